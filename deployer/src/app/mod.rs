//! Application wiring: settings, options and the deploy run

pub mod options;
pub mod run;
pub mod settings;
