//! Scenario tests driven by the in-memory platform

mod support;
mod test_pipeline;
mod test_resolver;
mod test_settings;
