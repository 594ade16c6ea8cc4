//! Lambda Deployer Library
//!
//! Resolves, builds, publishes and promotes a Lambda function, and tails
//! its logs.

pub mod app;
pub mod deploy;
pub mod errors;
pub mod filesys;
pub mod logs;
pub mod platform;
pub mod tail;
pub mod utils;
