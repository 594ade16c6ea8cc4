//! Deployment pipeline stages

pub mod artifact;
pub mod promoter;
pub mod publisher;
pub mod resolver;
pub mod waiter;
