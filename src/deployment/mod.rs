//! Deployments and their lifecycle state machine.

mod entity;
mod state;

pub use entity::Deployment;
pub use state::{DeploymentConfig, DeploymentState};
