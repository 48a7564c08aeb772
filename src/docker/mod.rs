//! Container runtime integration.
//!
//! This module provides:
//! - The [`Stack`] and [`RegistryAuthenticator`] interfaces
//! - A `docker compose` implementation of [`Stack`]
//! - Registry login and daemon checks through the docker CLI
//! - A bounded command executor shared with the git integration

mod compose;
mod executor;
mod registry;
mod stack;

pub use compose::ComposeStack;
pub use executor::{CommandExecutor, CommandResult};
pub use registry::RegistryClient;
pub use stack::{ManifestSnapshot, RegistryAuthenticator, Stack};
