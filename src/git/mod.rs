//! Version-control integration.
//!
//! This module provides the [`ManifestRepository`] interface and its `git2`
//! implementation over a local working copy.

mod repository;
mod source;

pub use repository::{GitCredentials, GitRepository, MANIFEST_FILE, origin_credentials};
pub use source::ManifestRepository;
