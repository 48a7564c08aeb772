//! Compose manifest loading, labels, and fingerprinting.

mod hash;
mod parser;
mod spec;

pub use hash::{ManifestHasher, canonicalize};
pub use parser::{LoadedManifest, ManifestParser, interpolate};
pub use spec::*;
