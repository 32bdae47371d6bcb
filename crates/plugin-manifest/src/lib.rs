//! Package manifest layer for Plugin Manager.
//!
//! This crate provides manifest parsing, serialization, and host-version
//! compatibility classification for plugin packages. It performs no
//! filesystem writes; deployment and state tracking live in `plugin-host`.

pub mod compat;
pub mod error;
pub mod manifest;

/// The canonical filename for package manifest files.
///
/// Each package directory must contain a file with this name at its root so
/// the plugin manager can discover and validate the package.
pub const MANIFEST_FILENAME: &str = "plugin_package.toml";

pub use compat::is_compatible;
pub use error::Error;
pub use manifest::{LEGACY_HOST_VERSION, PackageManifest};
