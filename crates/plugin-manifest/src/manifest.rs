//! Package manifest parsing for `plugin_package.toml` files.
//!
//! A package manifest declares a package's identity, version compatibility,
//! and load order. The canonical filename is
//! [`MANIFEST_FILENAME`](crate::MANIFEST_FILENAME) (`plugin_package.toml`).
//!
//! # Example TOML
//!
//! ```toml
//! system_name = "Widgets.Example"
//! friendly_name = "Example Widgets"
//! version = "1.2.0"
//! supported_host_versions = ["2.00", "2.10"]
//! display_order = 10
//! main_artifact_file_name = "widgets_example.so"
//! ```
//!
//! Every field has a default, so an empty document parses into a degenerate
//! but valid manifest. A manifest with an empty `system_name` is rejected
//! later, when the discovery pass validates accepted packages.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Host version injected into manifests that predate version metadata.
///
/// Packages authored before `supported_host_versions` existed declare
/// nothing, and are treated as supporting exactly this host version.
pub const LEGACY_HOST_VERSION: &str = "2.00";

/// A package manifest loaded from `plugin_package.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct PackageManifest {
    /// Unique package identifier (e.g., "Widgets.Example").
    pub system_name: String,
    /// Human-readable package name.
    pub friendly_name: String,
    /// Package version string.
    pub version: String,
    /// Host versions this package supports, in declared order.
    ///
    /// When empty after parsing, [`LEGACY_HOST_VERSION`] is injected.
    pub supported_host_versions: Vec<String>,
    /// Ascending load-order key; ties keep discovery order.
    pub display_order: i32,
    /// File name of the package's main binary artifact.
    ///
    /// Empty means the package is discovery-only and is never deployed.
    pub main_artifact_file_name: String,
}

impl PackageManifest {
    /// Parse a package manifest from a TOML string.
    ///
    /// An empty document yields a manifest with all defaults. If no
    /// supported host versions are declared, the legacy value is injected.
    pub fn from_toml(content: &str) -> Result<Self> {
        let mut manifest: Self = toml::from_str(content)?;
        if manifest.supported_host_versions.is_empty() {
            manifest
                .supported_host_versions
                .push(LEGACY_HOST_VERSION.to_string());
        }
        Ok(manifest)
    }

    /// Read and parse a package manifest from a file path.
    pub fn from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::ManifestNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Serialize the manifest back to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::ManifestSerialize(e.to_string()))
    }
}
