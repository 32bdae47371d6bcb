//! Host-version compatibility classification.
//!
//! A package is compatible with the running host when the host's current
//! version string appears in the manifest's `supported_host_versions` list.
//! The match is exact but case-insensitive; no range or semver semantics
//! apply. Incompatibility is a routine classification outcome, not an
//! error — incompatible packages are recorded by name and dropped from the
//! rest of the discovery pass.

use crate::manifest::PackageManifest;

/// Classify a manifest against the host's current version string.
pub fn is_compatible(manifest: &PackageManifest, host_version: &str) -> bool {
    manifest
        .supported_host_versions
        .iter()
        .any(|v| v.eq_ignore_ascii_case(host_version))
}
