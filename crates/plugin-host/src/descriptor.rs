//! Runtime package descriptor.

use std::path::PathBuf;

use plugin_manifest::PackageManifest;

use crate::host::ModuleHandle;

/// One discovered package: its manifest plus the state the discovery pass
/// attaches to it.
///
/// `module` and `entry_point` are set only after the package's main
/// artifact has been deployed and registered with the host; a descriptor
/// that fails any stage never reaches the published snapshot.
#[derive(Debug, Clone)]
pub struct PackageDescriptor {
    /// The parsed manifest document.
    pub manifest: PackageManifest,
    /// Location of the manifest file, when known. Required for
    /// [`PluginManager::save_package_descriptor`](crate::PluginManager::save_package_descriptor).
    pub manifest_path: Option<PathBuf>,
    /// The package's directory under the packages root.
    pub package_dir: PathBuf,
    /// Whether the installed-state registry lists this package.
    pub installed: bool,
    /// Filesystem location of the unmodified main artifact.
    pub original_artifact_path: Option<PathBuf>,
    /// Handle of the loaded module, set after deployment and registration.
    pub module: Option<ModuleHandle>,
    /// Resolved entry-point type name, set after registration.
    pub entry_point: Option<String>,
}

impl PackageDescriptor {
    /// Create a descriptor for a freshly parsed manifest.
    pub fn discovered(
        manifest: PackageManifest,
        manifest_path: PathBuf,
        package_dir: PathBuf,
    ) -> Self {
        Self {
            manifest,
            manifest_path: Some(manifest_path),
            package_dir,
            installed: false,
            original_artifact_path: None,
            module: None,
            entry_point: None,
        }
    }

    /// The package's unique identifier.
    pub fn system_name(&self) -> &str {
        &self.manifest.system_name
    }
}
