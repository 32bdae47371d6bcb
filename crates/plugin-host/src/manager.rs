//! Discovery-pass orchestrator.
//!
//! [`PluginManager`] sequences the full startup pipeline under an exclusive
//! process-local guard: ensure directories, read the installed registry,
//! enumerate and sort manifests, then per package filter, validate, deploy,
//! and load. A pass either publishes a complete new snapshot or fails and
//! leaves the previous snapshot in effect. Registrations made for packages
//! processed earlier in a failed pass are not rolled back.
//!
//! Snapshot readers never take the pass guard: they clone an
//! `Arc<DiscoverySnapshot>` that is only ever replaced wholesale.

use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tracing::{debug, info};

use plugin_manifest::{MANIFEST_FILENAME, PackageManifest, is_compatible};

use crate::config::ManagerConfig;
use crate::deploy;
use crate::descriptor::PackageDescriptor;
use crate::error::{Error, Result};
use crate::host::ModuleHost;
use crate::io::write_atomic;
use crate::state::InstalledStore;

/// Immutable result of one successful discovery pass.
#[derive(Debug, Clone, Default)]
pub struct DiscoverySnapshot {
    /// Accepted packages in load order, fully deployed and registered.
    pub accepted: Vec<PackageDescriptor>,
    /// System names of packages rejected by the compatibility filter.
    pub incompatible: Vec<String>,
}

/// Context object owning the discovery pipeline and its published snapshot.
pub struct PluginManager {
    config: ManagerConfig,
    store: InstalledStore,
    pass_guard: Mutex<()>,
    snapshot: RwLock<Arc<DiscoverySnapshot>>,
}

impl PluginManager {
    pub fn new(config: ManagerConfig) -> Self {
        let store = InstalledStore::new(&config.state_dir);
        Self {
            config,
            store,
            pass_guard: Mutex::new(()),
            snapshot: RwLock::new(Arc::new(DiscoverySnapshot::default())),
        }
    }

    /// Run one discovery pass and publish its snapshot.
    ///
    /// Serialized by the pass guard; expected to run once at host startup.
    /// Incompatible packages are routed to the incompatible list without
    /// failing the pass. Any other per-package fault is wrapped with that
    /// package's friendly name and version and aborts the whole pass; the
    /// previous snapshot, if any, stays published.
    pub fn initialize(&self, host: &mut dyn ModuleHost) -> Result<()> {
        let _pass = self
            .pass_guard
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        self.ensure_directories()?;
        if self.config.clear_deployment_dir_on_startup {
            info!(dir = %self.config.deployment_dir.display(), "clearing deployment directory");
            deploy::clear_deploy_dir(&self.config.deployment_dir);
        }

        let installed = self.store.list_installed()?;
        let mut descriptors = self.enumerate_descriptors()?;
        // Stable: equal display orders keep discovery order.
        descriptors.sort_by_key(|d| d.manifest.display_order);

        let host_version = host.current_version();
        let mut accepted: Vec<PackageDescriptor> = Vec::new();
        let mut incompatible: Vec<String> = Vec::new();

        for mut descriptor in descriptors {
            if !is_compatible(&descriptor.manifest, &host_version) {
                info!(
                    package = descriptor.system_name(),
                    host_version = %host_version,
                    "package does not support host version, skipping"
                );
                incompatible.push(descriptor.manifest.system_name.clone());
                continue;
            }

            let friendly = descriptor.manifest.friendly_name.clone();
            let version = descriptor.manifest.version.clone();
            self.process_descriptor(&mut descriptor, &accepted, &installed, host)
                .map_err(|e| e.in_package(&friendly, &version))?;
            accepted.push(descriptor);
        }

        info!(
            accepted = accepted.len(),
            incompatible = incompatible.len(),
            "publishing discovery snapshot"
        );
        let snapshot = Arc::new(DiscoverySnapshot {
            accepted,
            incompatible,
        });
        *self
            .snapshot
            .write()
            .unwrap_or_else(PoisonError::into_inner) = snapshot;
        Ok(())
    }

    /// The currently published snapshot.
    pub fn snapshot(&self) -> Arc<DiscoverySnapshot> {
        Arc::clone(
            &self
                .snapshot
                .read()
                .unwrap_or_else(PoisonError::into_inner),
        )
    }

    /// Accepted packages from the published snapshot, in load order.
    pub fn accepted_packages(&self) -> Vec<PackageDescriptor> {
        self.snapshot().accepted.clone()
    }

    /// System names the compatibility filter rejected.
    pub fn incompatible_package_names(&self) -> Vec<String> {
        self.snapshot().incompatible.clone()
    }

    /// Look up the accepted package whose bound entry point matches the
    /// given type name.
    pub fn find_package_by_entry_point(&self, type_name: &str) -> Option<PackageDescriptor> {
        self.snapshot()
            .accepted
            .iter()
            .find(|d| d.entry_point.as_deref() == Some(type_name))
            .cloned()
    }

    /// Persist a package as installed. Idempotent.
    pub fn mark_installed(&self, system_name: &str) -> Result<()> {
        let _pass = self
            .pass_guard
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        self.store.mark_installed(system_name)
    }

    /// Persist a package as uninstalled. Idempotent.
    pub fn mark_uninstalled(&self, system_name: &str) -> Result<()> {
        let _pass = self
            .pass_guard
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        self.store.mark_uninstalled(system_name)
    }

    /// Delete the installed-state registry entirely.
    pub fn mark_all_uninstalled(&self) -> Result<()> {
        let _pass = self
            .pass_guard
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        self.store.clear_all()
    }

    /// Rewrite the manifest document of a single package.
    ///
    /// Fails when the descriptor carries no manifest location.
    pub fn save_package_descriptor(&self, descriptor: &PackageDescriptor) -> Result<()> {
        let path = descriptor.manifest_path.as_ref().ok_or_else(|| {
            Error::ManifestLocationUnknown(descriptor.manifest.system_name.clone())
        })?;
        let content = descriptor.manifest.to_toml().map_err(Error::Manifest)?;
        write_atomic(path, content.as_bytes()).map_err(|e| Error::io(path, e))
    }

    fn ensure_directories(&self) -> Result<()> {
        for dir in [
            &self.config.packages_root,
            &self.config.deployment_dir,
            &self.config.state_dir,
        ] {
            fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
        }
        Ok(())
    }

    /// Walk the packages root for manifests nested exactly one level under
    /// a package directory. Directory order is made deterministic by name
    /// so the display-order sort has a stable tie-break input.
    fn enumerate_descriptors(&self) -> Result<Vec<PackageDescriptor>> {
        let root = &self.config.packages_root;
        let mut package_dirs: Vec<PathBuf> = fs::read_dir(root)
            .map_err(|e| Error::io(root, e))?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_dir())
            .collect();
        package_dirs.sort();

        let mut descriptors = Vec::new();
        for dir in package_dirs {
            let manifest_path = dir.join(MANIFEST_FILENAME);
            if !manifest_path.is_file() {
                debug!(dir = %dir.display(), "no manifest file, skipping directory");
                continue;
            }
            let dir_name = dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let manifest = PackageManifest::from_path(&manifest_path)
                .map_err(|e| Error::from(e).in_package(&dir_name, ""))?;
            debug!(
                package = %manifest.system_name,
                dir = %dir.display(),
                "discovered package"
            );
            descriptors.push(PackageDescriptor::discovered(manifest, manifest_path, dir));
        }
        Ok(descriptors)
    }

    fn process_descriptor(
        &self,
        descriptor: &mut PackageDescriptor,
        accepted: &[PackageDescriptor],
        installed: &BTreeSet<String>,
        host: &mut dyn ModuleHost,
    ) -> Result<()> {
        let system_name = descriptor.manifest.system_name.clone();
        if system_name.is_empty() {
            return Err(Error::Validation {
                name: system_name,
                reason: "missing system name".to_string(),
            });
        }
        if accepted.iter().any(|d| d.system_name() == system_name) {
            return Err(Error::Validation {
                name: system_name,
                reason: "duplicate system name".to_string(),
            });
        }

        descriptor.installed = installed.contains(&system_name);

        if descriptor.manifest.main_artifact_file_name.is_empty() {
            debug!(
                package = %system_name,
                "no main artifact declared, package is discovery-only"
            );
            return Ok(());
        }

        let artifacts = deploy::collect_artifacts(
            &descriptor.package_dir,
            &self.config.packages_root,
            &self.config.deployment_dir,
            &descriptor.manifest.main_artifact_file_name,
        )?;
        let main = artifacts.main.ok_or_else(|| Error::Deployment {
            path: descriptor
                .package_dir
                .join(&descriptor.manifest.main_artifact_file_name),
            reason: "declared main artifact not found".to_string(),
        })?;
        descriptor.original_artifact_path = Some(main.clone());

        let deployed_main = deploy::deploy_artifact(&main, &self.config.deployment_dir)?;
        for aux in &artifacts.auxiliary {
            let logical = deploy::logical_name(aux);
            if host.has_base_library(&logical) || host.is_module_loaded(&logical) {
                debug!(
                    dependency = %logical,
                    "shared dependency already available, skipping"
                );
                continue;
            }
            deploy::deploy_artifact(aux, &self.config.deployment_dir)?;
        }

        let registered = host
            .register_module(&deployed_main)
            .map_err(|failure| Error::Load {
                friendly_name: descriptor.manifest.friendly_name.clone(),
                causes: failure.causes,
            })?;
        descriptor.module = Some(registered.handle);
        descriptor.entry_point = registered.entry_point;
        Ok(())
    }
}
