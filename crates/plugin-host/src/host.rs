//! Host collaborator contract for module registration.
//!
//! The plugin manager does not own the host application's module registry;
//! it is handed a [`ModuleHost`] and pushes deployed artifacts into it. The
//! trait also supplies the host's current version (consumed by the
//! compatibility filter) and name-based lookups used to avoid deploying
//! shared dependencies twice.

use std::path::Path;

/// Opaque reference to a module registered with the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleHandle(pub u64);

/// Result of registering a deployed artifact with the host.
#[derive(Debug, Clone)]
pub struct RegisteredModule {
    /// Handle the host assigned to the loaded module.
    pub handle: ModuleHandle,
    /// Entry-point type name the module registered, if any.
    ///
    /// The registration convention yields at most one entry point per
    /// module; a module that registers none is discovery-only.
    pub entry_point: Option<String>,
}

/// A module failed to load or only partially loaded.
///
/// Carries one message per offending sub-component; the orchestrator
/// aggregates these into a single fatal load error for the package.
#[derive(Debug)]
pub struct ModuleLoadFailure {
    pub causes: Vec<String>,
}

impl ModuleLoadFailure {
    pub fn new(cause: impl Into<String>) -> Self {
        Self {
            causes: vec![cause.into()],
        }
    }
}

impl std::fmt::Display for ModuleLoadFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.causes.join("; "))
    }
}

/// The host application's module registry, as seen by the plugin manager.
pub trait ModuleHost {
    /// The host's current version string, matched against each manifest's
    /// `supported_host_versions`.
    fn current_version(&self) -> String;

    /// Load a deployed artifact into the process and register it.
    ///
    /// Returns the assigned handle and the entry point the module
    /// registered, or the aggregated causes when loading fails.
    fn register_module(
        &mut self,
        artifact: &Path,
    ) -> std::result::Result<RegisteredModule, ModuleLoadFailure>;

    /// Whether a module with this logical name is already loaded in the
    /// running process. Logical names are lowercased file stems.
    fn is_module_loaded(&self, logical_name: &str) -> bool;

    /// Whether the host ships a base library with this logical name.
    fn has_base_library(&self, logical_name: &str) -> bool;
}
