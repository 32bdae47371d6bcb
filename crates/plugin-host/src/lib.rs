//! Package deployment and lifecycle layer for Plugin Manager.
//!
//! This crate implements the discovery-and-deployment pipeline that runs
//! once at host startup:
//!
//! - **Installed-state store**: persisted set of installed package names,
//!   with migration from the legacy line-delimited format
//! - **Deployment engine**: shadow-copies package artifacts into an
//!   isolated deployment directory to avoid file-lock conflicts with the
//!   originals
//! - **Loader/registrar**: hands deployed artifacts to the host's module
//!   registry and binds each package's entry-point type
//! - **Orchestrator**: [`PluginManager`] sequences the pass under an
//!   exclusive guard and publishes an immutable snapshot
//!
//! Manifest parsing and compatibility classification live in
//! `plugin-manifest`.

pub mod config;
pub mod deploy;
pub mod descriptor;
pub mod error;
pub mod host;
pub mod io;
pub mod loader;
pub mod manager;
pub mod state;

pub use config::ManagerConfig;
pub use descriptor::PackageDescriptor;
pub use error::{Error, Result};
pub use host::{ModuleHandle, ModuleHost, ModuleLoadFailure, RegisteredModule};
pub use loader::DynamicModuleHost;
pub use manager::{DiscoverySnapshot, PluginManager};
pub use state::InstalledStore;
