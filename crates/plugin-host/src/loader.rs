//! Dynamic module host backed by `libloading`.
//!
//! Loaded artifacts identify their entry point through an explicit
//! registration convention rather than runtime type introspection: each
//! plugin library may export the well-known symbol
//! [`ENTRY_POINT_SYMBOL`], an `extern "C"` function returning the
//! NUL-terminated name of its entry-point type. A library without the
//! symbol loads fine and is treated as discovery-only.
//!
//! # Plugin-side export
//!
//! ```rust,ignore
//! #[unsafe(no_mangle)]
//! pub extern "C" fn plugin_entry_type_name() -> *const std::os::raw::c_char {
//!     c"Widgets.Example.WidgetPlugin".as_ptr()
//! }
//! ```

use std::collections::HashSet;
use std::ffi::CStr;
use std::os::raw::c_char;
use std::path::Path;

use libloading::Library;
use tracing::{debug, info};

use crate::deploy::logical_name;
use crate::host::{ModuleHandle, ModuleHost, ModuleLoadFailure, RegisteredModule};

/// Well-known symbol a plugin library exports to register its entry point.
pub const ENTRY_POINT_SYMBOL: &str = "plugin_entry_type_name";

type EntryTypeNameFn = unsafe extern "C" fn() -> *const c_char;

/// A [`ModuleHost`] that loads deployed artifacts into the running process
/// with `dlopen`/`LoadLibrary`.
///
/// Library handles are retained for the life of the host; there is no
/// unloading (the pipeline has no hot-reload).
pub struct DynamicModuleHost {
    version: String,
    base_libraries: HashSet<String>,
    libraries: Vec<Library>,
    loaded_names: HashSet<String>,
}

impl DynamicModuleHost {
    /// Create a host reporting the given current version.
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            base_libraries: HashSet::new(),
            libraries: Vec::new(),
            loaded_names: HashSet::new(),
        }
    }

    /// Declare the host's base library set, by logical name.
    pub fn with_base_libraries<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.base_libraries = names
            .into_iter()
            .map(|n| n.into().to_ascii_lowercase())
            .collect();
        self
    }

    /// Number of modules currently registered.
    pub fn loaded_count(&self) -> usize {
        self.libraries.len()
    }
}

impl ModuleHost for DynamicModuleHost {
    fn current_version(&self) -> String {
        self.version.clone()
    }

    fn register_module(
        &mut self,
        artifact: &Path,
    ) -> std::result::Result<RegisteredModule, ModuleLoadFailure> {
        // SAFETY: loading a plugin library executes its initializers; the
        // deployment pipeline only hands us artifacts shipped inside a
        // recognized package directory.
        let library = unsafe { Library::new(artifact) }.map_err(|e| {
            ModuleLoadFailure::new(format!("failed to load {}: {e}", artifact.display()))
        })?;

        // SAFETY: the symbol, when present, follows the documented
        // extern "C" signature and returns a static NUL-terminated string.
        let entry_point = unsafe {
            match library.get::<EntryTypeNameFn>(ENTRY_POINT_SYMBOL.as_bytes()) {
                Ok(entry_fn) => {
                    let ptr = entry_fn();
                    if ptr.is_null() {
                        None
                    } else {
                        Some(CStr::from_ptr(ptr).to_string_lossy().into_owned())
                    }
                }
                Err(_) => {
                    debug!(
                        artifact = %artifact.display(),
                        "no entry-point symbol, module is discovery-only"
                    );
                    None
                }
            }
        };

        self.libraries.push(library);
        self.loaded_names.insert(logical_name(artifact));
        let handle = ModuleHandle(self.libraries.len() as u64);

        info!(
            artifact = %artifact.display(),
            entry_point = entry_point.as_deref().unwrap_or("<none>"),
            "registered module"
        );
        Ok(RegisteredModule {
            handle,
            entry_point,
        })
    }

    fn is_module_loaded(&self, logical_name: &str) -> bool {
        self.loaded_names.contains(&logical_name.to_ascii_lowercase())
    }

    fn has_base_library(&self, logical_name: &str) -> bool {
        self.base_libraries
            .contains(&logical_name.to_ascii_lowercase())
    }
}
