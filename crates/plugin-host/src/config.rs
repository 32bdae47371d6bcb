//! Manager configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Configuration for a [`PluginManager`](crate::PluginManager).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ManagerConfig {
    /// Directory containing one subdirectory per package.
    pub packages_root: PathBuf,
    /// Isolated directory the deployment engine shadow-copies into.
    pub deployment_dir: PathBuf,
    /// Directory holding the installed-state registry files.
    pub state_dir: PathBuf,
    /// When set, all prior deployed artifacts (except the recognized
    /// placeholder file) are removed before redeploying.
    #[serde(default)]
    pub clear_deployment_dir_on_startup: bool,
}

impl ManagerConfig {
    /// Conventional layout under a single root directory:
    /// `{root}/packages`, `{root}/deployed`, `{root}/state`.
    pub fn under_root(root: &Path) -> Self {
        Self {
            packages_root: root.join("packages"),
            deployment_dir: root.join("deployed"),
            state_dir: root.join("state"),
            clear_deployment_dir_on_startup: false,
        }
    }

    /// Parse a configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(Error::from)
    }
}
