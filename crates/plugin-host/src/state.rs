//! Installed-state registry.
//!
//! Persists the set of package system names the user has marked installed,
//! as a TOML document (`installed.toml`). A legacy line-delimited
//! predecessor file (`installed.txt`, one name per line) is migrated to the
//! TOML format on first read and then deleted.
//!
//! The file is created lazily by the first mark call; there is no
//! in-memory-only fallback — a store that cannot be written fails the
//! mutating call with [`Error::Persistence`].

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::io::write_atomic;

/// Filename of the current-format installed-state document.
pub const INSTALLED_STATE_FILENAME: &str = "installed.toml";

/// Filename of the legacy line-delimited installed-state file.
pub const LEGACY_STATE_FILENAME: &str = "installed.txt";

#[derive(Debug, Default, Deserialize, Serialize)]
struct StateDoc {
    #[serde(default)]
    installed: Vec<String>,
}

/// Persisted set of installed package system names.
#[derive(Debug, Clone)]
pub struct InstalledStore {
    path: PathBuf,
    legacy_path: PathBuf,
}

impl InstalledStore {
    /// Create a store backed by `{state_dir}/installed.toml`.
    pub fn new(state_dir: &Path) -> Self {
        Self {
            path: state_dir.join(INSTALLED_STATE_FILENAME),
            legacy_path: state_dir.join(LEGACY_STATE_FILENAME),
        }
    }

    /// Read the installed set.
    ///
    /// When the current-format file is absent, attempts migration from the
    /// legacy file. When neither exists, returns an empty set.
    pub fn list_installed(&self) -> Result<BTreeSet<String>> {
        if self.path.exists() {
            let content = fs::read_to_string(&self.path)
                .map_err(|e| self.persistence(format!("read failed: {e}")))?;
            let doc: StateDoc = toml::from_str(&content)
                .map_err(|e| self.persistence(format!("parse failed: {e}")))?;
            return Ok(doc.installed.into_iter().collect());
        }

        if self.legacy_path.exists() {
            return self.migrate_legacy();
        }

        Ok(BTreeSet::new())
    }

    /// Add a name to the installed set. Adding a present name is a no-op.
    pub fn mark_installed(&self, system_name: &str) -> Result<()> {
        let mut installed = self.list_installed()?;
        if installed.insert(system_name.to_string()) {
            debug!(package = system_name, "marking package installed");
            self.persist(&installed)?;
        }
        Ok(())
    }

    /// Remove a name from the installed set. Removing an absent name is a
    /// no-op.
    pub fn mark_uninstalled(&self, system_name: &str) -> Result<()> {
        let mut installed = self.list_installed()?;
        if installed.remove(system_name) {
            debug!(package = system_name, "marking package uninstalled");
            self.persist(&installed)?;
        }
        Ok(())
    }

    /// Delete the persisted state entirely; a subsequent
    /// [`list_installed`](Self::list_installed) returns an empty set.
    pub fn clear_all(&self) -> Result<()> {
        for path in [&self.path, &self.legacy_path] {
            match fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(self.persistence(format!("delete failed: {e}"))),
            }
        }
        Ok(())
    }

    /// Migrate the legacy line-delimited file: one name per line, names
    /// trimmed, blank lines ignored. Persists the new format, then deletes
    /// the legacy file.
    fn migrate_legacy(&self) -> Result<BTreeSet<String>> {
        let content = fs::read_to_string(&self.legacy_path)
            .map_err(|e| self.persistence(format!("legacy read failed: {e}")))?;
        let installed: BTreeSet<String> = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();

        self.persist(&installed)?;

        // Migration already succeeded; a stuck legacy file is housekeeping.
        if let Err(e) = fs::remove_file(&self.legacy_path) {
            warn!(
                path = %self.legacy_path.display(),
                error = %e,
                "failed to delete legacy installed-state file after migration"
            );
        }

        info!(
            count = installed.len(),
            path = %self.path.display(),
            "migrated legacy installed-state file"
        );
        Ok(installed)
    }

    fn persist(&self, installed: &BTreeSet<String>) -> Result<()> {
        let doc = StateDoc {
            installed: installed.iter().cloned().collect(),
        };
        let content = toml::to_string_pretty(&doc)
            .map_err(|e| self.persistence(format!("serialize failed: {e}")))?;
        write_atomic(&self.path, content.as_bytes())
            .map_err(|e| self.persistence(format!("write failed: {e}")))
    }

    fn persistence(&self, reason: String) -> Error {
        Error::Persistence {
            path: self.path.clone(),
            reason,
        }
    }
}
