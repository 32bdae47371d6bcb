//! Error types for plugin-host operations.

use std::path::PathBuf;

/// Result type for plugin-host operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during package discovery, deployment, and loading.
///
/// Incompatibility with the host version is deliberately absent: it is a
/// classification outcome recorded in the published snapshot, never an
/// error. Faults raised while processing one package are wrapped in
/// [`Error::Package`] so startup logs show a readable chain of causes.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Manifest error from plugin-manifest.
    #[error(transparent)]
    Manifest(#[from] plugin_manifest::Error),

    /// Failed to parse manager configuration TOML.
    #[error("failed to parse manager config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Missing or duplicate system name, or other descriptor violation.
    #[error("invalid package '{name}': {reason}")]
    Validation { name: String, reason: String },

    /// Shadow copy failed even after the locked-file recovery retry.
    #[error("failed to deploy {}: {reason}", .path.display())]
    Deployment { path: PathBuf, reason: String },

    /// The deployed binary failed to load or only partially loaded.
    #[error("failed to load module for '{friendly_name}': {}", .causes.join("; "))]
    Load {
        friendly_name: String,
        causes: Vec<String>,
    },

    /// The installed-state file could not be read or written.
    #[error("installed-state persistence failed at {}: {reason}", .path.display())]
    Persistence { path: PathBuf, reason: String },

    /// A fault wrapped with the offending package's identity.
    #[error("error processing package '{context}': {source}")]
    Package {
        context: String,
        #[source]
        source: Box<Error>,
    },

    /// The descriptor has no recorded manifest location to rewrite.
    #[error("manifest location unknown for package '{0}'")]
    ManifestLocationUnknown(String),

    /// Standard I/O error with the path it occurred at.
    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Wrap an error with the friendly name and version of the package
    /// being processed when it was raised.
    pub fn in_package(self, friendly_name: &str, version: &str) -> Self {
        let context = format!("{friendly_name} {version}").trim().to_string();
        Self::Package {
            context,
            source: Box::new(self),
        }
    }
}
