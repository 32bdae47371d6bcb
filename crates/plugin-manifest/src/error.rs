use std::path::PathBuf;

/// Errors that can occur while reading or writing package manifests.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Failed to parse package manifest TOML.
    #[error("failed to parse package manifest: {0}")]
    ManifestParse(#[from] toml::de::Error),

    /// Package manifest file not found at the expected path.
    #[error("package manifest not found: {}", .0.display())]
    ManifestNotFound(PathBuf),

    /// Failed to serialize package manifest.
    #[error("failed to serialize package manifest: {0}")]
    ManifestSerialize(String),

    /// I/O error reading a manifest file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
