use std::path::PathBuf;

use thiserror::Error;

/// Cask error types
#[derive(Error, Debug)]
pub enum CaskError {
    /// Dependency declared without a content hash
    #[error("dependency \"{name}\" of image {image} has no hash")]
    MissingDependencyHash {
        /// Key of the image declaring the dependency
        image: String,
        /// Name of the dependency missing a hash
        name: String,
    },

    /// Image manifest missing or not parseable
    #[error("malformed manifest in image {key}: {reason}")]
    MalformedManifest { key: String, reason: String },

    /// No blob stored under the given key
    #[error("blob not found: {0}")]
    BlobNotFound(String),

    /// Key not in canonical form, or a prefix that does not resolve uniquely
    #[error("invalid key \"{key}\": {reason}")]
    InvalidKey { key: String, reason: String },

    /// Malformed tar stream
    #[error("tar format error: {0}")]
    TarFormat(String),

    /// Link entry whose target escapes the render directory
    #[error("insecure link {path:?} -> {target:?}")]
    InsecureLink { path: PathBuf, target: PathBuf },

    /// Tar entry type the extractor does not handle
    #[error("unsupported tar entry type {type_byte:#04x} for {path:?}")]
    UnsupportedEntryType { path: PathBuf, type_byte: u8 },

    /// Image reachable through its own dependency chain
    #[error("dependency cycle through image {0}")]
    DependencyCycle(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for cask operations
pub type Result<T> = std::result::Result<T, CaskError>;
