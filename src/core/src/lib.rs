//! Cask Core - Foundational Types
//!
//! This module provides the foundational types shared by the cask renderer
//! and CLI: the error type, content hash handling, and the image manifest
//! model.

pub mod error;
pub mod hash;
pub mod manifest;

// Re-export commonly used types
pub use error::{CaskError, Result};
pub use hash::ImageHash;
pub use manifest::{Dependency, ImageManifest};

/// Cask version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
