//! Cask Renderer - dependency-aware image rendering.
//!
//! This module renders an image and its transitive dependencies from a
//! content-addressed blob store into a target directory. It supports:
//!
//! - Flattening a dependency tree into precedence order
//! - Tar extraction with overwrite discipline and link-escape defense
//! - Per-image path whitelists pruning inherited files
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                     Rendered directory                    │
//! │                                                           │
//! │  target/                                                  │
//! │  ├── manifest          (from the root image)              │
//! │  └── rootfs/           (ordered overlay of every layer)   │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Layers are extracted deepest-first; images nearer the consumer overwrite
//! what their dependencies provided, and each image's whitelist decides what
//! survives from the levels below it.

mod extract;
mod flatten;
mod paths;
mod render;
pub mod store;
mod whitelist;

pub use extract::{extract_file_from_tar, extract_tar};
pub use flatten::{flatten, Image};
pub use render::render_image;
pub use store::{BlobStore, DiskStore};
pub use whitelist::PathWhitelist;
