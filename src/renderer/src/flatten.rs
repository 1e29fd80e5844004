//! Dependency flattening.

use cask_core::error::{CaskError, Result};
use cask_core::hash::ImageHash;
use cask_core::manifest::ImageManifest;

use crate::store::BlobStore;

/// An image positioned in the flattened dependency list.
#[derive(Debug, Clone)]
pub struct Image {
    manifest: ImageManifest,
    hash: ImageHash,
    level: u16,
}

impl Image {
    /// The image's parsed manifest.
    pub fn manifest(&self) -> &ImageManifest {
        &self.manifest
    }

    /// The image's content hash.
    pub fn hash(&self) -> &ImageHash {
        &self.hash
    }

    /// Depth in the dependency tree; 0 for the root image. A lower level
    /// means higher precedence during rendering.
    pub fn level(&self) -> u16 {
        self.level
    }
}

/// Flatten the dependency tree rooted at `hash` into render order.
///
/// The result is a pre-order enumeration: the root first at level 0, and
/// each image's declared dependencies spliced in directly after it at
/// level + 1 (which reads as reverse declared order left-to-right). An
/// entry earlier in the list takes precedence over every later entry when
/// the renderer overlays them.
///
/// The same image may legitimately appear more than once when it is
/// reachable through several parents. An image that appears in its own
/// dependency chain fails with [`CaskError::DependencyCycle`].
pub fn flatten<S: BlobStore>(store: &S, hash: &ImageHash) -> Result<Vec<Image>> {
    let manifest = store.get_manifest(hash.as_str())?;
    let mut images = vec![Image {
        manifest,
        hash: hash.clone(),
        level: 0,
    }];
    // Ancestor chains, index-aligned with `images`, for cycle detection.
    let mut ancestries: Vec<Vec<ImageHash>> = vec![vec![hash.clone()]];

    // The list grows while it is traversed; re-read the length each step.
    let mut i = 0;
    while i < images.len() {
        let dependencies = images[i].manifest.dependencies.clone();
        let level = images[i].level;
        let ancestry = ancestries[i].clone();

        for dependency in &dependencies {
            let dep_hash =
                dependency
                    .hash
                    .as_deref()
                    .ok_or_else(|| CaskError::MissingDependencyHash {
                        image: images[i].hash.to_string(),
                        name: dependency.name.clone(),
                    })?;
            let dep_hash = ImageHash::parse(dep_hash)?;

            if ancestry.contains(&dep_hash) {
                return Err(CaskError::DependencyCycle(dep_hash.to_string()));
            }

            let manifest = store.get_manifest(dep_hash.as_str())?;
            tracing::debug!(
                image = %dep_hash,
                level = level + 1,
                "flattened dependency"
            );

            let mut dep_ancestry = ancestry.clone();
            dep_ancestry.push(dep_hash.clone());
            images.insert(
                i + 1,
                Image {
                    manifest,
                    hash: dep_hash,
                    level: level + 1,
                },
            );
            ancestries.insert(i + 1, dep_ancestry);
        }

        i += 1;
    }

    Ok(images)
}
