//! Render orchestration and whitelist pruning.

use std::fs;
use std::path::Path;

use walkdir::WalkDir;

use cask_core::error::Result;
use cask_core::hash::ImageHash;

use crate::extract::extract_tar;
use crate::flatten::{flatten, Image};
use crate::store::BlobStore;
use crate::whitelist::{PathWhitelist, ROOTFS_DIR};

/// Render the image stored under `hash`, and every image it transitively
/// depends on, into `dir`.
///
/// Layers are extracted deepest-first so that images nearer the consumer
/// overwrite what their dependencies provided; each level transition upward
/// applies the arriving image's path whitelist to everything accumulated
/// below it. On success `dir` holds exactly one top-level `manifest` (from
/// the root image) and the overlaid `rootfs/` subtree.
///
/// The caller owns `dir`; partial output left behind by a failed render is
/// the caller's to discard.
pub fn render_image<S: BlobStore>(store: &S, hash: &ImageHash, dir: &Path) -> Result<()> {
    let images = flatten(store, hash)?;

    tracing::info!(
        image = %hash,
        layers = images.len(),
        target = %dir.display(),
        "rendering image"
    );

    let mut prev_level = match images.last() {
        Some(deepest) => deepest.level(),
        None => return Ok(()),
    };

    for image in images.iter().rev() {
        render_layer(store, image, dir, prev_level)?;
        if image.level() < prev_level {
            prev_level = image.level();
        }
    }

    tracing::info!(image = %hash, "rendered image");
    Ok(())
}

fn render_layer<S: BlobStore>(
    store: &S,
    image: &Image,
    dir: &Path,
    prev_level: u16,
) -> Result<()> {
    let whitelist = PathWhitelist::from_manifest(image.manifest());

    tracing::debug!(image = %image.hash(), level = image.level(), "extracting layer");
    let stream = store.read_stream(image.hash().as_str())?;
    extract_tar(stream, dir, true, &whitelist)?;

    // A drop in level means every deeper layer has been written; this
    // image's whitelist now decides what survives from them.
    if image.level() < prev_level && !whitelist.is_empty() {
        prune(dir, &whitelist)?;
    }

    Ok(())
}

/// Delete files under `dir/rootfs` that the whitelist does not list, then
/// sweep directories left empty that are not themselves listed.
fn prune(dir: &Path, whitelist: &PathWhitelist) -> Result<()> {
    let rootfs = dir.join(ROOTFS_DIR);
    if !rootfs.is_dir() {
        return Ok(());
    }

    // File pass. Directories are skipped here: a directory may hold a
    // whitelisted file and has to survive for it.
    for entry in WalkDir::new(&rootfs) {
        let entry = entry.map_err(io_error)?;
        if entry.file_type().is_dir() {
            continue;
        }
        let Ok(relpath) = entry.path().strip_prefix(dir) else {
            continue;
        };
        if !whitelist.contains(relpath) {
            tracing::debug!(path = %relpath.display(), "pruning file outside whitelist");
            fs::remove_file(entry.path())?;
        }
    }

    remove_empty_dirs(dir, &rootfs, whitelist)
}

/// Bottom-up sweep removing directories left empty that the whitelist does
/// not list. A directory with any surviving descendant is kept whether or
/// not it is listed.
fn remove_empty_dirs(base: &Path, dir: &Path, whitelist: &PathWhitelist) -> Result<()> {
    let mut subdirs = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            subdirs.push(entry.path());
        }
    }
    for subdir in subdirs {
        remove_empty_dirs(base, &subdir, whitelist)?;
    }

    if fs::read_dir(dir)?.next().is_none() {
        let Ok(relpath) = dir.strip_prefix(base) else {
            return Ok(());
        };
        if !whitelist.contains(relpath) {
            tracing::debug!(dir = %relpath.display(), "pruning empty directory");
            fs::remove_dir(dir)?;
        }
    }

    Ok(())
}

fn io_error(err: walkdir::Error) -> cask_core::CaskError {
    cask_core::CaskError::Io(err.into())
}
