//! Tar extraction for image layers.
//!
//! Extracts a tar stream into a target directory with optional whitelist
//! filtering, overwrite discipline, and link-escape defense, then restores
//! directory timestamps from the headers once the stream is drained. Entry
//! modes are applied with an explicit chmod after creation; the process
//! umask is never consulted, so concurrent extractions do not interfere.

use std::fs::{self, File};
use std::io::{self, Read};
use std::os::unix::fs::{symlink, PermissionsExt};
use std::path::{Path, PathBuf};

use filetime::FileTime;
use nix::sys::stat::{makedev, mknod, Mode, SFlag};
use tar::{Archive, Entry, EntryType, Header};

use cask_core::error::{CaskError, Result};

use crate::paths::clean;
use crate::whitelist::PathWhitelist;

/// Mode for parent directories created on demand.
const IMPLICIT_DIR_MODE: u32 = 0o755;

/// Extract a tar stream into `dir`.
///
/// With a non-empty `whitelist`, entries whose cleaned name is not a member
/// are skipped entirely. With `overwrite`, paths already present in `dir`
/// are replaced according to the arriving entry type: an existing directory
/// is recursively removed when the entry is not a directory, an existing
/// non-directory is unlinked, and a directory arriving over a directory
/// only has its mode updated.
///
/// Directory access and modification times are restored from the headers
/// after the whole stream is processed, in the order the directories were
/// encountered; writing children would otherwise clobber them.
pub fn extract_tar<R: Read>(
    reader: R,
    dir: &Path,
    overwrite: bool,
    whitelist: &PathWhitelist,
) -> Result<()> {
    let mut archive = Archive::new(reader);
    let mut dir_times: Vec<(PathBuf, FileTime, FileTime)> = Vec::new();

    for entry in archive.entries().map_err(tar_format)? {
        let mut entry = entry.map_err(tar_format)?;
        let name = clean(&entry.path().map_err(tar_format)?);

        if !whitelist.permits(&name) {
            tracing::debug!(entry = %name.display(), "entry not in path whitelist, skipping");
            continue;
        }

        let header = entry.header().clone();
        let dest = dir.join(&name);
        extract_entry(&mut entry, &header, &name, &dest, dir, overwrite)?;

        if header.entry_type() == EntryType::Directory {
            let (atime, mtime) = header_times(&header);
            dir_times.push((dest, atime, mtime));
        }
    }

    for (path, atime, mtime) in dir_times {
        filetime::set_file_times(&path, atime, mtime)?;
    }

    Ok(())
}

/// Extract the contents of a single regular-file entry, located by its
/// cleaned name.
pub fn extract_file_from_tar<R: Read>(reader: R, file: &str) -> Result<Vec<u8>> {
    let wanted = clean(Path::new(file));
    let mut archive = Archive::new(reader);

    for entry in archive.entries().map_err(tar_format)? {
        let mut entry = entry.map_err(tar_format)?;
        if clean(&entry.path().map_err(tar_format)?) != wanted {
            continue;
        }
        if entry.header().entry_type() != EntryType::Regular {
            return Err(CaskError::TarFormat(format!(
                "entry {} is not a regular file",
                wanted.display()
            )));
        }
        let mut buf = Vec::new();
        entry.read_to_end(&mut buf)?;
        return Ok(buf);
    }

    Err(CaskError::TarFormat(format!(
        "no {} entry in archive",
        wanted.display()
    )))
}

fn extract_entry<R: Read>(
    entry: &mut Entry<'_, R>,
    header: &Header,
    name: &Path,
    dest: &Path,
    dir: &Path,
    overwrite: bool,
) -> Result<()> {
    let kind = header.entry_type();

    if overwrite {
        if let Ok(existing) = fs::symlink_metadata(dest) {
            if kind != EntryType::Directory {
                if existing.is_dir() {
                    fs::remove_dir_all(dest)?;
                } else {
                    fs::remove_file(dest)?;
                }
            }
        }
    }

    if let Some(parent) = dest.parent() {
        create_implicit_dirs(parent)?;
    }

    let mode = header.mode().map_err(tar_format)? & 0o7777;

    match kind {
        EntryType::Regular => {
            let mut file = File::create(dest)?;
            io::copy(entry, &mut file)?;
            file.set_permissions(fs::Permissions::from_mode(mode))?;
        }
        EntryType::Directory => {
            // Already present: only the mode is updated.
            if fs::symlink_metadata(dest).is_err() {
                fs::create_dir(dest)?;
            }
            fs::set_permissions(dest, fs::Permissions::from_mode(mode))?;
        }
        EntryType::Symlink => {
            let target = link_target(entry, name)?;
            // A symlink resolves relative to its own directory.
            let resolved = clean(&dest.parent().unwrap_or(dir).join(&target));
            ensure_inside(dir, name, &target, &resolved)?;
            symlink(&target, dest)?;
        }
        EntryType::Link => {
            let target = link_target(entry, name)?;
            let resolved = clean(&dir.join(&target));
            ensure_inside(dir, name, &target, &resolved)?;
            fs::hard_link(&resolved, dest)?;
        }
        EntryType::Char | EntryType::Block => {
            let major = device_number(header.device_major(), name, "major")?;
            let minor = device_number(header.device_minor(), name, "minor")?;
            let sflag = if kind == EntryType::Char {
                SFlag::S_IFCHR
            } else {
                SFlag::S_IFBLK
            };
            mknod(
                dest,
                sflag,
                Mode::from_bits_truncate(mode),
                makedev(u64::from(major), u64::from(minor)),
            )
            .map_err(io::Error::from)?;
        }
        other => {
            return Err(CaskError::UnsupportedEntryType {
                path: name.to_path_buf(),
                type_byte: other.as_byte(),
            });
        }
    }

    let (atime, mtime) = header_times(header);
    if kind == EntryType::Symlink {
        filetime::set_symlink_file_times(dest, atime, mtime)?;
    } else {
        filetime::set_file_times(dest, atime, mtime)?;
    }

    Ok(())
}

/// Create the missing ancestors of `path` with an explicit 0755 mode.
fn create_implicit_dirs(path: &Path) -> io::Result<()> {
    let mut missing = Vec::new();
    let mut current = path;
    while fs::symlink_metadata(current).is_err() {
        missing.push(current.to_path_buf());
        match current.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => current = parent,
            _ => break,
        }
    }
    for dir in missing.iter().rev() {
        fs::create_dir(dir)?;
        fs::set_permissions(dir, fs::Permissions::from_mode(IMPLICIT_DIR_MODE))?;
    }
    Ok(())
}

fn link_target<R: Read>(entry: &Entry<'_, R>, name: &Path) -> Result<PathBuf> {
    let target = entry.link_name().map_err(tar_format)?.ok_or_else(|| {
        CaskError::TarFormat(format!("link entry {} has no target", name.display()))
    })?;
    Ok(target.into_owned())
}

fn ensure_inside(dir: &Path, entry: &Path, target: &Path, resolved: &Path) -> Result<()> {
    if resolved.starts_with(dir) {
        Ok(())
    } else {
        Err(CaskError::InsecureLink {
            path: entry.to_path_buf(),
            target: target.to_path_buf(),
        })
    }
}

fn device_number(
    field: io::Result<Option<u32>>,
    name: &Path,
    which: &str,
) -> Result<u32> {
    field.map_err(tar_format)?.ok_or_else(|| {
        CaskError::TarFormat(format!(
            "device entry {} has no {which} number",
            name.display()
        ))
    })
}

fn header_times(header: &Header) -> (FileTime, FileTime) {
    let mtime = header.mtime().unwrap_or(0);
    let atime = header
        .as_gnu()
        .and_then(|gnu| gnu.atime().ok())
        .unwrap_or(mtime);
    (
        FileTime::from_unix_time(atime as i64, 0),
        FileTime::from_unix_time(mtime as i64, 0),
    )
}

fn tar_format(err: io::Error) -> CaskError {
    CaskError::TarFormat(err.to_string())
}
