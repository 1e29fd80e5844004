//! Content-addressed blob store.
//!
//! Image blobs live under `blobs/sha512/<hex>` inside the store directory,
//! named by the truncated SHA-512 of their bytes. The renderer itself only
//! consumes the read capability ([`BlobStore`]); import and key resolution
//! exist for the CLI.

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use sha2::{Digest, Sha512};
use tempfile::NamedTempFile;

use cask_core::error::{CaskError, Result};
use cask_core::hash::{key_from_digest, ImageHash, HASH_PREFIX, KEY_LEN};
use cask_core::manifest::ImageManifest;

use crate::extract::extract_file_from_tar;
use crate::whitelist::MANIFEST_NAME;

/// Read capability over an image blob store.
///
/// This is all the renderer needs: a byte stream of an image's tar and the
/// parsed manifest it contains.
pub trait BlobStore {
    type Reader: Read;

    /// Open a read stream over the blob stored under `key`.
    fn read_stream(&self, key: &str) -> Result<Self::Reader>;

    /// Extract and parse the `manifest` entry of the image stored under
    /// `key`.
    fn get_manifest(&self, key: &str) -> Result<ImageManifest> {
        let stream = self.read_stream(key)?;
        let bytes = extract_file_from_tar(stream, MANIFEST_NAME).map_err(|err| match err {
            CaskError::TarFormat(reason) => CaskError::MalformedManifest {
                key: key.to_string(),
                reason,
            },
            other => other,
        })?;
        ImageManifest::from_json(&bytes).map_err(|err| CaskError::MalformedManifest {
            key: key.to_string(),
            reason: err.to_string(),
        })
    }
}

/// Magic bytes of a gzip stream.
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Disk-backed content-addressed store.
pub struct DiskStore {
    store_dir: PathBuf,
}

impl DiskStore {
    /// Open a store rooted at `store_dir`, creating the layout if needed.
    pub fn open(store_dir: impl Into<PathBuf>) -> Result<Self> {
        let store_dir = store_dir.into();
        fs::create_dir_all(store_dir.join("blobs").join("sha512"))?;
        Ok(Self { store_dir })
    }

    /// Import an image tar, returning its content hash key.
    ///
    /// Gzip-compressed input is detected by magic bytes and decompressed;
    /// the stored blob is always the plain tar. The stream is written to a
    /// temporary file while being hashed, then persisted at its content
    /// address. Importing an already-present blob returns the same key
    /// without rewriting it.
    pub fn import_image<R: Read>(&self, reader: R) -> Result<ImageHash> {
        let mut reader = maybe_decompress(reader)?;
        let mut tmp = NamedTempFile::new_in(&self.store_dir)?;
        let mut hasher = Sha512::new();
        let mut buf = [0u8; 32 * 1024];
        loop {
            let n = reader.read(&mut buf)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
            tmp.write_all(&buf[..n])?;
        }

        let key = key_from_digest(&hasher.finalize());
        let path = self.blob_path(&key);
        if path.exists() {
            tracing::debug!(key = %key, "blob already in store");
        } else {
            tmp.persist(&path).map_err(|err| CaskError::Io(err.error))?;
            tracing::debug!(key = %key, path = %path.display(), "imported blob");
        }

        ImageHash::parse(&key)
    }

    /// Expand an abbreviated `sha512-` key prefix to the unique stored key.
    pub fn resolve_key(&self, prefix: &str) -> Result<String> {
        let hex = prefix
            .strip_prefix(HASH_PREFIX)
            .ok_or_else(|| CaskError::InvalidKey {
                key: prefix.to_string(),
                reason: format!("key must start with \"{HASH_PREFIX}\""),
            })?;
        if hex.is_empty() || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(CaskError::InvalidKey {
                key: prefix.to_string(),
                reason: "key prefix must be non-empty hex".to_string(),
            });
        }
        let hex = hex.to_ascii_lowercase();

        let mut matches = Vec::new();
        for entry in fs::read_dir(self.blobs_dir())? {
            let name = entry?.file_name().to_string_lossy().into_owned();
            if name.starts_with(&hex) {
                matches.push(name);
            }
        }

        match matches.len() {
            0 => Err(CaskError::BlobNotFound(prefix.to_string())),
            1 => Ok(format!("{HASH_PREFIX}{}", matches.remove(0))),
            n => Err(CaskError::InvalidKey {
                key: prefix.to_string(),
                reason: format!("ambiguous key prefix ({n} matches)"),
            }),
        }
    }

    /// The store directory.
    pub fn store_dir(&self) -> &Path {
        &self.store_dir
    }

    fn blobs_dir(&self) -> PathBuf {
        self.store_dir.join("blobs").join("sha512")
    }

    fn blob_path(&self, key: &str) -> PathBuf {
        self.blobs_dir().join(key.trim_start_matches(HASH_PREFIX))
    }
}

impl BlobStore for DiskStore {
    type Reader = File;

    fn read_stream(&self, key: &str) -> Result<File> {
        if key.len() != KEY_LEN || !key.starts_with(HASH_PREFIX) {
            return Err(CaskError::InvalidKey {
                key: key.to_string(),
                reason: "not a canonical store key".to_string(),
            });
        }
        File::open(self.blob_path(key)).map_err(|err| {
            if err.kind() == io::ErrorKind::NotFound {
                CaskError::BlobNotFound(key.to_string())
            } else {
                err.into()
            }
        })
    }
}

/// Sniff the gzip magic and wrap the stream in a decoder when present.
fn maybe_decompress<'a, R: Read + 'a>(mut reader: R) -> io::Result<Box<dyn Read + 'a>> {
    let mut magic = [0u8; 2];
    let mut filled = 0;
    while filled < magic.len() {
        let n = reader.read(&mut magic[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }

    let rest = io::Cursor::new(magic[..filled].to_vec()).chain(reader);
    if filled == magic.len() && magic == GZIP_MAGIC {
        Ok(Box::new(GzDecoder::new(rest)))
    } else {
        Ok(Box::new(rest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use tempfile::TempDir;

    fn test_image_tar(manifest: &str) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        let mut header = tar::Header::new_gnu();
        header.set_entry_type(tar::EntryType::Regular);
        header.set_size(manifest.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, "manifest", manifest.as_bytes())
            .unwrap();
        builder.into_inner().unwrap()
    }

    const MANIFEST: &str = r#"{
        "acKind": "ImageManifest",
        "acVersion": "0.1.1",
        "name": "example.com/test01"
    }"#;

    #[test]
    fn test_open_creates_layout() {
        let tmp = TempDir::new().unwrap();
        let store_dir = tmp.path().join("store");
        let _store = DiskStore::open(&store_dir).unwrap();
        assert!(store_dir.join("blobs/sha512").is_dir());
    }

    #[test]
    fn test_import_and_read_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let store = DiskStore::open(tmp.path()).unwrap();
        let tar = test_image_tar(MANIFEST);

        let hash = store.import_image(&tar[..]).unwrap();
        assert_eq!(hash.as_str().len(), KEY_LEN);

        let mut stream = store.read_stream(hash.as_str()).unwrap();
        let mut bytes = Vec::new();
        stream.read_to_end(&mut bytes).unwrap();
        assert_eq!(bytes, tar);
    }

    #[test]
    fn test_import_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let store = DiskStore::open(tmp.path()).unwrap();
        let tar = test_image_tar(MANIFEST);

        let first = store.import_image(&tar[..]).unwrap();
        let second = store.import_image(&tar[..]).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_import_gzip_matches_plain() {
        let tmp = TempDir::new().unwrap();
        let store = DiskStore::open(tmp.path()).unwrap();
        let tar = test_image_tar(MANIFEST);

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&tar).unwrap();
        let gz = encoder.finish().unwrap();

        let plain_key = store.import_image(&tar[..]).unwrap();
        let gz_key = store.import_image(&gz[..]).unwrap();
        assert_eq!(plain_key, gz_key);
    }

    #[test]
    fn test_read_stream_not_found() {
        let tmp = TempDir::new().unwrap();
        let store = DiskStore::open(tmp.path()).unwrap();
        let key = format!("{HASH_PREFIX}{}", "ab".repeat(32));
        assert!(matches!(
            store.read_stream(&key),
            Err(CaskError::BlobNotFound(_))
        ));
    }

    #[test]
    fn test_read_stream_rejects_non_canonical_key() {
        let tmp = TempDir::new().unwrap();
        let store = DiskStore::open(tmp.path()).unwrap();
        assert!(matches!(
            store.read_stream("sha512-abcd"),
            Err(CaskError::InvalidKey { .. })
        ));
    }

    #[test]
    fn test_resolve_key_prefix() {
        let tmp = TempDir::new().unwrap();
        let store = DiskStore::open(tmp.path()).unwrap();
        let hash = store.import_image(&test_image_tar(MANIFEST)[..]).unwrap();

        let prefix = &hash.as_str()[..HASH_PREFIX.len() + 12];
        assert_eq!(store.resolve_key(prefix).unwrap(), hash.as_str());
    }

    #[test]
    fn test_resolve_key_not_found() {
        let tmp = TempDir::new().unwrap();
        let store = DiskStore::open(tmp.path()).unwrap();
        assert!(matches!(
            store.resolve_key("sha512-dead"),
            Err(CaskError::BlobNotFound(_))
        ));
    }

    #[test]
    fn test_resolve_key_rejects_bad_prefix() {
        let tmp = TempDir::new().unwrap();
        let store = DiskStore::open(tmp.path()).unwrap();
        assert!(matches!(
            store.resolve_key("md5-abcd"),
            Err(CaskError::InvalidKey { .. })
        ));
    }

    #[test]
    fn test_get_manifest() {
        let tmp = TempDir::new().unwrap();
        let store = DiskStore::open(tmp.path()).unwrap();
        let hash = store.import_image(&test_image_tar(MANIFEST)[..]).unwrap();

        let manifest = store.get_manifest(hash.as_str()).unwrap();
        assert_eq!(manifest.name, "example.com/test01");
    }

    #[test]
    fn test_get_manifest_missing_entry() {
        let tmp = TempDir::new().unwrap();
        let store = DiskStore::open(tmp.path()).unwrap();

        let mut builder = tar::Builder::new(Vec::new());
        let mut header = tar::Header::new_gnu();
        header.set_entry_type(tar::EntryType::Regular);
        header.set_size(5);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, "rootfs/a", &b"hello"[..])
            .unwrap();
        let tar = builder.into_inner().unwrap();

        let hash = store.import_image(&tar[..]).unwrap();
        assert!(matches!(
            store.get_manifest(hash.as_str()),
            Err(CaskError::MalformedManifest { .. })
        ));
    }

    #[test]
    fn test_get_manifest_bad_json() {
        let tmp = TempDir::new().unwrap();
        let store = DiskStore::open(tmp.path()).unwrap();
        let hash = store.import_image(&test_image_tar("not json")[..]).unwrap();
        assert!(matches!(
            store.get_manifest(hash.as_str()),
            Err(CaskError::MalformedManifest { .. })
        ));
    }
}
