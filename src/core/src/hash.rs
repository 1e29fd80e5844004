//! Content hash handling.
//!
//! Image blobs are addressed by `sha512-<hex>` keys. A store key keeps half
//! of the full digest hex: 64 characters after the prefix.

use std::fmt::{self, Write};

use crate::error::{CaskError, Result};

/// Prefix of every image key.
pub const HASH_PREFIX: &str = "sha512-";

/// Raw SHA-512 digest length in bytes.
const DIGEST_LEN: usize = 64;

/// Hex characters kept in a store key (half the full digest hex).
const KEY_HEX_LEN: usize = DIGEST_LEN;

/// Total length of a canonical store key.
pub const KEY_LEN: usize = HASH_PREFIX.len() + KEY_HEX_LEN;

/// A content hash identifying an image blob in the store.
///
/// Held in canonical form (`sha512-` followed by lowercase hex); equality is
/// byte identity on that form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageHash(String);

impl ImageHash {
    /// Parse a `sha512-<hex>` string, normalizing the hex to lowercase.
    pub fn parse(s: &str) -> Result<Self> {
        let hex = s
            .strip_prefix(HASH_PREFIX)
            .ok_or_else(|| CaskError::InvalidKey {
                key: s.to_string(),
                reason: format!("missing \"{HASH_PREFIX}\" prefix"),
            })?;

        if hex.is_empty() || hex.len() > DIGEST_LEN * 2 {
            return Err(CaskError::InvalidKey {
                key: s.to_string(),
                reason: format!("hex payload must be 1..={} characters", DIGEST_LEN * 2),
            });
        }
        if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(CaskError::InvalidKey {
                key: s.to_string(),
                reason: "hex payload contains non-hex characters".to_string(),
            });
        }

        Ok(Self(format!("{HASH_PREFIX}{}", hex.to_ascii_lowercase())))
    }

    /// The canonical `sha512-<hex>` form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImageHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Format the store key for a raw SHA-512 digest.
///
/// # Panics
///
/// Panics if `digest` is not exactly 64 bytes. Callers always pass the
/// output of a SHA-512 hasher; anything else is an internal invariant
/// violation.
pub fn key_from_digest(digest: &[u8]) -> String {
    assert_eq!(
        digest.len(),
        DIGEST_LEN,
        "bad digest passed to key_from_digest: {} bytes",
        digest.len()
    );

    let mut key = String::with_capacity(HASH_PREFIX.len() + digest.len() * 2);
    key.push_str(HASH_PREFIX);
    for byte in digest {
        // Writing to a String cannot fail.
        let _ = write!(key, "{byte:02x}");
    }
    key.truncate(KEY_LEN);
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_canonical() {
        let key = format!("{HASH_PREFIX}{}", "ab".repeat(32));
        let hash = ImageHash::parse(&key).unwrap();
        assert_eq!(hash.as_str(), key);
    }

    #[test]
    fn test_parse_normalizes_case() {
        let upper = format!("{HASH_PREFIX}{}", "AB".repeat(32));
        let lower = format!("{HASH_PREFIX}{}", "ab".repeat(32));
        let hash = ImageHash::parse(&upper).unwrap();
        assert_eq!(hash.as_str(), lower);
        assert_eq!(hash, ImageHash::parse(&lower).unwrap());
    }

    #[test]
    fn test_parse_missing_prefix() {
        let result = ImageHash::parse(&"ab".repeat(32));
        assert!(matches!(result, Err(CaskError::InvalidKey { .. })));
    }

    #[test]
    fn test_parse_non_hex() {
        let result = ImageHash::parse("sha512-zzzz");
        assert!(matches!(result, Err(CaskError::InvalidKey { .. })));
    }

    #[test]
    fn test_parse_empty_payload() {
        let result = ImageHash::parse("sha512-");
        assert!(matches!(result, Err(CaskError::InvalidKey { .. })));
    }

    #[test]
    fn test_key_from_digest() {
        let key = key_from_digest(&[0xabu8; 64]);
        assert_eq!(key.len(), KEY_LEN);
        assert_eq!(key, format!("{HASH_PREFIX}{}", "ab".repeat(32)));
    }

    #[test]
    #[should_panic(expected = "bad digest")]
    fn test_key_from_digest_wrong_length() {
        key_from_digest(&[0u8; 32]);
    }
}
