//! Image manifest model.
//!
//! Every image tar carries a single top-level `manifest` entry: a JSON
//! object naming the image, its ordered dependencies, and an optional path
//! whitelist restricting what survives from dependency levels.

use serde::{Deserialize, Serialize};

/// Parsed image manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageManifest {
    /// Manifest kind marker; required to be present, not interpreted
    pub ac_kind: String,

    /// Schema version marker; required to be present, not interpreted
    pub ac_version: String,

    /// Human-readable image name
    pub name: String,

    /// Ordered dependency list
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<Dependency>,

    /// Absolute paths allowed to survive from dependency levels; empty
    /// means everything inherited is kept
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path_whitelist: Vec<String>,
}

/// A reference from one image to another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dependency {
    /// Human name of the dependency
    pub name: String,

    /// Content hash. Discovery by name is not implemented, so rendering
    /// requires this to be present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

impl ImageManifest {
    /// Parse a manifest from its JSON bytes.
    pub fn from_json(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal() {
        let manifest = ImageManifest::from_json(
            br#"{
                "acKind": "ImageManifest",
                "acVersion": "0.1.1",
                "name": "example.com/app"
            }"#,
        )
        .unwrap();

        assert_eq!(manifest.name, "example.com/app");
        assert!(manifest.dependencies.is_empty());
        assert!(manifest.path_whitelist.is_empty());
    }

    #[test]
    fn test_parse_full() {
        let manifest = ImageManifest::from_json(
            br#"{
                "acKind": "ImageManifest",
                "acVersion": "0.1.1",
                "name": "example.com/app",
                "dependencies": [
                    {"name": "example.com/base", "hash": "sha512-abcd"},
                    {"name": "example.com/extras"}
                ],
                "pathWhitelist": ["/a/file01.txt", "/c/"]
            }"#,
        )
        .unwrap();

        assert_eq!(manifest.dependencies.len(), 2);
        assert_eq!(manifest.dependencies[0].hash.as_deref(), Some("sha512-abcd"));
        assert!(manifest.dependencies[1].hash.is_none());
        assert_eq!(manifest.path_whitelist, vec!["/a/file01.txt", "/c/"]);
    }

    #[test]
    fn test_parse_missing_name() {
        let result = ImageManifest::from_json(
            br#"{"acKind": "ImageManifest", "acVersion": "0.1.1"}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_roundtrip_keeps_field_names() {
        let manifest = ImageManifest {
            ac_kind: "ImageManifest".to_string(),
            ac_version: "0.1.1".to_string(),
            name: "example.com/app".to_string(),
            dependencies: vec![Dependency {
                name: "example.com/base".to_string(),
                hash: Some("sha512-abcd".to_string()),
            }],
            path_whitelist: vec!["/a".to_string()],
        };

        let json = serde_json::to_string(&manifest).unwrap();
        assert!(json.contains("\"acKind\""));
        assert!(json.contains("\"pathWhitelist\""));
        assert_eq!(ImageManifest::from_json(json.as_bytes()).unwrap(), manifest);
    }
}
