//! Extension manifest parsing.
//!
//! Each extension directory carries a `package.json` manifest. Only a handful
//! of keys are recognised:
//! - `name` (required, becomes the extension id)
//! - `displayName` (optional, falls back to `name`)
//! - `version` (required)
//! - `main` (optional, defaults to `index.js`)
//! - `author`, `description`, `homepage` (optional, passed through)
//!
//! An empty `displayName` or `main` counts as absent.
//!
//! The document is read as an untyped JSON value first and converted into an
//! [`ExtensionDescriptor`] only once every required field checks out.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::{ExtensionError, ExtensionResult};
use super::ExtensionId;

/// File name of the manifest inside an extension directory.
pub const MANIFEST_FILE: &str = "package.json";

/// Entry script used when the manifest has no `main`.
pub const DEFAULT_ENTRY: &str = "index.js";

/// Where an extension was installed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExtensionKind {
    /// Bundled with the host application.
    Internal,
    /// Installed by the user.
    External,
}

impl std::fmt::Display for ExtensionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtensionKind::Internal => f.write_str("INTERNAL"),
            ExtensionKind::External => f.write_str("EXTERNAL"),
        }
    }
}

/// Identity and provenance of a loaded extension.
///
/// Built once from the manifest at discovery time and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionDescriptor {
    /// Unique identifier, taken from the manifest `name`.
    pub id: ExtensionId,

    /// Human-readable display name.
    pub name: String,

    /// Semantic version string.
    pub version: String,

    /// Absolute path of the extension directory.
    pub install_root: PathBuf,

    /// Entry script, relative to `install_root`.
    pub entry_file: String,

    /// Bundled or user-installed.
    pub kind: ExtensionKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Either `"Name <mail>"` or a `{ name, email, url }` object, as written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,
}

impl ExtensionDescriptor {
    /// Absolute path of the entry script.
    pub fn entry_path(&self) -> PathBuf {
        self.install_root.join(&self.entry_file)
    }
}

/// Read and validate the manifest of an extension directory.
pub fn read_manifest(extension_dir: &Path, kind: ExtensionKind) -> ExtensionResult<ExtensionDescriptor> {
    let manifest_path = extension_dir.join(MANIFEST_FILE);

    let content = std::fs::read_to_string(&manifest_path)
        .map_err(|_| ExtensionError::ManifestMissing(extension_dir.to_path_buf()))?;

    let value: Value = serde_json::from_str(&content).map_err(|e| ExtensionError::ManifestInvalid {
        path: manifest_path.clone(),
        message: e.to_string(),
    })?;

    let install_root = std::path::absolute(extension_dir)?;
    parse_manifest(&value, install_root, kind).map_err(|message| ExtensionError::ManifestInvalid {
        path: manifest_path,
        message,
    })
}

/// Convert an untyped manifest document into a descriptor.
pub fn parse_manifest(
    value: &Value,
    install_root: PathBuf,
    kind: ExtensionKind,
) -> Result<ExtensionDescriptor, String> {
    let object = value
        .as_object()
        .ok_or_else(|| "manifest must be a JSON object".to_string())?;

    let id = required_string(object.get("name"), "name")?;
    let name = match object.get("displayName") {
        value if is_absent(value) => id.clone(),
        display => required_string(display, "displayName")?,
    };
    let version = required_string(object.get("version"), "version")?;
    let entry_file = match object.get("main") {
        value if is_absent(value) => DEFAULT_ENTRY.to_string(),
        main => required_string(main, "main")?,
    };

    let root = install_root.to_string_lossy();
    if root.is_empty() {
        return Err("missing required meta key: installRoot".to_string());
    }

    Ok(ExtensionDescriptor {
        id,
        name,
        version,
        install_root,
        entry_file,
        kind,
        description: optional_string(object.get("description")),
        author: object.get("author").filter(|author| !is_absent(Some(author))).cloned(),
        homepage: optional_string(object.get("homepage")),
    })
}

fn is_absent(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(_) => false,
    }
}

fn required_string(value: Option<&Value>, key: &str) -> Result<String, String> {
    match value {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.clone()),
        _ => Err(format!("missing required meta key: {key}")),
    }
}

fn optional_string(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::tempdir;

    fn parse(value: Value) -> Result<ExtensionDescriptor, String> {
        parse_manifest(&value, PathBuf::from("/ext/demo"), ExtensionKind::External)
    }

    #[test]
    fn test_parse_minimal_manifest() {
        let desc = parse(json!({ "name": "demo", "version": "1.0.0" })).unwrap();
        assert_eq!(desc.id, "demo");
        assert_eq!(desc.name, "demo");
        assert_eq!(desc.version, "1.0.0");
        assert_eq!(desc.entry_file, "index.js");
        assert_eq!(desc.kind, ExtensionKind::External);
        assert!(desc.author.is_none());

        let desc = parse(json!({
            "name": "demo",
            "version": "1",
            "displayName": "",
            "main": ""
        }))
        .unwrap();
        assert_eq!(desc.name, "demo");
        assert_eq!(desc.entry_file, "index.js");
    }

    #[test]
    fn test_parse_full_manifest() {
        let desc = parse(json!({
            "name": "podcast-index",
            "displayName": "Podcast Index",
            "version": "2.1.0",
            "main": "dist/main.js",
            "author": { "name": "Jane", "email": "jane@example.com" },
            "description": "Search the podcast index",
            "homepage": "https://example.com"
        }))
        .unwrap();

        assert_eq!(desc.id, "podcast-index");
        assert_eq!(desc.name, "Podcast Index");
        assert_eq!(desc.entry_file, "dist/main.js");
        assert_eq!(
            desc.author,
            Some(json!({ "name": "Jane", "email": "jane@example.com" }))
        );
        assert_eq!(desc.description.as_deref(), Some("Search the podcast index"));
        assert_eq!(desc.entry_path(), PathBuf::from("/ext/demo/dist/main.js"));
    }

    #[test]
    fn test_missing_required_fields() {
        assert!(parse(json!({ "version": "1.0.0" })).unwrap_err().contains("name"));
        assert!(parse(json!({ "name": "demo" })).unwrap_err().contains("version"));
        assert!(parse(json!({ "name": "", "version": "1.0.0" })).is_err());
        assert!(parse(json!({ "name": 42, "version": "1.0.0" })).is_err());
        assert!(parse(json!({ "name": "demo", "version": "1.0.0", "main": 3 })).is_err());
        assert!(parse(json!(["not", "an", "object"])).is_err());
    }

    #[test]
    fn test_read_manifest_errors() {
        let temp = tempdir().unwrap();

        let err = read_manifest(temp.path(), ExtensionKind::Internal).unwrap_err();
        assert!(matches!(err, ExtensionError::ManifestMissing(_)));

        fs::write(temp.path().join(MANIFEST_FILE), "{ not json").unwrap();
        let err = read_manifest(temp.path(), ExtensionKind::Internal).unwrap_err();
        assert!(matches!(err, ExtensionError::ManifestInvalid { .. }));

        fs::write(temp.path().join(MANIFEST_FILE), r#"{"name":"demo"}"#).unwrap();
        let err = read_manifest(temp.path(), ExtensionKind::Internal).unwrap_err();
        assert!(matches!(err, ExtensionError::ManifestInvalid { .. }));
    }

    #[test]
    fn test_read_manifest_sets_install_root() {
        let temp = tempdir().unwrap();
        fs::write(
            temp.path().join(MANIFEST_FILE),
            r#"{"name":"demo","version":"1.0.0"}"#,
        )
        .unwrap();

        let desc = read_manifest(temp.path(), ExtensionKind::Internal).unwrap();
        assert!(desc.install_root.is_absolute());
        assert_eq!(desc.kind, ExtensionKind::Internal);
    }
}
