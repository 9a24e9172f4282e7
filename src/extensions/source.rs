//! Sources registered by extensions.
//!
//! A source is a parametrized content provider. The serializable half of it
//! (id, name, icon, provider) lives in the host-side [`SourceRegistry`]; the
//! `preForm` / `postForm` callbacks stay inside the isolate that registered
//! them and are reached through the extension registry.

use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::error::{ExtensionError, ExtensionResult};
use super::kit::modules::confine;
use super::ExtensionId;

/// Submitted form values, keyed by form field id.
pub type FormValues = Map<String, Value>;

/// A content provider registered by an extension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceDescriptor {
    /// Identifier, unique within its provider by convention only.
    pub id: String,

    /// Display name.
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Id of the extension that registered the source.
    pub provider: ExtensionId,

    /// Icon as a base64 data URI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,

    /// Index of the callbacks inside the provider's isolate.
    #[serde(skip)]
    pub(crate) slot: u32,
}

/// What an extension passed to `registerSource`, minus the callbacks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRegistration {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    /// Icon path relative to the extension's install root.
    pub icon: Option<String>,
    /// Provider the extension claimed for itself. Never trusted.
    pub claimed_provider: Option<String>,
}

impl SourceRegistration {
    /// Validate the untyped registration payload coming out of the sandbox.
    pub fn from_value(value: Value) -> ExtensionResult<Self> {
        let Value::Object(object) = value else {
            return Err(ExtensionError::SourceInvalid(
                "source descriptor must be an object".to_string(),
            ));
        };

        let required = |key: &str| match object.get(key) {
            Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.clone()),
            _ => Err(ExtensionError::SourceInvalid(format!(
                "'{key}' must be a non-empty string"
            ))),
        };
        let optional = |key: &str| match object.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(_) => Err(ExtensionError::SourceInvalid(format!(
                "'{key}' must be a string"
            ))),
        };

        Ok(Self {
            id: required("id")?,
            name: required("name")?,
            description: optional("description")?,
            icon: optional("icon")?.filter(|icon| !icon.is_empty()),
            claimed_provider: object
                .get("provider")
                .and_then(Value::as_str)
                .map(str::to_string),
        })
    }
}

/// Value returned by a source's `postForm`, with the submitted input attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceResult {
    /// Fields the extension returned.
    #[serde(flatten)]
    pub payload: Map<String, Value>,

    /// The exact form values that produced this result.
    pub params: FormValues,
}

impl SourceResult {
    /// Merge the submitted values into whatever the extension returned.
    ///
    /// Non-object results are kept under a `value` key. A `params` key set by
    /// the extension is replaced by the real input.
    pub fn merge(returned: Value, params: FormValues) -> Self {
        let mut payload = match returned {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                map
            }
        };
        payload.remove("params");
        Self { payload, params }
    }

    /// String field of the payload, if present.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(Value::as_str)
    }

    /// Title of the content the result points at.
    pub fn title(&self) -> Option<&str> {
        self.get_str("title")
    }
}

/// Process-wide, insertion-ordered list of registered sources.
///
/// Append-only: sources are never removed while the host runs. Cloning
/// shares the same list.
#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    inner: Arc<RwLock<Vec<SourceDescriptor>>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a source, returning its position in the list.
    pub(crate) fn push(&self, source: SourceDescriptor) -> usize {
        let mut sources = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        sources.push(source);
        sources.len() - 1
    }

    /// Copy of the current list.
    pub fn snapshot(&self) -> Vec<SourceDescriptor> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// First source registered under `provider` with the given id.
    pub fn find(&self, provider: &str, source_id: &str) -> Option<SourceDescriptor> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|s| s.provider == provider && s.id == source_id)
            .cloned()
    }

    /// Whether `provider` already registered a source with this id.
    pub fn contains(&self, provider: &str, source_id: &str) -> bool {
        self.find(provider, source_id).is_some()
    }

    /// All sources registered by one extension.
    pub fn by_provider(&self, provider: &str) -> Vec<SourceDescriptor> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|s| s.provider == provider)
            .cloned()
            .collect()
    }
}

/// Read an icon relative to an extension root and encode it as a data URI.
pub fn read_icon(install_root: &Path, icon: &str) -> ExtensionResult<String> {
    let requested = install_root.join(icon);
    let path = confine(install_root, &requested).map_err(|e| match e {
        ExtensionError::Io(source) => ExtensionError::Icon {
            path: requested.clone(),
            source,
        },
        other => other,
    })?;

    let bytes = std::fs::read(&path).map_err(|source| ExtensionError::Icon {
        path: path.clone(),
        source,
    })?;

    let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
    Ok(format!("data:{};base64,{}", icon_mime(&path), encoded))
}

fn icon_mime(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("webp") => "image/webp",
        Some("ico") => "image/x-icon",
        _ => "application/octet-stream",
    }
}
