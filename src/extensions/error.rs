//! Error types for the extension system.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while discovering, loading or calling extensions.
#[derive(Debug, Error)]
pub enum ExtensionError {
    #[error("Unable to read extension directory {path}: {source}")]
    Discovery {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Manifest not found in extension: {0}")]
    ManifestMissing(PathBuf),

    #[error("Invalid manifest in {path}: {message}")]
    ManifestInvalid { path: PathBuf, message: String },

    #[error("Failed to execute extension '{extension}': {message}")]
    Execution { extension: String, message: String },

    #[error("Extension '{extension}' failed at runtime: {message}")]
    Runtime { extension: String, message: String },

    #[error("Invalid source registration: {0}")]
    SourceInvalid(String),

    #[error("Source '{source_id}' returned an invalid form: {message}")]
    FormInvalid { source_id: String, message: String },

    #[error("Source '{source_id}' not found for provider '{provider}'")]
    SourceNotFound { provider: String, source_id: String },

    #[error("Cannot find module '{specifier}' from {from}")]
    ModuleNotFound { specifier: String, from: PathBuf },

    #[error("Module {0} is outside the extension root")]
    ModuleOutsideRoot(PathBuf),

    #[error("Unable to read icon {path}: {source}")]
    Icon {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Extension execution timed out after {0:?}")]
    ExecutionTimeout(Duration),

    #[error("Extension '{0}' is not available")]
    IsolateUnavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ExtensionError {
    /// Message safe to show to end users.
    ///
    /// Never includes the underlying error text, which may come from
    /// third-party extension code.
    pub fn user_message(&self) -> &'static str {
        match self {
            ExtensionError::Discovery { .. } => "Unable to read extension directory.",
            ExtensionError::ManifestMissing(_) | ExtensionError::ManifestInvalid { .. } => {
                "Extension metadata is missing or invalid."
            }
            ExtensionError::Execution { .. }
            | ExtensionError::ModuleNotFound { .. }
            | ExtensionError::ModuleOutsideRoot(_)
            | ExtensionError::Icon { .. } => "Unable to load extension.",
            ExtensionError::ExecutionTimeout(_) => "An extension took too long to respond.",
            ExtensionError::SourceNotFound { .. } => "The requested source is not available.",
            ExtensionError::Runtime { .. }
            | ExtensionError::SourceInvalid(_)
            | ExtensionError::FormInvalid { .. }
            | ExtensionError::IsolateUnavailable(_)
            | ExtensionError::Io(_)
            | ExtensionError::Json(_) => "An unknown error occurred in an extension.",
        }
    }
}

/// Result type for extension operations.
pub type ExtensionResult<T> = Result<T, ExtensionError>;
