//! Error types for castkit
//!
//! Crate-level errors. The extension and subscription modules have their own
//! enums, which convert into [`CastkitError`].

use thiserror::Error;

use crate::extensions::ExtensionError;
use crate::subscriptions::SubscriptionError;

/// Errors that can occur in castkit
#[derive(Debug, Error)]
pub enum CastkitError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Logging could not be set up
    #[error("Logging error: {0}")]
    Logging(String),

    /// Extension loading or execution errors
    #[error(transparent)]
    Extension(#[from] ExtensionError),

    #[error(transparent)]
    Subscription(#[from] SubscriptionError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing errors
    #[error("Config parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

/// Result type alias for castkit operations
pub type CastkitResult<T> = Result<T, CastkitError>;
