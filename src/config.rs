use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{CastkitError, CastkitResult};
use crate::extensions::{KitSettings, RegistryConfig, DEFAULT_KIT_MODULE};

/// Longest timeout accepted from the config file, in seconds.
const MAX_TIMEOUT_SECS: u64 = 600;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub extensions: ExtensionsConfig,
    pub runtime: RuntimeConfig,
    pub logging: LoggingConfig,
    pub subscriptions: SubscriptionsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Locale handed to extensions through `getLocale()`.
    pub locale: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtensionsConfig {
    /// User-installed extensions.
    pub external_dir: PathBuf,
    /// Extensions shipped with the application.
    pub internal_dir: Option<PathBuf>,
    /// Name extensions `require` to get the Kit.
    pub kit_module: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Bound on loading one extension. 0 disables it.
    pub load_timeout_secs: u64,
    /// Bound on one preForm / postForm call. 0 disables it.
    pub form_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing-subscriber` filter directive. `RUST_LOG` takes precedence.
    pub filter: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscriptionsConfig {
    /// JSON file subscriptions are stored in.
    pub path: PathBuf,
}

#[allow(clippy::derivable_impls)]
impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            extensions: ExtensionsConfig::default(),
            runtime: RuntimeConfig::default(),
            logging: LoggingConfig::default(),
            subscriptions: SubscriptionsConfig::default(),
        }
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            locale: "en-US".to_string(),
        }
    }
}

impl Default for ExtensionsConfig {
    fn default() -> Self {
        Self {
            external_dir: data_dir().join("extensions"),
            internal_dir: std::env::current_exe()
                .ok()
                .and_then(|exe| exe.parent().map(|dir| dir.join("assets").join("extensions"))),
            kit_module: DEFAULT_KIT_MODULE.to_string(),
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            load_timeout_secs: 10,
            form_timeout_secs: 30,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "castkit=info".to_string(),
        }
    }
}

impl Default for SubscriptionsConfig {
    fn default() -> Self {
        Self {
            path: data_dir().join("subscriptions.json"),
        }
    }
}

fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| {
            dirs::home_dir()
                .map(|h| h.join(".local").join("share"))
                .unwrap_or_else(|| PathBuf::from("/tmp"))
        })
        .join("castkit")
}

fn timeout(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

impl Config {
    /// Get the config file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| {
                dirs::home_dir()
                    .map(|h| h.join(".config"))
                    .unwrap_or_else(|| PathBuf::from("/tmp"))
            })
            .join("castkit")
            .join("config.toml")
    }

    /// Load config from the default location, or return defaults if not found
    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    /// Load config from `path`, falling back to defaults on any error.
    ///
    /// Runs before logging is set up, so problems go to stderr.
    pub fn load_from(path: &Path) -> Self {
        let mut config = if path.exists() {
            match fs::read_to_string(path) {
                Ok(content) => match toml::from_str(&content) {
                    Ok(config) => config,
                    Err(e) => {
                        eprintln!("[castkit] Failed to parse config {}: {}", path.display(), e);
                        Self::default()
                    }
                },
                Err(e) => {
                    eprintln!("[castkit] Failed to read config {}: {}", path.display(), e);
                    Self::default()
                }
            }
        } else {
            Self::default()
        };

        config.validate();
        config
    }

    /// Validate and clamp config values to acceptable ranges
    fn validate(&mut self) {
        if self.general.locale.trim().is_empty() {
            self.general.locale = GeneralConfig::default().locale;
        }

        if self.extensions.kit_module.trim().is_empty() {
            self.extensions.kit_module = DEFAULT_KIT_MODULE.to_string();
        }

        self.runtime.load_timeout_secs = self.runtime.load_timeout_secs.min(MAX_TIMEOUT_SECS);
        self.runtime.form_timeout_secs = self.runtime.form_timeout_secs.min(MAX_TIMEOUT_SECS);

        if self.logging.filter.trim().is_empty() {
            self.logging.filter = LoggingConfig::default().filter;
        }
    }

    /// Save config to the default location
    pub fn save(&self) -> CastkitResult<()> {
        self.save_to(&Self::config_path())
    }

    /// Save config to `path`, creating its directory if needed
    pub fn save_to(&self, path: &Path) -> CastkitResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| CastkitError::Config(format!("Failed to serialize config: {e}")))?;

        fs::write(path, content)?;
        Ok(())
    }

    /// Settings for the extension registry.
    pub fn registry_config(&self) -> RegistryConfig {
        RegistryConfig {
            external_dir: self.extensions.external_dir.clone(),
            internal_dir: self.extensions.internal_dir.clone(),
            settings: KitSettings {
                locale: self.general.locale.clone(),
                module_name: self.extensions.kit_module.clone(),
            },
            load_timeout: timeout(self.runtime.load_timeout_secs),
            form_timeout: timeout(self.runtime.form_timeout_secs),
        }
    }
}
