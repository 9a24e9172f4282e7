//! Extension registry - owns every loaded extension and registered source.
//!
//! The ExtensionRegistry is responsible for:
//! - Discovering extension directories (external root first, then internal)
//! - Loading them one at a time, each in a fresh isolate
//! - Reporting failures without letting one extension block the others
//! - Routing `preForm` / `postForm` calls to the isolate owning a source

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, error, info, warn};

use super::discovery::{discover, ensure_root};
use super::error::{ExtensionError, ExtensionResult};
use super::form::{parse_form, FormField};
use super::isolate::{ExtensionIsolate, FormCall};
use super::kit::{KitContext, KitSettings};
use super::manifest::{read_manifest, ExtensionDescriptor, ExtensionKind};
use super::notify::{HostNotifier, PopupIcon};
use super::source::{FormValues, SourceRegistry, SourceResult};

/// Configuration for the extension registry.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// User-installed extensions. Created on first run.
    pub external_dir: PathBuf,

    /// Extensions bundled with the host. Skipped when absent.
    pub internal_dir: Option<PathBuf>,

    /// Settings exposed to extensions through the Kit.
    pub settings: KitSettings,

    /// Bound on running an entry script and settling its pending work.
    pub load_timeout: Option<Duration>,

    /// Bound on a single `preForm` / `postForm` call.
    pub form_timeout: Option<Duration>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            external_dir: default_extensions_dir(),
            internal_dir: None,
            settings: KitSettings::default(),
            load_timeout: Some(Duration::from_secs(10)),
            form_timeout: Some(Duration::from_secs(30)),
        }
    }
}

pub(crate) fn default_extensions_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("castkit").join("extensions"))
        .unwrap_or_else(|| PathBuf::from("~/.castkit/extensions"))
}

/// Progress of a single load attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Discovered,
    ManifestRead,
    Executing,
    Registered,
    Failed,
}

/// Outcome of one load attempt, kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadAttempt {
    pub path: PathBuf,
    pub kind: ExtensionKind,
    pub state: LoadState,
}

struct LoadedExtension {
    descriptor: ExtensionDescriptor,
    isolate: ExtensionIsolate,
}

/// Owns the extension list, the source list and the isolates behind them.
pub struct ExtensionRegistry {
    config: RegistryConfig,
    notifier: Arc<dyn HostNotifier>,

    /// Loaded extensions, in load order.
    extensions: Vec<LoadedExtension>,

    sources: SourceRegistry,

    attempts: Vec<LoadAttempt>,

    ready: bool,
}

impl ExtensionRegistry {
    pub fn new(config: RegistryConfig, notifier: Arc<dyn HostNotifier>) -> Self {
        Self {
            config,
            notifier,
            extensions: Vec::new(),
            sources: SourceRegistry::new(),
            attempts: Vec::new(),
            ready: false,
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Discover and load every extension, then signal readiness.
    ///
    /// Returns the number of extensions loaded by this call. The ready event
    /// fires once per registry, after the last candidate was attempted.
    pub async fn load_all(&mut self) -> usize {
        ensure_root(&self.config.external_dir);

        let mut candidates: Vec<(PathBuf, ExtensionKind)> =
            discover(&self.config.external_dir, self.notifier.as_ref())
                .into_iter()
                .map(|path| (path, ExtensionKind::External))
                .collect();

        if let Some(internal) = &self.config.internal_dir {
            if internal.exists() {
                candidates.extend(
                    discover(internal, self.notifier.as_ref())
                        .into_iter()
                        .map(|path| (path, ExtensionKind::Internal)),
                );
            } else {
                debug!(path = %internal.display(), "No bundled extensions directory");
            }
        }

        info!(count = candidates.len(), "Loading extensions");

        let before = self.extensions.len();
        for (path, kind) in candidates {
            self.load(&path, kind).await;
        }

        if !self.ready {
            self.ready = true;
            self.notifier.extension_ready();
        }

        self.extensions.len() - before
    }

    /// Load one extension directory.
    ///
    /// Failures are logged and shown to the user as a popup naming the path;
    /// they are never returned. Returns whether the extension was registered.
    pub async fn load(&mut self, dir: &Path, kind: ExtensionKind) -> bool {
        let index = self.attempts.len();
        self.attempts.push(LoadAttempt {
            path: dir.to_path_buf(),
            kind,
            state: LoadState::Discovered,
        });

        match self.try_load(dir, kind, index).await {
            Ok(loaded) => {
                info!(
                    extension = %loaded.descriptor.id,
                    version = %loaded.descriptor.version,
                    %kind,
                    "Extension loaded"
                );
                self.extensions.push(loaded);
                self.attempts[index].state = LoadState::Registered;
                self.notifier.extension_list_changed();
                true
            }
            Err(e) => {
                error!(path = %dir.display(), error = %e, "Failed to load extension");
                self.attempts[index].state = LoadState::Failed;
                self.notifier.popup(
                    PopupIcon::Error,
                    format!("Unable to read extension: {}", dir.display()),
                );
                false
            }
        }
    }

    async fn try_load(
        &mut self,
        dir: &Path,
        kind: ExtensionKind,
        attempt: usize,
    ) -> ExtensionResult<LoadedExtension> {
        let descriptor = read_manifest(dir, kind)?;
        self.attempts[attempt].state = LoadState::ManifestRead;

        if self.extension(&descriptor.id).is_some() {
            return Err(ExtensionError::ManifestInvalid {
                path: dir.to_path_buf(),
                message: format!("extension '{}' is already loaded", descriptor.id),
            });
        }

        let ctx = KitContext::new(
            descriptor.clone(),
            self.config.settings.clone(),
            self.sources.clone(),
            self.notifier.clone(),
        )?;

        self.attempts[attempt].state = LoadState::Executing;
        let mut isolate = ExtensionIsolate::spawn(ctx, self.notifier.clone()).await?;
        isolate
            .load(
                &descriptor.entry_file,
                self.config.load_timeout,
                self.notifier.as_ref(),
            )
            .await?;

        Ok(LoadedExtension {
            descriptor,
            isolate,
        })
    }

    /// Whether the ready event has fired.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Loaded extensions, in load order.
    pub fn extensions(&self) -> Vec<ExtensionDescriptor> {
        self.extensions.iter().map(|e| e.descriptor.clone()).collect()
    }

    pub fn extension(&self, id: &str) -> Option<&ExtensionDescriptor> {
        self.extensions
            .iter()
            .map(|e| &e.descriptor)
            .find(|d| d.id == id)
    }

    /// Shared handle to the source list.
    pub fn sources(&self) -> &SourceRegistry {
        &self.sources
    }

    /// Every load attempt so far, in order.
    pub fn attempts(&self) -> &[LoadAttempt] {
        &self.attempts
    }

    /// Ask a source for the form the user has to fill in.
    pub async fn pre_form(&mut self, provider: &str, source_id: &str) -> ExtensionResult<Vec<FormField>> {
        let value = self.call_source(provider, source_id, FormCall::PreForm, None).await?;
        parse_form(value).map_err(|e| {
            warn!(extension = provider, source = source_id, error = %e, "Invalid form returned");
            ExtensionError::FormInvalid {
                source_id: source_id.to_string(),
                message: e.to_string(),
            }
        })
    }

    /// Submit form values to a source.
    ///
    /// The extension only sees a copy of `params`; the returned result always
    /// carries the original values.
    pub async fn post_form(
        &mut self,
        provider: &str,
        source_id: &str,
        params: FormValues,
    ) -> ExtensionResult<SourceResult> {
        let returned = self
            .call_source(provider, source_id, FormCall::PostForm, Some(params.clone()))
            .await?;
        Ok(SourceResult::merge(returned, params))
    }

    async fn call_source(
        &mut self,
        provider: &str,
        source_id: &str,
        call: FormCall,
        input: Option<FormValues>,
    ) -> ExtensionResult<Value> {
        let source = self
            .sources
            .find(provider, source_id)
            .ok_or_else(|| ExtensionError::SourceNotFound {
                provider: provider.to_string(),
                source_id: source_id.to_string(),
            })?;

        let timeout = self.config.form_timeout;
        let loaded = self
            .extensions
            .iter_mut()
            .find(|e| e.descriptor.id == provider)
            .ok_or_else(|| ExtensionError::IsolateUnavailable(provider.to_string()))?;

        debug!(extension = provider, source = source_id, ?call, "Calling source");
        let result = loaded.isolate.call(call, source.slot, input, timeout).await;
        if let Err(e) = &result {
            error!(extension = provider, source = source_id, ?call, error = %e, "Source call failed");
        }
        result
    }

    /// Stop every isolate, most recently loaded first.
    pub fn shutdown(&mut self) {
        while let Some(loaded) = self.extensions.pop() {
            debug!(extension = %loaded.descriptor.id, "Stopping extension");
            drop(loaded);
        }
    }
}

impl Drop for ExtensionRegistry {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for ExtensionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtensionRegistry")
            .field("config", &self.config)
            .field("extensions", &self.extensions.len())
            .field("sources", &self.sources.len())
            .field("ready", &self.ready)
            .finish()
    }
}
