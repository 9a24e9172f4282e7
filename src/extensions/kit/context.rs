//! Kit context for one extension load.
//!
//! KitContext is the host half of the capability object an extension gets.
//! One is created per load and stored in that isolate's OpState, so the
//! identity every op acts on is fixed for the isolate's whole life.

use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use crate::extensions::error::ExtensionResult;
use crate::extensions::manifest::ExtensionDescriptor;
use crate::extensions::notify::HostNotifier;
use crate::extensions::source::{read_icon, SourceDescriptor, SourceRegistration, SourceRegistry};

use super::modules::{ModuleResolver, ResolvedModule};

/// Host settings every Kit exposes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KitSettings {
    /// Locale returned by `getLocale()`.
    pub locale: String,
    /// Name extensions `require` to obtain the Kit.
    pub module_name: String,
}

impl Default for KitSettings {
    fn default() -> Self {
        Self {
            locale: "en-US".to_string(),
            module_name: super::DEFAULT_KIT_MODULE.to_string(),
        }
    }
}

/// Context provided to an extension during execution.
pub struct KitContext {
    /// Extension the Kit is bound to.
    pub extension: ExtensionDescriptor,

    pub settings: KitSettings,

    resolver: ModuleResolver,

    sources: SourceRegistry,

    notifier: Arc<dyn HostNotifier>,

    /// Next callback slot inside the isolate.
    next_slot: u32,
}

impl KitContext {
    pub fn new(
        extension: ExtensionDescriptor,
        settings: KitSettings,
        sources: SourceRegistry,
        notifier: Arc<dyn HostNotifier>,
    ) -> ExtensionResult<Self> {
        let resolver = ModuleResolver::new(&extension.install_root)?;
        Ok(Self {
            extension,
            settings,
            resolver,
            sources,
            notifier,
            next_slot: 0,
        })
    }

    pub fn locale(&self) -> &str {
        &self.settings.locale
    }

    pub fn install_root(&self) -> &Path {
        self.resolver.root()
    }

    pub fn resolve_module(&self, from_dir: &Path, specifier: &str) -> ExtensionResult<ResolvedModule> {
        self.resolver.resolve(from_dir, specifier)
    }

    pub fn read_module(&self, path: &Path) -> ExtensionResult<String> {
        self.resolver.read(path)
    }

    /// Number of sources this extension registered so far.
    pub fn registered(&self) -> u32 {
        self.next_slot
    }

    /// Register a source on behalf of the bound extension.
    ///
    /// Resolves the icon, stamps the provider and appends the source to the
    /// shared list, then announces the change. Returns the callback slot the
    /// isolate must store the source's `preForm` / `postForm` under.
    pub fn register_source(&mut self, registration: SourceRegistration) -> ExtensionResult<u32> {
        let provider = &self.extension.id;

        let icon = registration
            .icon
            .as_deref()
            .map(|icon| read_icon(&self.extension.install_root, icon))
            .transpose()?;

        if let Some(claimed) = registration.claimed_provider.as_deref() {
            if claimed != provider {
                warn!(
                    extension = %provider,
                    claimed,
                    source = %registration.id,
                    "Ignoring provider supplied by extension"
                );
            }
        }

        if self.sources.contains(provider, &registration.id) {
            warn!(
                extension = %provider,
                source = %registration.id,
                "Source id registered twice, lookups resolve to the first one"
            );
        }

        let slot = self.next_slot;
        self.sources.push(SourceDescriptor {
            id: registration.id,
            name: registration.name,
            description: registration.description,
            provider: provider.clone(),
            icon,
            slot,
        });
        self.next_slot += 1;

        info!(extension = %provider, slot, "Source registered");
        self.notifier.source_list_changed();
        Ok(slot)
    }
}

impl std::fmt::Debug for KitContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KitContext")
            .field("extension", &self.extension.id)
            .field("settings", &self.settings)
            .field("registered", &self.next_slot)
            .finish()
    }
}
