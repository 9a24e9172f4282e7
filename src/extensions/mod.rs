//! Extension system for castkit.
//!
//! Extensions are JavaScript packages that register content sources. Each one
//! runs in its own V8 isolate (embedded Deno core) and can reach the host only
//! through the Kit it `require`s.
//!
//! # Architecture
//!
//! ```text
//! ExtensionRegistry
//! ├── extensions: Vec<(ExtensionDescriptor, ExtensionIsolate)>
//! ├── sources: SourceRegistry (shared, append-only)
//! └── notifier: Arc<dyn HostNotifier>
//!
//! ExtensionIsolate (one thread per extension)
//! └── JsRuntime
//!     └── OpState: KitContext (bound descriptor, resolver, sources)
//! ```
//!
//! Extensions are loaded one at a time at startup: externals first, then the
//! bundled ones. Loaded isolates stay alive to serve `preForm` / `postForm`
//! calls until the registry shuts down.

pub mod discovery;
mod error;
pub mod form;
mod isolate;
pub mod kit;
mod manifest;
pub mod notify;
mod registry;
mod source;

pub use discovery::{discover, ensure_root, scan};
pub use error::{ExtensionError, ExtensionResult};
pub use form::{FormError, FormField, FormFieldOption, FormFieldType};
pub use isolate::{ExtensionIsolate, FormCall, IsolateState};
pub use kit::{KitContext, KitSettings, DEFAULT_KIT_MODULE};
pub use manifest::{
    parse_manifest, read_manifest, ExtensionDescriptor, ExtensionKind, DEFAULT_ENTRY,
    MANIFEST_FILE,
};
pub use notify::{ChannelNotifier, HostEvent, HostNotifier, PopupIcon, TracingNotifier};
pub use registry::{ExtensionRegistry, LoadAttempt, LoadState, RegistryConfig};
pub use source::{
    read_icon, FormValues, SourceDescriptor, SourceRegistration, SourceRegistry, SourceResult,
};

/// Unique identifier for an extension.
pub type ExtensionId = String;
