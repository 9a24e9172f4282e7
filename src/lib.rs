//! castkit - sandboxed extension host for a podcast client.
//!
//! Third-party extensions register content "sources" that the client lets
//! users subscribe to. castkit discovers those extensions on disk, runs each
//! one in its own V8 isolate with nothing but a small capability object (the
//! Kit), and keeps track of the sources they register.
//!
//! # Architecture
//!
//! The library is organized into these main modules:
//!
//! - [`extensions`] - Discovery, isolated execution, the Kit and the registry
//! - [`subscriptions`] - Saved `postForm` results and their storage
//! - [`ipc`] - Request/response handling for the UI side
//! - [`config`] - Configuration loading and management
//! - [`logging`] - `tracing` subscriber setup
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use castkit::extensions::{ExtensionRegistry, TracingNotifier};
//!
//! let config = castkit::Config::load();
//! let mut registry = ExtensionRegistry::new(config.registry_config(), Arc::new(TracingNotifier));
//! registry.load_all().await;
//!
//! for source in registry.sources().snapshot() {
//!     println!("{} from {}", source.name, source.provider);
//! }
//! ```

// Public modules
pub mod cli;
pub mod config;
pub mod extensions;
pub mod ipc;
pub mod logging;
pub mod subscriptions;

// Internal modules
mod error;

// Re-export commonly used types for convenience
pub use config::Config;
pub use error::{CastkitError, CastkitResult};
pub use extensions::{ExtensionError, ExtensionRegistry, SourceDescriptor, SourceResult};
