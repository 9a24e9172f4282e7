//! The Kit: the capability surface handed to extension code.
//!
//! Inside an isolate the Kit is whatever `require("<kit module>")` returns:
//!
//! ```js
//! const kit = require("castkit");
//! kit.getLocale();
//! kit.registerSource({ id, name, icon, preForm, postForm });
//! ```
//!
//! Nothing else of the host is reachable. Enforcement happens host-side:
//! - the provider of every source is stamped from the bound extension,
//!   whatever the extension passes;
//! - icons are read relative to the extension root and embedded;
//! - `postForm` results get the submitted values merged in by the registry
//!   after the callback returns (see [`SourceResult::merge`]).
//!
//! [`SourceResult::merge`]: crate::extensions::source::SourceResult::merge

mod context;
pub(crate) mod modules;
mod ops;

pub use context::{KitContext, KitSettings};
pub use modules::{ModuleKind, ModuleResolver, ResolvedModule};
pub use ops::castkit_kit;

/// Module name extensions `require` to obtain the Kit unless configured otherwise.
pub const DEFAULT_KIT_MODULE: &str = "castkit";

/// Script run in every isolate before the extension's entry point.
pub(crate) const BOOTSTRAP_JS: &str = include_str!("js/bootstrap.js");
