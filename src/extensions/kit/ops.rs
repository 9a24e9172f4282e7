//! Deno ops behind the Kit.
//!
//! These are the only host functions reachable from an extension isolate.
//! The bootstrap script captures them and deletes the `Deno` namespace, so
//! extension code reaches them solely through the Kit object and `require`.

use std::path::Path;

use deno_core::{error::AnyError, op2, OpState};
use tracing::{debug, error, info, warn};

use crate::extensions::source::SourceRegistration;

use super::context::KitContext;
use super::modules::ResolvedModule;

// ─────────────────────────────────────────────────────────────────────────────
// Kit API
// ─────────────────────────────────────────────────────────────────────────────

/// Locale configured for the host.
#[op2]
#[string]
fn op_kit_get_locale(state: &mut OpState) -> String {
    state.borrow::<KitContext>().locale().to_string()
}

/// Register a source for the bound extension.
///
/// Takes the serializable part of the descriptor and returns the slot the
/// callbacks belong in.
#[op2]
fn op_kit_register_source(
    state: &mut OpState,
    #[serde] descriptor: serde_json::Value,
) -> Result<u32, AnyError> {
    let registration = SourceRegistration::from_value(descriptor)?;
    let ctx = state.borrow_mut::<KitContext>();
    Ok(ctx.register_source(registration)?)
}

// ─────────────────────────────────────────────────────────────────────────────
// Loader
// ─────────────────────────────────────────────────────────────────────────────

/// Name that `require` maps to the Kit.
#[op2]
#[string]
fn op_kit_module_name(state: &mut OpState) -> String {
    state.borrow::<KitContext>().settings.module_name.clone()
}

/// Canonical install root of the bound extension.
#[op2]
#[string]
fn op_kit_install_root(state: &mut OpState) -> String {
    state
        .borrow::<KitContext>()
        .install_root()
        .to_string_lossy()
        .into_owned()
}

/// Resolve a `require` specifier.
#[op2]
#[serde]
fn op_kit_resolve_module(
    state: &mut OpState,
    #[string] from_dir: String,
    #[string] specifier: String,
) -> Result<ResolvedModule, AnyError> {
    let ctx = state.borrow::<KitContext>();
    Ok(ctx.resolve_module(Path::new(&from_dir), &specifier)?)
}

/// Read the source of a resolved module.
#[op2]
#[string]
fn op_kit_read_module(state: &mut OpState, #[string] path: String) -> Result<String, AnyError> {
    let ctx = state.borrow::<KitContext>();
    Ok(ctx.read_module(Path::new(&path))?)
}

// ─────────────────────────────────────────────────────────────────────────────
// Console
// ─────────────────────────────────────────────────────────────────────────────

/// Forward `console.*` output to host logging.
#[op2(fast)]
fn op_kit_log(state: &mut OpState, #[string] level: String, #[string] message: String) {
    let extension = &state.borrow::<KitContext>().extension.id;
    match level.as_str() {
        "error" => error!(target: "castkit::extension", %extension, "{message}"),
        "warn" => warn!(target: "castkit::extension", %extension, "{message}"),
        "debug" | "trace" => debug!(target: "castkit::extension", %extension, "{message}"),
        _ => info!(target: "castkit::extension", %extension, "{message}"),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Extension Registration
// ─────────────────────────────────────────────────────────────────────────────

deno_core::extension!(
    castkit_kit,
    ops = [
        // Kit API
        op_kit_get_locale,
        op_kit_register_source,
        // Loader
        op_kit_module_name,
        op_kit_install_root,
        op_kit_resolve_module,
        op_kit_read_module,
        // Console
        op_kit_log,
    ],
);
