//! Name-based rule-file resolution (spec.md §6 "File loading strategy"):
//! given a bare rule name, try `<name>.dlc` first; on any failure — not
//! just a missing file, but also a corrupt payload or a `.dlc` that decodes
//! to a malformed program — fall back to `<name>.dl` source.

use std::path::PathBuf;

use super::Engine;
use crate::error::EngineError;

/// Tries `<name>.dlc`, then `<name>.dl` on any failure of the first attempt.
/// Mutates `engine` only on success: [`Engine::load_rules_from_file`]
/// already leaves prior state untouched when it errors, so a failed `.dlc`
/// attempt never leaks partial state into the `.dl` retry.
///
/// # Errors
/// Returns the `.dl` attempt's error if both attempts fail.
pub fn load_rules_file(engine: &mut Engine, name: &str) -> Result<(), EngineError> {
    let dlc_path = PathBuf::from(format!("{name}.dlc"));
    if engine.load_rules_from_file(&dlc_path).is_ok() {
        return Ok(());
    }
    let dl_path = PathBuf::from(format!("{name}.dl"));
    engine.load_rules_from_file(&dl_path)
}
