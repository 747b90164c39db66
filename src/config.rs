//! # Configuration
//!
//! Layered configuration via `figment`: defaults, an optional `rulr.toml`,
//! then `RULR_*` environment overrides (ambient-stack addition grounded in
//! the teacher's `config::Config`, which loads `config.toml` +
//! `FLOWLOG_*`/similar env prefix the same way).

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

/// Knobs the specification leaves implementation-defined.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    /// Safety bound on stratification fixpoint passes before the IR
    /// builder reports a negation cycle instead of looping forever.
    pub max_stratification_iterations: usize,
    /// Deflate compression level used by the `.dlc` codec (0-9).
    pub deflate_level: u32,
    /// `tracing` log filter, e.g. `"info"` or `"rulr=debug"`.
    pub log_level: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            max_stratification_iterations: 10_000,
            deflate_level: 6,
            log_level: "info".to_string(),
        }
    }
}

impl EngineConfig {
    /// Loads defaults, then an optional `rulr.toml` in the current
    /// directory, then `RULR_*` environment variables, highest priority
    /// last.
    ///
    /// # Errors
    /// Returns a `figment::Error` if `rulr.toml` exists but fails to parse,
    /// or an environment override has the wrong type.
    pub fn load() -> Result<Self, figment::Error> {
        Figment::from(Serialized::defaults(EngineConfig::default()))
            .merge(Toml::file("rulr.toml"))
            .merge(Env::prefixed("RULR_"))
            .extract()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_nothing_present() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.deflate_level, 6);
        assert_eq!(cfg.log_level, "info");
    }

    #[test]
    fn env_override_wins() {
        // SAFETY: test-local; no other test in this process reads this key.
        unsafe {
            std::env::set_var("RULR_LOG_LEVEL", "debug");
        }
        let cfg = EngineConfig::load().unwrap();
        assert_eq!(cfg.log_level, "debug");
        unsafe {
            std::env::remove_var("RULR_LOG_LEVEL");
        }
    }
}
