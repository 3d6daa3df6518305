//! # sockwire-settings
//!
//! Layered configuration for sockwire servers.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`SockwireSettings::default()`]
//! 2. **User file**: `~/.sockwire/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `SOCKWIRE_*` overrides (highest priority)

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_env_overrides, apply_overrides, deep_merge, load_settings, load_settings_from_path,
    settings_path,
};
pub use types::*;

use std::sync::OnceLock;

/// Global settings singleton, initialized on first access via [`get_settings`].
static SETTINGS: OnceLock<SockwireSettings> = OnceLock::new();

/// Get the global settings instance.
///
/// On first call, loads settings from `~/.sockwire/settings.json` with env
/// var overrides. If loading fails, logs a warning and returns compiled
/// defaults.
pub fn get_settings() -> &'static SockwireSettings {
    SETTINGS.get_or_init(|| {
        load_settings().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "failed to load settings, using defaults");
            SockwireSettings::default()
        })
    })
}

/// Initialize the global settings with a specific value.
///
/// # Errors
///
/// Returns the provided settings back if the global was already initialized.
#[allow(clippy::result_large_err)]
pub fn init_settings(settings: SockwireSettings) -> std::result::Result<(), SockwireSettings> {
    SETTINGS.set(settings)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn re_exports_work() {
        let _settings = SockwireSettings::default();
        let path = settings_path();
        assert!(path.ends_with(".sockwire/settings.json"));
    }

    #[test]
    fn deep_merge_re_exported() {
        let a = serde_json::json!({"x": 1});
        let b = serde_json::json!({"y": 2});
        let merged = deep_merge(a, b);
        assert_eq!(merged["x"], 1);
        assert_eq!(merged["y"], 2);
    }

    #[test]
    fn global_is_set_once() {
        let first = get_settings().clone();
        let mut other = SockwireSettings::default();
        other.server.port = 1234;
        assert!(init_settings(other).is_err());
        assert_eq!(*get_settings(), first);
    }
}
