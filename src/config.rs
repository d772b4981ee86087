// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Configuration for the storage provider.
//!
//! # Example
//!
//! ```
//! use skew_store::ProviderConfig;
//!
//! // Minimal config (uses defaults)
//! let config = ProviderConfig::default();
//! assert!(!config.round_to_nearest_second);
//! assert_eq!(config.max_depth, 256);
//!
//! // Override selected fields
//! let config = ProviderConfig {
//!     round_to_nearest_second: true,
//!     ..Default::default()
//! };
//! assert!(config.validate().is_ok());
//! ```

use serde::Deserialize;

/// Configuration for the storage provider.
///
/// All fields have sensible defaults.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProviderConfig {
    /// Round restored instants to the nearest whole second (default: false)
    #[serde(default)]
    pub round_to_nearest_second: bool,

    /// Maximum nesting depth accepted by the normalizer (default: 256)
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Suppress the first subscription delivery in `sync()`, which repeats
    /// the value already returned by its initial load (default: true)
    #[serde(default = "default_dedupe_initial_sync")]
    pub dedupe_initial_sync: bool,
}

fn default_max_depth() -> usize { 256 }
fn default_dedupe_initial_sync() -> bool { true }

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            round_to_nearest_second: false,
            max_depth: default_max_depth(),
            dedupe_initial_sync: default_dedupe_initial_sync(),
        }
    }
}

impl ProviderConfig {
    /// Check the config before a provider is built from it.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_depth == 0 {
            return Err("max_depth must be at least 1".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_empty_uses_defaults() {
        let config: ProviderConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, ProviderConfig::default());
    }

    #[test]
    fn test_deserialize_overrides() {
        let config: ProviderConfig = serde_json::from_str(
            r#"{"round_to_nearest_second": true, "max_depth": 8, "dedupe_initial_sync": false}"#,
        )
        .unwrap();

        assert!(config.round_to_nearest_second);
        assert_eq!(config.max_depth, 8);
        assert!(!config.dedupe_initial_sync);
    }

    #[test]
    fn test_validate_rejects_zero_depth() {
        let config = ProviderConfig {
            max_depth: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        assert!(ProviderConfig::default().validate().is_ok());
    }
}
