// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Timestamp normalizer.
//!
//! Rewrites instants in a [`Document`] into server-relative milliseconds before
//! a write, and restores them after a read.
//!
//! # Wire layout
//!
//! ```text
//! caller document                      stored value (offset = +250 ms)
//! ─────────────────                    ─────────────────────────────────
//! {                                    {
//!   "title": "report",                   "title": "report",
//!   "createdAt": <instant 1000>,         "meta": {},
//!   "meta": {                            "_times": {
//!     "seen": <instant 2000>               "createdAt": 1250,
//!   }                                      "meta": { "seen": 2250 }
//! }                                      }
//!                                      }
//! ```
//!
//! The `_times` side-tree mirrors only the branches that held instants, and
//! is created lazily: a document without instants is written unchanged.
//!
//! The normalizer is pure. Fetching the clock offset is the caller's job
//! (see [`crate::StorageProvider`]).

mod index;
mod inbound;
mod outbound;

pub use index::OffsetIndex;

use thiserror::Error;

use crate::config::ProviderConfig;

/// Reserved top-level key holding the offset index on the wire.
pub const TIMES_KEY: &str = "_times";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("Malformed document at '{path}': {reason}")]
    MalformedDocument { path: String, reason: String },
    #[error("Reserved key '{0}' cannot be used in caller documents")]
    ReservedKey(&'static str),
    #[error("Timestamp at '{path}' is outside the representable range")]
    OutOfRange { path: String },
}

impl NormalizeError {
    pub(crate) fn malformed(path: &[String], reason: impl Into<String>) -> Self {
        Self::MalformedDocument {
            path: display_path(path),
            reason: reason.into(),
        }
    }

    pub(crate) fn out_of_range(path: &[String]) -> Self {
        Self::OutOfRange {
            path: display_path(path),
        }
    }
}

/// Render a path as `/a/b/0`; the root renders as `/`.
pub(crate) fn display_path(path: &[String]) -> String {
    if path.is_empty() {
        return "/".to_string();
    }
    path.iter().fold(String::new(), |mut out, key| {
        out.push('/');
        out.push_str(key);
        out
    })
}

/// Bidirectional instant rewriter.
///
/// # Example
///
/// ```
/// use skew_store::{Document, Normalizer};
/// use chrono::{TimeZone, Utc};
/// use serde_json::json;
///
/// let at = Utc.timestamp_millis_opt(1_000).unwrap();
/// let doc: Document = [("createdAt", Document::from(at))].into_iter().collect();
///
/// let normalizer = Normalizer::new();
/// let wire = normalizer.outbound(doc.clone(), 250).unwrap();
/// assert_eq!(wire, json!({"_times": {"createdAt": 1250}}));
///
/// let restored = normalizer.inbound(wire, 250).unwrap();
/// assert_eq!(restored, doc);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Normalizer {
    round_to_nearest_second: bool,
    max_depth: usize,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::from_config(&ProviderConfig::default())
    }
}

impl Normalizer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_config(config: &ProviderConfig) -> Self {
        Self {
            round_to_nearest_second: config.round_to_nearest_second,
            max_depth: config.max_depth,
        }
    }

    /// Round restored instants to the nearest whole second (half up).
    #[must_use]
    pub fn with_rounding(mut self, round_to_nearest_second: bool) -> Self {
        self.round_to_nearest_second = round_to_nearest_second;
        self
    }

    /// Maximum number of path segments below the root.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    #[must_use]
    pub fn rounds_to_nearest_second(&self) -> bool {
        self.round_to_nearest_second
    }

    #[must_use]
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    fn check_depth(&self, path: &[String]) -> Result<(), NormalizeError> {
        if path.len() > self.max_depth {
            return Err(NormalizeError::malformed(
                path,
                format!("nesting exceeds the maximum depth of {}", self.max_depth),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_path() {
        assert_eq!(display_path(&[]), "/");
        assert_eq!(
            display_path(&["a".to_string(), "0".to_string(), "b".to_string()]),
            "/a/0/b"
        );
    }

    #[test]
    fn test_defaults_follow_config() {
        let normalizer = Normalizer::new();
        let config = ProviderConfig::default();

        assert_eq!(normalizer.rounds_to_nearest_second(), config.round_to_nearest_second);
        assert_eq!(normalizer.max_depth(), config.max_depth);
    }

    #[test]
    fn test_builders() {
        let normalizer = Normalizer::new().with_rounding(true).with_max_depth(3);
        assert!(normalizer.rounds_to_nearest_second());
        assert_eq!(normalizer.max_depth(), 3);
    }

    #[test]
    fn test_error_messages() {
        let err = NormalizeError::malformed(&["a".to_string()], "bad leaf");
        assert_eq!(err.to_string(), "Malformed document at '/a': bad leaf");

        let err = NormalizeError::ReservedKey(TIMES_KEY);
        assert!(err.to_string().contains("_times"));
    }
}
