// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Child queries: ordering, equality filter and limit.
//!
//! # Ordering
//!
//! With `sort_by`, records are ordered by the value at that child path:
//!
//! ```text
//! missing / null  <  false  <  true  <  numbers  <  strings  <  objects, arrays
//! ```
//!
//! Ties, and queries without `sort_by`, fall back to key order: keys that
//! parse as 32-bit integers first (numerically), then the rest
//! lexicographically.
//!
//! # Example
//!
//! ```
//! use skew_store::storage::QueryOptions;
//!
//! let options = QueryOptions::new().sort_by("score").limit(2);
//! assert_eq!(options.sort_by.as_deref(), Some("score"));
//! assert_eq!(options.limit, Some(2));
//! ```

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde_json::Value;

/// Options for `query` / `query_once`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOptions {
    /// Child path to order by, `/`-separated (e.g. `stats/score`)
    pub sort_by: Option<String>,
    /// Keep only records whose `sort_by` child equals this value.
    /// Ignored without `sort_by`.
    pub equal_to: Option<Value>,
    /// Keep the first N records in order. `0` means no limit.
    pub limit: Option<usize>,
}

impl QueryOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn sort_by(mut self, child: impl Into<String>) -> Self {
        self.sort_by = Some(child.into());
        self
    }

    #[must_use]
    pub fn equal_to(mut self, value: impl Into<Value>) -> Self {
        self.equal_to = Some(value.into());
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    fn effective_limit(&self) -> Option<usize> {
        self.limit.filter(|n| *n > 0)
    }

    /// Matching keys of `records`, in query order.
    #[must_use]
    pub fn select(&self, records: &BTreeMap<String, Value>) -> Vec<String> {
        let mut rows: Vec<(&String, Option<&Value>)> = match &self.sort_by {
            Some(path) => records.iter().map(|(k, v)| (k, child_at(v, path))).collect(),
            None => records.keys().map(|k| (k, None)).collect(),
        };

        if let (Some(_), Some(expected)) = (&self.sort_by, &self.equal_to) {
            rows.retain(|(_, child)| *child == Some(expected));
        }

        rows.sort_by(|(ka, va), (kb, vb)| {
            compare_values(*va, *vb).then_with(|| compare_keys(ka, kb))
        });

        let rows = rows.into_iter().map(|(k, _)| k.clone());
        match self.effective_limit() {
            Some(n) => rows.take(n).collect(),
            None => rows.collect(),
        }
    }
}

fn child_at<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .try_fold(value, |node, key| node.get(key))
}

fn type_rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Bool(false)) => 1,
        Some(Value::Bool(true)) => 2,
        Some(Value::Number(_)) => 3,
        Some(Value::String(_)) => 4,
        Some(Value::Array(_)) | Some(Value::Object(_)) => 5,
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

/// Integer-like keys sort numerically ahead of all other keys.
pub(crate) fn compare_keys(a: &str, b: &str) -> Ordering {
    match (a.parse::<i32>(), b.parse::<i32>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}
