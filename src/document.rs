// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Document tree data structure.
//!
//! A [`Document`] is the caller-facing value that flows through the provider.
//! It is a JSON-like tree with one extra leaf type, [`Document::Instant`], for
//! absolute points in time. JSON itself cannot carry instants, so they only
//! reach the store after the normalizer has rewritten them.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use serde_json::{Number, Value};

/// A JSON-like document tree with first-class instants.
///
/// # Example
///
/// ```
/// use skew_store::Document;
/// use chrono::{TimeZone, Utc};
///
/// let created = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
/// let doc: Document = [
///     ("title", Document::from("hello")),
///     ("createdAt", Document::from(created)),
/// ]
/// .into_iter()
/// .collect();
///
/// assert!(doc.get("createdAt").unwrap().is_instant());
/// assert_eq!(doc.instant_count(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Document {
    #[default]
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    /// An absolute point in time. The wire carries whole milliseconds, so
    /// build these with [`Document::instant`] or `From`, which truncate.
    Instant(DateTime<Utc>),
    Array(Vec<Document>),
    Object(BTreeMap<String, Document>),
}

impl Document {
    /// An empty object node.
    #[must_use]
    pub fn object() -> Self {
        Self::Object(BTreeMap::new())
    }

    /// An instant truncated to whole milliseconds.
    #[must_use]
    pub fn instant(at: DateTime<Utc>) -> Self {
        Self::Instant(at.trunc_subsecs(3))
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn is_instant(&self) -> bool {
        matches!(self, Self::Instant(_))
    }

    /// Objects and arrays.
    #[must_use]
    pub fn is_composite(&self) -> bool {
        matches!(self, Self::Object(_) | Self::Array(_))
    }

    #[must_use]
    pub fn as_instant(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Instant(at) => Some(*at),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_object(&self) -> Option<&BTreeMap<String, Document>> {
        match self {
            Self::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_object_mut(&mut self) -> Option<&mut BTreeMap<String, Document>> {
        match self {
            Self::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Look up a direct child by key (objects) or decimal index (arrays).
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Document> {
        match self {
            Self::Object(map) => map.get(key),
            Self::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        }
    }

    /// Follow a root-relative path of keys.
    #[must_use]
    pub fn pointer<S: AsRef<str>>(&self, path: &[S]) -> Option<&Document> {
        path.iter().try_fold(self, |node, key| node.get(key.as_ref()))
    }

    /// Insert a child into an object node, returning the previous value.
    ///
    /// Returns `None` without inserting when `self` is not an object.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<Document>,
    ) -> Option<Document> {
        self.as_object_mut()?.insert(key.into(), value.into())
    }

    /// Number of instant leaves anywhere in the tree.
    #[must_use]
    pub fn instant_count(&self) -> usize {
        match self {
            Self::Instant(_) => 1,
            Self::Array(items) => items.iter().map(Self::instant_count).sum(),
            Self::Object(map) => map.values().map(Self::instant_count).sum(),
            _ => 0,
        }
    }
}

impl From<Value> for Document {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => Self::Number(n),
            Value::String(s) => Self::String(s),
            Value::Array(items) => Self::Array(items.into_iter().map(Self::from).collect()),
            Value::Object(map) => {
                Self::Object(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

impl From<DateTime<Utc>> for Document {
    fn from(at: DateTime<Utc>) -> Self {
        Self::instant(at)
    }
}

impl From<bool> for Document {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Document {
    fn from(n: i64) -> Self {
        Self::Number(n.into())
    }
}

impl From<&str> for Document {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Document {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<Vec<Document>> for Document {
    fn from(items: Vec<Document>) -> Self {
        Self::Array(items)
    }
}

impl<K: Into<String>> FromIterator<(K, Document)> for Document {
    fn from_iter<I: IntoIterator<Item = (K, Document)>>(iter: I) -> Self {
        Self::Object(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// Instants serialize as RFC 3339 strings with millisecond precision.
/// This is a display form only; the store never sees it.
impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Number(n) => n.serialize(serializer),
            Self::String(s) => serializer.serialize_str(s),
            Self::Instant(at) => {
                serializer.serialize_str(&at.to_rfc3339_opts(SecondsFormat::Millis, true))
            }
            Self::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Object(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (k, v) in map {
                    out.serialize_entry(k, v)?;
                }
                out.end()
            }
        }
    }
}
