// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Lazily-built `_times` side-tree.

use serde_json::{Map, Value};

use super::NormalizeError;

/// Builder for the offset index written under [`super::TIMES_KEY`].
///
/// Nothing is allocated until the first [`OffsetIndex::insert`], so a
/// document without instants never grows a `_times` key.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct OffsetIndex {
    root: Option<Map<String, Value>>,
}

impl OffsetIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Record `millis` at `path`, creating intermediate objects.
    ///
    /// `path` is the full path of the rewritten leaf; its last segment
    /// becomes the leaf key in the index.
    pub fn insert(&mut self, path: &[String], millis: i64) -> Result<(), NormalizeError> {
        let Some((leaf, parents)) = path.split_last() else {
            return Err(NormalizeError::malformed(path, "an instant cannot be the document root"));
        };

        let mut node = self.root.get_or_insert_with(Map::new);
        for (depth, key) in parents.iter().enumerate() {
            let child = node
                .entry(key.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            node = match child {
                Value::Object(map) => map,
                _ => {
                    return Err(NormalizeError::malformed(
                        &path[..=depth],
                        "offset index already holds a leaf here",
                    ))
                }
            };
        }
        node.insert(leaf.clone(), Value::from(millis));
        Ok(())
    }

    /// The finished side-tree, or `None` when nothing was recorded.
    #[must_use]
    pub fn into_value(self) -> Option<Value> {
        self.root.map(Value::Object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn path(keys: &[&str]) -> Vec<String> {
        keys.iter().map(|k| k.to_string()).collect()
    }

    #[test]
    fn test_new_index_is_empty() {
        let index = OffsetIndex::new();
        assert!(index.is_empty());
        assert!(index.into_value().is_none());
    }

    #[test]
    fn test_insert_builds_mirrored_branches() {
        let mut index = OffsetIndex::new();
        index.insert(&path(&["a"]), 1).unwrap();
        index.insert(&path(&["b", "c"]), 2).unwrap();
        index.insert(&path(&["b", "d", "e"]), 3).unwrap();

        assert!(!index.is_empty());
        assert_eq!(
            index.into_value().unwrap(),
            json!({"a": 1, "b": {"c": 2, "d": {"e": 3}}})
        );
    }

    #[test]
    fn test_insert_rejects_root_leaf() {
        let mut index = OffsetIndex::new();
        let err = index.insert(&[], 1).unwrap_err();
        assert!(matches!(err, NormalizeError::MalformedDocument { .. }));
        assert!(index.is_empty());
    }

    #[test]
    fn test_insert_through_existing_leaf_fails() {
        let mut index = OffsetIndex::new();
        index.insert(&path(&["a"]), 1).unwrap();

        let err = index.insert(&path(&["a", "b"]), 2).unwrap_err();
        assert_eq!(
            err,
            NormalizeError::MalformedDocument {
                path: "/a".into(),
                reason: "offset index already holds a leaf here".into(),
            }
        );
    }
}
