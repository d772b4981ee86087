// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Client → server rewrite.

use serde_json::{Map, Value};

use crate::document::Document;

use super::{NormalizeError, Normalizer, OffsetIndex, TIMES_KEY};

impl Normalizer {
    /// Rewrite every instant in `doc` into `epoch_millis + offset_ms` under
    /// the `_times` side-tree, returning the wire value.
    ///
    /// Instants inside arrays leave a `null` in their slot so sibling
    /// indices keep their positions.
    ///
    /// # Errors
    ///
    /// - [`NormalizeError::ReservedKey`] if the root object already has `_times`
    /// - [`NormalizeError::MalformedDocument`] if the root itself is an instant,
    ///   instants sit under a non-object root, or nesting exceeds `max_depth`
    /// - [`NormalizeError::OutOfRange`] if the shifted time overflows
    pub fn outbound(&self, doc: Document, offset_ms: i64) -> Result<Value, NormalizeError> {
        if let Document::Object(map) = &doc {
            if map.contains_key(TIMES_KEY) {
                return Err(NormalizeError::ReservedKey(TIMES_KEY));
            }
        }

        let mut path = Vec::new();
        let mut index = OffsetIndex::new();
        let Some(mut wire) = self.extract(doc, &mut path, offset_ms, &mut index)? else {
            return Err(NormalizeError::malformed(&path, "an instant cannot be the document root"));
        };

        if let Some(times) = index.into_value() {
            match &mut wire {
                Value::Object(map) => {
                    map.insert(TIMES_KEY.to_string(), times);
                }
                _ => {
                    return Err(NormalizeError::malformed(
                        &path,
                        "instants require an object at the document root",
                    ))
                }
            }
        }
        Ok(wire)
    }

    /// Returns `None` when `node` was an instant that moved into the index.
    fn extract(
        &self,
        node: Document,
        path: &mut Vec<String>,
        offset_ms: i64,
        index: &mut OffsetIndex,
    ) -> Result<Option<Value>, NormalizeError> {
        self.check_depth(path)?;

        let value = match node {
            Document::Instant(at) => {
                let server = at
                    .timestamp_millis()
                    .checked_add(offset_ms)
                    .ok_or_else(|| NormalizeError::out_of_range(path))?;
                index.insert(path, server)?;
                return Ok(None);
            }
            Document::Object(map) => {
                let mut out = Map::new();
                for (key, child) in map {
                    path.push(key);
                    let converted = self.extract(child, path, offset_ms, index)?;
                    if let (Some(key), Some(value)) = (path.pop(), converted) {
                        out.insert(key, value);
                    }
                }
                Value::Object(out)
            }
            Document::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for (i, child) in items.into_iter().enumerate() {
                    path.push(i.to_string());
                    let converted = self.extract(child, path, offset_ms, index)?;
                    path.pop();
                    out.push(converted.unwrap_or(Value::Null));
                }
                Value::Array(out)
            }
            Document::Null => Value::Null,
            Document::Bool(b) => Value::Bool(b),
            Document::Number(n) => Value::Number(n),
            Document::String(s) => Value::String(s),
        };
        Ok(Some(value))
    }
}
