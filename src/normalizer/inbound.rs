// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Server → client rewrite.

use chrono::{DateTime, Utc};
use serde_json::{Map, Number, Value};

use crate::document::Document;

use super::{NormalizeError, Normalizer, TIMES_KEY};

impl Normalizer {
    /// Restore every instant recorded in the `_times` side-tree of `value`
    /// as `server_millis - offset_ms`, and drop the side-tree.
    ///
    /// A value without `_times` converts unchanged. Missing intermediate
    /// nodes on the way to a restored leaf are created as objects.
    ///
    /// # Errors
    ///
    /// [`NormalizeError::MalformedDocument`] when the side-tree holds a
    /// non-numeric leaf, when a restored path runs through a scalar, or when
    /// nesting exceeds `max_depth`; [`NormalizeError::OutOfRange`] when a time
    /// cannot be represented.
    pub fn inbound(&self, value: Value, offset_ms: i64) -> Result<Document, NormalizeError> {
        let Value::Object(mut map) = value else {
            return Ok(Document::from(value));
        };
        let Some(times) = map.remove(TIMES_KEY) else {
            return Ok(Document::from(Value::Object(map)));
        };

        let mut doc = Document::from(Value::Object(map));
        let mut path = Vec::new();
        match times {
            Value::Object(tree) => self.restore(tree, &mut path, offset_ms, &mut doc)?,
            Value::Null => {}
            _ => {
                path.push(TIMES_KEY.to_string());
                return Err(NormalizeError::malformed(&path, "offset index is not an object"));
            }
        }
        Ok(doc)
    }

    fn restore(
        &self,
        tree: Map<String, Value>,
        path: &mut Vec<String>,
        offset_ms: i64,
        doc: &mut Document,
    ) -> Result<(), NormalizeError> {
        for (key, leaf) in tree {
            path.push(key);
            self.check_depth(path)?;
            match leaf {
                Value::Object(subtree) => self.restore(subtree, path, offset_ms, doc)?,
                Value::Number(n) => {
                    let at = self.local_instant(&n, offset_ms, path)?;
                    place(doc, path, Document::Instant(at))?;
                }
                Value::Null => {}
                _ => {
                    return Err(NormalizeError::malformed(
                        path,
                        "offset index leaf is not a number",
                    ))
                }
            }
            path.pop();
        }
        Ok(())
    }

    fn local_instant(
        &self,
        server: &Number,
        offset_ms: i64,
        path: &[String],
    ) -> Result<DateTime<Utc>, NormalizeError> {
        let server = server
            .as_i64()
            .or_else(|| server.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
            .ok_or_else(|| NormalizeError::out_of_range(path))?;
        let mut local = server
            .checked_sub(offset_ms)
            .ok_or_else(|| NormalizeError::out_of_range(path))?;
        if self.round_to_nearest_second {
            local = round_half_up_to_second(local)
                .ok_or_else(|| NormalizeError::out_of_range(path))?;
        }
        DateTime::from_timestamp_millis(local).ok_or_else(|| NormalizeError::out_of_range(path))
    }
}

/// `round(ms / 1000) * 1000`, with ties going toward positive infinity.
fn round_half_up_to_second(ms: i64) -> Option<i64> {
    ms.checked_add(500)?.div_euclid(1000).checked_mul(1000)
}

/// Write `value` at `path` in `root`, creating intermediate objects.
fn place(root: &mut Document, path: &[String], value: Document) -> Result<(), NormalizeError> {
    let mut node = root;
    for depth in 0..path.len() {
        node = child_slot(node, &path[..=depth])?;
    }
    *node = value;
    Ok(())
}

/// The slot for the last segment of `path` under `node`. A `null` node is
/// promoted to an object; array slots past the end are padded with `null`.
fn child_slot<'a>(
    node: &'a mut Document,
    path: &[String],
) -> Result<&'a mut Document, NormalizeError> {
    let Some(key) = path.last() else {
        return Err(NormalizeError::malformed(path, "empty path"));
    };
    if node.is_null() {
        *node = Document::object();
    }
    match node {
        Document::Object(map) => Ok(map.entry(key.clone()).or_default()),
        Document::Array(items) => {
            let i = key
                .parse::<usize>()
                .map_err(|_| NormalizeError::malformed(path, "array segment is not an index"))?;
            if i >= items.len() {
                items.resize(i + 1, Document::Null);
            }
            Ok(&mut items[i])
        }
        _ => Err(NormalizeError::malformed(
            &path[..path.len() - 1],
            "cannot restore an instant beneath a scalar",
        )),
    }
}
