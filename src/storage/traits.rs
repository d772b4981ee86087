// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use super::query::QueryOptions;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Invalid data: {0}")]
    InvalidData(String),
    #[error("Invalid path: {0}")]
    InvalidPath(String),
    #[error("Store disconnected")]
    Disconnected,
    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Receives the initial value of a record and every later change.
/// `Ok(None)` means the record does not exist (or was removed).
pub type ValueListener = Arc<dyn Fn(Result<Option<Value>, StoreError>) + Send + Sync>;

/// Receives each matching child key once.
pub type KeyListener = Arc<dyn Fn(Result<String, StoreError>) + Send + Sync>;

/// Source of the estimated `server - local` clock offset in milliseconds.
#[async_trait]
pub trait ClockOffsetSource: Send + Sync {
    async fn clock_offset_ms(&self) -> Result<i64, StoreError>;
}

/// A hierarchical document store addressed by `collection/id`.
///
/// Listeners are invoked in store change order per record. They must not
/// call back into the store synchronously.
#[async_trait]
pub trait DocumentStore: ClockOffsetSource {
    /// Store `data` under a fresh, store-generated id.
    async fn create(&self, collection: &str, data: Value) -> Result<String, StoreError>;

    /// Overwrite the record at `id`. Writing `null` removes it.
    async fn update(&self, collection: &str, id: &str, data: Value) -> Result<String, StoreError>;

    async fn read(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError>;

    async fn subscribe_value(
        &self,
        collection: &str,
        id: &str,
        listener: ValueListener,
    ) -> Result<(), StoreError>;

    /// Drop every value listener on `collection/id`. Idempotent.
    fn unsubscribe(&self, collection: &str, id: &str);

    async fn query_child_keys(
        &self,
        collection: &str,
        options: &QueryOptions,
        listener: KeyListener,
    ) -> Result<(), StoreError>;

    /// Drop every key listener on `collection`. Idempotent.
    fn unsubscribe_query(&self, collection: &str);

    async fn query_once(
        &self,
        collection: &str,
        options: &QueryOptions,
    ) -> Result<BTreeMap<String, Value>, StoreError>;
}
