// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! In-process [`DocumentStore`] with Firebase-style semantics.
//!
//! Used by the test suites and the demo, and handy as a local fake:
//! - keys are validated like the hosted store (no `.`, `#`, `$`, `[`, `]`, `/`)
//! - `update` with `null` removes the record
//! - `create` ids are time-ordered (UUID v7)
//! - the clock offset is settable, modelling `.info/serverTimeOffset`
//! - `set_online(false)` makes every call fail with [`StoreError::Disconnected`]

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use super::query::QueryOptions;
use super::traits::{ClockOffsetSource, DocumentStore, KeyListener, StoreError, ValueListener};

const FORBIDDEN_KEY_CHARS: [char; 6] = ['.', '#', '$', '[', ']', '/'];

struct KeySubscription {
    options: QueryOptions,
    listener: KeyListener,
    emitted: HashSet<String>,
}

pub struct MemoryStore {
    collections: DashMap<String, BTreeMap<String, Value>>,
    value_listeners: DashMap<String, Vec<ValueListener>>,
    key_listeners: DashMap<String, Vec<KeySubscription>>,
    clock_offset_ms: AtomicI64,
    online: AtomicBool,
    /// Serializes writes with their notifications so listeners see store order
    write_lock: Mutex<()>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            collections: DashMap::new(),
            value_listeners: DashMap::new(),
            key_listeners: DashMap::new(),
            clock_offset_ms: AtomicI64::new(0),
            online: AtomicBool::new(true),
            write_lock: Mutex::new(()),
        }
    }

    /// Set the simulated `server - local` offset.
    pub fn set_clock_offset_ms(&self, offset_ms: i64) {
        self.clock_offset_ms.store(offset_ms, Ordering::SeqCst);
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Number of records in a collection
    #[must_use]
    pub fn len(&self, collection: &str) -> usize {
        self.collections.get(collection).map_or(0, |c| c.len())
    }

    #[must_use]
    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }

    /// Number of live value listeners on `collection/id`
    #[must_use]
    pub fn listener_count(&self, collection: &str, id: &str) -> usize {
        self.value_listeners
            .get(&record_path(collection, id))
            .map_or(0, |l| l.len())
    }

    /// Drop all records; listeners stay registered.
    pub fn clear(&self) {
        self.collections.clear();
    }

    fn ensure_online(&self) -> Result<(), StoreError> {
        if self.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Disconnected)
        }
    }

    fn write(&self, collection: &str, id: &str, data: Value) -> Result<(), StoreError> {
        validate_collection(collection)?;
        validate_key(id).map_err(StoreError::InvalidPath)?;
        validate_value(&data)?;

        let _guard = self.write_lock.lock();
        if data.is_null() {
            if let Some(mut records) = self.collections.get_mut(collection) {
                records.remove(id);
            }
        } else {
            self.collections
                .entry(collection.to_string())
                .or_default()
                .insert(id.to_string(), data);
        }
        self.notify(collection, id);
        Ok(())
    }

    fn snapshot(&self, collection: &str) -> BTreeMap<String, Value> {
        self.collections
            .get(collection)
            .map(|c| c.value().clone())
            .unwrap_or_default()
    }

    /// Deliver the current value of `collection/id` and any newly matching
    /// keys. Listeners are cloned out before being called.
    fn notify(&self, collection: &str, id: &str) {
        let current = self
            .collections
            .get(collection)
            .and_then(|c| c.get(id).cloned());
        let listeners = self
            .value_listeners
            .get(&record_path(collection, id))
            .map(|l| l.value().clone())
            .unwrap_or_default();
        for listener in &listeners {
            listener(Ok(current.clone()));
        }

        if self.key_listeners.contains_key(collection) {
            let records = self.snapshot(collection);
            let pending = self.collect_new_keys(collection, &records);
            for (listener, key) in pending {
                listener(Ok(key));
            }
        }
    }

    fn collect_new_keys(
        &self,
        collection: &str,
        records: &BTreeMap<String, Value>,
    ) -> Vec<(KeyListener, String)> {
        let mut pending = Vec::new();
        if let Some(mut subscriptions) = self.key_listeners.get_mut(collection) {
            for sub in subscriptions.iter_mut() {
                for key in sub.options.select(records) {
                    if sub.emitted.insert(key.clone()) {
                        pending.push((sub.listener.clone(), key));
                    }
                }
            }
        }
        pending
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn record_path(collection: &str, id: &str) -> String {
    format!("{collection}/{id}")
}

fn validate_key(key: &str) -> Result<(), String> {
    if key.is_empty() {
        return Err("keys must be non-empty".to_string());
    }
    if let Some(c) = key
        .chars()
        .find(|c| FORBIDDEN_KEY_CHARS.contains(c) || c.is_ascii_control())
    {
        return Err(format!("key '{key}' contains forbidden character {c:?}"));
    }
    Ok(())
}

fn validate_collection(collection: &str) -> Result<(), StoreError> {
    collection
        .split('/')
        .try_for_each(validate_key)
        .map_err(StoreError::InvalidPath)
}

fn validate_value(value: &Value) -> Result<(), StoreError> {
    match value {
        Value::Object(map) => map.iter().try_for_each(|(k, v)| {
            validate_key(k).map_err(StoreError::InvalidData)?;
            validate_value(v)
        }),
        Value::Array(items) => items.iter().try_for_each(validate_value),
        _ => Ok(()),
    }
}

#[async_trait]
impl ClockOffsetSource for MemoryStore {
    async fn clock_offset_ms(&self) -> Result<i64, StoreError> {
        self.ensure_online()?;
        Ok(self.clock_offset_ms.load(Ordering::SeqCst))
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn create(&self, collection: &str, data: Value) -> Result<String, StoreError> {
        self.ensure_online()?;
        let id = Uuid::now_v7().simple().to_string();
        self.write(collection, &id, data)?;
        debug!(collection, id = %id, "Record created");
        Ok(id)
    }

    async fn update(&self, collection: &str, id: &str, data: Value) -> Result<String, StoreError> {
        self.ensure_online()?;
        self.write(collection, id, data)?;
        Ok(id.to_string())
    }

    async fn read(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
        self.ensure_online()?;
        Ok(self
            .collections
            .get(collection)
            .and_then(|c| c.get(id).cloned()))
    }

    async fn subscribe_value(
        &self,
        collection: &str,
        id: &str,
        listener: ValueListener,
    ) -> Result<(), StoreError> {
        self.ensure_online()?;
        validate_collection(collection)?;
        validate_key(id).map_err(StoreError::InvalidPath)?;

        let _guard = self.write_lock.lock();
        let current = self
            .collections
            .get(collection)
            .and_then(|c| c.get(id).cloned());
        self.value_listeners
            .entry(record_path(collection, id))
            .or_default()
            .push(listener.clone());
        listener(Ok(current));
        Ok(())
    }

    fn unsubscribe(&self, collection: &str, id: &str) {
        self.value_listeners.remove(&record_path(collection, id));
    }

    async fn query_child_keys(
        &self,
        collection: &str,
        options: &QueryOptions,
        listener: KeyListener,
    ) -> Result<(), StoreError> {
        self.ensure_online()?;
        validate_collection(collection)?;

        let _guard = self.write_lock.lock();
        self.key_listeners
            .entry(collection.to_string())
            .or_default()
            .push(KeySubscription {
                options: options.clone(),
                listener,
                emitted: HashSet::new(),
            });
        let records = self.snapshot(collection);
        for (listener, key) in self.collect_new_keys(collection, &records) {
            listener(Ok(key));
        }
        Ok(())
    }

    fn unsubscribe_query(&self, collection: &str) {
        self.key_listeners.remove(collection);
    }

    async fn query_once(
        &self,
        collection: &str,
        options: &QueryOptions,
    ) -> Result<BTreeMap<String, Value>, StoreError> {
        self.ensure_online()?;
        let records = self.snapshot(collection);
        Ok(options
            .select(&records)
            .into_iter()
            .filter_map(|key| records.get(&key).cloned().map(|v| (key, v)))
            .collect())
    }
}
