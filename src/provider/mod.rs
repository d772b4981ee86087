// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Storage provider.
//!
//! The [`StorageProvider`] composes a [`DocumentStore`] with the
//! [`Normalizer`]:
//!
//! ```text
//! save:  Document ──outbound(offset)──► Value ──create / update──► store
//! load:  store ──read──► Value ──inbound(offset)──► Document
//! sync:  store ──subscribe──► channel ──inbound(offset)──► callback
//! ```
//!
//! The clock offset is fetched from the store for every operation.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use skew_store::{Document, MemoryStore, ProviderConfig, StorageProvider};
//! use chrono::Utc;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), skew_store::Error> {
//! let store = Arc::new(MemoryStore::new());
//! store.set_clock_offset_ms(1_500);
//! let provider = StorageProvider::new(store, ProviderConfig::default())?;
//!
//! let doc: Document = [("createdAt", Document::from(Utc::now()))].into_iter().collect();
//! let id = provider.save("notes", None, doc).await?;
//! let loaded = provider.load("notes", &id).await?;
//! assert!(loaded.unwrap().get("createdAt").unwrap().is_instant());
//! # Ok(())
//! # }
//! ```

mod query_api;
mod sync_api;
mod types;

pub use types::Error;

use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;
use tracing::{debug, info};

use crate::config::ProviderConfig;
use crate::document::Document;
use crate::metrics;
use crate::normalizer::{Normalizer, TIMES_KEY};
use crate::storage::traits::{ClockOffsetSource, DocumentStore};

/// Timestamp-normalizing front end over a [`DocumentStore`].
pub struct StorageProvider {
    store: Arc<dyn DocumentStore>,
    normalizer: Normalizer,
    config: ProviderConfig,
    /// Live `sync()` registrations per `collection/id`
    subscriptions: DashMap<String, usize>,
}

impl StorageProvider {
    /// Build a provider over `store`.
    ///
    /// # Errors
    ///
    /// [`Error::Construction`] when `config` does not validate.
    pub fn new(store: Arc<dyn DocumentStore>, config: ProviderConfig) -> Result<Self, Error> {
        config.validate().map_err(Error::Construction)?;
        info!(
            round_to_nearest_second = config.round_to_nearest_second,
            max_depth = config.max_depth,
            dedupe_initial_sync = config.dedupe_initial_sync,
            "Storage provider created"
        );
        Ok(Self {
            store,
            normalizer: Normalizer::from_config(&config),
            config,
            subscriptions: DashMap::new(),
        })
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    #[must_use]
    pub fn normalizer(&self) -> Normalizer {
        self.normalizer
    }

    #[must_use]
    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Save `data` under `collection`, creating a record when `id` is `None`
    /// and overwriting `id` otherwise. Returns the record id.
    ///
    /// # Errors
    ///
    /// Store failures (including the offset fetch) as [`Error::Store`],
    /// transform failures as [`Error::Normalize`].
    #[tracing::instrument(skip_all, fields(collection = %collection, id = ?id))]
    pub async fn save(
        &self,
        collection: &str,
        id: Option<&str>,
        data: Document,
    ) -> Result<String, Error> {
        let _timer = crate::time_operation!("save");
        let result = async {
            let wire = to_wire(self.store.as_ref(), &self.normalizer, data).await?;
            let id = match id {
                Some(id) => self.store.update(collection, id, wire).await?,
                None => self.store.create(collection, wire).await?,
            };
            debug!(id = %id, "Saved");
            Ok::<_, Error>(id)
        }
        .await;
        record_outcome("save", &result);
        result
    }

    /// Read `collection/id` and restore its instants. `Ok(None)` when the
    /// record does not exist.
    #[tracing::instrument(skip_all, fields(collection = %collection, id = %id))]
    pub async fn load(&self, collection: &str, id: &str) -> Result<Option<Document>, Error> {
        let _timer = crate::time_operation!("load");
        let result = async {
            let value = self.store.read(collection, id).await?;
            from_wire(self.store.as_ref(), &self.normalizer, value).await
        }
        .await;
        record_outcome("load", &result);
        result
    }
}

/// Fetch the offset and rewrite `doc` for the wire.
pub(crate) async fn to_wire(
    store: &dyn DocumentStore,
    normalizer: &Normalizer,
    doc: Document,
) -> Result<Value, Error> {
    let offset = store.clock_offset_ms().await?;
    metrics::set_clock_offset(offset);
    let count = doc.instant_count();
    let wire = normalizer.outbound(doc, offset)?;
    metrics::record_instants("outbound", count);
    Ok(wire)
}

/// Restore a stored value. The offset is only fetched when the value
/// carries an offset index.
pub(crate) async fn from_wire(
    store: &dyn DocumentStore,
    normalizer: &Normalizer,
    value: Option<Value>,
) -> Result<Option<Document>, Error> {
    let Some(value) = value else {
        return Ok(None);
    };
    if value.get(TIMES_KEY).is_none() {
        return Ok(Some(Document::from(value)));
    }
    let offset = store.clock_offset_ms().await?;
    metrics::set_clock_offset(offset);
    let doc = normalizer.inbound(value, offset)?;
    metrics::record_instants("inbound", doc.instant_count());
    Ok(Some(doc))
}

fn record_outcome<T>(operation: &'static str, result: &Result<T, Error>) {
    match result {
        Ok(_) => metrics::record_operation(operation, "success"),
        Err(e) => {
            metrics::record_operation(operation, "error");
            metrics::record_error(operation, e.kind());
        }
    }
}

fn record_path(collection: &str, id: &str) -> String {
    format!("{collection}/{id}")
}
