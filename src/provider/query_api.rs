// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Collection queries: streaming keys and one-shot snapshots.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use crate::document::Document;
use crate::metrics;
use crate::normalizer::TIMES_KEY;
use crate::storage::query::QueryOptions;
use crate::storage::traits::{ClockOffsetSource, DocumentStore, KeyListener, StoreError};

use super::{record_outcome, Error, StorageProvider};

impl StorageProvider {
    /// Stream the id of every record in `collection` matching `options`,
    /// once each, in store order. Records added later are reported as they
    /// start matching, until [`StorageProvider::unquery`].
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// # use skew_store::{StorageProvider, storage::QueryOptions};
    /// # async fn example(provider: &StorageProvider) -> Result<(), skew_store::Error> {
    /// let options = QueryOptions::new().sort_by("status").equal_to("open");
    /// provider
    ///     .query("tickets", &options, |key| match key {
    ///         Ok(id) => println!("open ticket {id}"),
    ///         Err(e) => eprintln!("query failed: {e}"),
    ///     })
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    #[tracing::instrument(skip_all, fields(collection = %collection))]
    pub async fn query<F>(
        &self,
        collection: &str,
        options: &QueryOptions,
        callback: F,
    ) -> Result<(), Error>
    where
        F: Fn(Result<String, Error>) + Send + Sync + 'static,
    {
        let listener: KeyListener = Arc::new(move |key: Result<String, StoreError>| {
            let status = if key.is_ok() { "success" } else { "error" };
            metrics::record_delivery("key", status);
            callback(key.map_err(Error::Store));
        });
        let result = self
            .store
            .query_child_keys(collection, options, listener)
            .await
            .map_err(Error::Store);
        record_outcome("query", &result);
        result
    }

    /// Stop key deliveries for every `query()` on `collection`. Idempotent.
    pub fn unquery(&self, collection: &str) {
        self.store.unsubscribe_query(collection);
        debug!(collection, "Unqueried");
    }

    /// Fetch every record of `collection` matching `options`, with instants
    /// restored.
    ///
    /// # Errors
    ///
    /// The store error, or the first record that fails to restore. No record
    /// is dropped silently.
    #[tracing::instrument(skip_all, fields(collection = %collection))]
    pub async fn query_once(
        &self,
        collection: &str,
        options: &QueryOptions,
    ) -> Result<BTreeMap<String, Document>, Error> {
        let _timer = crate::time_operation!("query_once");
        let result = async {
            let records = self.store.query_once(collection, options).await?;
            let offset = if records.values().any(|v| v.get(TIMES_KEY).is_some()) {
                let offset = self.store.clock_offset_ms().await?;
                metrics::set_clock_offset(offset);
                offset
            } else {
                0
            };

            let mut out = BTreeMap::new();
            let mut restored = 0;
            for (id, value) in records {
                let doc = self.normalizer.inbound(value, offset)?;
                restored += doc.instant_count();
                out.insert(id, doc);
            }
            metrics::record_instants("inbound", restored);
            debug!(count = out.len(), "Query returned");
            Ok::<_, Error>(out)
        }
        .await;
        record_outcome("query_once", &result);
        result
    }
}
