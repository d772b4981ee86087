// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Live subscriptions: `sync()` / `unsync()`.
//!
//! # Delivery
//!
//! ```text
//! store listener ──send──► unbounded channel ──► pump task ──inbound──► callback
//! ```
//!
//! One pump task per `sync()` call. It handles deliveries one at a time, so
//! the callback sees changes in store order. `unsync()` drops the store
//! listener, which closes the channel and ends the task; a delivery already
//! queued at that moment still reaches the callback.
//!
//! The pump holds deliveries until `sync()` has its initial value. If the
//! subscription or that load fails, the pump exits without ever calling the
//! callback and the registration is rolled back.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::document::Document;
use crate::metrics;
use crate::normalizer::Normalizer;
use crate::storage::traits::{DocumentStore, StoreError, ValueListener};

use super::{from_wire, record_outcome, record_path, Error, StorageProvider};

type Change = Result<Option<Value>, StoreError>;

impl StorageProvider {
    /// Subscribe to `collection/id` and return its current value.
    ///
    /// `callback` receives every later change with instants restored, or the
    /// error that prevented it. With `dedupe_initial_sync` (the default) the
    /// store's first delivery is dropped, since it carries the same initial
    /// value this call returns; otherwise the callback sees it too.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// # use skew_store::StorageProvider;
    /// # async fn example(provider: &StorageProvider) -> Result<(), skew_store::Error> {
    /// let initial = provider
    ///     .sync("rooms", "lobby", |change| match change {
    ///         Ok(doc) => println!("lobby is now {doc:?}"),
    ///         Err(e) => eprintln!("lobby sync failed: {e}"),
    ///     })
    ///     .await?;
    /// println!("lobby starts as {initial:?}");
    /// provider.unsync("rooms", "lobby");
    /// # Ok(())
    /// # }
    /// ```
    #[tracing::instrument(skip_all, fields(collection = %collection, id = %id))]
    pub async fn sync<F>(
        &self,
        collection: &str,
        id: &str,
        callback: F,
    ) -> Result<Option<Document>, Error>
    where
        F: Fn(Result<Option<Document>, Error>) + Send + Sync + 'static,
    {
        let _timer = crate::time_operation!("sync");
        let (tx, rx) = mpsc::unbounded_channel::<Change>();
        let listener: ValueListener = Arc::new(move |change| {
            // Receiver gone means the pump already stopped
            let _ = tx.send(change);
        });
        let (ready_tx, ready_rx) = oneshot::channel();

        // Spawn first: the store may deliver the initial value inline
        tokio::spawn(pump_changes(
            self.store.clone(),
            self.normalizer,
            rx,
            ready_rx,
            self.config.dedupe_initial_sync,
            callback,
        ));

        if let Err(e) = self.store.subscribe_value(collection, id, listener).await {
            let _ = ready_tx.send(false);
            let result = Err(Error::Store(e));
            record_outcome("sync", &result);
            return result;
        }
        self.track_subscription(collection, id);

        let result = self.load(collection, id).await;
        match &result {
            Ok(_) => {
                let _ = ready_tx.send(true);
            }
            Err(e) => {
                warn!(error = %e, "Initial load failed, dropping subscription");
                let _ = ready_tx.send(false);
                self.release_subscription(collection, id);
            }
        }
        record_outcome("sync", &result);
        result
    }

    /// Stop deliveries for every `sync()` on `collection/id`. Idempotent.
    pub fn unsync(&self, collection: &str, id: &str) {
        self.store.unsubscribe(collection, id);
        if self.subscriptions.remove(&record_path(collection, id)).is_some() {
            debug!(collection, id, "Unsynced");
        }
        metrics::set_active_subscriptions(self.active_syncs());
    }

    /// Number of `sync()` registrations not yet cancelled.
    #[must_use]
    pub fn active_syncs(&self) -> usize {
        self.subscriptions.iter().map(|entry| *entry.value()).sum()
    }

    fn track_subscription(&self, collection: &str, id: &str) {
        *self
            .subscriptions
            .entry(record_path(collection, id))
            .or_insert(0) += 1;
        metrics::set_active_subscriptions(self.active_syncs());
    }

    /// Undo one `track_subscription`. The store listeners on the record are
    /// only dropped once no other `sync()` still uses them.
    fn release_subscription(&self, collection: &str, id: &str) {
        let path = record_path(collection, id);
        if let Some(mut count) = self.subscriptions.get_mut(&path) {
            *count = count.saturating_sub(1);
        }
        if self.subscriptions.remove_if(&path, |_, count| *count == 0).is_some() {
            self.store.unsubscribe(collection, id);
        }
        metrics::set_active_subscriptions(self.active_syncs());
    }
}

async fn pump_changes<F>(
    store: Arc<dyn DocumentStore>,
    normalizer: Normalizer,
    mut rx: mpsc::UnboundedReceiver<Change>,
    ready: oneshot::Receiver<bool>,
    mut skip_next: bool,
    callback: F,
) where
    F: Fn(Result<Option<Document>, Error>) + Send + Sync + 'static,
{
    if !ready.await.unwrap_or(false) {
        debug!("Sync abandoned before its first delivery");
        return;
    }
    while let Some(change) = rx.recv().await {
        if std::mem::take(&mut skip_next) {
            debug!("Suppressed initial sync delivery");
            continue;
        }
        let result = match change {
            Ok(value) => from_wire(store.as_ref(), &normalizer, value).await,
            Err(e) => Err(Error::Store(e)),
        };
        match &result {
            Ok(_) => metrics::record_delivery("value", "success"),
            Err(e) => {
                warn!(error = %e, "Sync delivery failed");
                metrics::record_delivery("value", "error");
            }
        }
        callback(result);
    }
    debug!("Sync channel closed");
}
