// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! # Skew Store
//!
//! Clock-skew aware timestamp handling for hierarchical document stores.
//!
//! Client clocks drift. When a document carrying instants is written to a
//! shared store, each instant is shifted by the store's estimate of
//! `server - local` so every client writes in the server's time frame, and
//! shifted back on read.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     StorageProvider                         │
//! │  • save / load / sync / unsync / query / query_once         │
//! │  • Fetches the clock offset fresh per operation             │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Normalizer                            │
//! │  • outbound: instants → `_times` side-tree (server millis)  │
//! │  • inbound:  `_times` side-tree → instants (local)          │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     DocumentStore                           │
//! │  • External hierarchical store (collection/id records)      │
//! │  • MemoryStore reference implementation                     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use chrono::{TimeZone, Utc};
//! use serde_json::json;
//! use skew_store::{Document, MemoryStore, ProviderConfig, StorageProvider};
//! use skew_store::storage::DocumentStore;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), skew_store::Error> {
//! let store = Arc::new(MemoryStore::new());
//! store.set_clock_offset_ms(250); // server runs 250 ms ahead
//! let provider = StorageProvider::new(store.clone(), ProviderConfig::default())?;
//!
//! let created = Utc.timestamp_millis_opt(1_000).unwrap();
//! let doc: Document = [("createdAt", Document::from(created))].into_iter().collect();
//! let id = provider.save("namespace", None, doc.clone()).await?;
//!
//! // The store holds server-relative millis under `_times`
//! let raw = store.read("namespace", &id).await?;
//! assert_eq!(raw, Some(json!({"_times": {"createdAt": 1_250}})));
//!
//! // Loading restores the local instant
//! assert_eq!(provider.load("namespace", &id).await?, Some(doc));
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`normalizer`]: the outbound / inbound instant rewrite
//! - [`provider`]: the [`StorageProvider`] orchestrating store and normalizer
//! - [`storage`]: the [`DocumentStore`] contract and [`MemoryStore`]
//! - [`document`]: the [`Document`] tree
//! - [`metrics`]: metric recording helpers

pub mod config;
pub mod document;
pub mod metrics;
pub mod normalizer;
pub mod provider;
pub mod storage;

pub use config::ProviderConfig;
pub use document::Document;
pub use metrics::LatencyTimer;
pub use normalizer::{NormalizeError, Normalizer, OffsetIndex, TIMES_KEY};
pub use provider::{Error, StorageProvider};
pub use storage::{ClockOffsetSource, DocumentStore, MemoryStore, QueryOptions, StoreError};
