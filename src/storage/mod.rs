// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Store adapters.
//!
//! - [`traits`]: the [`DocumentStore`] / [`ClockOffsetSource`] contract
//! - [`query`]: query options and ordering rules
//! - [`memory`]: in-process reference store

pub mod memory;
pub mod query;
pub mod traits;

pub use memory::MemoryStore;
pub use query::QueryOptions;
pub use traits::{ClockOffsetSource, DocumentStore, KeyListener, StoreError, ValueListener};
