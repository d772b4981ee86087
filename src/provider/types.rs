// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Public types for the storage provider.

use thiserror::Error;

use crate::normalizer::NormalizeError;
use crate::storage::traits::StoreError;

/// Errors returned by [`super::StorageProvider`] operations and delivered
/// to `sync` / `query` callbacks.
///
/// Store errors are carried unmodified.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Invalid provider configuration: {0}")]
    Construction(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Normalize(#[from] NormalizeError),
}

impl Error {
    /// Short label for metrics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Construction(_) => "construction",
            Self::Store(_) => "store",
            Self::Normalize(_) => "normalize",
        }
    }
}
