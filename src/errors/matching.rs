// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Errors for the top-level match operation.
//!
//! Per-layer failures (timeout, cancellation, provider errors) are not
//! errors at this level: they ride inside each `LayerResult` and cost the
//! pair at most that layer's contribution.

use thiserror::Error;

use crate::errors::{AssemblyError, ResolveError, StoreError};

/// Top-level error for a match run. Wraps the per-stage taxonomies so the
/// coordinator's caller sees one error type with the stage still legible.
#[derive(Debug, Error)]
pub enum MatchError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Assembly(#[from] AssemblyError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// The caller's cancellation token fired before the run finished.
    /// Cancelled runs are never persisted.
    #[error("match run cancelled")]
    Cancelled,
}
