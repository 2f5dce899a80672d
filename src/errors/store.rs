// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Errors raised by the solution store and its object-store driver.

use thiserror::Error;

/// Store failures. `Unavailable` is the only transient variant; callers
/// may retry it. The rest surface as-is.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No solution with the given id. Also what a reader observes when a
    /// concurrent cleanup deleted the id between list and load.
    #[error("solution '{id}' not found")]
    NotFound { id: String },

    /// A save targeted an id that already exists without requesting
    /// overwrite.
    #[error("solution '{id}' already exists (save with overwrite to replace)")]
    Conflict { id: String },

    /// The backing object store failed; possibly transient.
    #[error("object store unavailable: {reason}")]
    Unavailable { reason: String },

    /// A blob or side-file failed to serialise or deserialise.
    #[error("serialization failure for '{id}': {reason}")]
    Serialization { id: String, reason: String },
}
