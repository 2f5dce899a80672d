// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Solution persistence: content-addressed blobs with metadata side-files.
//!
//! Layout is two logical keys per solution: `solutions/{id}` for the blob
//! and `solutions/metadata/{id}` for the listing projection. The side-file
//! is the sole source of truth for listing and staleness, so list
//! operations touch metadata only. Writes are ordered blob-then-metadata:
//! a crashed save leaves an orphan blob for `cleanup_stale` to sweep,
//! never a metadata pointer at nothing.

pub mod object_store;
pub mod solution_store;

pub use object_store::{FsObjectStore, MemoryObjectStore};
pub use solution_store::{
    ArchiveReport, CleanupReport, FreshnessInfo, ListQuery, SaveOptions,
    SolutionStore, SortKey, DEFAULT_TTL_DAYS,
};
