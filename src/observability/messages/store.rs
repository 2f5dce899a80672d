// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for solution store lifecycle events.

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// A solution and its metadata side-file were written.
///
/// # Log Level
/// `info!` - Important operational event
pub struct SolutionSaved<'a> {
    pub solution_id: &'a str,
    pub blob_bytes: usize,
    pub ttl_days: u32,
}

impl Display for SolutionSaved<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Saved solution '{}' ({} bytes, ttl={}d)",
            self.solution_id, self.blob_bytes, self.ttl_days
        )
    }
}

impl StructuredLog for SolutionSaved<'_> {
    fn log(&self) {
        tracing::info!(
            solution_id = self.solution_id,
            blob_bytes = self.blob_bytes,
            ttl_days = self.ttl_days,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "solution_saved",
            span_name = name,
            solution_id = self.solution_id,
            blob_bytes = self.blob_bytes,
        )
    }
}

/// A solution was deleted (blob and side-file).
///
/// # Log Level
/// `info!` - Important operational event
pub struct SolutionDeleted<'a> {
    pub solution_id: &'a str,
}

impl Display for SolutionDeleted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Deleted solution '{}'", self.solution_id)
    }
}

impl StructuredLog for SolutionDeleted<'_> {
    fn log(&self) {
        tracing::info!(solution_id = self.solution_id, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "solution_deleted",
            span_name = name,
            solution_id = self.solution_id,
        )
    }
}

/// A cleanup pass finished.
///
/// # Log Level
/// `info!` - Important operational event
pub struct CleanupCompleted {
    pub deleted_count: usize,
    pub freed_bytes: u64,
    pub dry_run: bool,
}

impl Display for CleanupCompleted {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Cleanup {}: {} solution(s), {} bytes",
            if self.dry_run { "dry-run" } else { "completed" },
            self.deleted_count,
            self.freed_bytes
        )
    }
}

impl StructuredLog for CleanupCompleted {
    fn log(&self) {
        tracing::info!(
            deleted_count = self.deleted_count,
            freed_bytes = self.freed_bytes,
            dry_run = self.dry_run,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "cleanup_completed",
            span_name = name,
            deleted_count = self.deleted_count,
            dry_run = self.dry_run,
        )
    }
}
