// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for BOM resolution and explosion events.

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// A manifest's BOM was resolved into a component tree.
///
/// # Log Level
/// `info!` - Important operational event
pub struct BomResolved<'a> {
    pub manifest_id: &'a str,
    pub kind: &'a str,
    pub component_count: usize,
}

impl Display for BomResolved<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Resolved {} BOM for manifest '{}': {} top-level component(s)",
            self.kind, self.manifest_id, self.component_count
        )
    }
}

impl StructuredLog for BomResolved<'_> {
    fn log(&self) {
        tracing::info!(
            manifest_id = self.manifest_id,
            kind = self.kind,
            component_count = self.component_count,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "bom_resolved",
            span_name = name,
            manifest_id = self.manifest_id,
            kind = self.kind,
            component_count = self.component_count,
        )
    }
}

/// A BOM explosion finished.
///
/// # Log Level
/// `info!` - Important operational event
pub struct ExplosionCompleted<'a> {
    pub manifest_id: &'a str,
    pub component_count: usize,
    pub max_depth: usize,
    pub warning_count: usize,
}

impl Display for ExplosionCompleted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Exploded manifest '{}' to {} component(s) at max_depth={} ({} warning(s))",
            self.manifest_id, self.component_count, self.max_depth, self.warning_count
        )
    }
}

impl StructuredLog for ExplosionCompleted<'_> {
    fn log(&self) {
        tracing::info!(
            manifest_id = self.manifest_id,
            component_count = self.component_count,
            max_depth = self.max_depth,
            warning_count = self.warning_count,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "explosion_completed",
            span_name = name,
            manifest_id = self.manifest_id,
            component_count = self.component_count,
            max_depth = self.max_depth,
        )
    }
}
