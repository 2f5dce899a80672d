// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for solution assembly and validation events.

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// A solution finished assembly.
///
/// # Log Level
/// `info!` - Important operational event
pub struct SolutionAssembled<'a> {
    pub solution_id: &'a str,
    pub tree_count: usize,
    pub stage_count: usize,
    pub is_valid: bool,
}

impl Display for SolutionAssembled<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Assembled solution '{}': {} tree(s) in {} stage(s), valid={}",
            self.solution_id, self.tree_count, self.stage_count, self.is_valid
        )
    }
}

impl StructuredLog for SolutionAssembled<'_> {
    fn log(&self) {
        tracing::info!(
            solution_id = self.solution_id,
            tree_count = self.tree_count,
            stage_count = self.stage_count,
            is_valid = self.is_valid,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "solution_assembled",
            span_name = name,
            solution_id = self.solution_id,
            tree_count = self.tree_count,
            stage_count = self.stage_count,
        )
    }
}

/// Assembly rejected a cyclic dependency graph.
///
/// # Log Level
/// `error!` - Fatal to the run
pub struct CycleRejected<'a> {
    pub cycle: &'a [String],
}

impl Display for CycleRejected<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Rejected cyclic supply-tree graph: {}", self.cycle.join(" -> "))
    }
}

impl StructuredLog for CycleRejected<'_> {
    fn log(&self) {
        tracing::error!(cycle_len = self.cycle.len(), "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!(
            "cycle_rejected",
            span_name = name,
            cycle_len = self.cycle.len(),
        )
    }
}
