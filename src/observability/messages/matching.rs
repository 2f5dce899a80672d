// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for layer pipeline and match runner events.

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// A match run started.
///
/// # Log Level
/// `info!` - Important operational event
pub struct MatchRunStarted<'a> {
    pub manifest_id: &'a str,
    pub component_count: usize,
    pub facility_count: usize,
    pub max_concurrency: usize,
}

impl Display for MatchRunStarted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Starting match run for '{}': {} component(s) x {} facilit(ies), max_concurrency={}",
            self.manifest_id, self.component_count, self.facility_count, self.max_concurrency
        )
    }
}

impl StructuredLog for MatchRunStarted<'_> {
    fn log(&self) {
        tracing::info!(
            manifest_id = self.manifest_id,
            component_count = self.component_count,
            facility_count = self.facility_count,
            max_concurrency = self.max_concurrency,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "match_run",
            span_name = name,
            manifest_id = self.manifest_id,
            component_count = self.component_count,
            facility_count = self.facility_count,
        )
    }
}

/// A layer exceeded its wall-clock budget and contributed nothing.
///
/// # Log Level
/// `warn!` - Degraded but recoverable
pub struct LayerTimedOut<'a> {
    pub layer: &'a str,
    pub component_id: &'a str,
    pub facility_id: &'a str,
    pub timeout_secs: u64,
}

impl Display for LayerTimedOut<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Layer '{}' timed out after {}s for ({}, {})",
            self.layer, self.timeout_secs, self.component_id, self.facility_id
        )
    }
}

impl StructuredLog for LayerTimedOut<'_> {
    fn log(&self) {
        tracing::warn!(
            layer = self.layer,
            component_id = self.component_id,
            facility_id = self.facility_id,
            timeout_secs = self.timeout_secs,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!(
            "layer_timed_out",
            span_name = name,
            layer = self.layer,
            component_id = self.component_id,
            facility_id = self.facility_id,
        )
    }
}

/// No layer produced a signal for the pair; the facility is dropped.
///
/// # Log Level
/// `debug!` - Expected, high-volume event
pub struct FacilityDropped<'a> {
    pub component_id: &'a str,
    pub facility_id: &'a str,
}

impl Display for FacilityDropped<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Facility '{}' produced no signal for component '{}'",
            self.facility_id, self.component_id
        )
    }
}

impl StructuredLog for FacilityDropped<'_> {
    fn log(&self) {
        tracing::debug!(
            component_id = self.component_id,
            facility_id = self.facility_id,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "facility_dropped",
            span_name = name,
            component_id = self.component_id,
            facility_id = self.facility_id,
        )
    }
}
