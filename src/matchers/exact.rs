// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The exact layer: membership and equality checks, no side effects.
//!
//! Processes intersect through the taxonomy (a facility offering a more
//! specific process satisfies a more general requirement), materials
//! compare by token equality, batch ranges by containment, and access
//! types by compatibility. Confidence here sits in the 0.8–1.0 band.

use async_trait::async_trait;

use crate::model::{AccessType, Component, Facility};
use crate::traits::{LayerMatcher, LayerResult, MatchContext, MatchLayer};

pub struct ExactMatcher {
    confidence_threshold: f64,
    confidence_ceiling: f64,
}

impl ExactMatcher {
    pub fn new() -> Self {
        Self { confidence_threshold: 0.8, confidence_ceiling: 1.0 }
    }
}

impl Default for ExactMatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LayerMatcher for ExactMatcher {
    fn layer(&self) -> MatchLayer {
        MatchLayer::Exact
    }

    fn confidence_threshold(&self) -> f64 {
        self.confidence_threshold
    }

    fn confidence_ceiling(&self) -> f64 {
        self.confidence_ceiling
    }

    async fn process(
        &self,
        component: &Component,
        facility: &Facility,
        ctx: &MatchContext,
    ) -> LayerResult {
        if ctx.is_cancelled() {
            return LayerResult::cancelled(self.layer());
        }

        let mut result = LayerResult::new(self.layer());
        let taxonomy = &ctx.taxonomy;

        // Process set intersection through the taxonomy.
        let (required, unknown_required) = taxonomy.normalise_set(component.processes.iter());
        for name in unknown_required {
            result.log.push(format!("unknown required process '{name}'"));
        }
        if !required.is_empty() {
            let offered: Vec<_> = facility
                .advertised_processes()
                .into_iter()
                .filter_map(|raw| taxonomy.normalise(raw))
                .collect();
            let satisfied = required
                .iter()
                .filter(|req| offered.iter().any(|off| taxonomy.matches(req, off)))
                .count();
            if satisfied == required.len() {
                result.push_field(
                    "process",
                    serde_json::json!(required
                        .iter()
                        .map(|p| p.as_str().to_string())
                        .collect::<Vec<_>>()),
                    1.0,
                    "taxonomy_intersection",
                    "facility.processes",
                );
            } else if satisfied > 0 {
                // Partial coverage scales into the exact band.
                let coverage = satisfied as f64 / required.len() as f64;
                result.push_field(
                    "process",
                    serde_json::json!({ "satisfied": satisfied, "required": required.len() }),
                    0.8 * coverage,
                    "taxonomy_intersection_partial",
                    "facility.processes",
                );
            }
        }

        // Material token equality, case-insensitive.
        if !component.materials.is_empty() {
            let offered: Vec<String> =
                facility.materials.iter().map(|m| m.trim().to_lowercase()).collect();
            let matched = component
                .materials
                .iter()
                .filter(|m| offered.contains(&m.trim().to_lowercase()))
                .count();
            if matched == component.materials.len() {
                result.push_field(
                    "materials",
                    serde_json::json!(component.materials),
                    1.0,
                    "token_equality",
                    "facility.materials",
                );
            } else if matched > 0 {
                let coverage = matched as f64 / component.materials.len() as f64;
                result.push_field(
                    "materials",
                    serde_json::json!({ "matched": matched, "required": component.materials.len() }),
                    0.8 * coverage,
                    "token_equality_partial",
                    "facility.materials",
                );
            }
        }

        // Batch-range containment of the component quantity.
        if let Some(range) = &facility.batch_range {
            if range.contains(component.quantity) {
                result.push_field(
                    "batch",
                    serde_json::json!({ "quantity": component.quantity }),
                    1.0,
                    "range_containment",
                    "facility.batch_range",
                );
            }
        }

        // Access-type compatibility when the component constrains it.
        if let Some(required_access) = component
            .constraints
            .get("access_type")
            .and_then(|v| serde_json::from_value::<AccessType>(v.clone()).ok())
        {
            if facility.access_type.satisfies(required_access) {
                result.push_field(
                    "access",
                    serde_json::json!(facility.access_type),
                    1.0,
                    "access_compatibility",
                    "facility.access_type",
                );
            }
        }

        result
    }
}
