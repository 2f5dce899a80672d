// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The match runner: drives the layer pipeline for (component, facility)
//! pairs.
//!
//! For each facility the enabled layers run in pipeline order. The pair
//! short-circuits as soon as the accumulated combined confidence reaches
//! the target, or the current layer's ceiling is hit. A facility that
//! produces no informative field from any layer is dropped: no tree is
//! emitted for it. Per-layer timeouts yield an empty result with a
//! `timeout` error and later layers still run.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};

use crate::matchers::combine::{
    combined_confidence, determine_match_type, expected_attributes, merge_fields,
    MatchWeights,
};
use crate::model::supply_tree::ProductionStage;
use crate::model::{Component, Facility, SupplyTree};
use crate::observability::messages::matching::{FacilityDropped, LayerTimedOut};
use crate::observability::messages::StructuredLog;
use crate::resolver::ComponentMatch;
use crate::traits::{LayerMatcher, LayerResult, MatchContext, MatchLayer};

#[derive(Clone)]
pub struct MatchRunner {
    layers: Vec<Arc<dyn LayerMatcher>>,
    weights: Arc<MatchWeights>,
}

impl MatchRunner {
    /// Compose a pipeline. Layers are kept in pipeline order regardless of
    /// the order they were supplied in.
    pub fn new(mut layers: Vec<Arc<dyn LayerMatcher>>, weights: MatchWeights) -> Self {
        layers.sort_by_key(|m| m.layer());
        Self { layers, weights: Arc::new(weights) }
    }

    pub fn weights(&self) -> &MatchWeights {
        &self.weights
    }

    /// Score one component against every facility, one bounded worker per
    /// facility, and return the trees for the facilities that matched.
    /// Output order follows facility input order; the assembler re-sorts
    /// by tree id anyway.
    pub async fn run(
        &self,
        component_match: &ComponentMatch,
        facilities: &[Facility],
        ctx: &MatchContext,
        target_confidence: f64,
        enabled: &BTreeSet<MatchLayer>,
        max_concurrency: usize,
    ) -> Vec<SupplyTree> {
        let semaphore = Arc::new(Semaphore::new(max_concurrency.max(1)));
        let (tx, mut rx) = mpsc::channel::<(usize, Option<SupplyTree>)>(
            facilities.len().max(1),
        );

        for (index, facility) in facilities.iter().enumerate() {
            let runner = self.clone();
            let component_match = component_match.clone();
            let facility = facility.clone();
            let ctx = ctx.clone();
            let enabled = enabled.clone();
            let semaphore = semaphore.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                let _permit = match semaphore.acquire().await {
                    Ok(permit) => permit,
                    Err(_) => return,
                };
                let tree = runner
                    .run_pair(&component_match, &facility, &ctx, target_confidence, &enabled)
                    .await;
                let _ = tx.send((index, tree)).await;
            });
        }
        drop(tx);

        let mut slots: Vec<Option<SupplyTree>> = vec![None; facilities.len()];
        while let Some((index, tree)) = rx.recv().await {
            slots[index] = tree;
        }
        slots.into_iter().flatten().collect()
    }

    /// Run the enabled layers for one pair and fold the results into at
    /// most one supply tree.
    pub async fn run_pair(
        &self,
        component_match: &ComponentMatch,
        facility: &Facility,
        ctx: &MatchContext,
        target_confidence: f64,
        enabled: &BTreeSet<MatchLayer>,
    ) -> Option<SupplyTree> {
        let component = &component_match.component;
        let expected = expected_attributes(component);
        let mut results: Vec<LayerResult> = Vec::new();

        for matcher in &self.layers {
            if !enabled.contains(&matcher.layer()) {
                continue;
            }
            if ctx.is_cancelled() {
                results.push(LayerResult::cancelled(matcher.layer()));
                break;
            }

            let mut result = match matcher.timeout() {
                Some(budget) => {
                    match tokio::time::timeout(
                        budget,
                        matcher.process(component, facility, ctx),
                    )
                    .await
                    {
                        Ok(result) => result,
                        Err(_) => {
                            LayerTimedOut {
                                layer: matcher.layer().name(),
                                component_id: &component.id,
                                facility_id: &facility.id,
                                timeout_secs: budget.as_secs(),
                            }
                            .log();
                            LayerResult::timed_out(matcher.layer())
                        }
                    }
                }
                None => matcher.process(component, facility, ctx).await,
            };

            // Fields below the layer's threshold are uninformative.
            let threshold = matcher.confidence_threshold();
            result.fields.retain(|_, field| field.confidence >= threshold);
            results.push(result);

            // Short-circuit on the accumulated confidence: either the
            // caller's target, or this layer's ceiling. A target (or
            // ceiling) of exactly 1.0 never short-circuits, so callers can
            // force every enabled layer to attempt.
            let merged = merge_fields(&results);
            let accumulated = combined_confidence(&merged, &self.weights, &expected);
            let target_reached =
                target_confidence < 1.0 && accumulated >= target_confidence;
            let ceiling = matcher.confidence_ceiling();
            let ceiling_reached = ceiling < 1.0 && accumulated >= ceiling;
            if target_reached || ceiling_reached {
                break;
            }
        }

        let merged = merge_fields(&results);
        if merged.is_empty() {
            FacilityDropped { component_id: &component.id, facility_id: &facility.id }
                .log();
            return None;
        }

        let confidence = combined_confidence(&merged, &self.weights, &expected);
        let match_type = determine_match_type(&merged, &self.weights);

        let mut metadata = std::collections::HashMap::new();
        metadata.insert(
            "layer_fields".to_string(),
            serde_json::json!(merged
                .iter()
                .map(|(name, m)| {
                    (
                        name.clone(),
                        serde_json::json!({
                            "confidence": m.score.confidence,
                            "method": m.score.method,
                            "layer": m.layer.name(),
                            "raw_source": m.score.raw_source,
                        }),
                    )
                })
                .collect::<serde_json::Map<String, serde_json::Value>>()),
        );

        Some(SupplyTree {
            id: SupplyTree::new_id(),
            component_id: component.id.clone(),
            component_name: component.name.clone(),
            component_quantity: component.quantity,
            component_unit: component.unit.clone(),
            component_path: component_match.path.clone(),
            facility_id: facility.id.clone(),
            facility_name: facility.name.clone(),
            depth: component_match.depth,
            production_stage: if component_match.depth == 0 {
                ProductionStage::Final
            } else {
                ProductionStage::Component
            },
            confidence: SupplyTree::clamp_confidence(confidence),
            match_type,
            estimated_cost: estimate_cost(component, facility),
            estimated_time: estimate_time(component, facility),
            materials_required: component.materials.clone(),
            capabilities_used: component.processes.clone(),
            parent_tree_id: None,
            child_tree_ids: BTreeSet::new(),
            depends_on: BTreeSet::new(),
            required_by: BTreeSet::new(),
            created_at: chrono::Utc::now(),
            metadata,
        })
    }
}

/// Well-known estimate keys: the component's constraints take precedence,
/// the facility's metadata fills in behind them.
fn estimate_cost(component: &Component, facility: &Facility) -> Option<f64> {
    component
        .constraints
        .get("estimated_cost")
        .or_else(|| facility.metadata.get("estimated_cost"))
        .and_then(serde_json::Value::as_f64)
        .filter(|cost| *cost >= 0.0)
}

fn estimate_time(component: &Component, facility: &Facility) -> Option<Duration> {
    component
        .constraints
        .get("estimated_time_hours")
        .or_else(|| facility.metadata.get("estimated_time_hours"))
        .and_then(serde_json::Value::as_f64)
        .filter(|hours| *hours >= 0.0)
        .map(|hours| Duration::from_secs_f64(hours * 3600.0))
}
