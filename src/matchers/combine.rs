// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Combining layer results into one per-pair confidence.
//!
//! When several layers score the same field, the higher confidence wins;
//! exact ties go to the earlier layer, so deterministic layers are
//! preferred over sampled ones. The combined confidence is a weighted sum
//! normalised to `[0, 1]`. An attribute the requirement expressed but no
//! layer scored contributes zero at a penalty weight, so absence is not
//! neutral; auxiliary evidence (equipment, semantic, reasoning) only
//! counts when a layer actually produced it.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::model::supply_tree::MatchType;
use crate::model::Component;
use crate::traits::{FieldScore, LayerResult, MatchLayer};

/// Per-attribute weights for the combined confidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchWeights {
    /// Attribute name to weight. Attributes outside this table use
    /// `default_weight` when present.
    #[serde(default = "default_field_weights")]
    pub fields: BTreeMap<String, f64>,
    /// Weight applied to a listed attribute that no layer scored.
    #[serde(default = "default_absence_penalty")]
    pub absence_penalty: f64,
    /// Weight for scored attributes missing from the table.
    #[serde(default = "default_unlisted_weight")]
    pub default_weight: f64,
}

fn default_absence_penalty() -> f64 {
    0.1
}

fn default_unlisted_weight() -> f64 {
    0.1
}

fn default_field_weights() -> BTreeMap<String, f64> {
    [
        ("process", 0.40),
        ("materials", 0.25),
        ("batch", 0.10),
        ("access", 0.05),
        ("equipment", 0.10),
        ("certifications", 0.05),
        ("semantic", 0.15),
        ("reasoning", 0.15),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

impl Default for MatchWeights {
    fn default() -> Self {
        Self {
            fields: default_field_weights(),
            absence_penalty: default_absence_penalty(),
            default_weight: default_unlisted_weight(),
        }
    }
}

/// A field's winning score plus which layer won it.
#[derive(Debug, Clone)]
pub struct MergedField {
    pub score: FieldScore,
    pub layer: MatchLayer,
}

/// Resolve per-field winners across layer results. Results must already be
/// filtered to informative fields (at or above each layer's threshold).
pub fn merge_fields(results: &[LayerResult]) -> BTreeMap<String, MergedField> {
    let mut merged: BTreeMap<String, MergedField> = BTreeMap::new();
    for result in results {
        for (name, score) in &result.fields {
            let replace = match merged.get(name) {
                None => true,
                Some(existing) => {
                    score.confidence > existing.score.confidence
                        || (score.confidence == existing.score.confidence
                            && result.layer < existing.layer)
                }
            };
            if replace {
                merged.insert(
                    name.clone(),
                    MergedField { score: score.clone(), layer: result.layer },
                );
            }
        }
    }
    merged
}

/// The attributes a component's requirements put on the table. These are
/// the attributes whose absence from the merge is penalised; everything
/// else is auxiliary evidence.
pub fn expected_attributes(component: &Component) -> BTreeSet<String> {
    let mut expected = BTreeSet::new();
    if !component.processes.is_empty() {
        expected.insert("process".to_string());
    }
    if !component.materials.is_empty() {
        expected.insert("materials".to_string());
    }
    if component.constraints.contains_key("access_type") {
        expected.insert("access".to_string());
    }
    if component.constraints.contains_key("certifications") {
        expected.insert("certifications".to_string());
    }
    expected
}

/// Weighted, normalised combination of merged field confidences.
///
/// Scored attributes contribute at their configured weight. Expected
/// attributes that no layer scored contribute zero at the penalty weight.
pub fn combined_confidence(
    merged: &BTreeMap<String, MergedField>,
    weights: &MatchWeights,
    expected: &BTreeSet<String>,
) -> f64 {
    let mut numerator = 0.0;
    let mut denominator = 0.0;

    for (field, m) in merged {
        let weight =
            weights.fields.get(field).copied().unwrap_or(weights.default_weight);
        numerator += weight * m.score.confidence;
        denominator += weight;
    }
    for field in expected {
        if !merged.contains_key(field) {
            // Absence of a required signal drags the score down.
            denominator += weights.absence_penalty;
        }
    }

    if denominator == 0.0 {
        return 0.0;
    }
    (numerator / denominator).clamp(0.0, 1.0)
}

/// The match type stamped on a tree: the dominant contributing layer, or
/// `Mixed` when more than one layer contributes non-trivially. Non-trivial
/// means at least a tenth of the total weighted contribution.
pub fn determine_match_type(
    merged: &BTreeMap<String, MergedField>,
    weights: &MatchWeights,
) -> MatchType {
    let mut per_layer: BTreeMap<MatchLayer, f64> = BTreeMap::new();
    for (field, m) in merged {
        let weight =
            weights.fields.get(field).copied().unwrap_or(weights.default_weight);
        *per_layer.entry(m.layer).or_insert(0.0) += weight * m.score.confidence;
    }

    let total: f64 = per_layer.values().sum();
    if total <= 0.0 {
        return MatchType::Unknown;
    }

    let significant: Vec<MatchLayer> = per_layer
        .iter()
        .filter(|(_, contribution)| **contribution >= total * 0.1)
        .map(|(layer, _)| *layer)
        .collect();

    match significant.as_slice() {
        [] => MatchType::Unknown,
        [only] => only.match_type(),
        _ => MatchType::Mixed,
    }
}
