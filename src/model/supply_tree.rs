// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The supply tree: one scored assignment of a component to a facility.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::time::Duration;
use uuid::Uuid;

/// Where a tree sits in the production hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProductionStage {
    Component,
    SubAssembly,
    Final,
}

/// Which matcher layer produced the winning signal for a tree.
///
/// `Mixed` marks trees where more than one layer contributed non-trivially;
/// `Unknown` marks trees constructed outside the pipeline (deserialized
/// from a blob, or injected in tests).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    Exact,
    Heuristic,
    Nlp,
    Llm,
    Mixed,
    Unknown,
}

/// A node of a supply-tree solution.
///
/// Relations are adjacency sets keyed by id rather than pointers, so the
/// structure serialises directly and cycle detection stays an algorithm,
/// not a memory-safety question. Two invariants hold after assembly:
///
/// * `parent_tree_id` set implies this id is in the parent's
///   `child_tree_ids` (and the parent's id is in `required_by` here);
/// * `confidence` is always within `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplyTree {
    pub id: String,
    pub component_id: String,
    pub component_name: String,
    pub component_quantity: f64,
    pub component_unit: String,
    /// Component names from the root down to this component.
    pub component_path: Vec<String>,
    pub facility_id: String,
    pub facility_name: String,
    pub depth: usize,
    pub production_stage: ProductionStage,
    pub confidence: f64,
    pub match_type: MatchType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_cost: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_time: Option<Duration>,
    #[serde(default)]
    pub materials_required: BTreeSet<String>,
    #[serde(default)]
    pub capabilities_used: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_tree_id: Option<String>,
    #[serde(default)]
    pub child_tree_ids: BTreeSet<String>,
    /// Trees that must be produced before this one.
    #[serde(default)]
    pub depends_on: BTreeSet<String>,
    /// Trees that consume this one's output.
    #[serde(default)]
    pub required_by: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl SupplyTree {
    /// Fresh tree id. Uuid v4, prefixed so ids read unambiguously in logs
    /// and store listings.
    pub fn new_id() -> String {
        format!("tree-{}", Uuid::new_v4())
    }

    /// Clamp a raw confidence into the legal range.
    pub fn clamp_confidence(raw: f64) -> f64 {
        raw.clamp(0.0, 1.0)
    }
}
