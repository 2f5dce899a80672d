// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The supply-tree solution: the complete, validated output of a match run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::model::supply_tree::SupplyTree;

/// Whether a run matched the root manifest only or exploded its nesting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchingMode {
    SingleLevel,
    Nested,
}

/// Outcome of solution validation. A solution is always returned with its
/// validation attached; callers are expected to inspect it. Unmatched
/// components make `is_valid` false without suppressing the rest of the
/// solution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ValidationResult {
    pub is_valid: bool,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub unmatched_components: Vec<String>,
    /// Each entry is a cycle as a sequence of tree ids.
    #[serde(default)]
    pub circular_dependencies: Vec<Vec<String>>,
    #[serde(default)]
    pub missing_dependencies: Vec<String>,
}

impl ValidationResult {
    pub fn valid() -> Self {
        Self { is_valid: true, ..Default::default() }
    }
}

/// A complete match-run result.
///
/// Structural invariants, enforced by the assembler and re-checked in
/// validation:
///
/// * `all_trees` equals the union of `component_mapping` values;
/// * `root_trees` holds exactly the ids of trees with `depth == 0`;
/// * `dependency_graph` is acyclic;
/// * `production_sequence` is a topological layering of the graph whose
///   stages together contain every tree id exactly once.
///
/// Solutions are immutable after assembly except for the lifecycle fields
/// the store touches: `updated_at`, `expires_at`, `ttl_days`, `tags`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplyTreeSolution {
    pub id: String,
    /// All trees, sorted by id for reproducible output.
    pub all_trees: Vec<SupplyTree>,
    /// Ids of trees at depth 0.
    pub root_trees: Vec<String>,
    /// Component id to the ids of the trees that produce it.
    pub component_mapping: BTreeMap<String, Vec<String>>,
    /// Tree id to the ids it depends on (its children, plus any explicit
    /// cross-dependencies). Always a DAG.
    pub dependency_graph: BTreeMap<String, BTreeSet<String>>,
    /// Ordered parallel stages; each stage's trees can run concurrently.
    pub production_sequence: Vec<Vec<String>>,
    pub validation: ValidationResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_estimated_cost: Option<f64>,
    /// A duration string when any tree carried a time estimate, otherwise
    /// the stage count (e.g. `"3 stages"`).
    pub critical_path_time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    pub matching_mode: MatchingMode,
    pub is_nested: bool,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_days: Option<u32>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

impl SupplyTreeSolution {
    pub fn tree(&self, id: &str) -> Option<&SupplyTree> {
        self.all_trees.iter().find(|t| t.id == id)
    }

    pub fn tree_count(&self) -> usize {
        self.all_trees.len()
    }

    pub fn facility_count(&self) -> usize {
        self.all_trees
            .iter()
            .map(|t| t.facility_id.as_str())
            .collect::<BTreeSet<_>>()
            .len()
    }

    pub fn component_count(&self) -> usize {
        self.component_mapping.len()
    }

    /// Projection persisted as the store's metadata side-file.
    pub fn to_metadata(&self, okh_id: &str, okh_title: &str) -> SolutionMetadata {
        SolutionMetadata {
            id: self.id.clone(),
            okh_id: okh_id.to_string(),
            okh_title: okh_title.to_string(),
            matching_mode: self.matching_mode,
            score: self.score,
            facility_count: self.facility_count(),
            component_count: self.component_count(),
            tree_count: self.tree_count(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            expires_at: self.expires_at,
            ttl_days: self.ttl_days,
            tags: self.tags.clone(),
        }
    }
}

/// The listing projection of a solution. The store keeps one of these per
/// solution as a side-file and answers every list and staleness query from
/// it alone, never touching the blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolutionMetadata {
    pub id: String,
    pub okh_id: String,
    pub okh_title: String,
    pub matching_mode: MatchingMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    pub facility_count: usize,
    pub component_count: usize,
    pub tree_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_days: Option<u32>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

impl SolutionMetadata {
    /// Whole days elapsed since creation, as seen from `now`.
    pub fn age_days(&self, now: DateTime<Utc>) -> i64 {
        (now - self.created_at).num_days()
    }
}
