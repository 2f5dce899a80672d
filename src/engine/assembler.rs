// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Supply-tree assembly: linking, validation, scheduling, aggregation.
//!
//! The assembler consumes the leaves-first component stream with each
//! component's candidate trees attached and produces one
//! [`SupplyTreeSolution`]: parent/child links stitched bidirectionally,
//! the dependency graph built from adjacency sets, cycles rejected, the
//! production sequence computed with Kahn's algorithm, and cost, critical
//! path, and score aggregated. It runs single-threaded after all per-pair
//! results are collected, so no locks guard the solution under assembly.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::Duration;
use uuid::Uuid;

use crate::engine::dependency_graph::DependencyGraph;
use crate::errors::AssemblyError;
use crate::model::solution::{MatchingMode, SupplyTreeSolution, ValidationResult};
use crate::model::supply_tree::{ProductionStage, SupplyTree};
use crate::observability::messages::assembly::{CycleRejected, SolutionAssembled};
use crate::observability::messages::StructuredLog;
use crate::resolver::ComponentMatch;

/// How the solution score folds per-tree confidences in nested mode.
/// Single-level mode always takes the max: the solution is one of many
/// single-facility options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScoreAggregation {
    /// Plain mean of tree confidences (default).
    #[default]
    Mean,
    /// Mean weighted by component quantity.
    Weighted,
}

pub struct SupplyTreeAssembler {
    score_aggregation: ScoreAggregation,
}

impl SupplyTreeAssembler {
    pub fn new(score_aggregation: ScoreAggregation) -> Self {
        Self { score_aggregation }
    }

    /// Assemble a solution from matched components.
    ///
    /// `components` must be leaves-first (depth descending), as the
    /// resolver emits them. `carried_warnings` are non-fatal notes from
    /// earlier stages (resolver grafting, unknown processes) folded into
    /// the validation result.
    pub fn assemble(
        &self,
        components: &[ComponentMatch],
        mode: MatchingMode,
        carried_warnings: Vec<String>,
    ) -> Result<SupplyTreeSolution, AssemblyError> {
        let mut validation = ValidationResult::valid();
        validation.warnings = carried_warnings;

        // Component id -> the ids of its trees; tree id -> tree.
        let mut trees: BTreeMap<String, SupplyTree> = BTreeMap::new();
        let mut by_component: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut parent_of_component: HashMap<String, Option<String>> = HashMap::new();

        for cm in components {
            parent_of_component
                .insert(cm.component.id.clone(), cm.parent_component_id.clone());
            if cm.trees.is_empty() {
                validation.unmatched_components.push(cm.component.id.clone());
                continue;
            }
            let entry = by_component.entry(cm.component.id.clone()).or_default();
            for tree in &cm.trees {
                entry.push(tree.id.clone());
                trees.insert(tree.id.clone(), tree.clone());
            }
        }
        if !validation.unmatched_components.is_empty() {
            validation.is_valid = false;
            validation.errors.push(format!(
                "{} component(s) have no matching facility",
                validation.unmatched_components.len()
            ));
        }

        self.link_parents(&mut trees, &by_component, &parent_of_component);

        // Interior nodes with children are sub-assemblies.
        for tree in trees.values_mut() {
            if tree.depth > 0 && !tree.child_tree_ids.is_empty() {
                tree.production_stage = ProductionStage::SubAssembly;
            }
        }

        let graph = self.build_graph(&mut trees, &mut validation);

        if let Some(cycle) = graph.detect_cycle() {
            CycleRejected { cycle: &cycle }.log();
            validation.circular_dependencies.push(cycle.clone());
            return Err(AssemblyError::CircularDependency { cycle });
        }
        let production_sequence = graph.production_stages()?;

        self.check_bidirectional_links(&trees, &mut validation);

        // Aggregates.
        let costed: Vec<f64> =
            trees.values().filter_map(|t| t.estimated_cost).collect();
        let missing_cost = trees.len() - costed.len();
        if missing_cost > 0 && !trees.is_empty() {
            validation
                .warnings
                .push(format!("cost_missing: {missing_cost} tree(s) without a cost estimate"));
        }
        let total_estimated_cost = if costed.is_empty() {
            None
        } else {
            Some(costed.iter().sum())
        };

        let durations: BTreeMap<String, Duration> = trees
            .values()
            .filter_map(|t| t.estimated_time.map(|d| (t.id.clone(), d)))
            .collect();
        let critical_path_time = if durations.is_empty() {
            format!("{} stages", production_sequence.len())
        } else {
            // The graph is already known acyclic here.
            format_duration(graph.critical_path(&durations).unwrap_or(Duration::ZERO))
        };

        let score = self.score(&trees, mode);

        let all_trees: Vec<SupplyTree> = trees.into_values().collect();
        let root_trees: Vec<String> =
            all_trees.iter().filter(|t| t.depth == 0).map(|t| t.id.clone()).collect();
        let mut component_mapping = by_component;
        for ids in component_mapping.values_mut() {
            ids.sort();
        }

        let now = chrono::Utc::now();
        let solution = SupplyTreeSolution {
            id: format!("solution-{}", Uuid::new_v4()),
            root_trees,
            component_mapping,
            dependency_graph: graph.into(),
            production_sequence,
            validation,
            total_estimated_cost,
            critical_path_time,
            score,
            matching_mode: mode,
            is_nested: mode == MatchingMode::Nested,
            metadata: HashMap::new(),
            created_at: now,
            updated_at: now,
            expires_at: None,
            ttl_days: None,
            tags: BTreeSet::new(),
            all_trees,
        };
        SolutionAssembled {
            solution_id: &solution.id,
            tree_count: solution.all_trees.len(),
            stage_count: solution.production_sequence.len(),
            is_valid: solution.validation.is_valid,
        }
        .log();
        Ok(solution)
    }

    /// Stitch parent/child links. Components arrive leaves-first, so a
    /// parent's trees are present by the time its children link upward.
    /// Each parent tree takes, per child component, the child tree on its
    /// own facility when one exists, falling back to the child tree with
    /// the lowest confidence (ties break by id).
    fn link_parents(
        &self,
        trees: &mut BTreeMap<String, SupplyTree>,
        by_component: &BTreeMap<String, Vec<String>>,
        parent_of_component: &HashMap<String, Option<String>>,
    ) {
        let mut links: Vec<(String, String)> = Vec::new(); // (parent, child)

        for (component_id, tree_ids) in by_component {
            let Some(Some(parent_component)) = parent_of_component.get(component_id)
            else {
                continue;
            };
            let Some(parent_tree_ids) = by_component.get(parent_component) else {
                continue;
            };

            for parent_id in parent_tree_ids {
                let parent_facility = trees[parent_id].facility_id.clone();
                let same_facility = tree_ids
                    .iter()
                    .find(|id| trees[*id].facility_id == parent_facility);
                let chosen = same_facility.cloned().or_else(|| {
                    tree_ids
                        .iter()
                        .min_by(|a, b| {
                            let ca = trees[*a].confidence;
                            let cb = trees[*b].confidence;
                            ca.partial_cmp(&cb)
                                .unwrap_or(std::cmp::Ordering::Equal)
                                .then_with(|| a.cmp(b))
                        })
                        .cloned()
                });
                if let Some(child_id) = chosen {
                    links.push((parent_id.clone(), child_id));
                }
            }
        }

        for (parent_id, child_id) in links {
            let parent_facility = trees[&parent_id].facility_id.clone();
            {
                let parent = trees.get_mut(&parent_id).expect("parent tree present");
                parent.child_tree_ids.insert(child_id.clone());
                parent.depends_on.insert(child_id.clone());
            }
            let child = trees.get_mut(&child_id).expect("child tree present");
            child.required_by.insert(parent_id.clone());
            // Same-facility parent is the primary; otherwise first link wins.
            if child.parent_tree_id.is_none() || child.facility_id == parent_facility {
                child.parent_tree_id = Some(parent_id);
            }
        }
    }

    /// Build the dependency graph from each tree's adjacency sets,
    /// dropping (and recording) references to unknown trees.
    fn build_graph(
        &self,
        trees: &mut BTreeMap<String, SupplyTree>,
        validation: &mut ValidationResult,
    ) -> DependencyGraph {
        let known: BTreeSet<String> = trees.keys().cloned().collect();
        let mut graph = DependencyGraph::new();
        for tree in trees.values_mut() {
            graph.insert_node(tree.id.clone());
            let (valid, dangling): (BTreeSet<String>, BTreeSet<String>) =
                std::mem::take(&mut tree.depends_on)
                    .into_iter()
                    .partition(|dep| known.contains(dep));
            for missing in dangling {
                validation.missing_dependencies.push(missing.clone());
                validation.warnings.push(format!(
                    "tree '{}' depends on unknown tree '{}'",
                    tree.id, missing
                ));
            }
            for dep in &valid {
                graph.add_dependency(tree.id.clone(), dep.clone());
            }
            tree.depends_on = valid;
        }
        graph
    }

    /// Re-verify that parent/child links are bidirectional. Violations are
    /// validation errors; they indicate injected or hand-edited trees.
    fn check_bidirectional_links(
        &self,
        trees: &BTreeMap<String, SupplyTree>,
        validation: &mut ValidationResult,
    ) {
        for tree in trees.values() {
            if let Some(parent_id) = &tree.parent_tree_id {
                match trees.get(parent_id) {
                    Some(parent) if parent.child_tree_ids.contains(&tree.id) => {}
                    Some(_) => {
                        validation.is_valid = false;
                        validation.errors.push(format!(
                            "tree '{}' has parent '{}' that does not list it as a child",
                            tree.id, parent_id
                        ));
                    }
                    None => {
                        validation.is_valid = false;
                        validation.errors.push(format!(
                            "tree '{}' has unknown parent '{}'",
                            tree.id, parent_id
                        ));
                    }
                }
            }
            for child_id in &tree.child_tree_ids {
                let consistent = trees
                    .get(child_id)
                    .map(|child| child.required_by.contains(&tree.id))
                    .unwrap_or(false);
                if !consistent {
                    validation.is_valid = false;
                    validation.errors.push(format!(
                        "tree '{}' lists child '{}' without a matching back-link",
                        tree.id, child_id
                    ));
                }
            }
        }
    }

    fn score(
        &self,
        trees: &BTreeMap<String, SupplyTree>,
        mode: MatchingMode,
    ) -> Option<f64> {
        if trees.is_empty() {
            return None;
        }
        let score = match (mode, self.score_aggregation) {
            (MatchingMode::SingleLevel, _) => trees
                .values()
                .map(|t| t.confidence)
                .fold(0.0, f64::max),
            (MatchingMode::Nested, ScoreAggregation::Mean) => {
                trees.values().map(|t| t.confidence).sum::<f64>() / trees.len() as f64
            }
            (MatchingMode::Nested, ScoreAggregation::Weighted) => {
                let weight_sum: f64 =
                    trees.values().map(|t| t.component_quantity.max(0.0)).sum();
                if weight_sum == 0.0 {
                    trees.values().map(|t| t.confidence).sum::<f64>()
                        / trees.len() as f64
                } else {
                    trees
                        .values()
                        .map(|t| t.confidence * t.component_quantity.max(0.0))
                        .sum::<f64>()
                        / weight_sum
                }
            }
        };
        Some(score.clamp(0.0, 1.0))
    }
}

impl Default for SupplyTreeAssembler {
    fn default() -> Self {
        Self::new(ScoreAggregation::default())
    }
}

/// Render a duration the way schedules read: `2h 30m`, `45m`, `30s`.
pub fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    match (hours, minutes, seconds) {
        (0, 0, s) => format!("{s}s"),
        (0, m, 0) => format!("{m}m"),
        (0, m, s) => format!("{m}m {s}s"),
        (h, 0, _) => format!("{h}h"),
        (h, m, _) => format!("{h}h {m}m"),
    }
}
