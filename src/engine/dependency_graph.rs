// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::time::Duration;

use crate::errors::AssemblyError;

/// A type-safe wrapper for supply-tree dependency relationships with the
/// graph algorithms the assembler needs.
///
/// The graph maps each tree id to the set of tree ids it depends on: an
/// assembly's tree depends on the trees of the components that feed it, so
/// leaves have empty dependency sets and roots carry the largest ones.
/// This dependency-set representation (T → {A, B}) is what serialises into
/// the solution blob, and it is the natural input for:
///
/// - **Production staging**: Kahn's algorithm emits parallel stages,
///   leaves first
/// - **Cycle detection**: three-colour DFS that reports the actual cycle
///   path for diagnostics
/// - **Critical-path time**: longest-path dynamic programming over the
///   stage order
///
/// Iteration order is deterministic everywhere: the backing maps are
/// B-trees and every emitted stage is ordered by id, so a solution's
/// production sequence is stable under input permutation.
///
/// # Examples
///
/// ## Staging a two-level build
/// ```
/// use openmatch::engine::DependencyGraph;
///
/// // root depends on two leaves
/// let mut graph = DependencyGraph::new();
/// graph.insert_node("leaf-a");
/// graph.insert_node("leaf-b");
/// graph.add_dependency("root", "leaf-a");
/// graph.add_dependency("root", "leaf-b");
///
/// let stages = graph.production_stages().unwrap();
/// assert_eq!(stages, vec![
///     vec!["leaf-a".to_string(), "leaf-b".to_string()],
///     vec!["root".to_string()],
/// ]);
/// ```
///
/// ## Detecting a cycle
/// ```
/// use openmatch::engine::DependencyGraph;
///
/// let mut graph = DependencyGraph::new();
/// graph.add_dependency("a", "b");
/// graph.add_dependency("b", "a");
///
/// let cycle = graph.detect_cycle().unwrap();
/// assert_eq!(cycle.first(), cycle.last());
/// assert!(graph.production_stages().is_err());
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DependencyGraph(pub BTreeMap<String, BTreeSet<String>>);

impl DependencyGraph {
    /// Create a new empty dependency graph
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Ensure a node exists, with no dependencies yet.
    pub fn insert_node(&mut self, id: impl Into<String>) {
        self.0.entry(id.into()).or_default();
    }

    /// Record that `id` depends on `dependency`. Both nodes are created if
    /// absent; duplicates deduplicate through the set.
    pub fn add_dependency(&mut self, id: impl Into<String>, dependency: impl Into<String>) {
        let dependency = dependency.into();
        self.insert_node(dependency.clone());
        self.0.entry(id.into()).or_default().insert(dependency);
    }

    /// Get the dependency set for a tree
    pub fn dependencies_of(&self, id: &str) -> Option<&BTreeSet<String>> {
        self.0.get(id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// All tree ids in the graph
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    /// Every dependency must itself be a node; returns the ids that are
    /// referenced but unknown. Always empty for graphs built through
    /// [`DependencyGraph::add_dependency`].
    pub fn dangling_references(&self) -> Vec<String> {
        self.0
            .values()
            .flatten()
            .filter(|dep| !self.0.contains_key(*dep))
            .cloned()
            .collect()
    }

    /// Build the reverse mapping: dependency -> the trees that require it.
    /// Used by Kahn's algorithm for O(1) dependent lookups.
    pub fn build_dependents(&self) -> BTreeMap<String, Vec<String>> {
        let mut dependents: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for id in self.0.keys() {
            dependents.entry(id.clone()).or_default();
        }
        for (id, dependencies) in &self.0 {
            for dependency in dependencies {
                dependents.entry(dependency.clone()).or_default().push(id.clone());
            }
        }
        dependents
    }

    /// Detect a cycle with a three-colour DFS.
    ///
    /// Returns the cycle as the id sequence from the re-encountered grey
    /// node around the loop and back to it, or `None` when the graph is a
    /// DAG. Nodes are visited in id order so the reported cycle is
    /// deterministic.
    pub fn detect_cycle(&self) -> Option<Vec<String>> {
        // 0 = white (unvisited), 1 = grey (on the current path), 2 = black
        const WHITE: u8 = 0;
        const GREY: u8 = 1;
        const BLACK: u8 = 2;

        let mut colour: HashMap<&str, u8> = HashMap::new();
        for id in self.0.keys() {
            colour.insert(id.as_str(), WHITE);
        }

        fn visit<'a>(
            graph: &'a BTreeMap<String, BTreeSet<String>>,
            node: &'a str,
            colour: &mut HashMap<&'a str, u8>,
            path: &mut Vec<&'a str>,
        ) -> Option<Vec<String>> {
            colour.insert(node, GREY);
            path.push(node);
            if let Some(dependencies) = graph.get(node) {
                for dependency in dependencies {
                    match colour.get(dependency.as_str()).copied().unwrap_or(WHITE) {
                        GREY => {
                            // Back edge: slice the path from the grey node.
                            let start = path
                                .iter()
                                .position(|n| *n == dependency.as_str())
                                .unwrap_or(0);
                            let mut cycle: Vec<String> =
                                path[start..].iter().map(|s| s.to_string()).collect();
                            cycle.push(dependency.clone());
                            return Some(cycle);
                        }
                        WHITE => {
                            if let Some(cycle) =
                                visit(graph, dependency.as_str(), colour, path)
                            {
                                return Some(cycle);
                            }
                        }
                        _ => {}
                    }
                }
            }
            path.pop();
            colour.insert(node, BLACK);
            None
        }

        let mut path = Vec::new();
        for node in self.0.keys() {
            if colour.get(node.as_str()).copied().unwrap_or(WHITE) == WHITE {
                if let Some(cycle) = visit(&self.0, node.as_str(), &mut colour, &mut path) {
                    return Some(cycle);
                }
            }
        }
        None
    }

    /// Compute the parallel production stages with Kahn's algorithm.
    ///
    /// Stage 0 holds every tree with no dependencies; each later stage
    /// holds the trees whose dependencies all sit in earlier stages. Trees
    /// within a stage are ordered by id. If the stages do not account for
    /// every tree a cycle remains, and the error carries its path.
    pub fn production_stages(&self) -> Result<Vec<Vec<String>>, AssemblyError> {
        let dependents = self.build_dependents();
        let mut in_degree: BTreeMap<&str, usize> = self
            .0
            .iter()
            .map(|(id, dependencies)| (id.as_str(), dependencies.len()))
            .collect();

        let mut stages: Vec<Vec<String>> = Vec::new();
        let mut current: VecDeque<String> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(id, _)| id.to_string())
            .collect();
        let mut processed = 0usize;

        while !current.is_empty() {
            let mut stage: Vec<String> = current.drain(..).collect();
            stage.sort();
            processed += stage.len();

            let mut next: Vec<String> = Vec::new();
            for id in &stage {
                if let Some(requiring) = dependents.get(id) {
                    for dependent in requiring {
                        if let Some(degree) = in_degree.get_mut(dependent.as_str()) {
                            *degree -= 1;
                            if *degree == 0 {
                                next.push(dependent.clone());
                            }
                        }
                    }
                }
            }
            stages.push(stage);
            current = next.into_iter().collect();
        }

        if processed != self.0.len() {
            let cycle = self.detect_cycle().unwrap_or_default();
            return Err(AssemblyError::CircularDependency { cycle });
        }
        Ok(stages)
    }

    /// Longest path through the graph, weighted by per-tree durations.
    /// Trees without a duration weigh zero. Returns `None` when the graph
    /// has a cycle.
    pub fn critical_path(
        &self,
        durations: &BTreeMap<String, Duration>,
    ) -> Option<Duration> {
        let stages = self.production_stages().ok()?;
        let mut finish: BTreeMap<&str, Duration> = BTreeMap::new();
        for stage in &stages {
            for id in stage {
                let own = durations.get(id).copied().unwrap_or(Duration::ZERO);
                let upstream = self
                    .0
                    .get(id)
                    .map(|dependencies| {
                        dependencies
                            .iter()
                            .filter_map(|d| finish.get(d.as_str()).copied())
                            .max()
                            .unwrap_or(Duration::ZERO)
                    })
                    .unwrap_or(Duration::ZERO);
                finish.insert(id.as_str(), own + upstream);
            }
        }
        Some(finish.values().copied().max().unwrap_or(Duration::ZERO))
    }
}

impl From<BTreeMap<String, BTreeSet<String>>> for DependencyGraph {
    fn from(graph: BTreeMap<String, BTreeSet<String>>) -> Self {
        Self(graph)
    }
}

impl From<DependencyGraph> for BTreeMap<String, BTreeSet<String>> {
    fn from(graph: DependencyGraph) -> Self {
        graph.0
    }
}
