// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The match coordinator: the engine's top-level entry point.
//!
//! Given an OKH manifest and a facility set, the coordinator resolves and
//! explodes the BOM, drives the layer pipeline for every (component,
//! facility) pair through a bounded worker pool, feeds the resulting trees
//! to the assembler, and optionally persists the finished solution.
//! Single-level and nested matching sit behind one depth parameter:
//! `max_depth = 0` scores only the root manifest, anything higher unlocks
//! nesting to that depth.
//!
//! All mutable solution state is owned here and in the assembler, which
//! runs after every per-pair result has been collected; the workers only
//! ever send results over the channel inside the runner.

#[cfg(test)]
mod integration_tests;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::config::EngineConfig;
use crate::engine::{MatchRunner, ScoreAggregation, SupplyTreeAssembler};
use crate::errors::MatchError;
use crate::matchers::{ExactMatcher, HeuristicMatcher, LlmMatcher, NlpMatcher};
use crate::model::solution::{MatchingMode, SupplyTreeSolution};
use crate::model::{Facility, Requirement};
use crate::observability::messages::matching::MatchRunStarted;
use crate::observability::messages::resolver::{BomResolved, ExplosionCompleted};
use crate::observability::messages::StructuredLog;
use crate::resolver::explode::DEFAULT_NESTED_DEPTH;
use crate::resolver::{BomKind, BomResolver};
use crate::store::{SaveOptions, SolutionStore};
use crate::taxonomy::ProcessTaxonomy;
use crate::traits::{
    BlobLoader, EmbeddingService, LayerMatcher, LlmService, ManifestLoader,
    MatchContext, MatchLayer,
};

/// Options for one match run. See the crate root for the depth semantics.
#[derive(Debug, Clone)]
pub struct MatchOptions {
    /// 0 = single-level, >0 = nested to that depth.
    pub max_depth: usize,
    /// Lift `max_depth = 0` to the default nested depth when the manifest
    /// shows nesting.
    pub auto_detect_depth: bool,
    /// Drop per-facility matches below this after combination.
    pub min_confidence: f64,
    /// Early-stop target for the layer pipeline.
    pub target_confidence: f64,
    /// Enabled layers; the default excludes the LLM layer.
    pub enabled_layers: BTreeSet<MatchLayer>,
    /// Selects a domain taxonomy registered on the coordinator.
    pub domain: Option<String>,
    /// Persist the solution and return it re-keyed by the store.
    pub save_solution: bool,
    pub tags: BTreeSet<String>,
    pub ttl_days: Option<u32>,
    pub score_aggregation: ScoreAggregation,
    /// Worker cap; `min(facility_count, cpu x 2)` when absent.
    pub max_concurrency: Option<usize>,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            max_depth: 0,
            auto_detect_depth: false,
            min_confidence: 0.0,
            target_confidence: 0.85,
            enabled_layers: [MatchLayer::Exact, MatchLayer::Heuristic, MatchLayer::Nlp]
                .into_iter()
                .collect(),
            domain: None,
            save_solution: false,
            tags: BTreeSet::new(),
            ttl_days: None,
            score_aggregation: ScoreAggregation::Mean,
            max_concurrency: None,
        }
    }
}

fn default_concurrency(facility_count: usize) -> usize {
    let cpus = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4);
    facility_count.clamp(1, cpus * 2)
}

pub struct MatchCoordinator {
    resolver: BomResolver,
    runner: MatchRunner,
    taxonomy: Arc<ProcessTaxonomy>,
    domains: BTreeMap<String, Arc<ProcessTaxonomy>>,
    store: Option<Arc<SolutionStore>>,
}

impl MatchCoordinator {
    pub fn new(
        resolver: BomResolver,
        runner: MatchRunner,
        taxonomy: Arc<ProcessTaxonomy>,
    ) -> Self {
        Self { resolver, runner, taxonomy, domains: BTreeMap::new(), store: None }
    }

    /// Assemble a coordinator from configuration plus the injected
    /// collaborators. The NLP and LLM layers are only present when their
    /// services are supplied.
    pub fn from_config(
        config: &EngineConfig,
        blob_loader: Arc<dyn BlobLoader>,
        manifest_loader: Arc<dyn ManifestLoader>,
        embedding: Option<Arc<dyn EmbeddingService>>,
        llm: Option<Arc<dyn LlmService>>,
    ) -> Self {
        let mut layers: Vec<Arc<dyn LayerMatcher>> = vec![Arc::new(ExactMatcher::new())];
        let heuristic = match &config.substitutions {
            Some(table) => HeuristicMatcher::new().with_substitutions(table.clone()),
            None => HeuristicMatcher::new(),
        };
        layers.push(Arc::new(heuristic));
        if let Some(service) = embedding {
            layers.push(Arc::new(
                NlpMatcher::new(service)
                    .with_timeout(Duration::from_secs(config.layers.nlp_timeout_secs)),
            ));
        }
        if let Some(service) = llm {
            layers.push(Arc::new(
                LlmMatcher::new(service)
                    .with_timeout(Duration::from_secs(config.layers.llm_timeout_secs)),
            ));
        }

        let taxonomy = match &config.taxonomy {
            Some(entries) => Arc::new(ProcessTaxonomy::new(entries)),
            None => Arc::new(ProcessTaxonomy::with_defaults()),
        };
        let mut coordinator = Self::new(
            BomResolver::new(blob_loader, manifest_loader),
            MatchRunner::new(layers, config.weights.clone()),
            taxonomy,
        );
        for (name, domain) in &config.domains {
            coordinator = coordinator
                .with_domain(name.clone(), Arc::new(ProcessTaxonomy::new(&domain.taxonomy)));
        }
        coordinator
    }

    pub fn with_store(mut self, store: Arc<SolutionStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Register a named domain taxonomy, selectable per run through
    /// [`MatchOptions::domain`].
    pub fn with_domain(mut self, name: String, taxonomy: Arc<ProcessTaxonomy>) -> Self {
        self.domains.insert(name, taxonomy);
        self
    }

    /// Run a match without external cancellation.
    pub async fn run_match(
        &self,
        manifest: &Requirement,
        facilities: &[Facility],
        options: &MatchOptions,
    ) -> Result<SupplyTreeSolution, MatchError> {
        self.run_match_with_cancellation(
            manifest,
            facilities,
            options,
            CancellationToken::new(),
        )
        .await
    }

    /// Run a match under a caller-supplied cancellation token. A cancelled
    /// run returns [`MatchError::Cancelled`] and is never persisted.
    pub async fn run_match_with_cancellation(
        &self,
        manifest: &Requirement,
        facilities: &[Facility],
        options: &MatchOptions,
        cancellation: CancellationToken,
    ) -> Result<SupplyTreeSolution, MatchError> {
        let max_depth = self.effective_depth(manifest, options);
        let mode = if max_depth == 0 {
            MatchingMode::SingleLevel
        } else {
            MatchingMode::Nested
        };

        let bom = self.resolver.resolve(manifest).await?;
        BomResolved {
            manifest_id: &manifest.id,
            kind: match &bom.kind {
                BomKind::External { .. } => "external",
                BomKind::Embedded => "embedded",
                BomKind::Empty => "empty",
            },
            component_count: bom.root.sub_components.len(),
        }
        .log();

        let mut explosion = self.resolver.explode(&bom, max_depth).await?;
        ExplosionCompleted {
            manifest_id: &manifest.id,
            component_count: explosion.components.len(),
            max_depth,
            warning_count: explosion.warnings.len(),
        }
        .log();

        let taxonomy = self.taxonomy_for(options);
        let snapshot = taxonomy.snapshot();
        let ctx = MatchContext::with_cancellation(snapshot, cancellation.clone());
        let concurrency = options
            .max_concurrency
            .unwrap_or_else(|| default_concurrency(facilities.len()));
        MatchRunStarted {
            manifest_id: &manifest.id,
            component_count: explosion.components.len(),
            facility_count: facilities.len(),
            max_concurrency: concurrency,
        }
        .log();

        // Components arrive leaves-first from the resolver and are scored
        // in that order, as the assembler requires.
        for component_match in &mut explosion.components {
            if cancellation.is_cancelled() {
                return Err(MatchError::Cancelled);
            }
            let mut trees = self
                .runner
                .run(
                    component_match,
                    facilities,
                    &ctx,
                    options.target_confidence,
                    &options.enabled_layers,
                    concurrency,
                )
                .await;
            trees.retain(|tree| tree.confidence >= options.min_confidence);
            component_match.matched = !trees.is_empty();
            component_match.trees = trees;
        }
        if cancellation.is_cancelled() {
            return Err(MatchError::Cancelled);
        }

        let assembler = SupplyTreeAssembler::new(options.score_aggregation);
        let warnings = std::mem::take(&mut explosion.warnings);
        let mut solution =
            assembler.assemble(&explosion.components, mode, warnings)?;

        solution
            .metadata
            .insert("okh_id".to_string(), serde_json::json!(manifest.id));
        solution
            .metadata
            .insert("okh_title".to_string(), serde_json::json!(manifest.title));
        if let Some(domain) = &options.domain {
            solution.metadata.insert("domain".to_string(), serde_json::json!(domain));
        }

        if options.save_solution {
            if let Some(store) = &self.store {
                let id = store
                    .save(
                        &solution,
                        SaveOptions {
                            id: None,
                            tags: options.tags.clone(),
                            ttl_days: options.ttl_days,
                            overwrite: false,
                        },
                    )
                    .await?;
                // Return the stored form so lifecycle fields are filled.
                solution = store.load(&id).await?;
            }
        }

        Ok(solution)
    }

    fn effective_depth(&self, manifest: &Requirement, options: &MatchOptions) -> usize {
        if options.max_depth == 0
            && options.auto_detect_depth
            && manifest.has_nested_components()
        {
            DEFAULT_NESTED_DEPTH
        } else {
            options.max_depth
        }
    }

    fn taxonomy_for(&self, options: &MatchOptions) -> Arc<ProcessTaxonomy> {
        match &options.domain {
            Some(name) => match self.domains.get(name) {
                Some(taxonomy) => taxonomy.clone(),
                None => {
                    tracing::warn!(domain = name.as_str(), "unknown domain, using default taxonomy");
                    self.taxonomy.clone()
                }
            },
            None => self.taxonomy.clone(),
        }
    }
}
