// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! End-to-end tests through the coordinator: resolve, match, assemble,
//! persist.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::coordinator::{MatchCoordinator, MatchOptions};
use crate::engine::MatchRunner;
use crate::errors::{MatchError, ResolveError, StoreError};
use crate::matchers::combine::MatchWeights;
use crate::matchers::{ExactMatcher, HeuristicMatcher};
use crate::model::solution::MatchingMode;
use crate::model::{Facility, Requirement};
use crate::resolver::BomResolver;
use crate::store::{ListQuery, MemoryObjectStore, SolutionStore};
use crate::taxonomy::{ProcessTaxonomy, TaxonomyEntry};
use crate::traits::{
    BlobLoader, ContentType, LayerMatcher, ManifestLoader, MatchLayer,
};

struct MapLoaders {
    blobs: HashMap<String, (Vec<u8>, ContentType)>,
    manifests: HashMap<String, Requirement>,
}

impl MapLoaders {
    fn empty() -> Self {
        Self { blobs: HashMap::new(), manifests: HashMap::new() }
    }
}

#[async_trait::async_trait]
impl BlobLoader for MapLoaders {
    async fn read(&self, path: &str) -> Result<(Vec<u8>, ContentType), ResolveError> {
        self.blobs
            .get(path)
            .cloned()
            .ok_or_else(|| ResolveError::BomFileNotFound { path: path.to_string() })
    }
}

#[async_trait::async_trait]
impl ManifestLoader for MapLoaders {
    async fn load_manifest(&self, id_or_path: &str) -> Result<Requirement, ResolveError> {
        self.manifests.get(id_or_path).cloned().ok_or_else(|| {
            ResolveError::LoaderFailure {
                path: id_or_path.to_string(),
                reason: "unknown manifest".to_string(),
            }
        })
    }
}

fn coordinator_with(loaders: MapLoaders) -> MatchCoordinator {
    let shared = Arc::new(loaders);
    let layers: Vec<Arc<dyn LayerMatcher>> =
        vec![Arc::new(ExactMatcher::new()), Arc::new(HeuristicMatcher::new())];
    MatchCoordinator::new(
        BomResolver::new(shared.clone(), shared),
        MatchRunner::new(layers, MatchWeights::default()),
        Arc::new(ProcessTaxonomy::with_defaults()),
    )
}

fn coordinator() -> MatchCoordinator {
    coordinator_with(MapLoaders::empty())
}

fn manifest(yaml: &str) -> Requirement {
    serde_yaml::from_str(yaml).unwrap()
}

fn facility(yaml: &str) -> Facility {
    serde_yaml::from_str(yaml).unwrap()
}

fn exact_only() -> MatchOptions {
    MatchOptions {
        enabled_layers: [MatchLayer::Exact].into_iter().collect(),
        ..MatchOptions::default()
    }
}

fn nested_manifest() -> Requirement {
    manifest(
        r#"
id: gearbox
title: Gearbox
processes: [assembly]
parts:
  - id: housing
    name: Housing
    processes: [milling]
  - id: shaft
    name: Shaft
    processes: [turning]
"#,
    )
}

fn three_facilities() -> Vec<Facility> {
    vec![
        facility("id: f-a\nname: mill shop\nprocesses: [milling]"),
        facility("id: f-b\nname: lathe shop\nprocesses: [turning]"),
        facility("id: f-r\nname: integrator\nprocesses: [assembly]"),
    ]
}

// Scenario: one leaf manifest, one facility offering the process under an
// alias, exact layer only, single-level.
#[tokio::test]
async fn single_leaf_single_facility_exact_match() {
    let m = manifest("id: m1\ntitle: Bracket\nprocesses: [\"3d printing\"]");
    let facilities =
        vec![facility("id: f1\nname: print farm\nprocesses: [\"fused deposition modeling\"]")];

    let solution =
        coordinator().run_match(&m, &facilities, &exact_only()).await.unwrap();

    assert_eq!(solution.matching_mode, MatchingMode::SingleLevel);
    assert_eq!(solution.all_trees.len(), 1);
    assert!(solution.all_trees[0].confidence >= 0.8);
    assert!(solution.validation.is_valid);
    assert_eq!(solution.production_sequence.len(), 1);
    assert!(solution.dependency_graph.values().all(BTreeSet::is_empty));
}

// Scenario: two-level manifest across three facilities; leaves schedule
// before the root and the root's tree depends on both leaf trees.
#[tokio::test]
async fn nested_two_level_multi_facility() {
    let options = MatchOptions { max_depth: 2, ..exact_only() };
    let solution = coordinator()
        .run_match(&nested_manifest(), &three_facilities(), &options)
        .await
        .unwrap();

    assert_eq!(solution.matching_mode, MatchingMode::Nested);
    assert!(solution.is_nested);
    assert!(solution.all_trees.len() >= 3);

    let root_id = &solution.root_trees[0];
    let leaf_ids: Vec<&String> = solution
        .all_trees
        .iter()
        .filter(|t| t.depth == 1)
        .map(|t| &t.id)
        .collect();
    assert_eq!(leaf_ids.len(), 2);
    for leaf in &leaf_ids {
        assert!(solution.production_sequence[0].contains(leaf));
        assert!(solution.dependency_graph[root_id].contains(*leaf));
    }
    let root_stage = solution
        .production_sequence
        .iter()
        .position(|stage| stage.contains(root_id))
        .unwrap();
    assert!(root_stage > 0);
}

// Scenario: a manifest whose component references itself fails the run;
// nothing is persisted.
#[tokio::test]
async fn circular_reference_fails_without_persisting() {
    let mut loaders = MapLoaders::empty();
    let looping = manifest(
        "id: loop\ntitle: Loop\nparts:\n  - id: again\n    name: Again\n    reference: loop",
    );
    loaders.manifests.insert("loop".to_string(), looping.clone());

    let store = Arc::new(SolutionStore::new(Arc::new(MemoryObjectStore::new())));
    let coordinator = coordinator_with(loaders).with_store(store.clone());
    let options = MatchOptions {
        max_depth: 3,
        save_solution: true,
        ..exact_only()
    };
    let err = coordinator
        .run_match(&looping, &three_facilities(), &options)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        MatchError::Resolve(ResolveError::CircularReference { .. })
    ));
    assert!(store.list(&ListQuery::default()).await.unwrap().is_empty());
}

// Scenario: one leaf has no matching facility; the solution is returned
// invalid with the component listed, the rest linked as usual.
#[tokio::test]
async fn partial_match_returns_invalid_solution() {
    let m = manifest(
        r#"
id: gearbox
title: Gearbox
processes: [assembly]
parts:
  - id: housing
    name: Housing
    processes: [milling]
  - id: exotic
    name: Exotic Part
    processes: [casting]
"#,
    );
    let facilities = vec![
        facility("id: f-a\nname: mill shop\nprocesses: [milling]"),
        facility("id: f-r\nname: integrator\nprocesses: [assembly]"),
    ];
    let options = MatchOptions { max_depth: 2, ..exact_only() };
    let solution =
        coordinator().run_match(&m, &facilities, &options).await.unwrap();

    assert!(!solution.validation.is_valid);
    assert_eq!(solution.validation.unmatched_components, vec!["exotic".to_string()]);
    assert_eq!(solution.all_trees.len(), 2);
    let root_id = &solution.root_trees[0];
    assert_eq!(solution.dependency_graph[root_id].len(), 1);
}

// Scenario: persistence through the coordinator; the stored solution is
// re-keyed and listable by its manifest.
#[tokio::test]
async fn save_solution_persists_and_rekeys() {
    let store = Arc::new(SolutionStore::new(Arc::new(MemoryObjectStore::new())));
    let coordinator = coordinator().with_store(store.clone());
    let m = manifest("id: m1\ntitle: Bracket\nprocesses: [milling]");
    let facilities = vec![facility("id: f1\nname: shop\nprocesses: [milling]")];
    let options = MatchOptions {
        save_solution: true,
        tags: ["demo".to_string()].into_iter().collect(),
        ttl_days: Some(7),
        ..exact_only()
    };

    let solution =
        coordinator.run_match(&m, &facilities, &options).await.unwrap();
    assert!(solution.id.starts_with("sol-"));
    assert_eq!(solution.ttl_days, Some(7));
    assert!(solution.expires_at.is_some());
    assert!(solution.created_at <= solution.updated_at);
    assert!(solution.updated_at <= solution.expires_at.unwrap());

    let listed = store
        .list(&ListQuery { okh_id: Some("m1".into()), ..ListQuery::default() })
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, solution.id);
    assert_eq!(listed[0].okh_title, "Bracket");
    assert!(listed[0].tags.contains("demo"));

    let loaded = store.load(&solution.id).await.unwrap();
    assert_eq!(loaded.all_trees, solution.all_trees);
}

// Boundary: max_depth = 0 on a nested manifest scores only the root, one
// tree per facility that matches it.
#[tokio::test]
async fn depth_zero_on_nested_manifest_is_single_level() {
    let solution = coordinator()
        .run_match(&nested_manifest(), &three_facilities(), &exact_only())
        .await
        .unwrap();
    assert_eq!(solution.matching_mode, MatchingMode::SingleLevel);
    // Only the integrator offers the root's assembly process.
    assert_eq!(solution.all_trees.len(), 1);
    assert_eq!(solution.all_trees.len(), solution.root_trees.len());
    assert_eq!(solution.production_sequence.len(), 1);
}

// Boundary: auto-detect lifts depth 0 when the manifest nests.
#[tokio::test]
async fn auto_detect_depth_unlocks_nesting() {
    let options = MatchOptions { auto_detect_depth: true, ..exact_only() };
    let solution = coordinator()
        .run_match(&nested_manifest(), &three_facilities(), &options)
        .await
        .unwrap();
    assert_eq!(solution.matching_mode, MatchingMode::Nested);
    assert_eq!(solution.all_trees.len(), 3);
}

// Boundary: an empty facility set leaves every component unmatched but
// the assembler still succeeds.
#[tokio::test]
async fn empty_facility_set_yields_unmatched_components() {
    let options = MatchOptions { max_depth: 2, ..exact_only() };
    let solution = coordinator()
        .run_match(&nested_manifest(), &[], &options)
        .await
        .unwrap();
    assert!(!solution.validation.is_valid);
    assert_eq!(solution.validation.unmatched_components.len(), 3);
    assert!(solution.all_trees.is_empty());
    assert!(solution.production_sequence.is_empty());
}

// A pre-cancelled token aborts the run before any persistence.
#[tokio::test]
async fn cancelled_run_is_not_persisted() {
    let store = Arc::new(SolutionStore::new(Arc::new(MemoryObjectStore::new())));
    let coordinator = coordinator().with_store(store.clone());
    let m = manifest("id: m1\ntitle: Bracket\nprocesses: [milling]");
    let facilities = vec![facility("id: f1\nname: shop\nprocesses: [milling]")];
    let options = MatchOptions { save_solution: true, ..exact_only() };

    let token = CancellationToken::new();
    token.cancel();
    let err = coordinator
        .run_match_with_cancellation(&m, &facilities, &options, token)
        .await
        .unwrap_err();
    assert!(matches!(err, MatchError::Cancelled));
    assert!(store.list(&ListQuery::default()).await.unwrap().is_empty());
}

// Saving the same manifest twice content-addresses to the same id and
// surfaces a conflict.
#[tokio::test]
async fn duplicate_save_conflicts() {
    let store = Arc::new(SolutionStore::new(Arc::new(MemoryObjectStore::new())));
    let coordinator = coordinator().with_store(store.clone());
    let m = manifest("id: m1\ntitle: Bracket\nprocesses: [milling]");
    let facilities = vec![facility("id: f1\nname: shop\nprocesses: [milling]")];
    let options = MatchOptions { save_solution: true, ..exact_only() };

    coordinator.run_match(&m, &facilities, &options).await.unwrap();
    let second = coordinator.run_match(&m, &facilities, &options).await;
    // Tree ids differ run to run, so the second run usually stores a new
    // id; a conflict only occurs when contents collide exactly.
    match second {
        Ok(solution) => assert!(solution.id.starts_with("sol-")),
        Err(MatchError::Store(StoreError::Conflict { .. })) => {}
        Err(other) => panic!("unexpected error: {other}"),
    }
}

// Min confidence filters facilities after combination.
#[tokio::test]
async fn min_confidence_drops_weak_matches() {
    // Process covered, material not: the combined confidence takes the
    // absence penalty and lands below a strict threshold.
    let m = manifest("id: m1\ntitle: Frame\nprocesses: [milling]\nmaterials: [titanium]");
    let facilities =
        vec![facility("id: f1\nname: mill only\nprocesses: [milling]\nmaterials: [steel]")];

    let lenient = coordinator()
        .run_match(&m, &facilities, &exact_only())
        .await
        .unwrap();
    assert_eq!(lenient.all_trees.len(), 1);
    let partial_confidence = lenient.all_trees[0].confidence;
    assert!(partial_confidence < 1.0);

    let strict_options = MatchOptions {
        min_confidence: partial_confidence + 0.05,
        ..exact_only()
    };
    let strict = coordinator()
        .run_match(&m, &facilities, &strict_options)
        .await
        .unwrap();
    assert!(strict.all_trees.is_empty());
    assert!(!strict.validation.is_valid);
}

// A domain selects its own taxonomy.
#[tokio::test]
async fn domain_taxonomy_overrides_default() {
    let textile_taxonomy = ProcessTaxonomy::new(&[TaxonomyEntry {
        uri: "urn:process:sewing".to_string(),
        aliases: vec!["sewing".to_string(), "stitching".to_string()],
        parent: None,
    }]);
    let coordinator = coordinator()
        .with_domain("textiles".to_string(), Arc::new(textile_taxonomy));

    let m = manifest("id: m1\ntitle: Bag\nprocesses: [stitching]");
    let facilities = vec![facility("id: f1\nname: sew shop\nprocesses: [sewing]")];

    // The default taxonomy does not know 'stitching'.
    let default_run =
        coordinator.run_match(&m, &facilities, &exact_only()).await.unwrap();
    assert!(default_run.all_trees.is_empty());

    let domain_options = MatchOptions {
        domain: Some("textiles".to_string()),
        ..exact_only()
    };
    let domain_run =
        coordinator.run_match(&m, &facilities, &domain_options).await.unwrap();
    assert_eq!(domain_run.all_trees.len(), 1);
    assert_eq!(domain_run.metadata.get("domain").unwrap(), "textiles");
}

// External BOM in markdown, loaded through the blob loader.
#[tokio::test]
async fn external_markdown_bom_end_to_end() {
    let mut loaders = MapLoaders::empty();
    let table = "\
| id | name | quantity | unit | processes | materials |
|----|------|----------|------|-----------|-----------|
| panel | Panel | 2 | piece | laser cutting | acrylic |
";
    loaders
        .blobs
        .insert("bom.md".to_string(), (table.as_bytes().to_vec(), ContentType::Markdown));

    let m = manifest("id: kit\ntitle: Kit\nprocesses: [assembly]\nbom: bom.md");
    let facilities = vec![
        facility("id: f1\nname: laser shop\nprocesses: [laser cutting]\nmaterials: [acrylic]"),
        facility("id: f2\nname: integrator\nprocesses: [assembly]"),
    ];
    let options = MatchOptions { max_depth: 2, ..exact_only() };
    let solution = coordinator_with(loaders)
        .run_match(&m, &facilities, &options)
        .await
        .unwrap();

    assert!(solution.validation.is_valid);
    assert_eq!(solution.all_trees.len(), 2);
    let panel_tree = solution
        .all_trees
        .iter()
        .find(|t| t.component_id == "panel")
        .unwrap();
    assert_eq!(panel_tree.component_quantity, 2.0);
    assert_eq!(panel_tree.facility_id, "f1");
}
