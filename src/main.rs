// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use anyhow::Context;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use openmatch::config::{load_engine_config, EngineConfig};
use openmatch::coordinator::{MatchCoordinator, MatchOptions};
use openmatch::loaders::{FsBlobLoader, FsManifestLoader, StaticFacilityProvider};
use openmatch::model::SupplyTreeSolution;
use openmatch::store::{FsObjectStore, SolutionStore};
use openmatch::traits::{FacilityFilter, FacilityProvider, ManifestLoader};

fn usage(program: &str) -> ! {
    eprintln!("Usage: {program} <manifest.yaml> <facilities.yaml> [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --depth <n>        match nested components down to depth n (default 0)");
    eprintln!("  --auto-depth       lift depth 0 when the manifest nests");
    eprintln!("  --config <file>    engine configuration file");
    eprintln!("  --save <dir>       persist the solution under a store directory");
    std::process::exit(1);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "openmatch=info".into()),
        )
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        usage(&args[0]);
    }
    let manifest_path = &args[1];
    let facilities_path = &args[2];

    let mut options = MatchOptions::default();
    let mut config = EngineConfig::default();
    let mut store_dir: Option<PathBuf> = None;
    let mut rest = args[3..].iter();
    while let Some(flag) = rest.next() {
        match flag.as_str() {
            "--depth" => {
                let value = rest.next().unwrap_or_else(|| usage(&args[0]));
                options.max_depth =
                    value.parse().context("--depth expects a non-negative integer")?;
            }
            "--auto-depth" => options.auto_detect_depth = true,
            "--config" => {
                let value = rest.next().unwrap_or_else(|| usage(&args[0]));
                config = load_engine_config(Path::new(value))?;
                options.target_confidence = config.target_confidence;
                options.min_confidence = config.min_confidence;
                options.max_concurrency = config.max_concurrency;
            }
            "--save" => {
                let value = rest.next().unwrap_or_else(|| usage(&args[0]));
                store_dir = Some(PathBuf::from(value));
                options.save_solution = true;
            }
            _ => usage(&args[0]),
        }
    }

    // Loaders resolve relative to the manifest's directory, so referenced
    // manifests and BOM files sit next to the manifest.
    let manifest_file = Path::new(manifest_path);
    let root = manifest_file
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();
    let manifest_name = manifest_file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| manifest_path.clone());

    let manifest_loader = Arc::new(FsManifestLoader::new(root.clone()));
    let manifest = manifest_loader
        .load_manifest(&manifest_name)
        .await
        .with_context(|| format!("loading manifest '{manifest_path}'"))?;

    let facility_bytes = tokio::fs::read(facilities_path)
        .await
        .with_context(|| format!("loading facilities '{facilities_path}'"))?;
    let provider = StaticFacilityProvider::from_bytes(&facility_bytes)?;
    let facilities = provider.list_facilities(&FacilityFilter::default()).await?;
    if facilities.is_empty() {
        anyhow::bail!("no facilities in '{facilities_path}'");
    }

    let mut coordinator = MatchCoordinator::from_config(
        &config,
        Arc::new(FsBlobLoader::new(root.clone())),
        manifest_loader,
        None,
        None,
    );
    if let Some(dir) = store_dir {
        coordinator = coordinator.with_store(Arc::new(SolutionStore::new(Arc::new(
            FsObjectStore::new(dir),
        ))));
    }

    let solution = coordinator.run_match(&manifest, &facilities, &options).await?;
    print_solution(&solution);
    Ok(())
}

fn print_solution(solution: &SupplyTreeSolution) {
    println!("Solution {}", solution.id);
    println!(
        "  mode: {:?}  trees: {}  score: {}",
        solution.matching_mode,
        solution.all_trees.len(),
        solution
            .score
            .map(|s| format!("{s:.2}"))
            .unwrap_or_else(|| "-".to_string()),
    );
    if let Some(cost) = solution.total_estimated_cost {
        println!("  estimated cost: {cost:.2}");
    }
    println!("  critical path: {}", solution.critical_path_time);

    if !solution.validation.is_valid {
        println!("  INVALID:");
        for error in &solution.validation.errors {
            println!("    error: {error}");
        }
        for unmatched in &solution.validation.unmatched_components {
            println!("    unmatched component: {unmatched}");
        }
    }
    for warning in &solution.validation.warnings {
        println!("  warning: {warning}");
    }

    println!("  production schedule:");
    for (index, stage) in solution.production_sequence.iter().enumerate() {
        println!("    stage {index}:");
        for tree_id in stage {
            if let Some(tree) = solution.tree(tree_id) {
                println!(
                    "      {} -> {} (confidence {:.2}, {:?})",
                    tree.component_name, tree.facility_name, tree.confidence, tree.match_type
                );
            }
        }
    }
}
