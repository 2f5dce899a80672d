// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Engine configuration, loaded from a YAML file.
//!
//! Everything is optional and defaulted, so an empty file is a valid
//! configuration. A typical file:
//!
//! ```yaml
//! max_concurrency: 8
//! target_confidence: 0.85
//! weights:
//!   fields:
//!     process: 0.4
//!     materials: 0.25
//!   absence_penalty: 0.1
//! layers:
//!   nlp_timeout_secs: 5
//!   llm_timeout_secs: 30
//! substitutions:
//!   pla: [petg, abs]
//! taxonomy:
//!   - uri: urn:process:machining
//!     aliases: [cnc, cnc machining]
//! domains:
//!   textiles:
//!     taxonomy:
//!       - uri: urn:process:sewing
//!         aliases: [sewing, stitching]
//! ```

use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use crate::matchers::combine::MatchWeights;
use crate::taxonomy::TaxonomyEntry;

/// Per-layer tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct LayerOptions {
    #[serde(default = "default_nlp_timeout")]
    pub nlp_timeout_secs: u64,
    #[serde(default = "default_llm_timeout")]
    pub llm_timeout_secs: u64,
}

fn default_nlp_timeout() -> u64 {
    5
}

fn default_llm_timeout() -> u64 {
    30
}

impl Default for LayerOptions {
    fn default() -> Self {
        Self {
            nlp_timeout_secs: default_nlp_timeout(),
            llm_timeout_secs: default_llm_timeout(),
        }
    }
}

/// A domain profile: its own taxonomy table (replacing the default one
/// when the domain is selected).
#[derive(Debug, Clone, Deserialize)]
pub struct DomainConfig {
    pub taxonomy: Vec<TaxonomyEntry>,
}

/// Root configuration for the matching engine.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Worker cap per match run; `min(facility_count, cpu x 2)` when
    /// absent.
    #[serde(default)]
    pub max_concurrency: Option<usize>,
    #[serde(default = "default_target_confidence")]
    pub target_confidence: f64,
    #[serde(default)]
    pub min_confidence: f64,
    #[serde(default)]
    pub weights: MatchWeights,
    #[serde(default)]
    pub layers: LayerOptions,
    /// Material substitution whitelist for the heuristic layer; the
    /// built-in table applies when absent.
    #[serde(default)]
    pub substitutions: Option<BTreeMap<String, BTreeSet<String>>>,
    /// Replacement taxonomy table; the built-in vocabulary applies when
    /// absent.
    #[serde(default)]
    pub taxonomy: Option<Vec<TaxonomyEntry>>,
    #[serde(default)]
    pub domains: BTreeMap<String, DomainConfig>,
    #[serde(default)]
    pub default_ttl_days: Option<u32>,
}

fn default_target_confidence() -> f64 {
    0.85
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrency: None,
            target_confidence: default_target_confidence(),
            min_confidence: 0.0,
            weights: MatchWeights::default(),
            layers: LayerOptions::default(),
            substitutions: None,
            taxonomy: None,
            domains: BTreeMap::new(),
            default_ttl_days: None,
        }
    }
}

impl EngineConfig {
    /// Range checks that deserialization cannot express.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        if !(0.0..=1.0).contains(&self.target_confidence) {
            errors.push(format!(
                "target_confidence {} outside [0, 1]",
                self.target_confidence
            ));
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            errors.push(format!(
                "min_confidence {} outside [0, 1]",
                self.min_confidence
            ));
        }
        if self.weights.absence_penalty < 0.0 {
            errors.push("weights.absence_penalty must be non-negative".to_string());
        }
        for (field, weight) in &self.weights.fields {
            if *weight < 0.0 {
                errors.push(format!("weight for '{field}' must be non-negative"));
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Load and validate an engine configuration file.
pub fn load_engine_config(path: &Path) -> anyhow::Result<EngineConfig> {
    let raw = fs::read_to_string(path)?;
    let config: EngineConfig = serde_yaml::from_str(&raw)?;
    config
        .validate()
        .map_err(|errors| anyhow::anyhow!("invalid config: {}", errors.join("; ")))?;
    Ok(config)
}
