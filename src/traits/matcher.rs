// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The layer matcher contract.
//!
//! Four matcher variants (exact, heuristic, NLP, LLM) implement one
//! capability: score a (component, facility) pair and report per-field
//! confidence with provenance. Layer-specific state (thresholds, ceilings,
//! substitution tables, provider handles) lives on the variant, not on the
//! pipeline that composes them.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::model::supply_tree::MatchType;
use crate::model::{Component, Facility};
use crate::taxonomy::TaxonomySnapshot;

/// The fixed pipeline order: exact, then heuristic, then NLP, then LLM.
/// On confidence ties the earlier layer wins, so deterministic layers are
/// preferred over sampled ones.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum MatchLayer {
    Exact,
    Heuristic,
    Nlp,
    Llm,
}

impl MatchLayer {
    pub fn name(&self) -> &'static str {
        match self {
            MatchLayer::Exact => "exact",
            MatchLayer::Heuristic => "heuristic",
            MatchLayer::Nlp => "nlp",
            MatchLayer::Llm => "llm",
        }
    }

    /// Pipeline order, earliest first.
    pub fn all() -> [MatchLayer; 4] {
        [MatchLayer::Exact, MatchLayer::Heuristic, MatchLayer::Nlp, MatchLayer::Llm]
    }

    pub fn match_type(&self) -> MatchType {
        match self {
            MatchLayer::Exact => MatchType::Exact,
            MatchLayer::Heuristic => MatchType::Heuristic,
            MatchLayer::Nlp => MatchType::Nlp,
            MatchLayer::Llm => MatchType::Llm,
        }
    }
}

impl std::fmt::Display for MatchLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One scored attribute with provenance: which method produced the value
/// and from which raw source field it was read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldScore {
    pub value: serde_json::Value,
    /// Always within `[0, 1]`.
    pub confidence: f64,
    pub method: String,
    pub raw_source: String,
}

/// What one layer reports for one (component, facility) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerResult {
    pub layer: MatchLayer,
    /// Attribute name to its scored value.
    pub fields: BTreeMap<String, FieldScore>,
    pub errors: Vec<String>,
    pub log: Vec<String>,
}

impl LayerResult {
    pub fn new(layer: MatchLayer) -> Self {
        Self { layer, fields: BTreeMap::new(), errors: Vec::new(), log: Vec::new() }
    }

    /// The partial result a matcher must return when its context is
    /// cancelled.
    pub fn cancelled(layer: MatchLayer) -> Self {
        Self {
            layer,
            fields: BTreeMap::new(),
            errors: vec!["cancelled".to_string()],
            log: Vec::new(),
        }
    }

    /// The empty result a timed-out layer yields; later layers still run.
    pub fn timed_out(layer: MatchLayer) -> Self {
        Self {
            layer,
            fields: BTreeMap::new(),
            errors: vec!["timeout".to_string()],
            log: Vec::new(),
        }
    }

    pub fn push_field(
        &mut self,
        name: impl Into<String>,
        value: serde_json::Value,
        confidence: f64,
        method: impl Into<String>,
        raw_source: impl Into<String>,
    ) {
        self.fields.insert(
            name.into(),
            FieldScore {
                value,
                confidence: confidence.clamp(0.0, 1.0),
                method: method.into(),
                raw_source: raw_source.into(),
            },
        );
    }

    /// Highest single-field confidence this layer produced.
    pub fn best_confidence(&self) -> f64 {
        self.fields.values().map(|f| f.confidence).fold(0.0, f64::max)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Shared, read-only context for one match run. The taxonomy snapshot is
/// pinned for the whole run so every layer decision sees the same table.
#[derive(Clone)]
pub struct MatchContext {
    pub taxonomy: Arc<TaxonomySnapshot>,
    pub cancellation: CancellationToken,
}

impl MatchContext {
    pub fn new(taxonomy: Arc<TaxonomySnapshot>) -> Self {
        Self { taxonomy, cancellation: CancellationToken::new() }
    }

    pub fn with_cancellation(
        taxonomy: Arc<TaxonomySnapshot>,
        cancellation: CancellationToken,
    ) -> Self {
        Self { taxonomy, cancellation }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

/// A single matching layer.
///
/// Implementations declare a threshold below which their fields are
/// uninformative and a ceiling above which later layers add no value for
/// this layer's domain. A matcher seeing a cancelled context returns
/// [`LayerResult::cancelled`] promptly and must never block further.
#[async_trait]
pub trait LayerMatcher: Send + Sync {
    fn layer(&self) -> MatchLayer;

    /// Fields scored below this are treated as no signal.
    fn confidence_threshold(&self) -> f64;

    /// Crossing this short-circuits the pipeline for the pair.
    fn confidence_ceiling(&self) -> f64;

    /// Per-layer wall-clock budget. `None` for CPU-bound layers.
    fn timeout(&self) -> Option<Duration> {
        None
    }

    async fn process(
        &self,
        component: &Component,
        facility: &Facility,
        ctx: &MatchContext,
    ) -> LayerResult;
}
