// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The NLP layer: semantic similarity over free-text fields.
//!
//! Component and facility descriptions are embedded through the injected
//! service and compared by cosine similarity. The only layer state is the
//! service handle and the band limits; confidence sits in 0.5–0.8 and the
//! layer carries a 5 second default timeout enforced by the runner.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::model::{Component, Facility};
use crate::traits::{
    EmbeddingService, LayerMatcher, LayerResult, MatchContext, MatchLayer,
};

pub const DEFAULT_NLP_TIMEOUT: Duration = Duration::from_secs(5);

pub struct NlpMatcher {
    service: Arc<dyn EmbeddingService>,
    confidence_threshold: f64,
    confidence_ceiling: f64,
    timeout: Duration,
}

impl NlpMatcher {
    pub fn new(service: Arc<dyn EmbeddingService>) -> Self {
        Self {
            service,
            confidence_threshold: 0.5,
            confidence_ceiling: 0.8,
            timeout: DEFAULT_NLP_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The free-text view of a component: name, processes, materials, and
    /// any textual constraints.
    fn component_text(component: &Component) -> String {
        let mut parts = vec![component.name.clone()];
        parts.extend(component.processes.iter().cloned());
        parts.extend(component.materials.iter().cloned());
        for (key, value) in &component.constraints {
            if let Some(text) = value.as_str() {
                parts.push(format!("{key}: {text}"));
            }
        }
        parts.join(". ")
    }

    /// The free-text view of a facility: description, process names, and
    /// equipment blurbs.
    fn facility_text(facility: &Facility) -> String {
        let mut parts = Vec::new();
        if let Some(description) = &facility.description {
            parts.push(description.clone());
        }
        parts.extend(facility.processes.iter().cloned());
        for equipment in &facility.equipment {
            parts.push(equipment.name.clone());
            if let Some(description) = &equipment.description {
                parts.push(description.clone());
            }
        }
        parts.join(". ")
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let dot: f64 = a.iter().zip(b).map(|(x, y)| (*x as f64) * (*y as f64)).sum();
    let norm_a: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl LayerMatcher for NlpMatcher {
    fn layer(&self) -> MatchLayer {
        MatchLayer::Nlp
    }

    fn confidence_threshold(&self) -> f64 {
        self.confidence_threshold
    }

    fn confidence_ceiling(&self) -> f64 {
        self.confidence_ceiling
    }

    fn timeout(&self) -> Option<Duration> {
        Some(self.timeout)
    }

    async fn process(
        &self,
        component: &Component,
        facility: &Facility,
        ctx: &MatchContext,
    ) -> LayerResult {
        if ctx.is_cancelled() {
            return LayerResult::cancelled(self.layer());
        }

        let facility_text = Self::facility_text(facility);
        if facility_text.trim().is_empty() {
            // Nothing to embed on the facility side; no signal.
            return LayerResult::new(self.layer());
        }
        let texts = vec![Self::component_text(component), facility_text];

        let embeddings = tokio::select! {
            _ = ctx.cancellation.cancelled() => {
                return LayerResult::cancelled(self.layer());
            }
            outcome = self.service.embed(&texts) => outcome,
        };

        let mut result = LayerResult::new(self.layer());
        match embeddings {
            Ok(vectors) if vectors.len() == 2 => {
                let similarity = cosine_similarity(&vectors[0], &vectors[1]);
                let confidence =
                    (similarity.max(0.0) * self.confidence_ceiling).clamp(0.0, 1.0);
                result.push_field(
                    "semantic",
                    serde_json::json!({ "cosine": similarity }),
                    confidence,
                    "embedding_cosine",
                    "facility.description",
                );
            }
            Ok(vectors) => {
                result
                    .errors
                    .push(format!("embedding service returned {} vectors", vectors.len()));
            }
            Err(e) => {
                result.errors.push(format!("embedding failure: {e}"));
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matchers::stubs::KeywordEmbedding;
    use crate::taxonomy::ProcessTaxonomy;

    fn ctx() -> MatchContext {
        MatchContext::new(ProcessTaxonomy::with_defaults().snapshot())
    }

    fn component(yaml: &str) -> Component {
        serde_yaml::from_str(yaml).unwrap()
    }

    fn facility(yaml: &str) -> Facility {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn cosine_of_identical_vectors_is_one() {
        let v = vec![0.3, 0.5, 0.1];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn cosine_of_orthogonal_vectors_is_zero() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
    }

    #[test]
    fn cosine_handles_mismatched_lengths() {
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
    }

    #[tokio::test]
    async fn overlapping_vocabulary_scores_in_band() {
        let matcher = NlpMatcher::new(Arc::new(KeywordEmbedding));
        let c = component("id: c1\nname: milled aluminum bracket\nprocesses: [milling]");
        let f = facility(
            "id: f1\nname: shop\ndescription: cnc milling of aluminum parts",
        );
        let result = matcher.process(&c, &f, &ctx()).await;
        let field = &result.fields["semantic"];
        assert!(field.confidence > 0.0);
        assert!(field.confidence <= 0.8);
    }

    #[tokio::test]
    async fn facility_without_text_yields_no_signal() {
        let matcher = NlpMatcher::new(Arc::new(KeywordEmbedding));
        let c = component("id: c1\nname: bracket");
        let f = facility("id: f1\nname: shop");
        let result = matcher.process(&c, &f, &ctx()).await;
        assert!(result.is_empty());
        assert!(result.errors.is_empty());
    }

    #[tokio::test]
    async fn cancelled_context_short_circuits() {
        let matcher = NlpMatcher::new(Arc::new(KeywordEmbedding));
        let c = component("id: c1\nname: bracket");
        let f = facility("id: f1\nname: shop\ndescription: general fabrication");
        let context = ctx();
        context.cancellation.cancel();
        let result = matcher.process(&c, &f, &context).await;
        assert_eq!(result.errors, vec!["cancelled".to_string()]);
    }
}
