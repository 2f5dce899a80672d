// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The LLM layer: prompted reasoning over ambiguous or missing data.
//!
//! The most expensive layer and the last to run; disabled by default at
//! the coordinator. The prompt carries both sides of the pair and the
//! response is constrained by a small JSON schema. Confidence is whatever
//! the model reports, clamped into this layer's 0.3–0.9 band.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use crate::model::{Component, Facility};
use crate::traits::{LayerMatcher, LayerResult, LlmService, MatchContext, MatchLayer};

pub const DEFAULT_LLM_TIMEOUT: Duration = Duration::from_secs(30);

pub struct LlmMatcher {
    service: Arc<dyn LlmService>,
    confidence_threshold: f64,
    confidence_ceiling: f64,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct Assessment {
    compatible: bool,
    confidence: f64,
    #[serde(default)]
    reasoning: String,
}

impl LlmMatcher {
    pub fn new(service: Arc<dyn LlmService>) -> Self {
        Self {
            service,
            confidence_threshold: 0.3,
            confidence_ceiling: 0.9,
            timeout: DEFAULT_LLM_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn prompt(component: &Component, facility: &Facility) -> String {
        format!(
            "Assess whether the facility can manufacture the component.\n\
             Component: {}\nProcesses: {:?}\nMaterials: {:?}\nQuantity: {} {}\n\
             Facility: {}\nProcesses: {:?}\nMaterials: {:?}\nEquipment: {:?}\n\
             Answer with the requested JSON only.",
            component.name,
            component.processes,
            component.materials,
            component.quantity,
            component.unit,
            facility.name,
            facility.processes,
            facility.materials,
            facility.equipment.iter().map(|e| e.name.as_str()).collect::<Vec<_>>(),
        )
    }

    fn response_schema() -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "compatible": { "type": "boolean" },
                "confidence": { "type": "number", "minimum": 0.0, "maximum": 1.0 },
                "reasoning": { "type": "string" }
            },
            "required": ["compatible", "confidence"]
        })
    }
}

#[async_trait]
impl LayerMatcher for LlmMatcher {
    fn layer(&self) -> MatchLayer {
        MatchLayer::Llm
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

        let prompt = Self::prompt(component, facility);
        let schema = Self::response_schema();

        let response = tokio::select! {
            _ = ctx.cancellation.cancelled() => {
                return LayerResult::cancelled(self.layer());
            }
            outcome = self.service.chat(&prompt, &schema) => outcome,
        };

        let mut result = LayerResult::new(self.layer());
        match response.and_then(|value| {
            serde_json::from_value::<Assessment>(value).map_err(Into::into)
        }) {
            Ok(assessment) => {
                if assessment.compatible {
                    let confidence = assessment
                        .confidence
                        .clamp(0.0, self.confidence_ceiling);
                    result.push_field(
                        "reasoning",
                        serde_json::json!({ "reasoning": assessment.reasoning }),
                        confidence,
                        "llm_assessment",
                        "llm.chat",
                    );
                } else {
                    result.log.push(format!(
                        "llm judged incompatible: {}",
                        assessment.reasoning
                    ));
                }
            }
            Err(e) => {
                result.errors.push(format!("llm failure: {e}"));
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matchers::stubs::RuleLlm;
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

    #[tokio::test]
    async fn compatible_assessment_lands_in_band() {
        let matcher = LlmMatcher::new(Arc::new(RuleLlm::compatible(0.95)));
        let c = component("id: c1\nname: bracket");
        let f = facility("id: f1\nname: shop");
        let result = matcher.process(&c, &f, &ctx()).await;
        // Clamped to the layer ceiling.
        assert_eq!(result.fields["reasoning"].confidence, 0.9);
    }

    #[tokio::test]
    async fn incompatible_assessment_yields_no_field() {
        let matcher = LlmMatcher::new(Arc::new(RuleLlm::incompatible()));
        let c = component("id: c1\nname: bracket");
        let f = facility("id: f1\nname: shop");
        let result = matcher.process(&c, &f, &ctx()).await;
        assert!(result.is_empty());
        assert!(!result.log.is_empty());
    }

    #[tokio::test]
    async fn malformed_response_is_an_error_not_a_panic() {
        let matcher = LlmMatcher::new(Arc::new(RuleLlm::malformed()));
        let c = component("id: c1\nname: bracket");
        let f = facility("id: f1\nname: shop");
        let result = matcher.process(&c, &f, &ctx()).await;
        assert!(result.is_empty());
        assert_eq!(result.errors.len(), 1);
    }
}
