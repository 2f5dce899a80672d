// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Deterministic service stubs for tests. No network, no randomness: the
//! embedding stub hashes tokens into a fixed-width bag-of-words vector,
//! the LLM stub replays canned verdicts.

use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use crate::traits::{EmbeddingService, LlmService};

const EMBEDDING_WIDTH: usize = 64;

/// Token-hash bag-of-words embedding. Texts sharing vocabulary get
/// correlated vectors; disjoint texts stay near-orthogonal.
pub struct KeywordEmbedding;

#[async_trait]
impl EmbeddingService for KeywordEmbedding {
    async fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| {
                let mut vector = vec![0.0f32; EMBEDDING_WIDTH];
                for token in text.to_lowercase().split(|c: char| !c.is_alphanumeric()) {
                    if token.is_empty() {
                        continue;
                    }
                    let mut hasher = DefaultHasher::new();
                    token.hash(&mut hasher);
                    vector[(hasher.finish() % EMBEDDING_WIDTH as u64) as usize] += 1.0;
                }
                vector
            })
            .collect())
    }
}

/// An embedding service that never answers inside any sane timeout.
pub struct StalledEmbedding {
    pub delay: Duration,
}

#[async_trait]
impl EmbeddingService for StalledEmbedding {
    async fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        tokio::time::sleep(self.delay).await;
        Ok(vec![vec![0.0; EMBEDDING_WIDTH]; texts.len()])
    }
}

/// Canned-verdict LLM.
pub struct RuleLlm {
    response: serde_json::Value,
}

impl RuleLlm {
    pub fn compatible(confidence: f64) -> Self {
        Self {
            response: serde_json::json!({
                "compatible": true,
                "confidence": confidence,
                "reasoning": "capabilities align"
            }),
        }
    }

    pub fn incompatible() -> Self {
        Self {
            response: serde_json::json!({
                "compatible": false,
                "confidence": 0.9,
                "reasoning": "no overlapping capability"
            }),
        }
    }

    pub fn malformed() -> Self {
        Self { response: serde_json::json!({ "unexpected": "shape" }) }
    }
}

#[async_trait]
impl LlmService for RuleLlm {
    async fn chat(
        &self,
        _prompt: &str,
        _schema: &serde_json::Value,
    ) -> anyhow::Result<serde_json::Value> {
        Ok(self.response.clone())
    }
}
