// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The four matcher layers and the logic that combines their signals.
//!
//! Layers run in a fixed order (exact, heuristic, NLP, LLM) and each
//! reports per-field confidence with provenance. Exact and heuristic are
//! CPU-bound and deterministic; NLP and LLM call injected services and
//! carry timeouts. The pipeline is a plain list of matcher values; there
//! is no subclass hierarchy to navigate, and layer-specific state lives on
//! each matcher.

pub mod combine;
pub mod exact;
pub mod heuristic;
pub mod llm;
pub mod nlp;
#[cfg(test)]
pub mod stubs;

pub use combine::{combined_confidence, determine_match_type, merge_fields, MatchWeights};
pub use exact::ExactMatcher;
pub use heuristic::HeuristicMatcher;
pub use llm::LlmMatcher;
pub use nlp::NlpMatcher;
