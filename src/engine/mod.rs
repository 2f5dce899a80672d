// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod assembler;
pub mod dependency_graph;
pub mod runner;

pub use assembler::{format_duration, ScoreAggregation, SupplyTreeAssembler};
pub use dependency_graph::DependencyGraph;
pub use runner::MatchRunner;
