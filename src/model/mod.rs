// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Domain model for the matching engine.
//!
//! The requirement side (OKH) describes what must be produced: a manifest
//! with a bill of materials that explodes into a component tree. The
//! capability side (OKW) describes facilities advertising processes,
//! equipment, and materials. The output side is the supply tree: one scored
//! assignment of a component to a facility, assembled into a
//! [`SupplyTreeSolution`] with a dependency graph and production schedule.

pub mod facility;
pub mod requirement;
pub mod solution;
pub mod supply_tree;

pub use facility::{AccessType, BatchRange, Equipment, Facility, FacilityStatus};
pub use requirement::{BomRef, Component, Requirement};
pub use solution::{
    MatchingMode, SolutionMetadata, SupplyTreeSolution, ValidationResult,
};
pub use supply_tree::{MatchType, ProductionStage, SupplyTree};
