// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! BOM resolution: detection, loading, parsing, and explosion.
//!
//! A manifest's bill of materials arrives in one of three shapes: an
//! external file reference, inline parts, or nothing at all (the manifest
//! itself becomes the single root component). The resolver normalises all
//! three into a component tree, follows cross-manifest references with
//! cycle and depth bounds, and explodes the tree into a flat,
//! depth-tracked list ordered leaves-first for the match pipeline.

pub mod bom;
pub mod explode;

pub use bom::{detect_bom_kind, parse_components, BillOfMaterials, BomKind};
pub use explode::{BomResolver, ComponentMatch, Explosion, ReferencePolicy};
