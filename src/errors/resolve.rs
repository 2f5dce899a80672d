// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Errors raised while resolving and exploding bills of materials.

use thiserror::Error;

/// Errors from BOM detection, loading, parsing, and explosion.
///
/// All variants are fatal to the run except `ComponentReference`, whose
/// handling is a caller policy (fail, or continue with the component
/// treated as a leaf plus a warning).
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The BOM file or inline content could not be parsed.
    #[error("failed to parse BOM from '{source_path}': {reason}")]
    BomParse { source_path: String, reason: String },

    /// An external BOM reference pointed at a missing file.
    #[error("BOM file not found: '{path}'")]
    BomFileNotFound { path: String },

    /// A component's manifest reference could not be resolved.
    #[error("component '{component_id}' references '{reference}': {reason}")]
    ComponentReference {
        component_id: String,
        reference: String,
        reason: String,
    },

    /// Explosion would exceed the caller-chosen depth bound. The resolve
    /// fails rather than silently truncating; callers choose the depth.
    #[error("component nesting at depth {depth} exceeds max_depth {max_depth}")]
    MaxDepthExceeded { depth: usize, max_depth: usize },

    /// A component reaches itself, directly or through references.
    #[error("circular component reference: {}", cycle.join(" -> "))]
    CircularReference { cycle: Vec<String> },

    /// The injected loader failed for a reason other than a missing file.
    #[error("loader failed for '{path}': {reason}")]
    LoaderFailure { path: String, reason: String },
}
