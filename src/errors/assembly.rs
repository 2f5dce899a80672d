// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Errors raised while assembling supply trees into a solution.

use thiserror::Error;

/// Structural assembly failures. Unmatched components are NOT here: they
/// are recorded in the solution's validation result and the solution is
/// still returned. A cycle between supply trees, by contrast, means no
/// valid production schedule exists, so assembly fails outright.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssemblyError {
    /// The dependency graph contains a cycle. The path runs from the
    /// re-encountered node around the loop and back. Dangling dependency
    /// references are NOT fatal; they surface as `missing_dependencies`
    /// warnings on the solution instead.
    #[error("circular dependency between supply trees: {}", cycle.join(" -> "))]
    CircularDependency { cycle: Vec<String> },
}
