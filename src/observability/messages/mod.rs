// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Centralized message types for structured logging and tracing.
//!
//! Each message type implements:
//!
//! * `Display` - human-readable output
//! * [`StructuredLog`] - machine-readable fields + span creation
//!
//! # Usage
//!
//! ```rust
//! use openmatch::observability::messages::{StructuredLog, matching::FacilityDropped};
//!
//! // Emits the human-readable message AND structured fields.
//! FacilityDropped { component_id: "c1", facility_id: "f9" }.log();
//! ```

pub mod assembly;
pub mod matching;
pub mod resolver;
pub mod store;

use tracing::Span;

/// Trait for messages that support structured logging and tracing.
///
/// `log()` emits the event at the level matching the message's semantic
/// meaning, with fields attached for querying and metrics. `span()`
/// creates a tracing span carrying the same fields as attributes.
pub trait StructuredLog {
    /// Emit a log event with structured fields.
    fn log(&self);

    /// Create a span with this message's fields as attributes.
    fn span(&self, name: &str) -> Span;
}
