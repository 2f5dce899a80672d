// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Observability module for structured logging and tracing.
//!
//! Centralized message types for diagnostic and operational logging.
//! Message types follow a struct-based pattern with a `Display`
//! implementation plus the [`messages::StructuredLog`] trait, so the same
//! event renders human-readably and carries machine-readable fields.
//!
//! Messages are organized by subsystem:
//! * `messages::resolver` - BOM resolution and explosion events
//! * `messages::matching` - layer pipeline and runner events
//! * `messages::assembly` - solution assembly and validation events
//! * `messages::store` - solution store lifecycle events

pub mod messages;
