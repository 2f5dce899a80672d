// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Error taxonomy for the matching engine.
//!
//! Errors are tagged values returned from each step, never control flow.
//! The coordinator matches on the tag and decides fatal-vs-warning:
//! resolver errors abort the run, per-pair layer errors drop only that
//! pair, assembly keeps going through unmatched components but fails on
//! structural damage (cycles), and store errors never corrupt an existing
//! metadata side-file.

mod assembly;
mod matching;
mod resolve;
mod store;

pub use assembly::AssemblyError;
pub use matching::MatchError;
pub use resolve::ResolveError;
pub use store::StoreError;
