// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod matcher;
pub mod providers;
pub mod store;

pub use matcher::{FieldScore, LayerMatcher, LayerResult, MatchContext, MatchLayer};
pub use providers::{
    BlobLoader, ContentType, EmbeddingService, FacilityFilter, FacilityProvider,
    LlmService, ManifestLoader,
};
pub use store::{Clock, ObjectStore, SystemClock};
