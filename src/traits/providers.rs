// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Contracts for the external collaborators the engine consumes.
//!
//! The engine owns none of these: manifests and facilities come from
//! loaders, BOM files from a blob loader, and the NLP/LLM layers talk to
//! injected services. Everything here is a seam; production drivers live
//! outside this crate, deterministic test implementations inside it.

use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};

use crate::errors::ResolveError;
use crate::model::{AccessType, Facility, FacilityStatus, Requirement};

/// Loads an OKH manifest in its canonical immutable form.
#[async_trait]
pub trait ManifestLoader: Send + Sync {
    async fn load_manifest(&self, id_or_path: &str) -> Result<Requirement, ResolveError>;
}

/// Free-form facility filter. At minimum supports status and access-type
/// subsetting; anything else rides in `extra` for the provider to
/// interpret.
#[derive(Debug, Clone, Default)]
pub struct FacilityFilter {
    pub status: Option<FacilityStatus>,
    pub access_types: Option<BTreeSet<AccessType>>,
    pub extra: HashMap<String, String>,
}

impl FacilityFilter {
    pub fn matches(&self, facility: &Facility) -> bool {
        if let Some(status) = self.status {
            if facility.status != status {
                return false;
            }
        }
        if let Some(access) = &self.access_types {
            if !access.contains(&facility.access_type) {
                return false;
            }
        }
        true
    }
}

/// Supplies the facility population for a match run.
#[async_trait]
pub trait FacilityProvider: Send + Sync {
    async fn list_facilities(&self, filter: &FacilityFilter) -> anyhow::Result<Vec<Facility>>;
}

/// Content type of a loaded blob, as reported by the loader. `Unknown`
/// makes the parser sniff the bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Json,
    Yaml,
    Markdown,
    Unknown,
}

impl ContentType {
    /// Best-effort detection from a file path extension.
    pub fn from_path(path: &str) -> Self {
        let lower = path.to_lowercase();
        if lower.ends_with(".json") {
            ContentType::Json
        } else if lower.ends_with(".yaml") || lower.ends_with(".yml") {
            ContentType::Yaml
        } else if lower.ends_with(".md") || lower.ends_with(".markdown") {
            ContentType::Markdown
        } else {
            ContentType::Unknown
        }
    }
}

/// Reads BOM files and externally referenced manifests. A missing file
/// must surface as [`ResolveError::BomFileNotFound`], distinct from other
/// loader failures.
#[async_trait]
pub trait BlobLoader: Send + Sync {
    async fn read(&self, path: &str) -> Result<(Vec<u8>, ContentType), ResolveError>;
}

/// Embedding service backing the NLP layer.
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    async fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// LLM service backing the LLM layer. The schema constrains the shape of
/// the structured response.
#[async_trait]
pub trait LlmService: Send + Sync {
    async fn chat(
        &self,
        prompt: &str,
        schema: &serde_json::Value,
    ) -> anyhow::Result<serde_json::Value>;
}
