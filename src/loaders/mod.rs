// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Local, in-process implementations of the collaborator contracts:
//! filesystem loaders for manifests and BOM blobs, and a static facility
//! provider. Production deployments swap in object-store and registry
//! backed drivers; these cover the demo binary and embedded use.

use async_trait::async_trait;
use std::path::PathBuf;

use crate::errors::ResolveError;
use crate::model::{Facility, Requirement};
use crate::traits::{
    BlobLoader, ContentType, FacilityFilter, FacilityProvider, ManifestLoader,
};

/// Reads BOM files and referenced manifests from the local filesystem.
/// Relative paths resolve against the configured root.
pub struct FsBlobLoader {
    root: PathBuf,
}

impl FsBlobLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let candidate = PathBuf::from(path);
        if candidate.is_absolute() {
            candidate
        } else {
            self.root.join(candidate)
        }
    }
}

#[async_trait]
impl BlobLoader for FsBlobLoader {
    async fn read(&self, path: &str) -> Result<(Vec<u8>, ContentType), ResolveError> {
        let resolved = self.resolve(path);
        match tokio::fs::read(&resolved).await {
            Ok(bytes) => Ok((bytes, ContentType::from_path(path))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ResolveError::BomFileNotFound {
                    path: resolved.to_string_lossy().into_owned(),
                })
            }
            Err(e) => Err(ResolveError::LoaderFailure {
                path: resolved.to_string_lossy().into_owned(),
                reason: e.to_string(),
            }),
        }
    }
}

/// Loads OKH manifests (YAML or JSON) from the local filesystem and stamps
/// their origin so relative BOM references resolve.
pub struct FsManifestLoader {
    blobs: FsBlobLoader,
}

impl FsManifestLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { blobs: FsBlobLoader::new(root) }
    }
}

#[async_trait]
impl ManifestLoader for FsManifestLoader {
    async fn load_manifest(&self, id_or_path: &str) -> Result<Requirement, ResolveError> {
        let (bytes, content_type) = self.blobs.read(id_or_path).await?;
        let mut manifest: Requirement = match content_type {
            ContentType::Json => serde_json::from_slice(&bytes).map_err(|e| {
                ResolveError::BomParse {
                    source_path: id_or_path.to_string(),
                    reason: e.to_string(),
                }
            })?,
            _ => serde_yaml::from_slice(&bytes).map_err(|e| ResolveError::BomParse {
                source_path: id_or_path.to_string(),
                reason: e.to_string(),
            })?,
        };
        manifest.origin = Some(id_or_path.to_string());
        Ok(manifest)
    }
}

/// A fixed facility population, filtered in memory.
pub struct StaticFacilityProvider {
    facilities: Vec<Facility>,
}

impl StaticFacilityProvider {
    pub fn new(facilities: Vec<Facility>) -> Self {
        Self { facilities }
    }

    /// Load a facility file: a YAML/JSON sequence, or an object with a
    /// `facilities` key.
    pub fn from_bytes(bytes: &[u8]) -> anyhow::Result<Self> {
        #[derive(serde::Deserialize)]
        #[serde(untagged)]
        enum FacilityFile {
            Bare(Vec<Facility>),
            Wrapped { facilities: Vec<Facility> },
        }
        let parsed: FacilityFile = serde_yaml::from_slice(bytes)?;
        Ok(Self::new(match parsed {
            FacilityFile::Bare(facilities) => facilities,
            FacilityFile::Wrapped { facilities } => facilities,
        }))
    }
}

#[async_trait]
impl FacilityProvider for StaticFacilityProvider {
    async fn list_facilities(&self, filter: &FacilityFilter) -> anyhow::Result<Vec<Facility>> {
        Ok(self
            .facilities
            .iter()
            .filter(|f| filter.matches(f))
            .cloned()
            .collect())
    }
}
