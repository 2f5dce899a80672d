// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The solution store: save, load, list, staleness, and lifecycle.
//!
//! Solutions are content-addressed when the caller supplies no id: the id
//! is derived from a SHA-256 over the canonical blob with lifecycle
//! fields cleared, so identical solutions land on identical keys. Every
//! save writes the blob first and the metadata side-file second. Listing,
//! staleness, and cleanup selection read side-files only and never load a
//! blob.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::errors::StoreError;
use crate::model::solution::{MatchingMode, SolutionMetadata, SupplyTreeSolution};
use crate::observability::messages::store::{
    CleanupCompleted, SolutionDeleted, SolutionSaved,
};
use crate::observability::messages::StructuredLog;
use crate::traits::{Clock, ObjectStore, SystemClock};

pub const DEFAULT_TTL_DAYS: u32 = 30;

const BLOB_PREFIX: &str = "solutions/";
const META_PREFIX: &str = "solutions/metadata/";

fn blob_key(id: &str) -> String {
    format!("{BLOB_PREFIX}{id}")
}

fn meta_key(id: &str) -> String {
    format!("{META_PREFIX}{id}")
}

/// Options for [`SolutionStore::save`].
#[derive(Debug, Clone, Default)]
pub struct SaveOptions {
    /// Explicit id; content-addressed when absent.
    pub id: Option<String>,
    pub tags: BTreeSet<String>,
    /// Defaults to [`DEFAULT_TTL_DAYS`].
    pub ttl_days: Option<u32>,
    /// Saving over an existing id is a conflict unless set.
    pub overwrite: bool,
}

/// Staleness verdict returned alongside loads and queries.
#[derive(Debug, Clone, PartialEq)]
pub struct FreshnessInfo {
    pub is_stale: bool,
    pub reason: Option<String>,
    pub age_days: i64,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Sort keys for listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    CreatedAt,
    UpdatedAt,
    ExpiresAt,
    Score,
    AgeDays,
}

/// Listing filter, sort, and paging. Filters compose conjunctively.
#[derive(Debug, Clone)]
pub struct ListQuery {
    pub okh_id: Option<String>,
    pub matching_mode: Option<MatchingMode>,
    pub min_age_days: Option<i64>,
    pub max_age_days: Option<i64>,
    /// Keep only stale entries.
    pub only_stale: bool,
    /// When false, stale entries are dropped.
    pub include_stale: bool,
    /// Free-form tag that must be present.
    pub tag: Option<String>,
    pub sort: SortKey,
    pub ascending: bool,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            okh_id: None,
            matching_mode: None,
            min_age_days: None,
            max_age_days: None,
            only_stale: false,
            include_stale: true,
            tag: None,
            sort: SortKey::default(),
            ascending: false,
            limit: None,
            offset: 0,
        }
    }
}

/// Result of a cleanup pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CleanupReport {
    pub deleted_count: usize,
    pub freed_bytes: u64,
    pub ids: Vec<String>,
}

/// Result of an archive pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArchiveReport {
    pub moved_count: usize,
    pub ids: Vec<String>,
}

/// Content-addressable solution persistence over an injected object-store
/// driver. The handle is created at process start and shared; all methods
/// take `&self`.
pub struct SolutionStore {
    store: Arc<dyn ObjectStore>,
    clock: Arc<dyn Clock>,
}

impl SolutionStore {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store, clock: Arc::new(SystemClock) }
    }

    /// Inject a clock; tests drive TTL behaviour on a virtual one.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Persist a solution (blob first, metadata side-file second) and
    /// return its id.
    pub async fn save(
        &self,
        solution: &SupplyTreeSolution,
        options: SaveOptions,
    ) -> Result<String, StoreError> {
        let id = match &options.id {
            Some(id) => id.clone(),
            None => content_address(solution)?,
        };

        if !options.overwrite {
            if let Ok(_existing) = self.store.get(&meta_key(&id)).await {
                return Err(StoreError::Conflict { id });
            }
        }

        let now = self.clock.now();
        let ttl_days = options.ttl_days.unwrap_or(DEFAULT_TTL_DAYS);

        let mut stored = solution.clone();
        stored.id = id.clone();
        stored.updated_at = now;
        stored.ttl_days = Some(ttl_days);
        stored.expires_at = Some(now + ChronoDuration::days(ttl_days as i64));
        stored.tags.extend(options.tags);

        let blob = serde_json::to_vec_pretty(&stored).map_err(|e| {
            StoreError::Serialization { id: id.clone(), reason: e.to_string() }
        })?;
        let blob_bytes = blob.len();
        self.store.put(&blob_key(&id), blob, BTreeMap::new()).await?;

        let metadata = stored.to_metadata(
            stored
                .metadata
                .get("okh_id")
                .and_then(|v| v.as_str())
                .unwrap_or_default(),
            stored
                .metadata
                .get("okh_title")
                .and_then(|v| v.as_str())
                .unwrap_or_default(),
        );
        let side_file = serde_json::to_vec_pretty(&metadata).map_err(|e| {
            StoreError::Serialization { id: id.clone(), reason: e.to_string() }
        })?;
        self.store.put(&meta_key(&id), side_file, BTreeMap::new()).await?;

        SolutionSaved { solution_id: &id, blob_bytes, ttl_days }.log();
        Ok(id)
    }

    pub async fn load(&self, id: &str) -> Result<SupplyTreeSolution, StoreError> {
        let blob = self.store.get(&blob_key(id)).await.map_err(|e| match e {
            StoreError::NotFound { .. } => StoreError::NotFound { id: id.to_string() },
            other => other,
        })?;
        serde_json::from_slice(&blob).map_err(|e| StoreError::Serialization {
            id: id.to_string(),
            reason: e.to_string(),
        })
    }

    /// Load a solution together with its freshness verdict. With
    /// `validate_freshness` unset the verdict is computed but carries no
    /// `max_age` tightening.
    pub async fn load_with_metadata(
        &self,
        id: &str,
        validate_freshness: Option<i64>,
    ) -> Result<(SupplyTreeSolution, FreshnessInfo), StoreError> {
        let solution = self.load(id).await?;
        let metadata = self.read_metadata(id).await?;
        let freshness = self.freshness_of(&metadata, validate_freshness, true);
        Ok((solution, freshness))
    }

    /// List solution metadata. Never loads a blob.
    pub async fn list(
        &self,
        query: &ListQuery,
    ) -> Result<Vec<SolutionMetadata>, StoreError> {
        let now = self.clock.now();
        let mut entries = Vec::new();
        for key in self.store.list(META_PREFIX).await? {
            let bytes = match self.store.get(&key).await {
                Ok(bytes) => bytes,
                // Raced with a concurrent delete; skip the id.
                Err(StoreError::NotFound { .. }) => continue,
                Err(other) => return Err(other),
            };
            let metadata: SolutionMetadata = match serde_json::from_slice(&bytes) {
                Ok(metadata) => metadata,
                Err(e) => {
                    tracing::warn!(key = key.as_str(), error = %e, "skipping unreadable side-file");
                    continue;
                }
            };
            if self.query_admits(&metadata, query, now) {
                entries.push(metadata);
            }
        }

        sort_entries(&mut entries, query.sort, query.ascending, now);
        let paged: Vec<SolutionMetadata> = entries
            .into_iter()
            .skip(query.offset)
            .take(query.limit.unwrap_or(usize::MAX))
            .collect();
        Ok(paged)
    }

    /// Delete a solution's side-file and blob. Metadata goes first so a
    /// crash can only leave an orphan blob, which cleanup sweeps.
    pub async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let had_meta = self.store.delete(&meta_key(id)).await?;
        let had_blob = self.store.delete(&blob_key(id)).await?;
        let existed = had_meta || had_blob;
        if existed {
            SolutionDeleted { solution_id: id }.log();
        }
        Ok(existed)
    }

    /// Staleness verdict for one id. Reasons, in the order checked:
    /// `check_failed` (metadata present, blob missing), `exceeded_ttl_N_days`,
    /// `expired`, `too_old_N_days`.
    pub async fn is_stale(
        &self,
        id: &str,
        max_age_days: Option<i64>,
    ) -> Result<(bool, Option<String>), StoreError> {
        let metadata = self.read_metadata(id).await?;
        let blob_present = self.store.get(&blob_key(id)).await.is_ok();
        let freshness = self.freshness_of(&metadata, max_age_days, blob_present);
        Ok((freshness.is_stale, freshness.reason))
    }

    /// Extend a solution's lifetime. Bumps `expires_at`, `updated_at`, and
    /// `ttl_days` on both the blob and the side-file. Returns false when
    /// the id does not exist.
    pub async fn extend_ttl(&self, id: &str, days: u32) -> Result<bool, StoreError> {
        let mut solution = match self.load(id).await {
            Ok(solution) => solution,
            Err(StoreError::NotFound { .. }) => return Ok(false),
            Err(other) => return Err(other),
        };
        let metadata = self.read_metadata(id).await?;

        let now = self.clock.now();
        let base = solution.expires_at.filter(|e| *e > now).unwrap_or(now);
        solution.expires_at = Some(base + ChronoDuration::days(days as i64));
        solution.ttl_days = Some(solution.ttl_days.unwrap_or(0) + days);
        solution.updated_at = now;

        let blob = serde_json::to_vec_pretty(&solution).map_err(|e| {
            StoreError::Serialization { id: id.to_string(), reason: e.to_string() }
        })?;
        self.store.put(&blob_key(id), blob, BTreeMap::new()).await?;

        let mut metadata = metadata;
        metadata.expires_at = solution.expires_at;
        metadata.ttl_days = solution.ttl_days;
        metadata.updated_at = now;
        let side_file = serde_json::to_vec_pretty(&metadata).map_err(|e| {
            StoreError::Serialization { id: id.to_string(), reason: e.to_string() }
        })?;
        self.store.put(&meta_key(id), side_file, BTreeMap::new()).await?;
        Ok(true)
    }

    /// Delete stale solutions (and orphan blobs). Idempotent: a second
    /// pass over an already-clean store deletes nothing.
    pub async fn cleanup_stale(
        &self,
        max_age_days: Option<i64>,
        before: Option<DateTime<Utc>>,
        dry_run: bool,
    ) -> Result<CleanupReport, StoreError> {
        let mut report = CleanupReport::default();

        let mut metadata_ids = BTreeSet::new();
        for key in self.store.list(META_PREFIX).await? {
            let id = key.trim_start_matches(META_PREFIX).to_string();
            metadata_ids.insert(id.clone());

            let Ok(bytes) = self.store.get(&key).await else { continue };
            let Ok(metadata) = serde_json::from_slice::<SolutionMetadata>(&bytes)
            else {
                continue;
            };

            let stale = self.freshness_of(&metadata, max_age_days, true).is_stale;
            let before_cutoff =
                before.map(|cutoff| metadata.created_at < cutoff).unwrap_or(false);
            if !(stale || before_cutoff) {
                continue;
            }

            if let Ok(blob) = self.store.get(&blob_key(&id)).await {
                report.freed_bytes += blob.len() as u64;
            }
            report.freed_bytes += bytes.len() as u64;
            report.ids.push(id.clone());
            report.deleted_count += 1;
            if !dry_run {
                self.delete(&id).await?;
            }
        }

        // Orphan blobs: a crashed save wrote the blob but never the
        // side-file.
        for key in self.store.list(BLOB_PREFIX).await? {
            if key.starts_with(META_PREFIX) {
                continue;
            }
            let id = key.trim_start_matches(BLOB_PREFIX).to_string();
            if metadata_ids.contains(&id) {
                continue;
            }
            if let Ok(blob) = self.store.get(&key).await {
                report.freed_bytes += blob.len() as u64;
            }
            report.ids.push(id);
            report.deleted_count += 1;
            if !dry_run {
                self.store.delete(&key).await?;
            }
        }

        CleanupCompleted {
            deleted_count: report.deleted_count,
            freed_bytes: report.freed_bytes,
            dry_run,
        }
        .log();
        Ok(report)
    }

    /// Move stale solutions under an archive prefix, bytes preserved.
    pub async fn archive_stale(
        &self,
        max_age_days: Option<i64>,
        archive_prefix: &str,
    ) -> Result<ArchiveReport, StoreError> {
        let prefix = archive_prefix.trim_end_matches('/');
        let mut report = ArchiveReport::default();

        for key in self.store.list(META_PREFIX).await? {
            let id = key.trim_start_matches(META_PREFIX).to_string();
            let Ok(meta_bytes) = self.store.get(&key).await else { continue };
            let Ok(metadata) = serde_json::from_slice::<SolutionMetadata>(&meta_bytes)
            else {
                continue;
            };
            if !self.freshness_of(&metadata, max_age_days, true).is_stale {
                continue;
            }

            // Copy blob-then-metadata into the archive, then drop the
            // originals.
            if let Ok(blob) = self.store.get(&blob_key(&id)).await {
                self.store
                    .put(&format!("{prefix}/{}", blob_key(&id)), blob, BTreeMap::new())
                    .await?;
            }
            self.store
                .put(&format!("{prefix}/{}", meta_key(&id)), meta_bytes, BTreeMap::new())
                .await?;
            self.delete(&id).await?;

            report.ids.push(id);
            report.moved_count += 1;
        }
        Ok(report)
    }

    async fn read_metadata(&self, id: &str) -> Result<SolutionMetadata, StoreError> {
        let bytes = self.store.get(&meta_key(id)).await.map_err(|e| match e {
            StoreError::NotFound { .. } => StoreError::NotFound { id: id.to_string() },
            other => other,
        })?;
        serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
            id: id.to_string(),
            reason: e.to_string(),
        })
    }

    fn freshness_of(
        &self,
        metadata: &SolutionMetadata,
        max_age_days: Option<i64>,
        blob_present: bool,
    ) -> FreshnessInfo {
        let now = self.clock.now();
        let age_days = metadata.age_days(now);
        let mut info = FreshnessInfo {
            is_stale: false,
            reason: None,
            age_days,
            expires_at: metadata.expires_at,
        };

        if !blob_present {
            info.is_stale = true;
            info.reason = Some("check_failed".to_string());
            return info;
        }
        if let Some(ttl) = metadata.ttl_days {
            if age_days > ttl as i64 {
                info.is_stale = true;
                info.reason = Some(format!("exceeded_ttl_{ttl}_days"));
                return info;
            }
        }
        if let Some(expires_at) = metadata.expires_at {
            if now > expires_at {
                info.is_stale = true;
                info.reason = Some("expired".to_string());
                return info;
            }
        }
        if let Some(max_age) = max_age_days {
            if age_days > max_age {
                info.is_stale = true;
                info.reason = Some(format!("too_old_{max_age}_days"));
                return info;
            }
        }
        info
    }

    fn query_admits(
        &self,
        metadata: &SolutionMetadata,
        query: &ListQuery,
        now: DateTime<Utc>,
    ) -> bool {
        if let Some(okh_id) = &query.okh_id {
            if &metadata.okh_id != okh_id {
                return false;
            }
        }
        if let Some(mode) = query.matching_mode {
            if metadata.matching_mode != mode {
                return false;
            }
        }
        let age = metadata.age_days(now);
        if query.min_age_days.map(|min| age < min).unwrap_or(false) {
            return false;
        }
        if query.max_age_days.map(|max| age > max).unwrap_or(false) {
            return false;
        }
        if let Some(tag) = &query.tag {
            if !metadata.tags.contains(tag) {
                return false;
            }
        }
        let stale = self.freshness_of(metadata, None, true).is_stale;
        if query.only_stale && !stale {
            return false;
        }
        if !query.include_stale && stale && !query.only_stale {
            return false;
        }
        true
    }
}

/// Content address: SHA-256 over the blob with id and lifecycle fields
/// cleared, truncated to 16 hex characters.
fn content_address(solution: &SupplyTreeSolution) -> Result<String, StoreError> {
    let mut canonical = solution.clone();
    canonical.id = String::new();
    canonical.updated_at = canonical.created_at;
    canonical.expires_at = None;
    canonical.ttl_days = None;
    let bytes = serde_json::to_vec(&canonical).map_err(|e| {
        StoreError::Serialization { id: solution.id.clone(), reason: e.to_string() }
    })?;
    let digest = Sha256::digest(&bytes);
    Ok(format!("sol-{}", &hex::encode(digest)[..16]))
}

fn sort_entries(
    entries: &mut [SolutionMetadata],
    sort: SortKey,
    ascending: bool,
    now: DateTime<Utc>,
) {
    entries.sort_by(|a, b| {
        let ordering = match sort {
            SortKey::CreatedAt => a.created_at.cmp(&b.created_at),
            SortKey::UpdatedAt => a.updated_at.cmp(&b.updated_at),
            SortKey::ExpiresAt => a.expires_at.cmp(&b.expires_at),
            SortKey::Score => a
                .score
                .partial_cmp(&b.score)
                .unwrap_or(std::cmp::Ordering::Equal),
            SortKey::AgeDays => a.age_days(now).cmp(&b.age_days(now)),
        };
        let ordering = ordering.then_with(|| a.id.cmp(&b.id));
        if ascending {
            ordering
        } else {
            ordering.reverse()
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::solution::ValidationResult;
    use crate::model::supply_tree::{MatchType, ProductionStage, SupplyTree};
    use crate::store::object_store::MemoryObjectStore;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Virtual clock the tests advance by hand.
    struct ManualClock {
        now: Mutex<DateTime<Utc>>,
    }

    impl ManualClock {
        fn new(start: DateTime<Utc>) -> Self {
            Self { now: Mutex::new(start) }
        }

        fn advance_days(&self, days: i64) {
            let mut now = self.now.lock().unwrap();
            *now += ChronoDuration::days(days);
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.now.lock().unwrap()
        }
    }

    fn sample_tree(id: &str) -> SupplyTree {
        SupplyTree {
            id: id.to_string(),
            component_id: "c1".into(),
            component_name: "bracket".into(),
            component_quantity: 2.0,
            component_unit: "piece".into(),
            component_path: vec!["root".into()],
            facility_id: "f1".into(),
            facility_name: "shop".into(),
            depth: 0,
            production_stage: ProductionStage::Final,
            confidence: 0.9,
            match_type: MatchType::Exact,
            estimated_cost: Some(12.0),
            estimated_time: None,
            materials_required: Default::default(),
            capabilities_used: Default::default(),
            parent_tree_id: None,
            child_tree_ids: Default::default(),
            depends_on: Default::default(),
            required_by: Default::default(),
            created_at: Utc::now(),
            metadata: HashMap::new(),
        }
    }

    fn sample_solution(created_at: DateTime<Utc>) -> SupplyTreeSolution {
        let tree = sample_tree("t-1");
        let mut metadata = HashMap::new();
        metadata.insert("okh_id".to_string(), serde_json::json!("okh-7"));
        metadata.insert("okh_title".to_string(), serde_json::json!("Bracket"));
        SupplyTreeSolution {
            id: "solution-fixture".into(),
            all_trees: vec![tree],
            root_trees: vec!["t-1".into()],
            component_mapping: [("c1".to_string(), vec!["t-1".to_string()])]
                .into_iter()
                .collect(),
            dependency_graph: [("t-1".to_string(), BTreeSet::new())]
                .into_iter()
                .collect(),
            production_sequence: vec![vec!["t-1".into()]],
            validation: ValidationResult::valid(),
            total_estimated_cost: Some(12.0),
            critical_path_time: "1 stages".into(),
            score: Some(0.9),
            matching_mode: MatchingMode::SingleLevel,
            is_nested: false,
            metadata,
            created_at,
            updated_at: created_at,
            expires_at: None,
            ttl_days: None,
            tags: BTreeSet::new(),
        }
    }

    fn store_at(start: DateTime<Utc>) -> (SolutionStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(start));
        let store = SolutionStore::new(Arc::new(MemoryObjectStore::new()))
            .with_clock(clock.clone());
        (store, clock)
    }

    fn start_time() -> DateTime<Utc> {
        "2026-01-01T00:00:00Z".parse().unwrap()
    }

    #[tokio::test]
    async fn save_load_round_trips_everything_but_updated_at() {
        let (store, _clock) = store_at(start_time());
        let solution = sample_solution(start_time());
        let id = store.save(&solution, SaveOptions::default()).await.unwrap();

        let loaded = store.load(&id).await.unwrap();
        assert_eq!(loaded.id, id);
        assert_eq!(loaded.all_trees, solution.all_trees);
        assert_eq!(loaded.component_mapping, solution.component_mapping);
        assert_eq!(loaded.dependency_graph, solution.dependency_graph);
        assert_eq!(loaded.production_sequence, solution.production_sequence);
        assert_eq!(loaded.score, solution.score);
        assert_eq!(loaded.created_at, solution.created_at);
        assert_eq!(loaded.ttl_days, Some(DEFAULT_TTL_DAYS));
        assert!(loaded.expires_at.is_some());
    }

    #[tokio::test]
    async fn content_address_is_stable() {
        let (store, _clock) = store_at(start_time());
        let solution = sample_solution(start_time());
        let id = store.save(&solution, SaveOptions::default()).await.unwrap();
        assert!(id.starts_with("sol-"));
        assert_eq!(id.len(), 4 + 16);
        // Same content, same address: the second save conflicts.
        let err = store.save(&solution, SaveOptions::default()).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { id: conflict } if conflict == id));
    }

    #[tokio::test]
    async fn explicit_id_and_overwrite() {
        let (store, _clock) = store_at(start_time());
        let solution = sample_solution(start_time());
        let options = SaveOptions {
            id: Some("my-solution".into()),
            ..SaveOptions::default()
        };
        assert_eq!(store.save(&solution, options.clone()).await.unwrap(), "my-solution");
        assert!(matches!(
            store.save(&solution, options.clone()).await,
            Err(StoreError::Conflict { .. })
        ));
        let overwrite = SaveOptions { overwrite: true, ..options };
        assert_eq!(store.save(&solution, overwrite).await.unwrap(), "my-solution");
    }

    #[tokio::test]
    async fn ttl_lifecycle_end_to_end() {
        // Scenario: save with a one-day TTL, cross it, observe staleness,
        // dry-run cleanup, real cleanup, then nothing to load.
        let (store, clock) = store_at(start_time());
        let solution = sample_solution(start_time());
        let id = store
            .save(
                &solution,
                SaveOptions { ttl_days: Some(1), ..SaveOptions::default() },
            )
            .await
            .unwrap();

        // Fresh at t+0.
        let fresh = store.list(&ListQuery::default()).await.unwrap();
        assert_eq!(fresh.len(), 1);
        let (stale, reason) = store.is_stale(&id, None).await.unwrap();
        assert!(!stale);
        assert!(reason.is_none());

        clock.advance_days(2);

        let (stale, reason) = store.is_stale(&id, None).await.unwrap();
        assert!(stale);
        assert_eq!(reason.as_deref(), Some("exceeded_ttl_1_days"));

        // Fresh-only listing drops it; stale-only listing keeps it.
        let fresh_only = store
            .list(&ListQuery { include_stale: false, ..ListQuery::default() })
            .await
            .unwrap();
        assert!(fresh_only.is_empty());
        let stale_only = store
            .list(&ListQuery { only_stale: true, ..ListQuery::default() })
            .await
            .unwrap();
        assert_eq!(stale_only.len(), 1);

        // Dry run reports without deleting.
        let dry = store.cleanup_stale(None, None, true).await.unwrap();
        assert_eq!(dry.deleted_count, 1);
        assert_eq!(dry.ids, vec![id.clone()]);
        assert!(store.load(&id).await.is_ok());

        // The real pass removes blob and side-file.
        let real = store.cleanup_stale(None, None, false).await.unwrap();
        assert_eq!(real.deleted_count, 1);
        assert!(real.freed_bytes > 0);
        assert!(matches!(
            store.load(&id).await,
            Err(StoreError::NotFound { .. })
        ));

        // Idempotence: a second pass is a no-op.
        let again = store.cleanup_stale(None, None, false).await.unwrap();
        assert_eq!(again, CleanupReport::default());
    }

    #[tokio::test]
    async fn extend_ttl_revives_a_solution() {
        let (store, clock) = store_at(start_time());
        let id = store
            .save(
                &sample_solution(start_time()),
                SaveOptions { ttl_days: Some(1), ..SaveOptions::default() },
            )
            .await
            .unwrap();

        clock.advance_days(2);
        assert!(store.is_stale(&id, None).await.unwrap().0);

        assert!(store.extend_ttl(&id, 30).await.unwrap());
        let (stale, _) = store.is_stale(&id, None).await.unwrap();
        assert!(!stale);

        let loaded = store.load(&id).await.unwrap();
        assert_eq!(loaded.ttl_days, Some(31));
        assert!(loaded.expires_at.unwrap() > clock.now());

        assert!(!store.extend_ttl("nope", 5).await.unwrap());
    }

    #[tokio::test]
    async fn max_age_overrides_ttl() {
        let (store, clock) = store_at(start_time());
        let id = store
            .save(&sample_solution(start_time()), SaveOptions::default())
            .await
            .unwrap();
        clock.advance_days(10);
        // Within the 30-day TTL but older than the caller's 7-day budget.
        let (stale, reason) = store.is_stale(&id, Some(7)).await.unwrap();
        assert!(stale);
        assert_eq!(reason.as_deref(), Some("too_old_7_days"));
    }

    #[tokio::test]
    async fn missing_blob_reports_check_failed() {
        let (store, _clock) = store_at(start_time());
        let id = store
            .save(&sample_solution(start_time()), SaveOptions::default())
            .await
            .unwrap();
        store.store.delete(&blob_key(&id)).await.unwrap();
        let (stale, reason) = store.is_stale(&id, None).await.unwrap();
        assert!(stale);
        assert_eq!(reason.as_deref(), Some("check_failed"));
    }

    #[tokio::test]
    async fn listing_filters_and_sorts() {
        let (store, clock) = store_at(start_time());
        let mut first = sample_solution(start_time());
        first.score = Some(0.4);
        let first_id = store
            .save(
                &first,
                SaveOptions {
                    id: Some("a-first".into()),
                    tags: ["prototype".to_string()].into_iter().collect(),
                    ..SaveOptions::default()
                },
            )
            .await
            .unwrap();

        clock.advance_days(3);
        let mut second = sample_solution(clock.now());
        second.score = Some(0.9);
        second.matching_mode = MatchingMode::Nested;
        second.is_nested = true;
        second
            .metadata
            .insert("okh_id".to_string(), serde_json::json!("okh-other"));
        let second_id = store
            .save(
                &second,
                SaveOptions { id: Some("b-second".into()), ..SaveOptions::default() },
            )
            .await
            .unwrap();

        // Filter by okh id.
        let by_okh = store
            .list(&ListQuery { okh_id: Some("okh-7".into()), ..ListQuery::default() })
            .await
            .unwrap();
        assert_eq!(by_okh.len(), 1);
        assert_eq!(by_okh[0].id, first_id);

        // Filter by matching mode.
        let nested = store
            .list(&ListQuery {
                matching_mode: Some(MatchingMode::Nested),
                ..ListQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(nested.len(), 1);
        assert_eq!(nested[0].id, second_id);

        // Tag filter.
        let tagged = store
            .list(&ListQuery { tag: Some("prototype".into()), ..ListQuery::default() })
            .await
            .unwrap();
        assert_eq!(tagged.len(), 1);

        // Minimum age keeps only the older entry.
        let aged = store
            .list(&ListQuery { min_age_days: Some(2), ..ListQuery::default() })
            .await
            .unwrap();
        assert_eq!(aged.len(), 1);
        assert_eq!(aged[0].id, first_id);

        // Sort by score ascending.
        let by_score = store
            .list(&ListQuery {
                sort: SortKey::Score,
                ascending: true,
                ..ListQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(by_score[0].id, first_id);
        assert_eq!(by_score[1].id, second_id);

        // Paging.
        let page = store
            .list(&ListQuery {
                sort: SortKey::Score,
                ascending: true,
                offset: 1,
                limit: Some(1),
                ..ListQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id, second_id);
    }

    #[tokio::test]
    async fn cleanup_sweeps_orphan_blobs() {
        let (store, _clock) = store_at(start_time());
        // A crashed save: blob landed, side-file never did.
        store
            .store
            .put(&blob_key("orphan-1"), b"{}".to_vec(), BTreeMap::new())
            .await
            .unwrap();
        let report = store.cleanup_stale(None, None, false).await.unwrap();
        assert_eq!(report.deleted_count, 1);
        assert_eq!(report.ids, vec!["orphan-1".to_string()]);
        assert!(store.store.get(&blob_key("orphan-1")).await.is_err());
    }

    #[tokio::test]
    async fn archive_moves_stale_solutions() {
        let (store, clock) = store_at(start_time());
        let id = store
            .save(
                &sample_solution(start_time()),
                SaveOptions { ttl_days: Some(1), ..SaveOptions::default() },
            )
            .await
            .unwrap();
        clock.advance_days(3);

        let report = store.archive_stale(None, "archive").await.unwrap();
        assert_eq!(report.moved_count, 1);
        assert_eq!(report.ids, vec![id.clone()]);

        // Originals gone, archived copies readable.
        assert!(matches!(store.load(&id).await, Err(StoreError::NotFound { .. })));
        let archived = store
            .store
            .get(&format!("archive/{}", blob_key(&id)))
            .await
            .unwrap();
        let parsed: SupplyTreeSolution = serde_json::from_slice(&archived).unwrap();
        assert_eq!(parsed.id, id);

        // A second archive pass finds nothing.
        let again = store.archive_stale(None, "archive").await.unwrap();
        assert_eq!(again.moved_count, 0);
    }

    #[tokio::test]
    async fn load_with_metadata_reports_freshness() {
        let (store, clock) = store_at(start_time());
        let id = store
            .save(
                &sample_solution(start_time()),
                SaveOptions { ttl_days: Some(1), ..SaveOptions::default() },
            )
            .await
            .unwrap();
        clock.advance_days(2);
        let (_, freshness) = store.load_with_metadata(&id, None).await.unwrap();
        assert!(freshness.is_stale);
        assert_eq!(freshness.age_days, 2);
    }
}
