// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Object-store drivers: an in-memory map for tests and embedded use, and
//! a filesystem driver mapping keys to paths under a root directory.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

use crate::errors::StoreError;
use crate::traits::ObjectStore;

/// In-memory object store. Thread-safe, hermetic, and ordered: `list`
/// returns keys lexicographically like the filesystem driver does.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        _meta: BTreeMap<String, String>,
    ) -> Result<(), StoreError> {
        self.objects.write().await.insert(key.to_string(), bytes);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        self.objects
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound { id: key.to_string() })
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .objects
            .read()
            .await
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.objects.write().await.remove(key).is_some())
    }
}

/// Filesystem object store rooted at a directory. Keys map to relative
/// paths; traversal segments are rejected outright.
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        if key.split('/').any(|segment| segment == ".." || segment.is_empty()) {
            return Err(StoreError::Unavailable {
                reason: format!("invalid object key '{key}'"),
            });
        }
        Ok(self.root.join(key))
    }

    fn collect_keys(
        dir: &Path,
        root: &Path,
        keys: &mut Vec<String>,
    ) -> std::io::Result<()> {
        if !dir.exists() {
            return Ok(());
        }
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_dir() {
                Self::collect_keys(&path, root, keys)?;
            } else if let Ok(relative) = path.strip_prefix(root) {
                keys.push(relative.to_string_lossy().replace('\\', "/"));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        _meta: BTreeMap<String, String>,
    ) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                StoreError::Unavailable { reason: e.to_string() }
            })?;
        }
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| StoreError::Unavailable { reason: e.to_string() })
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound { id: key.to_string() })
            }
            Err(e) => Err(StoreError::Unavailable { reason: e.to_string() }),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let mut keys = Vec::new();
        Self::collect_keys(&self.root, &self.root, &mut keys)
            .map_err(|e| StoreError::Unavailable { reason: e.to_string() })?;
        keys.retain(|k| k.starts_with(prefix));
        keys.sort();
        Ok(keys)
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::Unavailable { reason: e.to_string() }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn exercise_store(store: &dyn ObjectStore) {
        store
            .put("solutions/s1", b"one".to_vec(), BTreeMap::new())
            .await
            .unwrap();
        store
            .put("solutions/metadata/s1", b"meta".to_vec(), BTreeMap::new())
            .await
            .unwrap();

        assert_eq!(store.get("solutions/s1").await.unwrap(), b"one");
        assert!(matches!(
            store.get("solutions/s2").await,
            Err(StoreError::NotFound { .. })
        ));

        let all = store.list("solutions/").await.unwrap();
        assert_eq!(all, vec!["solutions/metadata/s1", "solutions/s1"]);
        let meta_only = store.list("solutions/metadata/").await.unwrap();
        assert_eq!(meta_only, vec!["solutions/metadata/s1"]);

        assert!(store.delete("solutions/s1").await.unwrap());
        assert!(!store.delete("solutions/s1").await.unwrap());
    }

    #[tokio::test]
    async fn memory_store_contract() {
        exercise_store(&MemoryObjectStore::new()).await;
    }

    #[tokio::test]
    async fn fs_store_contract() {
        let dir = tempfile::tempdir().unwrap();
        exercise_store(&FsObjectStore::new(dir.path())).await;
    }

    #[tokio::test]
    async fn fs_store_rejects_traversal_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path());
        assert!(store.get("../outside").await.is_err());
    }

    #[tokio::test]
    async fn fs_store_overwrites_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path());
        store.put("k/v", b"a".to_vec(), BTreeMap::new()).await.unwrap();
        store.put("k/v", b"b".to_vec(), BTreeMap::new()).await.unwrap();
        assert_eq!(store.get("k/v").await.unwrap(), b"b");
    }
}
