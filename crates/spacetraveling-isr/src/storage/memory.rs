//! In-memory storage backend

use crate::cache::CachedRender;
use crate::config::MemoryConfig;
use crate::storage::Storage;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory storage backend
///
/// Stores renders in a HashMap behind a lock, at most `max_entries` of them.
/// Fast but non-persistent - renders are lost on restart.
pub struct MemoryStorage<T> {
    renders: Arc<RwLock<HashMap<String, CachedRender<T>>>>,
    max_entries: usize,
}

impl<T> MemoryStorage<T> {
    /// Create a new memory storage backend with the default cap
    pub fn new() -> Self {
        Self::with_config(MemoryConfig::default())
    }

    pub fn with_config(config: MemoryConfig) -> Self {
        Self {
            renders: Arc::new(RwLock::new(HashMap::new())),
            max_entries: config.max_entries.max(1),
        }
    }

    /// Number of stored renders
    pub async fn size(&self) -> usize {
        self.renders.read().await.len()
    }
}

impl<T> Clone for MemoryStorage<T> {
    fn clone(&self) -> Self {
        Self {
            renders: Arc::clone(&self.renders),
            max_entries: self.max_entries,
        }
    }
}

impl<T> Default for MemoryStorage<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T> Storage<T> for MemoryStorage<T>
where
    T: Clone + Send + Sync + 'static,
{
    async fn get(&self, path: &str) -> Result<Option<CachedRender<T>>> {
        let renders = self.renders.read().await;
        Ok(renders.get(path).cloned())
    }

    async fn set(&self, path: &str, render: CachedRender<T>) -> Result<()> {
        let mut renders = self.renders.write().await;

        if !renders.contains_key(path) && renders.len() >= self.max_entries {
            // Not-found markers go first, then the oldest render.
            let victim = renders
                .iter()
                .min_by_key(|(_, cached)| (!cached.is_not_found(), cached.record.generated_at))
                .map(|(key, _)| key.clone());
            if let Some(victim) = victim {
                tracing::debug!("Evicting {} from memory storage", victim);
                renders.remove(&victim);
            }
        }

        renders.insert(path.to_string(), render);
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let mut renders = self.renders.write().await;
        renders.remove(path);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let mut renders = self.renders.write().await;
        renders.clear();
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let renders = self.renders.read().await;
        Ok(renders.keys().cloned().collect())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{Generated, GenerationRecord, PageMetadata};
    use chrono::Utc;
    use std::time::Duration;

    fn render(path: &str, body: &str) -> CachedRender<String> {
        CachedRender::new(
            GenerationRecord::new(path, Utc::now(), Duration::from_secs(300)),
            Generated::Content(body.to_string()),
            PageMetadata::default(),
        )
    }

    #[tokio::test]
    async fn test_memory_storage_basic() {
        let storage = MemoryStorage::new();

        storage.set("/", render("/", "listing")).await.unwrap();

        let retrieved = storage.get("/").await.unwrap().unwrap();
        assert_eq!(retrieved.output, Generated::Content("listing".to_string()));
        assert!(storage.get("/post/missing").await.unwrap().is_none());

        storage.delete("/").await.unwrap();
        assert!(storage.get("/").await.unwrap().is_none());
        assert_eq!(storage.name(), "memory");
    }

    #[tokio::test]
    async fn test_set_replaces_whole_render() {
        let storage = MemoryStorage::new();

        storage.set("/", render("/", "v1")).await.unwrap();
        let mut newer = render("/", "v2");
        newer.metadata.regenerations = 2;
        storage.set("/", newer.clone()).await.unwrap();

        let retrieved = storage.get("/").await.unwrap().unwrap();
        assert_eq!(retrieved.output, newer.output);
        assert_eq!(retrieved.metadata.regenerations, 2);
        assert_eq!(storage.size().await, 1);
    }

    #[tokio::test]
    async fn test_cap_evicts_not_found_markers_before_content() {
        let storage = MemoryStorage::with_config(MemoryConfig { max_entries: 2 });

        storage.set("/", render("/", "listing")).await.unwrap();
        let mut marker = render("/post/gone", "");
        marker.output = Generated::NotFound;
        storage.set("/post/gone", marker).await.unwrap();
        storage.set("/post/a", render("/post/a", "a")).await.unwrap();

        assert_eq!(storage.size().await, 2);
        assert!(storage.get("/post/gone").await.unwrap().is_none());
        assert!(storage.get("/").await.unwrap().is_some());

        // Replacing an existing path never evicts.
        storage.set("/", render("/", "listing v2")).await.unwrap();
        assert!(storage.get("/post/a").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_memory_storage_clear_and_keys() {
        let storage = MemoryStorage::new();

        storage.set("/", render("/", "listing")).await.unwrap();
        storage.set("/post/a", render("/post/a", "a")).await.unwrap();

        let keys = storage.keys().await.unwrap();
        assert_eq!(keys.len(), 2);
        assert!(keys.contains(&"/post/a".to_string()));

        storage.clear().await.unwrap();
        assert_eq!(storage.size().await, 0);
    }
}
