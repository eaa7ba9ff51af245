//! Generation manager core - serves renders and decides when to rebuild

use crate::cache::{
    CacheStats, CachedRender, Freshness, Generated, GenerationRecord, PageMetadata, PathState,
    Render,
};
use crate::clock::{Clock, SystemClock};
use crate::config::{FallbackMode, GenerationConfig, StorageBackend};
use crate::error::GenerationError;
use crate::storage::Storage;
use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use futures::stream::{self, StreamExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// Outcome of one build, shared by every request waiting on it
pub type BuildResult<T> = Result<Generated<T>, GenerationError>;

type SharedBuild<T> = Shared<BoxFuture<'static, BuildResult<T>>>;

/// Builds to run at once during [`GenerationManager::prebuild`]
const PREBUILD_CONCURRENCY: usize = 4;

/// Produces the render for a path.
///
/// Returning [`GenerationError::NotFound`] records the path as missing
/// instead of failing the build.
#[async_trait]
pub trait PageBuilder<T>: Send + Sync {
    async fn build(&self, path: &str) -> Result<T, GenerationError>;
}

/// Summary of a [`GenerationManager::prebuild`] run
#[derive(Debug, Default)]
pub struct PrebuildReport {
    pub built: usize,
    pub not_found: usize,
    pub failed: Vec<(String, GenerationError)>,
}

enum BuildSlot<T> {
    /// A fresh render appeared while the slot was being claimed
    Current(CachedRender<T>),

    /// The build running for the path, with the render stored before it
    InFlight {
        build: SharedBuild<T>,
        last_known: Option<CachedRender<T>>,
    },
}

/// Serves generated renders per path with stale-while-revalidate.
///
/// - Fresh render: returned as is
/// - Stale render: returned as is while one background rebuild runs
/// - No render: the request waits for the build if the path is known (or the
///   fallback is blocking), otherwise gets [`Render::Pending`]
///
/// At most one build runs per path. Requests arriving during a build join it
/// or get the last stored render.
pub struct GenerationManager<T> {
    config: GenerationConfig,
    storage: Arc<dyn Storage<T>>,
    builder: Arc<dyn PageBuilder<T>>,
    clock: Arc<dyn Clock>,
    known_paths: Arc<RwLock<HashSet<String>>>,
    in_flight: Arc<Mutex<HashMap<String, SharedBuild<T>>>>,
    stats: Arc<RwLock<CacheStats>>,
}

impl<T> GenerationManager<T>
where
    T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Create a manager with the configured storage and the system clock
    pub async fn new(
        config: GenerationConfig,
        builder: Arc<dyn PageBuilder<T>>,
    ) -> anyhow::Result<Self> {
        let storage = Self::create_storage(&config.storage).await?;
        info!("Using {} storage", storage.name());
        Ok(Self::from_parts(config, storage, builder, Arc::new(SystemClock)))
    }

    /// Create a manager from explicit parts
    pub fn from_parts(
        config: GenerationConfig,
        storage: Arc<dyn Storage<T>>,
        builder: Arc<dyn PageBuilder<T>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            storage,
            builder,
            clock,
            known_paths: Arc::new(RwLock::new(HashSet::new())),
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            stats: Arc::new(RwLock::new(CacheStats::default())),
        }
    }

    /// Create a storage backend from config
    async fn create_storage(backend: &StorageBackend) -> anyhow::Result<Arc<dyn Storage<T>>> {
        match backend {
            StorageBackend::Memory(config) => {
                use crate::storage::memory::MemoryStorage;
                Ok(Arc::new(MemoryStorage::with_config(config.clone())))
            }
            StorageBackend::Filesystem(config) => {
                use crate::storage::filesystem::FilesystemStorage;
                let storage = FilesystemStorage::new(config.clone()).await?;
                Ok(Arc::new(storage))
            }
        }
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    /// Serve the render for `path`, starting a build when it is stale or
    /// missing.
    pub async fn serve(&self, path: &str) -> Result<Render<T>, GenerationError> {
        if let Some(cached) = self.load(path).await? {
            if cached.record.is_fresh(self.clock.now()) {
                self.stats.write().await.hits += 1;
                return Ok(cached.output.into_render(Freshness::Fresh));
            }
        }

        let (build, last_known) = match self.claim_build(path).await? {
            BuildSlot::Current(cached) => {
                self.stats.write().await.hits += 1;
                return Ok(cached.output.into_render(Freshness::Fresh));
            }
            BuildSlot::InFlight { build, last_known } => (build, last_known),
        };

        if let Some(cached) = last_known {
            let freshness = if cached.record.is_fresh(self.clock.now()) {
                self.stats.write().await.hits += 1;
                Freshness::Fresh
            } else {
                self.stats.write().await.stale_hits += 1;
                debug!("Serving stale render of {} while it rebuilds", path);
                Freshness::Stale
            };
            return Ok(cached.output.into_render(freshness));
        }

        let waits = self.config.fallback == FallbackMode::Blocking
            || self.known_paths.read().await.contains(path);

        if !waits {
            self.stats.write().await.pending += 1;
            debug!("Serving pending placeholder for {}", path);
            return Ok(Render::Pending);
        }

        self.stats.write().await.misses += 1;
        let output = build.await?;
        Ok(output.into_render(Freshness::Fresh))
    }

    /// Join the build running for `path`, or start one unless a fresh render
    /// is already stored.
    ///
    /// Storage is read under the in-flight lock, and a finished build writes
    /// its render before leaving the map, so a build that completes
    /// concurrently is seen here and never repeated.
    async fn claim_build(&self, path: &str) -> Result<BuildSlot<T>, GenerationError> {
        let mut in_flight = self.in_flight.lock().await;
        let last_known = self.load(path).await?;

        if let Some(build) = in_flight.get(path) {
            return Ok(BuildSlot::InFlight {
                build: build.clone(),
                last_known,
            });
        }

        match last_known {
            Some(cached) if cached.record.is_fresh(self.clock.now()) => {
                Ok(BuildSlot::Current(cached))
            }
            last_known => {
                let build = self.spawn_build(path);
                in_flight.insert(path.to_string(), build.clone());
                Ok(BuildSlot::InFlight { build, last_known })
            }
        }
    }

    /// Run the build on its own task so it completes even when no request is
    /// waiting for it.
    fn spawn_build(&self, path: &str) -> SharedBuild<T> {
        let manager = self.clone();
        let path = path.to_string();
        let task = tokio::spawn(async move { manager.run_build(path).await });

        async move {
            task.await.unwrap_or_else(|err| {
                Err(GenerationError::Build(format!("build task failed: {err}")))
            })
        }
        .boxed()
        .shared()
    }

    async fn run_build(&self, path: String) -> BuildResult<T> {
        let budget = self.config.build_timeout;
        info!("Generating {}", path);

        let attempt = AssertUnwindSafe(self.builder.build(&path)).catch_unwind();
        let outcome = match tokio::time::timeout(budget, attempt).await {
            Ok(Ok(Ok(content))) => Ok(Generated::Content(content)),
            Ok(Ok(Err(GenerationError::NotFound(_)))) => Ok(Generated::NotFound),
            Ok(Ok(Err(err))) => Err(err),
            Ok(Err(_)) => Err(GenerationError::Build(format!("builder panicked on {path}"))),
            Err(_) => Err(GenerationError::BuildTimeout {
                path: path.clone(),
                budget,
            }),
        };

        let result = match outcome {
            Ok(output) => self.store(&path, output).await,
            Err(err) => Err(err),
        };

        match result {
            Ok(Generated::Content(_)) => {
                self.stats.write().await.builds += 1;
                info!("Generated {}", path);
            }
            Ok(Generated::NotFound) => {
                self.stats.write().await.builds += 1;
                info!("Nothing to generate at {}", path);
            }
            Err(ref err) => {
                self.stats.write().await.build_failures += 1;
                warn!("Generating {} failed: {}", path, err);
            }
        }

        self.in_flight.lock().await.remove(&path);
        result
    }

    /// Replace the stored render of `path` with `output`
    async fn store(&self, path: &str, output: Generated<T>) -> BuildResult<T> {
        let metadata = match self.storage.get(path).await.ok().flatten() {
            Some(previous) => previous.metadata.next(Some(previous.record.generated_at)),
            None => PageMetadata::default().next(None),
        };
        let record = GenerationRecord::new(path, self.clock.now(), self.config.ttl);

        self.storage
            .set(path, CachedRender::new(record, output.clone(), metadata))
            .await?;

        Ok(output)
    }

    /// Stored render of `path`. A render that cannot be read back is
    /// dropped, so the path is rebuilt as if it had never been generated.
    async fn load(&self, path: &str) -> Result<Option<CachedRender<T>>, GenerationError> {
        match self.storage.get(path).await {
            Ok(cached) => Ok(cached),
            Err(err) => {
                warn!("Discarding unreadable render of {}: {:#}", path, err);
                self.storage.delete(path).await?;
                Ok(None)
            }
        }
    }

    /// Register `paths` as known and build each of them.
    pub async fn prebuild<I, S>(&self, paths: I) -> PrebuildReport
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let paths: Vec<String> = paths.into_iter().map(Into::into).collect();
        self.known_paths
            .write()
            .await
            .extend(paths.iter().cloned());

        let outcomes: Vec<(String, BuildResult<T>)> = stream::iter(paths)
            .map(|path| async move {
                let result = self.build_now(&path).await;
                (path, result)
            })
            .buffer_unordered(PREBUILD_CONCURRENCY)
            .collect()
            .await;

        let mut report = PrebuildReport::default();
        for (path, result) in outcomes {
            match result {
                Ok(Generated::Content(_)) => report.built += 1,
                Ok(Generated::NotFound) => report.not_found += 1,
                Err(err) => report.failed.push((path, err)),
            }
        }

        info!(
            "Prebuilt {} paths ({} not found, {} failed)",
            report.built,
            report.not_found,
            report.failed.len()
        );
        report
    }

    async fn build_now(&self, path: &str) -> BuildResult<T> {
        match self.claim_build(path).await? {
            BuildSlot::Current(cached) => Ok(cached.output),
            BuildSlot::InFlight { build, .. } => build.await,
        }
    }

    /// Whether `path` was registered by [`prebuild`](Self::prebuild)
    pub async fn is_known(&self, path: &str) -> bool {
        self.known_paths.read().await.contains(path)
    }

    /// Wait for the build running for `path`, if any
    pub async fn wait_for_build(&self, path: &str) -> Option<BuildResult<T>> {
        let build = self.in_flight.lock().await.get(path).cloned();
        match build {
            Some(build) => Some(build.await),
            None => None,
        }
    }

    /// Lifecycle state of `path`
    pub async fn state(&self, path: &str) -> Result<PathState, GenerationError> {
        if self.in_flight.lock().await.contains_key(path) {
            return Ok(PathState::Building);
        }

        Ok(match self.load(path).await? {
            None => PathState::Unbuilt,
            Some(cached) if cached.is_not_found() => PathState::NotFound,
            Some(cached) if cached.record.is_fresh(self.clock.now()) => PathState::Fresh,
            Some(_) => PathState::Stale,
        })
    }

    /// Drop the render of `path` so the next request rebuilds it
    pub async fn revalidate(&self, path: &str) -> Result<(), GenerationError> {
        self.storage.delete(path).await?;
        Ok(())
    }

    /// Revalidate multiple paths
    pub async fn revalidate_many(&self, paths: &[String]) -> Result<(), GenerationError> {
        for path in paths {
            if let Err(err) = self.revalidate(path).await {
                warn!("Revalidating {} failed: {}", path, err);
            }
        }
        Ok(())
    }

    /// Clear all renders and reset statistics
    pub async fn clear(&self) -> Result<(), GenerationError> {
        self.storage.clear().await?;
        *self.stats.write().await = CacheStats::default();
        Ok(())
    }

    /// Get cache statistics
    pub async fn stats(&self) -> CacheStats {
        self.stats.read().await.clone()
    }

    /// Paths with a stored render
    pub async fn keys(&self) -> Result<Vec<String>, GenerationError> {
        Ok(self.storage.keys().await?)
    }
}

impl<T> Clone for GenerationManager<T> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            storage: Arc::clone(&self.storage),
            builder: Arc::clone(&self.builder),
            clock: Arc::clone(&self.clock),
            known_paths: Arc::clone(&self.known_paths),
            in_flight: Arc::clone(&self.in_flight),
            stats: Arc::clone(&self.stats),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::storage::memory::MemoryStorage;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Renders "<path> v<n>" where n counts builds.
    struct CountingBuilder {
        builds: AtomicUsize,
    }

    #[async_trait]
    impl PageBuilder<String> for CountingBuilder {
        async fn build(&self, path: &str) -> Result<String, GenerationError> {
            let n = self.builds.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(format!("{path} v{n}"))
        }
    }

    fn manager(fallback: FallbackMode) -> (GenerationManager<String>, ManualClock) {
        let clock = ManualClock::default();
        let config = GenerationConfig {
            fallback,
            ..Default::default()
        };
        let manager = GenerationManager::from_parts(
            config,
            Arc::new(MemoryStorage::new()),
            Arc::new(CountingBuilder {
                builds: AtomicUsize::new(0),
            }),
            Arc::new(clock.clone()),
        );
        (manager, clock)
    }

    #[tokio::test]
    async fn test_blocking_fallback_builds_on_first_request() {
        let (manager, _clock) = manager(FallbackMode::Blocking);

        let render = manager.serve("/").await.unwrap();
        assert_eq!(render.content().map(String::as_str), Some("/ v1"));
        assert_eq!(manager.state("/").await.unwrap(), PathState::Fresh);

        let stats = manager.stats().await;
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.builds, 1);
    }

    #[tokio::test]
    async fn test_fresh_render_is_served_without_rebuilding() {
        let (manager, clock) = manager(FallbackMode::Blocking);
        manager.serve("/").await.unwrap();

        clock.advance(Duration::from_secs(299));
        let render = manager.serve("/").await.unwrap();
        assert_eq!(
            render,
            Render::Ready {
                content: "/ v1".to_string(),
                freshness: Freshness::Fresh
            }
        );
        assert_eq!(manager.stats().await.builds, 1);
    }

    #[tokio::test]
    async fn test_ttl_elapsing_makes_render_stale() {
        let (manager, clock) = manager(FallbackMode::Blocking);
        manager.serve("/").await.unwrap();

        clock.advance(Duration::from_secs(300));
        assert_eq!(manager.state("/").await.unwrap(), PathState::Stale);

        let render = manager.serve("/").await.unwrap();
        assert_eq!(
            render,
            Render::Ready {
                content: "/ v1".to_string(),
                freshness: Freshness::Stale
            }
        );

        manager.wait_for_build("/").await;
        let render = manager.serve("/").await.unwrap();
        assert_eq!(render.content().map(String::as_str), Some("/ v2"));
    }

    #[tokio::test]
    async fn test_regeneration_metadata_is_carried() {
        let (manager, clock) = manager(FallbackMode::Blocking);
        manager.serve("/").await.unwrap();
        let first_generated = clock.now();

        clock.advance(Duration::from_secs(600));
        manager.serve("/").await.unwrap();
        manager.wait_for_build("/").await;

        let stored = manager.storage.get("/").await.unwrap().unwrap();
        assert_eq!(stored.metadata.regenerations, 2);
        assert_eq!(stored.metadata.last_revalidated, Some(first_generated));
        assert_eq!(stored.record.generated_at, clock.now());
    }

    #[tokio::test]
    async fn test_revalidate_and_clear() {
        let (manager, _clock) = manager(FallbackMode::Blocking);
        manager.serve("/").await.unwrap();
        manager.serve("/post/a").await.unwrap();
        assert_eq!(manager.keys().await.unwrap().len(), 2);

        manager.revalidate("/").await.unwrap();
        assert_eq!(manager.state("/").await.unwrap(), PathState::Unbuilt);
        assert_eq!(manager.state("/post/a").await.unwrap(), PathState::Fresh);

        manager.serve("/").await.unwrap();
        manager
            .revalidate_many(&["/".to_string(), "/post/a".to_string()])
            .await
            .unwrap();
        assert!(manager.keys().await.unwrap().is_empty());

        manager.serve("/").await.unwrap();
        manager.clear().await.unwrap();
        assert!(manager.keys().await.unwrap().is_empty());
        assert_eq!(manager.stats().await.builds, 0);
    }
}
