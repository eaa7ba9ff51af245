//! Storage backends for generated renders

use crate::cache::CachedRender;
use anyhow::Result;
use async_trait::async_trait;

pub mod filesystem;
pub mod memory;

/// Trait for render storage backends.
///
/// `set` replaces the whole render for a path in one step; readers see the
/// old render or the new one, never a mix.
#[async_trait]
pub trait Storage<T>: Send + Sync
where
    T: Send + Sync + 'static,
{
    /// Get the render stored for a path
    async fn get(&self, path: &str) -> Result<Option<CachedRender<T>>>;

    /// Store a render, replacing any previous one
    async fn set(&self, path: &str, render: CachedRender<T>) -> Result<()>;

    /// Delete a path's render
    async fn delete(&self, path: &str) -> Result<()>;

    /// Clear all renders
    async fn clear(&self) -> Result<()>;

    /// Get all stored paths
    async fn keys(&self) -> Result<Vec<String>>;

    /// Get storage backend name
    fn name(&self) -> &'static str;
}
