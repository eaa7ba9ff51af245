//! Filesystem storage backend

use crate::cache::CachedRender;
use crate::config::FilesystemConfig;
use crate::storage::Storage;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use std::path::PathBuf;
use tokio::fs;
use walkdir::WalkDir;

const EXTENSION: &str = "json";

/// Filesystem storage backend
///
/// Stores each render as a JSON file on disk.
/// Persistent across restarts, suitable for single-instance deployments.
pub struct FilesystemStorage<T> {
    config: FilesystemConfig,
    _render: PhantomData<fn() -> T>,
}

impl<T> Clone for FilesystemStorage<T> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            _render: PhantomData,
        }
    }
}

/// Encode a path as a file stem: ASCII letters, digits and `-` are kept,
/// every other byte becomes `_xx` (lowercase hex).
fn encode_key(key: &str) -> String {
    let mut encoded = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("_{byte:02x}"));
        }
    }
    encoded
}

/// Stored renders only; staging files from an unfinished write are skipped.
fn is_render_file(entry: &walkdir::DirEntry) -> bool {
    entry.file_type().is_file()
        && entry.path().extension().and_then(|ext| ext.to_str()) == Some(EXTENSION)
}

fn decode_key(stem: &str) -> Option<String> {
    let mut bytes = Vec::with_capacity(stem.len());
    let mut chars = stem.bytes();
    while let Some(byte) = chars.next() {
        if byte == b'_' {
            let hex = [chars.next()?, chars.next()?];
            let hex = std::str::from_utf8(&hex).ok()?;
            bytes.push(u8::from_str_radix(hex, 16).ok()?);
        } else {
            bytes.push(byte);
        }
    }
    String::from_utf8(bytes).ok()
}

impl<T> FilesystemStorage<T> {
    /// Create a new filesystem storage backend
    pub async fn new(config: FilesystemConfig) -> Result<Self> {
        fs::create_dir_all(&config.path)
            .await
            .context("Failed to create cache directory")?;

        Ok(Self {
            config,
            _render: PhantomData,
        })
    }

    /// Get the file path for a content path
    fn key_to_path(&self, key: &str) -> PathBuf {
        self.config
            .path
            .join(format!("{}.{}", encode_key(key), EXTENSION))
    }

    /// Total size of the stored renders in bytes
    pub async fn total_size_bytes(&self) -> Result<u64> {
        let mut total = 0u64;

        for entry in WalkDir::new(&self.config.path)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if is_render_file(&entry) {
                if let Ok(metadata) = entry.metadata() {
                    total += metadata.len();
                }
            }
        }

        Ok(total)
    }

    /// Check if cache size exceeds maximum
    pub async fn is_over_limit(&self) -> Result<bool> {
        let total_bytes = self.total_size_bytes().await?;
        let max_bytes = self.config.max_size_mb * 1024 * 1024;

        Ok(total_bytes > max_bytes)
    }

    /// Evict least recently modified renders until under limit
    pub async fn evict_if_needed(&self) -> Result<()> {
        if !self.is_over_limit().await? {
            return Ok(());
        }

        let mut entries: Vec<(PathBuf, std::time::SystemTime)> = Vec::new();

        for entry in WalkDir::new(&self.config.path)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if is_render_file(&entry) {
                if let Some(modified) = entry.metadata().ok().and_then(|m| m.modified().ok()) {
                    entries.push((entry.path().to_path_buf(), modified));
                }
            }
        }

        entries.sort_by_key(|(_, time)| *time);

        for (path, _) in entries.iter() {
            tracing::debug!("Evicting {}", path.display());
            fs::remove_file(path).await.ok();

            if !self.is_over_limit().await? {
                break;
            }
        }

        Ok(())
    }
}

#[async_trait]
impl<T> Storage<T> for FilesystemStorage<T>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn get(&self, key: &str) -> Result<Option<CachedRender<T>>> {
        let path = self.key_to_path(key);

        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(None);
        }

        let content = fs::read_to_string(&path)
            .await
            .context("Failed to read cache file")?;

        let render: CachedRender<T> =
            serde_json::from_str(&content).context("Failed to deserialize cached render")?;

        Ok(Some(render))
    }

    async fn set(&self, key: &str, render: CachedRender<T>) -> Result<()> {
        let path = self.key_to_path(key);
        let staging = path.with_extension("tmp");

        let json = serde_json::to_string_pretty(&render).context("Failed to serialize render")?;

        // Rename is atomic, so readers never see a half-written file.
        fs::write(&staging, json)
            .await
            .context("Failed to write cache file")?;
        fs::rename(&staging, &path)
            .await
            .context("Failed to move cache file into place")?;

        self.evict_if_needed().await.ok();

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.key_to_path(key);

        if fs::try_exists(&path).await.unwrap_or(false) {
            fs::remove_file(&path)
                .await
                .context("Failed to delete cache file")?;
        }

        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let mut entries = fs::read_dir(&self.config.path)
            .await
            .context("Failed to read cache directory")?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();

            if path.is_file() {
                fs::remove_file(&path).await.ok();
            }
        }

        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut entries = fs::read_dir(&self.config.path)
            .await
            .context("Failed to read cache directory")?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();

            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }

            if let Some(key) = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(decode_key)
            {
                keys.push(key);
            }
        }

        Ok(keys)
    }

    fn name(&self) -> &'static str {
        "filesystem"
    }
}
