//! Generation configuration types

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Regeneration interval used for every page of the blog.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// Time budget of a single build.
pub const DEFAULT_BUILD_TIMEOUT: Duration = Duration::from_secs(10);

/// Generation manager configuration
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    /// How long a render stays fresh after it was generated
    pub ttl: Duration,

    /// Upper bound on a single build; longer builds fail with `BuildTimeout`
    pub build_timeout: Duration,

    /// What a request for a never-built, unknown path receives
    pub fallback: FallbackMode,

    /// Where renders are stored
    pub storage: StorageBackend,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            build_timeout: DEFAULT_BUILD_TIMEOUT,
            fallback: FallbackMode::Pending,
            storage: StorageBackend::Memory(MemoryConfig::default()),
        }
    }
}

/// Behavior for requests to paths that were not known at startup and have
/// never been built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FallbackMode {
    /// Answer with a placeholder at once and build in the background
    #[default]
    Pending,

    /// Hold the request until the build finishes
    Blocking,
}

/// Storage backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageBackend {
    /// In-memory storage (fast, non-persistent)
    Memory(MemoryConfig),

    /// Filesystem storage (persistent, single-instance)
    Filesystem(FilesystemConfig),
}

/// In-memory storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Renders kept at most; the oldest are evicted first, not-found
    /// markers before content
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

fn default_max_entries() -> usize {
    10_000
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
        }
    }
}

/// Filesystem storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilesystemConfig {
    /// Cache directory path
    #[serde(default = "default_cache_path")]
    pub path: PathBuf,

    /// Maximum cache size in megabytes
    #[serde(default = "default_max_size_mb")]
    pub max_size_mb: u64,
}

fn default_cache_path() -> PathBuf {
    PathBuf::from(".spacetraveling/cache")
}

fn default_max_size_mb() -> u64 {
    500
}

impl Default for FilesystemConfig {
    fn default() -> Self {
        Self {
            path: default_cache_path(),
            max_size_mb: default_max_size_mb(),
        }
    }
}

/// `[isr]` section of spacetraveling.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsrTomlConfig {
    /// Regeneration interval in seconds
    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: u64,

    /// Build time budget in seconds
    #[serde(default = "default_build_timeout_seconds")]
    pub build_timeout_seconds: u64,

    /// "pending" or "blocking"
    #[serde(default)]
    pub fallback: FallbackMode,

    /// Storage configuration
    #[serde(default)]
    pub storage: StorageTomlConfig,
}

fn default_ttl_seconds() -> u64 {
    DEFAULT_TTL.as_secs()
}

fn default_build_timeout_seconds() -> u64 {
    DEFAULT_BUILD_TIMEOUT.as_secs()
}

impl Default for IsrTomlConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_ttl_seconds(),
            build_timeout_seconds: default_build_timeout_seconds(),
            fallback: FallbackMode::default(),
            storage: StorageTomlConfig::default(),
        }
    }
}

/// Storage configuration in TOML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageTomlConfig {
    /// Storage backend: "memory" or "filesystem"
    #[serde(default = "default_primary")]
    pub primary: String,

    /// Memory-specific config
    pub memory: Option<MemoryConfig>,

    /// Filesystem-specific config
    pub filesystem: Option<FilesystemConfig>,
}

fn default_primary() -> String {
    "memory".to_string()
}

impl Default for StorageTomlConfig {
    fn default() -> Self {
        Self {
            primary: default_primary(),
            memory: None,
            filesystem: None,
        }
    }
}

impl IsrTomlConfig {
    /// Convert TOML config to runtime config
    pub fn to_runtime_config(&self) -> anyhow::Result<GenerationConfig> {
        if self.ttl_seconds == 0 {
            anyhow::bail!("isr.ttl_seconds must be greater than zero");
        }
        if self.build_timeout_seconds == 0 {
            anyhow::bail!("isr.build_timeout_seconds must be greater than zero");
        }

        Ok(GenerationConfig {
            ttl: Duration::from_secs(self.ttl_seconds),
            build_timeout: Duration::from_secs(self.build_timeout_seconds),
            fallback: self.fallback,
            storage: self.parse_storage_backend(&self.storage.primary)?,
        })
    }

    fn parse_storage_backend(&self, backend_type: &str) -> anyhow::Result<StorageBackend> {
        match backend_type {
            "memory" => {
                let config = self.storage.memory.clone().unwrap_or_default();
                if config.max_entries == 0 {
                    anyhow::bail!("isr.storage.memory.max_entries must be greater than zero");
                }
                Ok(StorageBackend::Memory(config))
            }
            "filesystem" => {
                let config = self.storage.filesystem.clone().unwrap_or_default();
                Ok(StorageBackend::Filesystem(config))
            }
            _ => Err(anyhow::anyhow!("Unknown storage backend: {}", backend_type)),
        }
    }
}
