//! # spacetraveling ISR - Incremental Static Regeneration
//!
//! Pages are generated once and served from storage until their TTL runs
//! out; after that the next request gets the old render while one rebuild
//! runs in the background.
//!
//! ## Features
//!
//! - **Stale-While-Revalidate**: Serve the last render while updating it
//! - **Single-Flight Builds**: One build per path, however many requests race
//! - **Fallback Pages**: Placeholder for paths nobody has built yet
//! - **Build Budget**: Builds that run too long fail instead of hanging
//! - **Storage Backends**: Memory and filesystem
//! - **Injectable Clock**: Freshness is decided by a [`Clock`]
//!
//! ## Example
//!
//! ```rust,ignore
//! use spacetraveling_isr::{GenerationConfig, GenerationManager, Render};
//! use std::sync::Arc;
//!
//! let manager = GenerationManager::new(GenerationConfig::default(), Arc::new(builder)).await?;
//! manager.prebuild(["/", "/post/como-utilizar-hooks"]).await;
//!
//! match manager.serve("/post/como-utilizar-hooks").await? {
//!     Render::Ready { content, .. } => { /* render it */ }
//!     Render::Pending => { /* placeholder */ }
//!     Render::NotFound => { /* 404 */ }
//! }
//! ```

pub mod cache;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod storage;

pub use cache::{
    CacheStats, CachedRender, Freshness, Generated, GenerationRecord, PageMetadata, PathState,
    Render,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{FallbackMode, GenerationConfig, IsrTomlConfig, StorageBackend};
pub use engine::{BuildResult, GenerationManager, PageBuilder, PrebuildReport};
pub use error::GenerationError;
pub use storage::Storage;
