//! Generation records, cached renders and cache statistics

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// When a path was last generated and how long that stays fresh
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRecord {
    /// Content path, e.g. `/` or `/post/como-utilizar-hooks`
    pub path: String,

    /// When the render was generated
    pub generated_at: DateTime<Utc>,

    /// How long before the render goes stale
    pub ttl: Duration,
}

impl GenerationRecord {
    pub fn new(path: impl Into<String>, generated_at: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            path: path.into(),
            generated_at,
            ttl,
        }
    }

    /// Age of the render at `now`. A render from the future has age zero.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.generated_at)
            .to_std()
            .unwrap_or(Duration::from_secs(0))
    }

    /// `now - generated_at < ttl`
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.age(now) < self.ttl
    }

    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        !self.is_fresh(now)
    }
}

/// What a build produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "content", rename_all = "snake_case")]
pub enum Generated<T> {
    /// The rendered value
    Content(T),

    /// The source has nothing at this path
    NotFound,
}

impl<T> Generated<T> {
    pub fn into_render(self, freshness: Freshness) -> Render<T> {
        match self {
            Generated::Content(content) => Render::Ready { content, freshness },
            Generated::NotFound => Render::NotFound,
        }
    }
}

/// A stored render with its generation record.
///
/// Regeneration writes a new `CachedRender`; stored values are never patched
/// field by field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedRender<T> {
    pub record: GenerationRecord,
    pub output: Generated<T>,
    #[serde(default)]
    pub metadata: PageMetadata,
}

impl<T> CachedRender<T> {
    pub fn new(record: GenerationRecord, output: Generated<T>, metadata: PageMetadata) -> Self {
        Self {
            record,
            output,
            metadata,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.output, Generated::NotFound)
    }
}

/// Metadata about a cached render
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PageMetadata {
    /// Number of times this path has been generated
    pub regenerations: u64,

    /// Previous generation timestamp
    pub last_revalidated: Option<DateTime<Utc>>,
}

impl PageMetadata {
    /// Metadata for the render that replaces one generated at `previous`
    pub fn next(&self, previous: Option<DateTime<Utc>>) -> Self {
        Self {
            regenerations: self.regenerations + 1,
            last_revalidated: previous,
        }
    }
}

/// How current a served render is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Freshness {
    /// Within its TTL
    Fresh,

    /// Past its TTL; a rebuild has been started
    Stale,
}

/// What a request for a path receives
#[derive(Debug, Clone, PartialEq)]
pub enum Render<T> {
    /// A generated render
    Ready { content: T, freshness: Freshness },

    /// Placeholder while the first build of the path runs
    Pending,

    /// The source has nothing at this path
    NotFound,
}

impl<T> Render<T> {
    pub fn content(&self) -> Option<&T> {
        match self {
            Render::Ready { content, .. } => Some(content),
            _ => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Render::Pending)
    }
}

/// Where a path is in its generation lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathState {
    /// Never generated
    Unbuilt,

    /// Generated within its TTL
    Fresh,

    /// Generated, TTL elapsed
    Stale,

    /// A build is in flight
    Building,

    /// The last build found nothing at this path
    NotFound,
}

/// Statistics for the generation cache
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    /// Requests served a fresh render
    pub hits: u64,

    /// Requests served a stale render while it was rebuilt
    pub stale_hits: u64,

    /// Requests that waited for a first build
    pub misses: u64,

    /// Requests answered with the pending placeholder
    pub pending: u64,

    /// Successful builds
    pub builds: u64,

    /// Failed or timed-out builds
    pub build_failures: u64,
}

impl CacheStats {
    /// Share of requests answered from a stored render
    pub fn hit_rate(&self) -> f64 {
        let served = self.hits + self.stale_hits;
        let total = served + self.misses + self.pending;
        if total == 0 {
            0.0
        } else {
            served as f64 / total as f64
        }
    }
}
