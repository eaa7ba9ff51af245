// File: spacetraveling-server/src/pages.rs
// Purpose: Page builders run by the generation managers

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use spacetraveling_content::{reading_time, ContentError, ContentSource, Entry, Page};
use spacetraveling_isr::{GenerationError, PageBuilder};
use std::sync::Arc;

pub const LISTING_PATH: &str = "/";
const POST_PREFIX: &str = "/post/";

pub fn post_path(slug: &str) -> String {
    format!("{POST_PREFIX}{slug}")
}

/// A post with its reading-time estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostView {
    pub entry: Entry,
    pub reading_minutes: u32,
}

impl From<Entry> for PostView {
    fn from(entry: Entry) -> Self {
        let reading_minutes = reading_time::estimate(&entry.content);
        Self {
            entry,
            reading_minutes,
        }
    }
}

pub fn generation_error(err: ContentError) -> GenerationError {
    match err {
        ContentError::Transport(message) => GenerationError::Transport(message),
        ContentError::NotFound { id, .. } => GenerationError::NotFound(id),
        other => GenerationError::Build(other.to_string()),
    }
}

/// Builds the first page of the post listing.
pub struct ListingBuilder {
    source: Arc<dyn ContentSource>,
    document_type: String,
    page_size: u32,
}

impl ListingBuilder {
    pub fn new(source: Arc<dyn ContentSource>, document_type: String, page_size: u32) -> Self {
        Self {
            source,
            document_type,
            page_size,
        }
    }
}

#[async_trait]
impl PageBuilder<Page> for ListingBuilder {
    async fn build(&self, path: &str) -> Result<Page, GenerationError> {
        if path != LISTING_PATH {
            return Err(GenerationError::NotFound(path.to_string()));
        }
        self.source
            .query_by_type(&self.document_type, self.page_size)
            .await
            .map_err(generation_error)
    }
}

/// Builds `/post/<slug>` pages.
pub struct PostBuilder {
    source: Arc<dyn ContentSource>,
    document_type: String,
}

impl PostBuilder {
    pub fn new(source: Arc<dyn ContentSource>, document_type: String) -> Self {
        Self {
            source,
            document_type,
        }
    }
}

#[async_trait]
impl PageBuilder<PostView> for PostBuilder {
    async fn build(&self, path: &str) -> Result<PostView, GenerationError> {
        let slug = match path.strip_prefix(POST_PREFIX) {
            Some(slug) if !slug.is_empty() && !slug.contains('/') => slug,
            _ => return Err(GenerationError::NotFound(path.to_string())),
        };

        let entry = self
            .source
            .get_by_identifier(&self.document_type, slug)
            .await
            .map_err(generation_error)?;
        Ok(PostView::from(entry))
    }
}
