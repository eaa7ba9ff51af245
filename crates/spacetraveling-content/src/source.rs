// File: spacetraveling-content/src/source.rs
// Purpose: Narrow query interface to the content-management backend

use crate::error::Result;
use crate::model::{Entry, Page};
use async_trait::async_trait;

/// Query interface to the content backend.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// First page of every entry of `type_name`, `page_size` entries long.
    async fn query_by_type(&self, type_name: &str, page_size: u32) -> Result<Page>;

    /// One entry by its identifier. Fails with `NotFound` when it does not
    /// exist.
    async fn get_by_identifier(&self, type_name: &str, id: &str) -> Result<Entry>;

    /// Identifiers of every entry of `type_name` at the time of the call.
    async fn list_known_identifiers(&self, type_name: &str) -> Result<Vec<String>>;
}
