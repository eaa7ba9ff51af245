// File: spacetraveling-content/src/lib.rs
// Purpose: Main entry point for the spacetraveling content library

//! # spacetraveling-content
//!
//! Posts as delivered by the content backend, and the two computations the
//! blog performs on them:
//!
//! - **Reading time**: [`reading_time::estimate`] over a post's rich-text blocks
//! - **Incremental pagination**: [`PaginationState`] grows a listing one page
//!   at a time by following opaque cursors, never re-fetching seen entries
//!
//! The backend itself sits behind [`ContentSource`] and [`PageFetcher`];
//! [`PrismicClient`] implements both over the Prismic REST API.
//!
//! ```rust,ignore
//! use spacetraveling_content::{ContentSource, PaginationState, PrismicClient};
//!
//! let prismic = PrismicClient::new("https://my-repo.cdn.prismic.io/api/v2", None)?;
//! let first = prismic.query_by_type("posts", 1).await?;
//!
//! let state = PaginationState::initialize(first);
//! let state = state.load_more(&prismic).await?;
//! ```

pub mod error;
pub mod model;
pub mod pagination;
pub mod prismic;
pub mod reading_time;
pub mod source;

pub use error::{ContentError, Result};
pub use model::{as_text, Banner, Block, Cursor, Entry, Page, RichTextSpan, SpanKind};
pub use pagination::{LoadOutcome, PageFetcher, PaginationState, Paginator};
pub use prismic::PrismicClient;
pub use source::ContentSource;
