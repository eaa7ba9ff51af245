// File: spacetraveling-content/src/prismic.rs
// Purpose: Prismic REST API content source

use crate::error::{ContentError, Result};
use crate::model::{Banner, Block, Cursor, Entry, Page, RichTextSpan};
use crate::pagination::PageFetcher;
use crate::source::ContentSource;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder};
use serde::de::{self, DeserializeOwned};
use serde::{Deserialize, Deserializer};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Page size used when walking every document of a type.
const ENUMERATION_PAGE_SIZE: u32 = 100;

/// Pages followed when enumerating one document type before giving up
const MAX_ENUMERATION_PAGES: usize = 1_000;

/// HTTP client for a Prismic repository's v2 REST API.
///
/// `endpoint` is the API root, e.g. `https://my-repo.cdn.prismic.io/api/v2`.
pub struct PrismicClient {
    client: Client,
    endpoint: String,
    access_token: Option<String>,
}

impl PrismicClient {
    pub fn new(endpoint: impl Into<String>, access_token: Option<String>) -> Result<Self> {
        Self::with_timeout(endpoint, access_token, Duration::from_secs(30))
    }

    pub fn with_timeout(
        endpoint: impl Into<String>,
        access_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("spacetraveling/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            access_token: access_token.filter(|token| !token.is_empty()),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Whether `cursor` points inside this repository's API.
    pub fn owns_cursor(&self, cursor: &Cursor) -> bool {
        match cursor.as_str().strip_prefix(&self.endpoint) {
            Some(rest) => rest.is_empty() || rest.starts_with('/') || rest.starts_with('?'),
            None => false,
        }
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match self.access_token {
            Some(ref token) => request.query(&[("access_token", token.as_str())]),
            None => request,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            return Err(ContentError::Transport(format!(
                "{} answered {}",
                response.url(),
                status
            )));
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Reference of the currently published content.
    async fn master_ref(&self) -> Result<String> {
        let request = self.authorized(self.client.get(&self.endpoint));
        let api: ApiInfo = self.get_json(request).await?;

        api.refs
            .into_iter()
            .find(|r| r.is_master_ref)
            .map(|r| r.reference)
            .ok_or_else(|| ContentError::MalformedResponse("API has no master ref".to_string()))
    }

    async fn search(&self, query: &str, page_size: u32) -> Result<Page> {
        let master_ref = self.master_ref().await?;
        let url = format!("{}/documents/search", self.endpoint);
        let params = [
            ("ref", master_ref),
            ("q", query.to_string()),
            ("pageSize", page_size.to_string()),
        ];

        debug!("Prismic search {} (pageSize={})", query, page_size);
        let request = self.authorized(self.client.get(url).query(&params));
        let response: SearchResponse = self.get_json(request).await?;
        Ok(response.into_page())
    }
}

fn quoted(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

#[async_trait]
impl ContentSource for PrismicClient {
    async fn query_by_type(&self, type_name: &str, page_size: u32) -> Result<Page> {
        let query = format!("[[at(document.type,{})]]", quoted(type_name));
        self.search(&query, page_size).await
    }

    async fn get_by_identifier(&self, type_name: &str, id: &str) -> Result<Entry> {
        let query = format!("[[at(my.{}.uid,{})]]", type_name, quoted(id));
        let page = self.search(&query, 1).await?;

        page.entries
            .into_iter()
            .next()
            .ok_or_else(|| ContentError::not_found(type_name, id))
    }

    async fn list_known_identifiers(&self, type_name: &str) -> Result<Vec<String>> {
        let mut page = self.query_by_type(type_name, ENUMERATION_PAGE_SIZE).await?;
        let mut ids: Vec<String> = Vec::new();
        let mut seen: HashSet<Cursor> = HashSet::new();

        for fetched in 1.. {
            ids.extend(page.entries.into_iter().map(|entry| entry.id));
            let Some(cursor) = page.next_cursor else {
                break;
            };
            if fetched >= MAX_ENUMERATION_PAGES {
                warn!(
                    "Stopped listing '{}' after {} pages",
                    type_name, MAX_ENUMERATION_PAGES
                );
                break;
            }
            if !seen.insert(cursor.clone()) {
                warn!("Cursor {} repeated while listing '{}'", cursor, type_name);
                break;
            }
            page = self.fetch_page(&cursor).await?;
        }

        info!("Found {} '{}' documents", ids.len(), type_name);
        Ok(ids)
    }
}

#[async_trait]
impl PageFetcher for PrismicClient {
    async fn fetch_page(&self, cursor: &Cursor) -> Result<Page> {
        if !self.owns_cursor(cursor) {
            return Err(ContentError::InvalidCursor(cursor.to_string()));
        }

        let mut request = self.client.get(cursor.as_str());
        if !cursor.as_str().contains("access_token=") {
            request = self.authorized(request);
        }

        let response: SearchResponse = self.get_json(request).await?;
        Ok(response.into_page())
    }
}

// Wire types of the Prismic API.

#[derive(Deserialize)]
struct ApiInfo {
    refs: Vec<RefInfo>,
}

#[derive(Deserialize)]
struct RefInfo {
    #[serde(rename = "ref")]
    reference: String,
    #[serde(rename = "isMasterRef", default)]
    is_master_ref: bool,
}

#[derive(Deserialize)]
struct SearchResponse {
    // Required even though nullable: a payload without it is malformed.
    #[serde(deserialize_with = "Option::deserialize")]
    next_page: Option<String>,
    results: Vec<Document>,
}

impl SearchResponse {
    fn into_page(self) -> Page {
        Page::new(
            self.results.into_iter().map(Entry::from).collect(),
            self.next_page.map(Cursor::from),
        )
    }
}

#[derive(Deserialize)]
struct Document {
    id: String,
    #[serde(default)]
    uid: Option<String>,
    #[serde(default, deserialize_with = "publication_date")]
    first_publication_date: Option<DateTime<Utc>>,
    #[serde(default)]
    data: PostData,
}

#[derive(Deserialize, Default)]
struct PostData {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    subtitle: Option<String>,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    banner: Option<ImageField>,
    #[serde(default)]
    content: Vec<ContentSlice>,
}

#[derive(Deserialize)]
struct ImageField {
    #[serde(default)]
    url: Option<String>,
}

#[derive(Deserialize)]
struct ContentSlice {
    #[serde(default)]
    heading: Option<String>,
    #[serde(default)]
    body: Vec<RichTextSpan>,
}

impl From<Document> for Entry {
    fn from(doc: Document) -> Self {
        let data = doc.data;
        Entry {
            id: doc.uid.unwrap_or(doc.id),
            published_at: doc.first_publication_date,
            title: data.title.unwrap_or_default(),
            subtitle: data.subtitle.unwrap_or_default(),
            author: data.author.unwrap_or_default(),
            banner: Banner {
                url: data.banner.and_then(|b| b.url).unwrap_or_default(),
            },
            content: data
                .content
                .into_iter()
                .map(|slice| Block::new(slice.heading.unwrap_or_default(), slice.body))
                .collect(),
        }
    }
}

/// Prismic writes offsets without a colon (`+0000`).
fn parse_publication_date(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%z"))
        .ok()
        .map(|date| date.with_timezone(&Utc))
}

fn publication_date<'de, D>(deserializer: D) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    raw.map(|raw| {
        parse_publication_date(&raw)
            .ok_or_else(|| de::Error::custom(format!("invalid publication date '{raw}'")))
    })
    .transpose()
}
