mod config;
mod pages;
mod views;

use crate::config::Config;
use crate::pages::{post_path, ListingBuilder, PostBuilder, PostView, LISTING_PATH};
use anyhow::Context;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Json, Response},
    routing::get,
    Router,
};
use maud::Markup;
use serde::Deserialize;
use spacetraveling_content::{ContentSource, Cursor, Page, PaginationState, PrismicClient};
use spacetraveling_isr::{
    GenerationConfig, GenerationError, GenerationManager, PrebuildReport, Render, StorageBackend,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Application state shared across handlers
#[derive(Clone)]
struct AppState {
    prismic: Arc<PrismicClient>,
    listing: GenerationManager<Page>,
    posts: GenerationManager<PostView>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = Config::load_default().context("Failed to load config")?;
    config.validate()?;

    info!(
        "spacetraveling starting: endpoint {}, type '{}', page size {}",
        config.prismic.endpoint, config.prismic.document_type, config.prismic.page_size
    );

    let prismic = Arc::new(PrismicClient::new(
        &config.prismic.endpoint,
        config.prismic.access_token.clone(),
    )?);
    let source: Arc<dyn ContentSource> = prismic.clone();
    let generation = config.isr.to_runtime_config()?;
    let document_type = config.prismic.document_type.clone();

    let listing = GenerationManager::<Page>::new(
        scoped(&generation, "listing"),
        Arc::new(ListingBuilder::new(
            source.clone(),
            document_type.clone(),
            config.prismic.page_size,
        )),
    )
    .await
    .context("Failed to set up listing storage")?;

    let posts = GenerationManager::<PostView>::new(
        scoped(&generation, "posts"),
        Arc::new(PostBuilder::new(source.clone(), document_type.clone())),
    )
    .await
    .context("Failed to set up post storage")?;

    prebuild(source.as_ref(), &document_type, &listing, &posts).await;

    let state = AppState {
        prismic,
        listing,
        posts,
    };

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Server running at http://{}", addr);
    axum::serve(listener, app(state)).await?;

    Ok(())
}

/// Give each manager its own directory when renders go to disk
fn scoped(config: &GenerationConfig, name: &str) -> GenerationConfig {
    let mut config = config.clone();
    if let StorageBackend::Filesystem(ref mut filesystem) = config.storage {
        filesystem.path = filesystem.path.join(name);
    }
    config
}

/// Build the listing and every post that exists right now. Posts published
/// later are generated on first request.
async fn prebuild(
    source: &dyn ContentSource,
    document_type: &str,
    listing: &GenerationManager<Page>,
    posts: &GenerationManager<PostView>,
) {
    log_report("listing", listing.prebuild([LISTING_PATH]).await);

    match source.list_known_identifiers(document_type).await {
        Ok(ids) => {
            let report = posts.prebuild(ids.iter().map(|id| post_path(id))).await;
            log_report("posts", report);
        }
        Err(err) => warn!(
            category = err.category(),
            "Could not list posts to prebuild: {}", err
        ),
    }
}

fn log_report(scope: &str, report: PrebuildReport) {
    info!(
        "Prebuilt {} {} page(s), {} not found",
        report.built, scope, report.not_found
    );
    for (path, err) in report.failed {
        warn!("Prebuilding {} failed: {}", path, err);
    }
}

fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(home_handler))
        .route("/posts/more", get(more_posts_handler))
        .route("/post/:slug", get(post_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn page(markup: Markup) -> Response {
    Html(markup.into_string()).into_response()
}

fn respond<T>(
    path: &str,
    served: Result<Render<T>, GenerationError>,
    ready: impl FnOnce(&T) -> Markup,
) -> Response {
    match served {
        Ok(Render::Ready { content, .. }) => page(ready(&content)),
        Ok(Render::Pending) => page(views::loading()),
        Ok(Render::NotFound) => (StatusCode::NOT_FOUND, page(views::not_found())).into_response(),
        Err(err) => {
            warn!("Serving {} failed: {}", path, err);
            (StatusCode::SERVICE_UNAVAILABLE, page(views::unavailable())).into_response()
        }
    }
}

async fn home_handler(State(state): State<AppState>) -> Response {
    let served = state.listing.serve(LISTING_PATH).await;
    respond(LISTING_PATH, served, |listing| {
        views::home(&listing.entries, listing.next_cursor.as_ref())
    })
}

#[derive(Debug, Deserialize)]
struct MoreParams {
    cursor: String,
}

/// Next page of the listing as an HTMX fragment.
async fn more_posts_handler(
    State(state): State<AppState>,
    Query(params): Query<MoreParams>,
) -> Response {
    let cursor = Cursor::new(params.cursor);
    if !state.prismic.owns_cursor(&cursor) {
        warn!("Rejected cursor outside the content repository: {}", cursor);
        return (StatusCode::BAD_REQUEST, "invalid cursor").into_response();
    }

    let pending = PaginationState::initialize(Page::new(Vec::new(), Some(cursor.clone())));
    match pending.load_more(state.prismic.as_ref()).await {
        Ok(loaded) => page(views::more_posts(loaded.entries(), loaded.cursor())),
        Err(err) => {
            warn!(
                category = err.category(),
                "Loading more posts failed: {}", err
            );
            page(views::load_more_failed(&cursor))
        }
    }
}

async fn post_handler(State(state): State<AppState>, Path(slug): Path<String>) -> Response {
    let path = post_path(&slug);
    let served = state.posts.serve(&path).await;
    respond(&path, served, views::post)
}

async fn health_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "listing": state.listing.stats().await,
        "posts": state.posts.stats().await,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use pretty_assertions::assert_eq;
    use spacetraveling_content::{Banner, Block, ContentError, Entry, RichTextSpan};
    use spacetraveling_isr::storage::memory::MemoryStorage;
    use spacetraveling_isr::{FallbackMode, ManualClock, PageBuilder};
    use tower::ServiceExt;

    const ENDPOINT: &str = "http://127.0.0.1:9/api/v2";

    fn entry(id: &str, title: &str) -> Entry {
        Entry {
            id: id.to_string(),
            published_at: None,
            title: title.to_string(),
            subtitle: "subtitle".to_string(),
            author: "Danilo Vieira".to_string(),
            banner: Banner::default(),
            content: vec![Block::new("Intro", vec![RichTextSpan::paragraph("Olá mundo")])],
        }
    }

    struct StaticSource {
        entries: Vec<Entry>,
    }

    #[async_trait]
    impl ContentSource for StaticSource {
        async fn query_by_type(
            &self,
            _type_name: &str,
            page_size: u32,
        ) -> spacetraveling_content::Result<Page> {
            let entries = self.entries.iter().take(page_size as usize).cloned().collect();
            Ok(Page::new(
                entries,
                Some(Cursor::new(format!("{ENDPOINT}/documents/search?page=2"))),
            ))
        }

        async fn get_by_identifier(
            &self,
            type_name: &str,
            id: &str,
        ) -> spacetraveling_content::Result<Entry> {
            self.entries
                .iter()
                .find(|entry| entry.id == id)
                .cloned()
                .ok_or_else(|| ContentError::not_found(type_name, id))
        }

        async fn list_known_identifiers(
            &self,
            _type_name: &str,
        ) -> spacetraveling_content::Result<Vec<String>> {
            Ok(self.entries.iter().map(|entry| entry.id.clone()).collect())
        }
    }

    fn manager<T, B>(builder: B) -> GenerationManager<T>
    where
        T: Clone + serde::Serialize + serde::de::DeserializeOwned + Send + Sync + 'static,
        B: PageBuilder<T> + 'static,
    {
        let config = GenerationConfig {
            fallback: FallbackMode::Blocking,
            ..Default::default()
        };
        GenerationManager::from_parts(
            config,
            Arc::new(MemoryStorage::new()),
            Arc::new(builder),
            Arc::new(ManualClock::default()),
        )
    }

    fn test_app() -> Router {
        let source: Arc<dyn ContentSource> = Arc::new(StaticSource {
            entries: vec![
                entry("como-utilizar-hooks", "Como utilizar Hooks"),
                entry("criando-um-app-cra-do-zero", "Criando um app CRA do zero"),
            ],
        });
        let state = AppState {
            prismic: Arc::new(PrismicClient::new(ENDPOINT, None).unwrap()),
            listing: manager(ListingBuilder::new(source.clone(), "posts".to_string(), 1)),
            posts: manager(PostBuilder::new(source, "posts".to_string())),
        };
        app(state)
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, String) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_home_lists_first_page() {
        let (status, body) = get(test_app(), "/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Como utilizar Hooks"));
        assert!(!body.contains("Criando um app CRA do zero"));
        assert!(body.contains("Carregar mais posts"));
    }

    #[tokio::test]
    async fn test_post_page_renders_post() {
        let (status, body) = get(test_app(), "/post/como-utilizar-hooks").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Como utilizar Hooks | spacetraveling"));
        assert!(body.contains("Olá mundo"));
        assert!(body.contains("0 min"));
    }

    #[tokio::test]
    async fn test_missing_post_is_404() {
        let (status, body) = get(test_app(), "/post/nao-existe").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.contains("Post não encontrado"));
    }

    #[tokio::test]
    async fn test_foreign_cursor_is_rejected() {
        let uri = format!(
            "/posts/more?cursor={}",
            urlencoding::encode("http://169.254.169.254/latest/meta-data")
        );
        let (status, _) = get(test_app(), &uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unreachable_source_keeps_load_more_button() {
        let cursor = format!("{ENDPOINT}/documents/search?page=2");
        let uri = format!("/posts/more?cursor={}", urlencoding::encode(&cursor));
        let (status, body) = get(test_app(), &uri).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Carregar mais posts"));
        assert!(body.contains(&urlencoding::encode(&cursor).into_owned()));
    }

    #[tokio::test]
    async fn test_health_reports_stats() {
        let (status, body) = get(test_app(), "/health").await;
        assert_eq!(status, StatusCode::OK);
        let health: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(health["status"], "ok");
        assert_eq!(health["posts"]["builds"], 0);
    }

    #[test]
    fn test_filesystem_storage_is_scoped_per_manager() {
        let config = GenerationConfig {
            storage: StorageBackend::Filesystem(Default::default()),
            ..Default::default()
        };
        match scoped(&config, "posts").storage {
            StorageBackend::Filesystem(filesystem) => {
                assert!(filesystem.path.ends_with("cache/posts"))
            }
            StorageBackend::Memory(_) => panic!("backend changed"),
        }
    }
}
