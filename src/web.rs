use crate::{MenuEntry, MenuSearch, ScoredEntry};
use askama::Template;
use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
};
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::compression::CompressionLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::info;

type SharedState = Arc<AppState>;

pub struct AppState {
    pub search: MenuSearch,
    pub base_url: String,
}

#[derive(Clone)]
pub struct WebConfig {
    pub addr: SocketAddr,
    pub base_url: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            base_url: "http://127.0.0.1:8080".to_string(),
        }
    }
}

#[derive(Debug)]
pub enum WebError {
    Io(std::io::Error),
}

impl fmt::Display for WebError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebError::Io(err) => write!(f, "io error: {err}"),
        }
    }
}

impl std::error::Error for WebError {}

impl From<std::io::Error> for WebError {
    fn from(value: std::io::Error) -> Self {
        WebError::Io(value)
    }
}

pub async fn serve(search: MenuSearch, config: WebConfig) -> Result<(), WebError> {
    let entries = search.catalog().len();
    let state = Arc::new(AppState {
        search,
        base_url: config.base_url.clone(),
    });
    let router = build_router(state);
    info!(
        %config.addr,
        base = %config.base_url,
        entries,
        "Binding HTTP listener"
    );
    let listener = TcpListener::bind(config.addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("HTTP server exited");
    Ok(())
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let payload = json!({ "error": self.message });
        (self.status, Json(payload)).into_response()
    }
}

fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(search_page))
        .route("/api/search", get(api_search))
        .route("/api/entry", get(api_entry))
        .route("/api/catalog", get(api_catalog))
        .route("/api/categories", get(api_categories))
        .route("/healthz", get(health))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(true))
                .on_response(DefaultOnResponse::new().include_headers(true)),
        )
        .layer(CompressionLayer::new())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        if let Ok(mut stream) = signal(SignalKind::terminate()) {
            let _ = stream.recv().await;
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

async fn health(State(state): State<SharedState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "menu-search",
        "entries": state.search.catalog().len(),
    }))
}

async fn search_page(
    State(state): State<SharedState>,
    Query(params): Query<SearchParams>,
) -> Response {
    let query = params.q.unwrap_or_default();
    let query = query.trim();
    let (hits, groups) = if query.is_empty() {
        (Vec::new(), catalog_groups(&state.search))
    } else {
        let hits = state
            .search
            .rank_scored(query)
            .iter()
            .map(EntryPayload::from_hit)
            .collect();
        (hits, Vec::new())
    };
    let template = SearchTemplate {
        query,
        search_href: search_href(&state.base_url, query),
        hits,
        groups,
    };
    match template.render() {
        Ok(html) => Html(html).into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response(),
    }
}

async fn api_search(
    State(state): State<SharedState>,
    Query(params): Query<SearchParams>,
) -> Json<SearchResponsePayload> {
    let query = params.q.unwrap_or_default();
    let limit = params
        .limit
        .unwrap_or(usize::MAX)
        .clamp(1, state.search.config().limit.max(1));
    let results = state
        .search
        .rank_scored(&query)
        .iter()
        .take(limit)
        .map(EntryPayload::from_hit)
        .collect();
    Json(SearchResponsePayload {
        query,
        limit,
        results,
    })
}

async fn api_entry(
    State(state): State<SharedState>,
    Query(params): Query<EntryParams>,
) -> Result<Json<EntryPayload>, ApiError> {
    let id = params
        .id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::bad_request("Query parameter `id` is required"))?;
    state
        .search
        .catalog()
        .get(id)
        .map(|entry| Json(EntryPayload::from_entry(entry, None)))
        .ok_or_else(|| ApiError::not_found(format!("No menu entry with id {id:?}")))
}

async fn api_catalog(State(state): State<SharedState>) -> Json<Vec<EntryPayload>> {
    Json(
        state
            .search
            .catalog()
            .entries()
            .iter()
            .map(|entry| EntryPayload::from_entry(entry, None))
            .collect(),
    )
}

async fn api_categories(State(state): State<SharedState>) -> Json<Vec<CategoryPayload>> {
    Json(
        catalog_groups(&state.search)
            .into_iter()
            .map(|group| CategoryPayload {
                entries: group.entries.len(),
                key: group.key,
                name: group.name,
                color: group.color.to_string(),
            })
            .collect(),
    )
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    q: Option<String>,
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct EntryParams {
    id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct EntryPayload {
    id: String,
    text: String,
    category: String,
    category_key: String,
    color: String,
    link: Option<String>,
    score: Option<f32>,
}

impl EntryPayload {
    fn from_entry(entry: &MenuEntry, score: Option<f32>) -> Self {
        Self {
            id: entry.id.clone(),
            text: entry.text.clone(),
            category: entry.category.clone(),
            category_key: entry.category_key.clone(),
            color: entry.color().to_string(),
            link: entry.link.clone(),
            score,
        }
    }

    fn from_hit(hit: &ScoredEntry<'_>) -> Self {
        Self::from_entry(hit.entry, hit.score)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SearchResponsePayload {
    query: String,
    limit: usize,
    results: Vec<EntryPayload>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CategoryPayload {
    key: String,
    name: String,
    color: String,
    entries: usize,
}

struct CategoryGroup {
    key: String,
    name: String,
    color: &'static str,
    entries: Vec<EntryPayload>,
}

fn catalog_groups(search: &MenuSearch) -> Vec<CategoryGroup> {
    let catalog = search.catalog();
    catalog
        .categories()
        .into_iter()
        .map(|(key, name)| CategoryGroup {
            key: key.to_string(),
            name: name.to_string(),
            color: search.category_color(key),
            entries: catalog
                .by_category(key)
                .map(|entry| EntryPayload::from_entry(entry, None))
                .collect(),
        })
        .collect()
}

fn search_href(base_url: &str, query: &str) -> String {
    format!(
        "{}/api/search?q={}",
        base_url.trim_end_matches('/'),
        utf8_percent_encode(query, NON_ALPHANUMERIC)
    )
}

#[derive(Template)]
#[template(
    source = r#"<!DOCTYPE html>
<html lang="ru">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>Поиск услуг</title>
    <script src="https://cdn.jsdelivr.net/npm/@tailwindcss/browser@4"></script>
    <style>
      :root { --blue: #2563eb; --red: #dc2626; --orange: #ea580c; --green: #16a34a; --blue_2: #0891b2; --grey: #64748b; }
    </style>
  </head>
  <body class="bg-slate-50 text-slate-900">
    <main class="min-h-screen flex flex-col items-center justify-start py-10 px-4">
      <div class="max-w-3xl w-full space-y-6">
        <form method="get" action="/" class="flex gap-3">
          <input type="search" name="q" value="{{ query }}" autofocus placeholder="Печать визиток, gtxfnm…"
                 class="flex-1 rounded-md border border-slate-300 px-4 py-2" />
          <button class="rounded-md bg-slate-900 px-4 py-2 text-white font-semibold">Найти</button>
        </form>
        {% if query.is_empty() %}
          {% for group in groups %}
          <section id="{{ group.key }}">
            <h2 class="text-xl font-bold" style="color: {{ group.color }}">{{ group.name }}</h2>
            <ul class="list-disc pl-6">
              {% for entry in group.entries %}
              <li>{% match entry.link %}{% when Some with (link) %}<a href="{{ link }}" class="hover:underline">{{ entry.text }}</a>{% when None %}{{ entry.text }}{% endmatch %}</li>
              {% endfor %}
            </ul>
          </section>
          {% endfor %}
        {% else %}
          <p class="text-sm text-slate-500">{{ hits.len() }} results · <a href="{{ search_href }}" class="hover:underline">JSON</a></p>
          {% if hits.is_empty() %}
            <p>Ничего не найдено.</p>
          {% else %}
          <ul class="divide-y divide-slate-200 bg-white shadow rounded">
            {% for hit in hits %}
            <li class="px-4 py-2 flex justify-between">
              <span>{% match hit.link %}{% when Some with (link) %}<a href="{{ link }}" class="hover:underline">{{ hit.text }}</a>{% when None %}{{ hit.text }}{% endmatch %}</span>
              <span class="text-sm" style="color: {{ hit.color }}">{{ hit.category }}</span>
            </li>
            {% endfor %}
          </ul>
          {% endif %}
        {% endif %}
      </div>
    </main>
  </body>
</html>"#,
    ext = "html"
)]
struct SearchTemplate<'a> {
    query: &'a str,
    search_href: String,
    hits: Vec<EntryPayload>,
    groups: Vec<CategoryGroup>,
}

#[cfg(all(test, feature = "web"))]
mod tests {
    use super::*;
    use crate::{Catalog, MenuSearch};
    use axum::{body, body::Body, http::Request};
    use tower::ServiceExt;

    fn test_router() -> Router {
        let state = Arc::new(AppState {
            search: MenuSearch::new(Catalog::builtin().clone()),
            base_url: "http://127.0.0.1:8080".to_string(),
        });
        build_router(state)
    }

    async fn get_body(uri: &str) -> (StatusCode, Vec<u8>) {
        let response = test_router()
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, bytes.to_vec())
    }

    #[tokio::test]
    async fn api_search_business_cards() {
        let (status, bytes) = get_body("/api/search?q=%D0%B2%D0%B8%D0%B7%D0%B8%D1%82").await;
        assert!(status.is_success());
        let payload: SearchResponsePayload = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(payload.query, "визит");
        assert_eq!(payload.results[0].id, "t6");
        assert_eq!(payload.results[0].score, Some(1.0));
        assert_eq!(payload.results[0].color, "var(--blue)");
    }

    #[tokio::test]
    async fn api_search_wrong_layout_with_limit() {
        let (status, bytes) = get_body("/api/search?q=gtxfnm&limit=3").await;
        assert!(status.is_success());
        let payload: SearchResponsePayload = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(payload.limit, 3);
        assert_eq!(payload.results.len(), 3);
    }

    #[tokio::test]
    async fn api_search_reports_the_limit_it_applies() {
        let (status, bytes) = get_body("/api/search?q=a&limit=20").await;
        assert!(status.is_success());
        let payload: SearchResponsePayload = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(payload.limit, 8);
        assert_eq!(payload.results.len(), payload.limit);

        let (_, bytes) = get_body("/api/search?q=a").await;
        let payload: SearchResponsePayload = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(payload.limit, 8);
    }

    #[tokio::test]
    async fn api_search_without_query_is_empty() {
        let (status, bytes) = get_body("/api/search").await;
        assert!(status.is_success());
        let payload: SearchResponsePayload = serde_json::from_slice(&bytes).unwrap();
        assert!(payload.results.is_empty());
    }

    #[tokio::test]
    async fn api_entry_found_and_missing() {
        let (status, bytes) = get_body("/api/entry?id=g3").await;
        assert!(status.is_success());
        let payload: EntryPayload = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(payload.text, "Лазерная гравировка");
        assert_eq!(payload.link, None);

        let (status, _) = get_body("/api/entry?id=nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = get_body("/api/entry").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn api_categories_lists_all_five() {
        let (status, bytes) = get_body("/api/categories").await;
        assert!(status.is_success());
        let payload: Vec<CategoryPayload> = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(payload.len(), 5);
        assert_eq!(payload.iter().map(|c| c.entries).sum::<usize>(), 60);
    }

    #[tokio::test]
    async fn api_catalog_keeps_menu_order() {
        let (_, bytes) = get_body("/api/catalog").await;
        let payload: Vec<EntryPayload> = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(payload.len(), 60);
        assert_eq!(payload[0].id, "t1");
    }

    #[tokio::test]
    async fn home_page_groups_catalog() {
        let (status, bytes) = get_body("/").await;
        assert!(status.is_success());
        let html = String::from_utf8(bytes).unwrap();
        assert!(html.contains("<section id=\"engraving\">"));
        assert!(html.contains("visit-card"));
        assert!(html.contains("Тиснение фольгой"));
    }

    #[tokio::test]
    async fn search_page_renders_hits() {
        let (status, bytes) = get_body("/?q=gtxfnm").await;
        assert!(status.is_success());
        let html = String::from_utf8(bytes).unwrap();
        assert!(html.contains("Печать визиток"));
        assert!(!html.contains("<section"));
    }

    #[test]
    fn search_href_is_percent_encoded() {
        assert_eq!(
            search_href("http://x/", "a b"),
            "http://x/api/search?q=a%20b"
        );
    }
}
