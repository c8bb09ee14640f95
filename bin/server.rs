// School Finder - Web Server
// REST API with Axum over the catalog, search sessions and bookmarks

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use school_finder::search::{resources_from_value, response_from_value};
use school_finder::{
    BookmarkStore, CatalogHandle, CompareSet, ComparisonRow, FinderConfig, FinderError,
    GroundingSource, NameMatcher, ReconciliationReport, ResourceResponse, School, SchoolFinder,
    SearchRequest, SearchSession, StaticProvider, ViewConfig, comparison_rows, DEFAULT_RESOURCE_TOPIC,
};

/// Sessions kept in memory; the oldest is dropped past this
const MAX_SESSIONS: usize = 64;

/// Shared application state
#[derive(Clone)]
struct AppState {
    catalog: Arc<CatalogHandle>,
    matcher: NameMatcher,
    bookmarks: Arc<Mutex<BookmarkStore>>,
    sessions: Arc<Mutex<HashMap<Uuid, SearchSession>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T) -> Response {
        (
            StatusCode::OK,
            Json(ApiResponse {
                success: true,
                data: Some(data),
                error: None,
            }),
        )
            .into_response()
    }
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(message.into()),
        }),
    )
        .into_response()
}

fn finder_error_response(e: FinderError) -> Response {
    let status = match e {
        FinderError::MissingLocation
        | FinderError::MissingQuery
        | FinderError::MissingTopic
        | FinderError::CompareLimit { .. } => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(status, e.to_string())
}

// ============================================================================
// Request / Response bodies
// ============================================================================

#[derive(Deserialize)]
struct CatalogQuery {
    #[serde(default)]
    q: String,
}

#[derive(Serialize)]
struct CatalogResponse {
    fingerprint: String,
    loaded_at: DateTime<Utc>,
    total: usize,
    schools: Vec<School>,
}

/// Provider output travels in the request body: either the raw response
/// text or an already-decoded JSON payload.
#[derive(Deserialize)]
struct SearchBody {
    query: String,
    location: String,
    #[serde(default)]
    results: Value,
    #[serde(default)]
    view: ViewConfig,
}

#[derive(Serialize)]
struct SearchResponse {
    session_id: Uuid,
    report: ReconciliationReport,
    sources: Vec<GroundingSource>,
    schools: Vec<School>,
}

/// Resource library answer travels in the body like search results
#[derive(Deserialize)]
struct ResourcesBody {
    #[serde(default = "default_topic")]
    topic: String,
    #[serde(default)]
    results: Value,
}

fn default_topic() -> String {
    DEFAULT_RESOURCE_TOPIC.to_string()
}

#[derive(Deserialize)]
struct CompareBody {
    ids: Vec<String>,
}

#[derive(Serialize)]
struct CompareResponse {
    schools: Vec<School>,
    rows: Vec<ComparisonRow>,
}

#[derive(Serialize)]
struct BookmarkResponse {
    id: String,
    bookmarked: bool,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    ApiResponse::ok("OK")
}

/// GET /api/catalog?q= - Keyword search over the local catalog
async fn get_catalog(State(state): State<AppState>, Query(query): Query<CatalogQuery>) -> Response {
    let catalog = state.catalog.get();
    ApiResponse::ok(CatalogResponse {
        fingerprint: catalog.fingerprint().to_string(),
        loaded_at: catalog.loaded_at(),
        total: catalog.len(),
        schools: catalog.search(&query.q),
    })
}

/// POST /api/search - Reconcile provider results into a new session
async fn post_search(State(state): State<AppState>, Json(body): Json<SearchBody>) -> Response {
    let response = match &body.results {
        Value::String(text) => school_finder::parse_provider_response(text),
        other => response_from_value(other),
    };

    let finder = SchoolFinder::new(
        Arc::clone(&state.catalog),
        Box::new(StaticProvider::new(response)),
    )
    .with_matcher(state.matcher);
    let session = match finder.search(SearchRequest::new(body.query, body.location)) {
        Ok(session) => session,
        Err(e) => return finder_error_response(e),
    };

    let bookmarks = lock(&state.bookmarks).load();
    let schools = finder.view(&session, &body.view, &bookmarks);
    let result = SearchResponse {
        session_id: session.id,
        report: session.report.clone(),
        sources: session.sources.clone(),
        schools,
    };

    store_session(&state, session);
    ApiResponse::ok(result)
}

fn store_session(state: &AppState, session: SearchSession) {
    let mut sessions = lock(&state.sessions);
    if sessions.len() >= MAX_SESSIONS {
        let oldest = sessions
            .values()
            .min_by_key(|s| s.created_at)
            .map(|s| s.id);
        if let Some(id) = oldest {
            sessions.remove(&id);
        }
    }
    sessions.insert(session.id, session);
}

/// POST /api/sessions/:id/view - Filter and sort an existing session
async fn post_view(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(view): Json<ViewConfig>,
) -> Response {
    let bookmarks = lock(&state.bookmarks).load();
    let sessions = lock(&state.sessions);

    match sessions.get(&id) {
        Some(session) => ApiResponse::ok(school_finder::display_list(&session.schools, &view, &bookmarks)),
        None => error_response(StatusCode::NOT_FOUND, format!("Unknown session: {}", id)),
    }
}

/// POST /api/sessions/:id/compare - Comparison table for up to 4 schools
async fn post_compare(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<CompareBody>,
) -> Response {
    let mut compare = CompareSet::new();
    for school_id in &body.ids {
        if let Err(e) = compare.toggle(school_id) {
            return finder_error_response(e);
        }
    }

    let sessions = lock(&state.sessions);
    let Some(session) = sessions.get(&id) else {
        return error_response(StatusCode::NOT_FOUND, format!("Unknown session: {}", id));
    };

    let selected = compare.selected(&session.schools);
    ApiResponse::ok(CompareResponse {
        rows: comparison_rows(&selected),
        schools: selected.into_iter().cloned().collect(),
    })
}

/// POST /api/resources - Parent articles on a topic
async fn post_resources(State(state): State<AppState>, Json(body): Json<ResourcesBody>) -> Response {
    let resources: ResourceResponse = match &body.results {
        Value::String(text) => school_finder::parse_resource_response(text),
        other => resources_from_value(other),
    };

    let finder = SchoolFinder::new(
        Arc::clone(&state.catalog),
        Box::new(StaticProvider::default().with_resources(resources)),
    );
    match finder.resources(&body.topic) {
        Ok(response) => ApiResponse::ok(response),
        Err(e) => finder_error_response(e),
    }
}

/// GET /api/bookmarks - Saved school ids
async fn get_bookmarks(State(state): State<AppState>) -> Response {
    ApiResponse::ok(lock(&state.bookmarks).load())
}

/// POST /api/bookmarks/:id - Toggle a bookmark
async fn toggle_bookmark(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let bookmarked = lock(&state.bookmarks).toggle(&id);
    ApiResponse::ok(BookmarkResponse { id, bookmarked })
}

/// DELETE /api/bookmarks/:id - Remove a bookmark
async fn delete_bookmark(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    lock(&state.bookmarks).remove(&id);
    ApiResponse::ok(BookmarkResponse { id, bookmarked: false })
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = FinderConfig::from_env();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("🌐 School Finder - Web Server v{}", school_finder::VERSION);

    let catalog = Arc::new(CatalogHandle::from_path(&config.catalog_path));
    let loaded = catalog.get();
    if loaded.is_empty() {
        warn!(path = %config.catalog_path.display(), "Catalog is empty; searches will pass provider results through unchanged");
    }

    let bookmarks = BookmarkStore::open(&config.bookmarks_db)?;
    info!(db = %config.bookmarks_db.display(), "Bookmark store opened");

    let state = AppState {
        catalog,
        matcher: config.matcher(),
        bookmarks: Arc::new(Mutex::new(bookmarks)),
        sessions: Arc::new(Mutex::new(HashMap::new())),
    };

    // Build API routes
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/catalog", get(get_catalog))
        .route("/search", post(post_search))
        .route("/sessions/:id/view", post(post_view))
        .route("/sessions/:id/compare", post(post_compare))
        .route("/resources", post(post_resources))
        .route("/bookmarks", get(get_bookmarks))
        .route("/bookmarks/:id", post(toggle_bookmark).delete(delete_bookmark))
        .with_state(state);

    // Build main router
    let app = Router::new()
        .nest("/api", api_routes)
        .nest_service("/fee-pdfs", ServeDir::new(&config.fee_documents_dir))
        .layer(ServiceBuilder::new().layer(CorsLayer::permissive()));

    let listener = tokio::net::TcpListener::bind(&config.server_addr).await?;

    info!("🚀 Server running on http://{}", config.server_addr);
    info!("   API: http://{}/api/search", config.server_addr);
    info!("   Fee documents: {}", config.fee_documents_dir.display());

    axum::serve(listener, app).await?;
    Ok(())
}
