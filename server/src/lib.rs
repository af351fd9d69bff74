use anyhow::Result;
use axum::{extract::{Path, Query, State}, http::StatusCode, routing::get, Json, Router};
use searchcore::tokenizer::{normalize, query_terms};
use searchcore::{CancelToken, Document, EngineConfig, Error, RankingMethod, SearchEngine};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Upper bound on `k` accepted from clients.
pub const MAX_K: usize = 100;

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default = "default_k")]
    pub k: usize,
    #[serde(default)]
    pub method: Option<String>,
    /// Run the raw query through stopword removal and stemming first.
    #[serde(default)]
    pub normalize: bool,
}
fn default_k() -> usize { 10 }

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub method: RankingMethod,
    pub terms: Vec<String>,
    pub took_s: f64,
    pub results: Vec<SearchHit>,
}

#[derive(Serialize)]
pub struct SearchHit {
    pub pid: String,
    pub score: f64,
    pub title: String,
    pub rating: Option<f64>,
    pub out_of_stock: bool,
}

#[derive(Serialize)]
pub struct MethodInfo {
    pub id: RankingMethod,
    pub label: &'static str,
}

#[derive(Serialize)]
pub struct MethodsResponse {
    pub default: RankingMethod,
    pub methods: Vec<MethodInfo>,
}

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<SearchEngine>,
    /// Per-query deadline; queries past it are cancelled.
    pub query_timeout: Duration,
}

/// Load and index the corpus, then build the router.
pub fn build_app_from_corpus(corpus: PathBuf, config: EngineConfig, query_timeout: Duration) -> Result<Router> {
    let engine = SearchEngine::load(&corpus, config)?;
    engine.warm_up(&[engine.default_method()]);
    Ok(build_app(Arc::new(engine), query_timeout))
}

pub fn build_app(engine: Arc<SearchEngine>, query_timeout: Duration) -> Router {
    let app_state = AppState { engine, query_timeout };
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/methods", get(methods_handler))
        .route("/search", get(search_handler))
        .route("/doc/:doc_id", get(doc_handler))
        .with_state(app_state)
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
}

// CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
fn cors_layer() -> CorsLayer {
    let any = || CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);
    match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val.split(',').filter_map(|s| s.trim().parse().ok()).collect();
            if origins.is_empty() {
                any()
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => any(),
    }
}

pub async fn methods_handler(State(state): State<AppState>) -> Json<MethodsResponse> {
    let methods = state.engine.available_methods().iter().map(|&m| MethodInfo { id: m, label: m.label() }).collect();
    Json(MethodsResponse { default: state.engine.default_method(), methods })
}

pub async fn search_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, (StatusCode, String)> {
    let start = std::time::Instant::now();
    let engine = state.engine.clone();
    let method = params.method.as_deref().map_or(engine.default_method(), |m| engine.resolve_method(m));
    let terms = if params.normalize { normalize(&params.q) } else { query_terms(&params.q) };
    let k = params.k.min(MAX_K);
    let cancel = CancelToken::with_timeout(state.query_timeout);

    // Ranking is CPU-bound; keep it off the async workers.
    let (terms, hits) = tokio::task::spawn_blocking(move || {
        let hits = engine.search_terms(&terms, k, method, &cancel);
        (terms, hits)
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    let hits = hits.map_err(error_status)?;

    let results = hits
        .into_iter()
        .filter_map(|h| {
            let doc = state.engine.corpus().get(h.doc_id)?;
            Some(SearchHit {
                pid: h.external_id,
                score: h.score,
                title: doc.title.clone(),
                rating: doc.rating,
                out_of_stock: doc.out_of_stock,
            })
        })
        .collect();

    Ok(Json(SearchResponse { query: params.q, method, terms, took_s: start.elapsed().as_secs_f64(), results }))
}

pub async fn doc_handler(State(state): State<AppState>, Path(doc_id): Path<String>) -> Result<Json<Document>, (StatusCode, String)> {
    state
        .engine
        .document(&doc_id)
        .cloned()
        .map(Json)
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("document `{doc_id}` not found")))
}

fn error_status(err: Error) -> (StatusCode, String) {
    let status = match &err {
        Error::Cancelled => StatusCode::GATEWAY_TIMEOUT,
        Error::Embedding(_) | Error::EmbeddingTimeout(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    tracing::warn!(%status, error = %err, "search failed");
    (status, err.to_string())
}
