//! Main Gateway implementation
//!
//! HTTP surface for lesson generation, compilation and sandboxed delivery.

use axum::{
    extract::{rejection::JsonRejection, ConnectInfo, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use lessonforge_agent::{LessonGenerator, LessonPipeline, OpenRouterGenerator, RepairOrchestrator};
use lessonforge_core::{
    ForgeError, LessonRecord, LessonStatus, LessonStore, MemoryLessonStore, SqliteLessonStore,
};
use lessonforge_sandbox::{escape_html, LessonCompiler, SandboxExecutor};

use crate::config::GatewayConfig;
use crate::quota::{QuotaDecision, QuotaGuard};
use crate::{GatewayError, Result};

/// Default page size for lesson listings
const DEFAULT_LIST_LIMIT: usize = 50;
const MAX_LIST_LIMIT: usize = 200;

/// Gateway state shared across handlers
pub struct GatewayState {
    pub config: GatewayConfig,
    pub pipeline: Arc<LessonPipeline>,
    pub compiler: LessonCompiler,
    pub sandbox: SandboxExecutor,
    pub generation_quota: QuotaGuard,
    pub compilation_quota: QuotaGuard,
}

impl GatewayState {
    /// Assemble state around an explicit generator and store
    pub fn new(
        config: GatewayConfig,
        generator: Arc<dyn LessonGenerator>,
        store: Arc<dyn LessonStore>,
    ) -> Result<Self> {
        let pipeline = LessonPipeline::new(generator, store)
            .with_orchestrator(RepairOrchestrator::with_max_attempts(config.pipeline.max_attempts))
            .with_timeout(config.pipeline.timeout())
            .with_duplicate_window(config.pipeline.duplicate_window());
        let sandbox = SandboxExecutor::new(config.sandbox.clone())
            .map_err(|e| GatewayError::InvalidConfig(e.to_string()))?;

        Ok(Self {
            generation_quota: QuotaGuard::new(config.quota.generation),
            compilation_quota: QuotaGuard::new(config.quota.compilation),
            pipeline: Arc::new(pipeline),
            compiler: LessonCompiler::new(),
            sandbox,
            config,
        })
    }

    /// Build the OpenRouter generator and the configured store
    pub fn from_config(config: GatewayConfig) -> Result<Self> {
        let generator = OpenRouterGenerator::from_config(&config.generator)
            .map_err(|e| GatewayError::InvalidConfig(e.to_string()))?;
        let store = open_store(&config)?;
        Self::new(config, Arc::new(generator), store)
    }

    pub fn store(&self) -> &Arc<dyn LessonStore> {
        self.pipeline.store()
    }
}

fn open_store(config: &GatewayConfig) -> Result<Arc<dyn LessonStore>> {
    match &config.storage.database_path {
        Some(path) => {
            if let Some(parent) = std::path::Path::new(path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            let store = SqliteLessonStore::open(path)?;
            tracing::info!("Lesson store: {}", path);
            Ok(Arc::new(store))
        }
        None => {
            tracing::warn!("Lesson store: in-memory, lessons are lost on restart");
            Ok(Arc::new(MemoryLessonStore::new()))
        }
    }
}

/// Client identity for quotas: first `X-Forwarded-For` entry, else the peer
/// address, else `unknown`
pub fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

#[derive(Debug, Deserialize)]
pub struct CreateLessonRequest {
    pub outline: String,
}

#[derive(Debug, Deserialize)]
pub struct CompileRequest {
    pub source: String,
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub limit: Option<usize>,
}

/// Main Gateway
pub struct Gateway {
    state: Arc<GatewayState>,
}

impl Gateway {
    pub fn new(state: GatewayState) -> Self {
        Self {
            state: Arc::new(state),
        }
    }

    /// Create a gateway from configuration
    pub fn from_config(config: GatewayConfig) -> Result<Self> {
        Ok(Self::new(GatewayState::from_config(config)?))
    }

    /// Get gateway state
    pub fn state(&self) -> Arc<GatewayState> {
        self.state.clone()
    }

    /// Build the Axum router
    pub fn build_router(&self) -> Router {
        Router::new()
            .route("/", get(Self::handle_index))
            .route("/health", get(Self::handle_health))
            .route("/api/lessons", post(Self::handle_create_lesson).get(Self::handle_list_lessons))
            .route("/api/lessons/:id", get(Self::handle_get_lesson))
            .route("/api/compile", post(Self::handle_compile))
            .route("/lessons/:id", get(Self::handle_lesson_page))
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Start the gateway server
    pub async fn start(&self) -> Result<()> {
        let addr = self.state.config.socket_addr()?;
        let router = self.build_router();

        tracing::info!("LessonForge gateway starting on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;

        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| GatewayError::Internal(e.to_string()))?;

        tracing::info!("Gateway stopped");
        Ok(())
    }

    fn check_quota(guard: &QuotaGuard, key: &str) -> Result<QuotaDecision> {
        let now = Instant::now();
        let decision = guard.admit_at(key, now);
        if !decision.allowed {
            tracing::info!(client = %key, "quota exhausted");
            return Err(GatewayError::RateLimitExceeded {
                retry_after_secs: decision.retry_after_secs(now),
            });
        }
        Ok(decision)
    }

    // HTTP handlers

    async fn handle_health() -> impl IntoResponse {
        Json(serde_json::json!({
            "status": "healthy",
            "version": crate::VERSION
        }))
    }

    async fn handle_create_lesson(
        State(state): State<Arc<GatewayState>>,
        peer: Option<ConnectInfo<SocketAddr>>,
        headers: HeaderMap,
        payload: std::result::Result<Json<CreateLessonRequest>, JsonRejection>,
    ) -> Result<Response> {
        let key = client_key(&headers, peer.map(|ConnectInfo(addr)| addr));
        Self::check_quota(&state.generation_quota, &key)?;

        let Json(request) = payload?;
        let record = state.pipeline.submit(&request.outline).await?;
        Ok((StatusCode::ACCEPTED, Json(record)).into_response())
    }

    async fn handle_list_lessons(
        State(state): State<Arc<GatewayState>>,
        Query(params): Query<ListParams>,
    ) -> Result<Json<serde_json::Value>> {
        let limit = params.limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT);
        let records = state.store().list(limit).await?;
        let lessons: Vec<serde_json::Value> = records.iter().map(summary).collect();
        Ok(Json(serde_json::json!({ "lessons": lessons })))
    }

    async fn handle_get_lesson(
        State(state): State<Arc<GatewayState>>,
        Path(id): Path<Uuid>,
    ) -> Result<Json<LessonRecord>> {
        let record = state
            .store()
            .get(id)
            .await?
            .ok_or(ForgeError::LessonNotFound(id))?;
        Ok(Json(record))
    }

    async fn handle_compile(
        State(state): State<Arc<GatewayState>>,
        peer: Option<ConnectInfo<SocketAddr>>,
        headers: HeaderMap,
        payload: std::result::Result<Json<CompileRequest>, JsonRejection>,
    ) -> Result<Response> {
        let key = client_key(&headers, peer.map(|ConnectInfo(addr)| addr));
        Self::check_quota(&state.compilation_quota, &key)?;

        let Json(request) = payload?;
        let compiled = state.compiler.compile(&request.source)?;
        Ok(Json(compiled).into_response())
    }

    async fn handle_lesson_page(
        State(state): State<Arc<GatewayState>>,
        Path(id): Path<Uuid>,
    ) -> Result<Response> {
        let record = state
            .store()
            .get(id)
            .await?
            .ok_or(ForgeError::LessonNotFound(id))?;

        let content = match (record.status(), record.generated_content()) {
            (LessonStatus::Generated, Some(content)) => content,
            (LessonStatus::Generating, _) => {
                let page = notice_page(&record.title, "This lesson is still being generated. Refresh in a moment.");
                return Ok((StatusCode::ACCEPTED, Html(page)).into_response());
            }
            _ => {
                let message = record.error_message().unwrap_or("Lesson generation failed");
                let page = notice_page(&record.title, message);
                return Ok((StatusCode::NOT_FOUND, Html(page)).into_response());
            }
        };

        let compiled = state.compiler.compile(content)?;
        Ok(Html(state.sandbox.host_page(&compiled, &record.title, "/")).into_response())
    }

    async fn handle_index(State(state): State<Arc<GatewayState>>) -> Result<Html<String>> {
        let records = state.store().list(DEFAULT_LIST_LIMIT).await?;
        let items = records
            .iter()
            .map(|r| match r.status() {
                LessonStatus::Generated => format!(
                    r#"<li><a href="/lessons/{}">{}</a></li>"#,
                    r.id,
                    escape_html(&r.title)
                ),
                status => format!("<li>{} <em>({})</em></li>", escape_html(&r.title), status),
            })
            .collect::<Vec<_>>()
            .join("\n");
        Ok(Html(page("LessonForge", &format!("<h1>Lessons</h1>\n<ul>\n{}\n</ul>", items))))
    }
}

fn summary(record: &LessonRecord) -> serde_json::Value {
    serde_json::json!({
        "id": record.id,
        "title": record.title,
        "status": record.status(),
        "error_message": record.error_message(),
        "created_at": record.created_at,
        "updated_at": record.updated_at,
    })
}

fn notice_page(title: &str, message: &str) -> String {
    page(
        title,
        &format!(
            "<h1>{}</h1>\n<p>{}</p>\n<p><a href=\"/\">&larr; All lessons</a></p>",
            escape_html(title),
            escape_html(message)
        ),
    )
}

fn page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n</head>\n<body>\n{}\n</body>\n</html>\n",
        escape_html(title),
        body
    )
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Gateway shutdown initiated");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_client_key_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static(" 203.0.113.7 , 10.0.0.1"));
        let peer: SocketAddr = "192.168.1.2:5000".parse().unwrap();
        assert_eq!(client_key(&headers, Some(peer)), "203.0.113.7");
    }

    #[test]
    fn test_client_key_falls_back_to_peer_then_unknown() {
        let peer: SocketAddr = "192.168.1.2:5000".parse().unwrap();
        assert_eq!(client_key(&HeaderMap::new(), Some(peer)), "192.168.1.2");
        assert_eq!(client_key(&HeaderMap::new(), None), "unknown");

        let mut blank = HeaderMap::new();
        blank.insert("x-forwarded-for", HeaderValue::from_static("  "));
        assert_eq!(client_key(&blank, None), "unknown");
    }

    #[test]
    fn test_notice_page_escapes_message() {
        let html = notice_page("Fractions", "<script>alert(1)</script>");
        assert!(!html.contains("<script>alert"));
        assert!(html.contains("&lt;script&gt;"));
    }
}
