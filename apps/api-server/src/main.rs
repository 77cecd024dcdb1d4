//! api-server — HTTP front door for the redirect engine workspace.
//!
//! Serves two surfaces:
//! - Resolution: every path not claimed by the admin API is looked up in the
//!   redirect store and answered with a 30x (Location carries the merged
//!   query string) or a JSON 404.
//! - Admin: CRUD plus an integrity audit under /api/redirects. The optional
//!   X-Actor header attributes created redirects.
//!
//! Storage: In-memory (default for tests) or SQLite (file) when the `sqlite`
//! feature is enabled. CORS is configurable via CORS_ALLOW_ORIGIN for an
//! admin frontend.
//!
//! Run:
//! ```bash
//! # pretty logs (default); PORT optional
//! cargo run -p api-server
//!
//! # sqlite storage in a chosen location
//! STORAGE_PROVIDER=sqlite DB_PATH=./data/redirects.db cargo run -p api-server
//! ```
//!
//! Configuration: See `config.rs` for all environment variables.

mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::HeaderValue;
use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode, Uri},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use domain::adapters::memory_repo::InMemoryRedirectRepo;
use domain::adapters::routes::StaticRouteChecker;
use domain::service::{NewRedirect, RedirectService, RedirectUpdate};
use domain::{
    Clock, CoreError, IdGenerator, NormalizedPath, Redirect, RedirectId, RedirectRepository,
    ServiceError, ValidationCode, ValidationError,
};
use serde::{Deserialize, Serialize};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

// Local repo abstraction supporting memory or sqlite (feature-gated).
enum RepoKind {
    Memory(InMemoryRedirectRepo),
    #[cfg(feature = "sqlite")]
    Sqlite(sqlite_adapter::SqliteRedirectRepo),
}

#[derive(Clone)]
struct AnyRepo {
    kind: Arc<RepoKind>,
}

impl AnyRepo {
    fn memory() -> Self {
        Self {
            kind: Arc::new(RepoKind::Memory(InMemoryRedirectRepo::new())),
        }
    }

    #[cfg(feature = "sqlite")]
    fn sqlite_from_env() -> Result<Self, CoreError> {
        Ok(Self {
            kind: Arc::new(RepoKind::Sqlite(
                sqlite_adapter::SqliteRedirectRepo::from_env()?,
            )),
        })
    }
}

impl RedirectRepository for AnyRepo {
    fn get_by_id(&self, id: &RedirectId) -> Result<Option<Redirect>, CoreError> {
        match &*self.kind {
            RepoKind::Memory(r) => r.get_by_id(id),
            #[cfg(feature = "sqlite")]
            RepoKind::Sqlite(r) => r.get_by_id(id),
        }
    }

    fn get_by_source(&self, source: &NormalizedPath) -> Result<Option<Redirect>, CoreError> {
        match &*self.kind {
            RepoKind::Memory(r) => r.get_by_source(source),
            #[cfg(feature = "sqlite")]
            RepoKind::Sqlite(r) => r.get_by_source(source),
        }
    }

    fn save(&self, redirect: Redirect) -> Result<Redirect, CoreError> {
        match &*self.kind {
            RepoKind::Memory(r) => r.save(redirect),
            #[cfg(feature = "sqlite")]
            RepoKind::Sqlite(r) => r.save(redirect),
        }
    }

    fn delete(&self, id: &RedirectId) -> Result<bool, CoreError> {
        match &*self.kind {
            RepoKind::Memory(r) => r.delete(id),
            #[cfg(feature = "sqlite")]
            RepoKind::Sqlite(r) => r.delete(id),
        }
    }

    fn list_all(&self) -> Result<Vec<Redirect>, CoreError> {
        match &*self.kind {
            RepoKind::Memory(r) => r.list_all(),
            #[cfg(feature = "sqlite")]
            RepoKind::Sqlite(r) => r.list_all(),
        }
    }
}

#[derive(Clone)]
struct StdClock;
impl Clock for StdClock {
    fn now(&self) -> std::time::SystemTime {
        std::time::SystemTime::now()
    }
}

/// UUIDv4 ids: unique across restarts, which matters with persistent storage.
#[derive(Clone, Copy)]
struct UuidIds;
impl IdGenerator for UuidIds {
    fn next_id(&self, _seq: u64) -> RedirectId {
        RedirectId::new(uuid::Uuid::new_v4().to_string())
    }
}

type Service = RedirectService<AnyRepo, UuidIds, StdClock>;

#[derive(Clone)]
struct AppState {
    service: Arc<Service>,
}

#[tokio::main]
async fn main() {
    // Load and validate config first (fail fast on misconfiguration)
    let cfg = match config::Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    init_tracing(&cfg);
    cfg.warn_if_insecure();

    let repo = build_repo_from_env(&cfg);
    let mut service = RedirectService::new(repo, UuidIds, StdClock, cfg.policy.clone());
    if !cfg.reserved_routes.is_empty() {
        service = service
            .with_route_checker(Arc::new(StaticRouteChecker::new(cfg.reserved_routes.iter())));
    }
    let state = AppState {
        service: Arc::new(service),
    };

    // Request ID header name
    let x_request_id = axum::http::HeaderName::from_static("x-request-id");

    let mut app = router(state)
        .layer(PropagateRequestIdLayer::new(x_request_id.clone()))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("-");
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id,
                )
            }),
        )
        .layer(SetRequestIdLayer::new(x_request_id, MakeRequestUuid));

    // CORS - already validated in Config::from_env()
    let cors = if cfg.cors_allow_origin == HeaderValue::from_static("*") {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::list([cfg.cors_allow_origin]))
            .allow_methods([
                axum::http::Method::GET,
                axum::http::Method::POST,
                axum::http::Method::PATCH,
                axum::http::Method::DELETE,
                axum::http::Method::OPTIONS,
            ])
            .allow_headers([
                axum::http::header::CONTENT_TYPE,
                axum::http::HeaderName::from_static("x-actor"),
            ])
    };
    app = app.layer(cors);

    let addr: SocketAddr = ([0, 0, 0, 0], cfg.port).into();
    info!(%addr, "api-server listening");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("bind port");
    axum::serve(listener, app).await.expect("server error");
}

fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/redirects",
            post(create_redirect)
                .get(list_redirects)
                .options(preflight),
        )
        .route("/api/redirects/audit", get(audit_redirects))
        .route(
            "/api/redirects/:id",
            get(get_redirect)
                .patch(update_redirect)
                .delete(delete_redirect)
                .options(preflight),
        )
        .fallback(resolve_path)
        .with_state(state)
}

fn init_tracing(cfg: &config::Config) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);
    match cfg.log_format {
        config::LogFormat::Json => {
            registry
                .with(
                    fmt::layer()
                        .json()
                        .with_target(true)
                        .with_timer(fmt::time::SystemTime)
                        .with_writer(std::io::stdout),
                )
                .init();
        }
        config::LogFormat::Pretty => {
            registry
                .with(
                    fmt::layer()
                        .pretty()
                        .with_target(true)
                        .with_writer(std::io::stdout),
                )
                .init();
        }
    }
}

// Construct a repository instance based on config and feature flags.
fn build_repo_from_env(cfg: &config::Config) -> AnyRepo {
    match cfg.storage_provider {
        #[cfg(feature = "sqlite")]
        config::StorageProvider::Sqlite => match AnyRepo::sqlite_from_env() {
            Ok(r) => r,
            Err(e) => {
                eprintln!("failed to init SqliteRedirectRepo from env: {e}");
                AnyRepo::memory()
            }
        },
        _ => AnyRepo::memory(),
    }
}

#[derive(Deserialize)]
struct CreateRedirectReq {
    source_path: String,
    target_path: String,
    #[serde(default)]
    status_code: Option<u16>,
    #[serde(default)]
    notes: Option<String>,
}

#[derive(Deserialize)]
struct UpdateRedirectReq {
    #[serde(default)]
    source_path: Option<String>,
    #[serde(default)]
    target_path: Option<String>,
    #[serde(default)]
    status_code: Option<u16>,
    #[serde(default)]
    enabled: Option<bool>,
    #[serde(default)]
    notes: Option<Option<String>>,
}

#[derive(Serialize)]
struct RedirectOut {
    id: String,
    source_path: String,
    target_path: String,
    status_code: u16,
    enabled: bool,
    created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    updated_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    created_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    notes: Option<String>,
}

#[derive(Serialize)]
struct ListOut {
    redirects: Vec<RedirectOut>,
    total: usize,
}

#[derive(Serialize)]
struct AuditFindingOut {
    redirect: RedirectOut,
    errors: Vec<ValidationError>,
}

#[derive(Serialize)]
struct AuditOut {
    findings: Vec<AuditFindingOut>,
    total: usize,
}

fn redirect_to_out(redirect: Redirect) -> RedirectOut {
    RedirectOut {
        id: redirect.id.as_str().to_string(),
        source_path: redirect.source_path.into_string(),
        target_path: redirect.target_path,
        status_code: redirect.status_code,
        enabled: redirect.enabled,
        created_at: http_common::system_time_to_rfc3339(redirect.created_at),
        updated_at: redirect.updated_at.map(http_common::system_time_to_rfc3339),
        created_by: redirect.created_by,
        notes: redirect.notes,
    }
}

/// Map a service failure onto the wire: validation findings become 4xx with
/// the list envelope, repository failures become an opaque 500.
fn service_error_response(err: ServiceError, context: &'static str) -> axum::response::Response {
    match err {
        ServiceError::Invalid(errors) => {
            let status = if errors.iter().any(|e| e.code == ValidationCode::NotFound) {
                StatusCode::NOT_FOUND
            } else if errors.iter().any(|e| e.code == ValidationCode::SourceExists) {
                StatusCode::CONFLICT
            } else {
                StatusCode::BAD_REQUEST
            };
            (
                status,
                Json(http_common::json_validation_errors(&errors)),
            )
                .into_response()
        }
        ServiceError::Repository(e) => repo_error_response(e, context),
    }
}

fn repo_error_response(err: CoreError, context: &'static str) -> axum::response::Response {
    error!(err = %err, context, "repository failure");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(http_common::json_err("internal")),
    )
        .into_response()
}

async fn preflight() -> impl IntoResponse {
    StatusCode::NO_CONTENT
}

/// Fallback handler: every path the admin API does not claim is a resolution
/// candidate.
async fn resolve_path(State(state): State<AppState>, uri: Uri) -> impl IntoResponse {
    let original = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| uri.path());
    match state.service.resolve_request(original) {
        Ok(Some(resolution)) => {
            info!(path = %uri.path(), location = %resolution.target, status = resolution.status_code, "resolve ok");
            let status = StatusCode::from_u16(resolution.status_code)
                .unwrap_or(StatusCode::MOVED_PERMANENTLY);
            (status, [(header::LOCATION, resolution.target)]).into_response()
        }
        Ok(None) => {
            warn!(path = %uri.path(), "resolve 404");
            (
                StatusCode::NOT_FOUND,
                Json(http_common::json_err("not_found")),
            )
                .into_response()
        }
        Err(e) => repo_error_response(e, "resolve"),
    }
}

async fn create_redirect(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreateRedirectReq>,
) -> impl IntoResponse {
    let created_by = headers
        .get("x-actor")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let input = NewRedirect {
        source_path: body.source_path,
        target_path: body.target_path,
        status_code: body.status_code,
        created_by,
        notes: body.notes,
    };
    match state.service.create(input) {
        Ok(redirect) => {
            info!(source = %redirect.source_path, target = %redirect.target_path, "create ok");
            (StatusCode::CREATED, Json(redirect_to_out(redirect))).into_response()
        }
        Err(e) => service_error_response(e, "create"),
    }
}

async fn list_redirects(State(state): State<AppState>) -> impl IntoResponse {
    match state.service.list_all() {
        Ok(all) => {
            let total = all.len();
            (
                StatusCode::OK,
                Json(ListOut {
                    redirects: all.into_iter().map(redirect_to_out).collect(),
                    total,
                }),
            )
                .into_response()
        }
        Err(e) => repo_error_response(e, "list"),
    }
}

async fn get_redirect(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.service.get(&RedirectId::new(id)) {
        Ok(Some(redirect)) => (StatusCode::OK, Json(redirect_to_out(redirect))).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(http_common::json_err("not_found")),
        )
            .into_response(),
        Err(e) => repo_error_response(e, "get"),
    }
}

async fn update_redirect(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<UpdateRedirectReq>,
) -> impl IntoResponse {
    let changes = RedirectUpdate {
        source_path: body.source_path,
        target_path: body.target_path,
        status_code: body.status_code,
        enabled: body.enabled,
        notes: body.notes,
    };
    match state.service.update(&RedirectId::new(id.clone()), changes) {
        Ok(redirect) => {
            info!(id = %id, "update ok");
            (StatusCode::OK, Json(redirect_to_out(redirect))).into_response()
        }
        Err(e) => service_error_response(e, "update"),
    }
}

async fn delete_redirect(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.service.delete(&RedirectId::new(id.clone())) {
        Ok(true) => {
            info!(id = %id, "delete ok");
            StatusCode::NO_CONTENT.into_response()
        }
        Ok(false) => (
            StatusCode::NOT_FOUND,
            Json(http_common::json_err("not_found")),
        )
            .into_response(),
        Err(e) => repo_error_response(e, "delete"),
    }
}

async fn audit_redirects(State(state): State<AppState>) -> impl IntoResponse {
    match state.service.validate_all() {
        Ok(findings) => {
            let total = findings.len();
            (
                StatusCode::OK,
                Json(AuditOut {
                    findings: findings
                        .into_iter()
                        .map(|(redirect, errors)| AuditFindingOut {
                            redirect: redirect_to_out(redirect),
                            errors,
                        })
                        .collect(),
                    total,
                }),
            )
                .into_response()
        }
        Err(e) => repo_error_response(e, "audit"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use domain::Policy;
    use tower::util::ServiceExt;

    fn app() -> Router {
        let service = RedirectService::new(
            AnyRepo::memory(),
            UuidIds,
            StdClock,
            Policy::default(),
        )
        .with_route_checker(Arc::new(StaticRouteChecker::new(["/api"])));
        router(AppState {
            service: Arc::new(service),
        })
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .header("X-Actor", "admin@example.com")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    #[tokio::test]
    async fn create_and_resolve_flow() {
        let router = app();

        let resp = router
            .clone()
            .oneshot(post_json(
                "/api/redirects",
                "{\"source_path\":\"/Old-Page/\",\"target_path\":\"/new-page\"}",
            ))
            .await
            .expect("create");
        assert_eq!(resp.status(), StatusCode::CREATED);

        // List
        let resp = router
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/redirects")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("list");
        assert_eq!(resp.status(), StatusCode::OK);

        // Resolve uses the normalized source and the policy default status
        let resp = router
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/old-page")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("resolve");
        assert_eq!(resp.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(resp.headers().get(header::LOCATION).expect("location"), "/new-page");
    }

    #[tokio::test]
    async fn resolve_carries_utm_params() {
        let router = app();
        let resp = router
            .clone()
            .oneshot(post_json(
                "/api/redirects",
                "{\"source_path\":\"/a\",\"target_path\":\"/b\",\"status_code\":302}",
            ))
            .await
            .expect("create");
        assert_eq!(resp.status(), StatusCode::CREATED);

        let resp = router
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/a?utm_source=news&ref=x")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("resolve");
        assert_eq!(resp.status(), StatusCode::FOUND);
        assert_eq!(
            resp.headers().get(header::LOCATION).expect("location"),
            "/b?utm_source=news"
        );
    }

    #[tokio::test]
    async fn unknown_path_is_not_found() {
        let resp = app()
            .oneshot(
                Request::builder()
                    .uri("/nothing-here")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("resolve");
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn invalid_creates_are_rejected() {
        let router = app();

        // Open redirect attempt
        let resp = router
            .clone()
            .oneshot(post_json(
                "/api/redirects",
                "{\"source_path\":\"/x\",\"target_path\":\"https://evil.example/phish\"}",
            ))
            .await
            .expect("create");
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        // Reserved application route
        let resp = router
            .clone()
            .oneshot(post_json(
                "/api/redirects",
                "{\"source_path\":\"/api\",\"target_path\":\"/b\"}",
            ))
            .await
            .expect("create");
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        // Duplicate source
        let resp = router
            .clone()
            .oneshot(post_json(
                "/api/redirects",
                "{\"source_path\":\"/dup\",\"target_path\":\"/b\"}",
            ))
            .await
            .expect("create");
        assert_eq!(resp.status(), StatusCode::CREATED);
        let resp = router
            .clone()
            .oneshot(post_json(
                "/api/redirects",
                "{\"source_path\":\"/dup\",\"target_path\":\"/c\"}",
            ))
            .await
            .expect("create");
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn delete_unknown_id_is_not_found() {
        let resp = app()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/api/redirects/does-not-exist")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("delete");
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn audit_is_empty_on_healthy_store() {
        let resp = app()
            .oneshot(
                Request::builder()
                    .uri("/api/redirects/audit")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("audit");
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
