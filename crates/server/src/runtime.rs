// Process wiring: shared state, router, middleware and the serve loop.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::DefaultBodyLimit,
    http::{Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::api;
use crate::api::error::{attach_request_id_header, request_id_from_headers_or_generate, with_request_id_scope};
use crate::config::ServerConfig;
use crate::cors::cors_layer;
use crate::notify::ChangeNotifier;
use crate::rpc;
use crate::rpc::methods::Dispatcher;
use crate::workspace::WorkspaceStore;

const MAX_REQUEST_BODY_BYTES: usize = 8 * 1024 * 1024;
const SERVER_ID_LEN: usize = 8;

/// State shared by every route.
#[derive(Debug, Clone)]
pub struct AppState {
    pub store: Arc<WorkspaceStore>,
    pub dispatcher: Dispatcher,
    pub notifier: ChangeNotifier,
    pub server_id: Arc<str>,
}

impl AppState {
    pub fn new(store: WorkspaceStore, notifier: ChangeNotifier, server_id: impl Into<Arc<str>>) -> Self {
        let store = Arc::new(store);
        Self {
            dispatcher: Dispatcher::new(Arc::clone(&store)),
            store,
            notifier,
            server_id: server_id.into(),
        }
    }
}

/// Random identifier for this process: 8 lowercase hex characters.
pub fn generate_server_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(SERVER_ID_LEN);
    id
}

/// Ensure the workspace exists and build the state around its canonical
/// root.
pub async fn prepare_state(workspace_root: std::path::PathBuf) -> Result<AppState> {
    let store = tokio::task::spawn_blocking(move || -> Result<WorkspaceStore> {
        let store = WorkspaceStore::new(&workspace_root);
        store.ensure().context("failed to initialize workspace")?;
        let canonical = store.canonical_root().context("failed to resolve workspace root")?;
        Ok(WorkspaceStore::new(canonical))
    })
    .await
    .context("workspace initialization task failed")??;

    Ok(AppState::new(store, ChangeNotifier::new(), generate_server_id()))
}

pub fn build_router(state: AppState, cors_origins: &[String]) -> Router {
    let router = Router::new()
        .route("/healthz", get(healthz))
        .merge(rpc::http::router())
        .merge(rpc::ws::router())
        .merge(api::router())
        .with_state(state);
    apply_middleware(router, cors_layer(cors_origins))
}

fn apply_middleware(router: Router, cors: Option<CorsLayer>) -> Router {
    let router = router
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(middleware::from_fn(request_context_middleware))
        .layer(middleware::from_fn(panic_handler));
    match cors {
        Some(cors) => router.layer(cors),
        None => router,
    }
}

/// Run the server described by `config` until Ctrl+C or SIGTERM.
pub async fn run(config: ServerConfig) -> Result<()> {
    let state = prepare_state(config.workspace_root.clone()).await?;
    let listener = TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind listener on {}", config.listen_addr))?;
    let local_addr: SocketAddr = listener.local_addr().context("failed to read listener address")?;

    info!(
        listen_addr = %local_addr,
        workspace_root = %state.store.root().display(),
        server_id = %state.server_id,
        "starting focal mcp server"
    );

    let app = build_router(state, &config.cors_origins);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server exited unexpectedly")
}

async fn healthz() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            warn!(%error, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                warn!(%error, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received");
}

async fn panic_handler(request: Request<Body>, next: Next) -> Response {
    match tokio::spawn(async move { next.run(request).await }).await {
        Ok(response) => response,
        Err(join_error) => {
            error!(?join_error, "request handling panicked");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn request_context_middleware(request: Request<Body>, next: Next) -> Response {
    let request_id = request_id_from_headers_or_generate(request.headers());
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let started_at = Instant::now();

    let mut response = with_request_id_scope(request_id.clone(), next.run(request)).await;
    attach_request_id_header(&mut response, &request_id);

    info!(
        request_id = %request_id,
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        latency_ms = started_at.elapsed().as_millis() as u64,
        "request completed"
    );

    response
}
