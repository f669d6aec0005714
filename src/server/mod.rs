use crate::config::Config;
use crate::conversion::{HardwareSupport, Orchestrator, OrchestratorConfig, Transcoder};
use crate::state::AppState;
use anyhow::{Context, Result};
use axum::{
    extract::DefaultBodyLimit,
    http::{header, Method, StatusCode},
    response::{Html, IntoResponse},
    routing::get,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};

pub mod routes_api;
pub mod routes_sse;

const INDEX_HTML: &str = include_str!("ui/index.html");

/// Shared application context
#[derive(Clone)]
pub struct AppContext {
    pub state: Arc<AppState>,
    pub config: Arc<Config>,
    pub orchestrator: Orchestrator,
}

impl AppContext {
    pub fn new(
        config: Config,
        state: Arc<AppState>,
        transcoder: Arc<dyn Transcoder>,
        hardware: HardwareSupport,
    ) -> Self {
        let orchestrator = Orchestrator::new(
            transcoder,
            OrchestratorConfig::from_config(&config.conversion, hardware),
            state.event_sender(),
        );

        Self {
            state,
            config: Arc::new(config),
            orchestrator,
        }
    }
}

/// Create the Axum router with all routes
pub fn create_router(ctx: AppContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    let static_dir = ctx
        .config
        .server
        .static_dir
        .clone()
        .filter(|dir| dir.exists());
    let output_dir = ctx.config.conversion.output_dir.clone();
    let body_limit = ctx.config.server.max_upload_bytes();

    let mut app = Router::new()
        .route("/health", get(health_check))
        .nest(
            "/api",
            routes_api::api_routes().merge(routes_sse::sse_routes()),
        )
        .nest_service("/outputs", ServeDir::new(output_dir));

    if static_dir.is_none() {
        app = app.route("/", get(index));
    }

    let mut app = app
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx);

    // Uses SPA fallback: serves index.html for any route that doesn't match a file
    if let Some(dir) = static_dir {
        tracing::info!("Serving static files from {:?}", dir);
        let index_path = dir.join("index.html");
        app = app.fallback_service(
            ServeDir::new(&dir)
                .append_index_html_on_directories(true)
                .not_found_service(ServeFile::new(index_path)),
        );
    }

    app
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn health_check() -> impl IntoResponse {
    StatusCode::OK
}

/// Start the HTTP server and run until a shutdown signal arrives.
pub async fn start_server(
    config: Config,
    state: Arc<AppState>,
    transcoder: Arc<dyn Transcoder>,
    hardware: HardwareSupport,
) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;

    std::fs::create_dir_all(&config.conversion.output_dir).with_context(|| {
        format!(
            "Failed to create output directory {:?}",
            config.conversion.output_dir
        )
    })?;

    let ctx = AppContext::new(config, Arc::clone(&state), transcoder, hardware);
    let app = create_router(ctx);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!("Starting server on {}", addr);
    tracing::info!("Open http://{} in your browser", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            let cancelled = state.cancel_all();
            if cancelled > 0 {
                tracing::info!("Cancelled {} running batch(es)", cancelled);
            }
        })
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => {}
            Err(e) => {
                tracing::error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
