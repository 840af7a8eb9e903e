//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (tracing, limits, request ID, CORS, security headers)
//! - Bind server to listener, with optional TLS
//! - Run the compress pipeline: admit → policy → quality → signatures → convert → name

use axum::{
    body::Body,
    extract::{ConnectInfo, DefaultBodyLimit, FromRequest, Multipart, State},
    http::{HeaderName, HeaderValue, Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::GateConfig;
use crate::convert::{compress_file, is_valid_quality, Converter, ImageConverter};
use crate::gate::{EndpointLimit, SecurityGate};
use crate::http::request::{read_upload_form, require_multipart, require_user_agent};
use crate::http::response::{insert_rate_limit_headers, ApiError, CompressResponse};
use crate::observability::metrics;
use crate::security::{client_ip, headers as security};

/// Endpoint name used to namespace compress rate limits.
pub const COMPRESS_ENDPOINT: &str = "compress";

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub gate: Arc<SecurityGate>,
    pub converter: Arc<dyn Converter>,
    pub config: Arc<GateConfig>,
}

impl AppState {
    fn compress_limit(&self) -> EndpointLimit {
        EndpointLimit {
            limit: self.config.rate_limit.compress_limit,
            window_ms: self.config.rate_limit.compress_window_ms,
        }
    }
}

/// HTTP server for the upload gate.
pub struct HttpServer {
    router: Router,
    config: Arc<GateConfig>,
    gate: Arc<SecurityGate>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: GateConfig) -> Self {
        let gate = Arc::new(SecurityGate::from_config(&config));
        Self::with_parts(config, gate, Arc::new(ImageConverter))
    }

    /// Create a server around an existing gate and converter.
    pub fn with_parts(
        config: GateConfig,
        gate: Arc<SecurityGate>,
        converter: Arc<dyn Converter>,
    ) -> Self {
        let config = Arc::new(config);
        let state = AppState {
            gate: gate.clone(),
            converter,
            config: config.clone(),
        };
        let router = build_router(&config, state);
        Self {
            router,
            config,
            gate,
        }
    }

    /// The fully layered router.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// The shared gate, e.g. for the eviction sweeper.
    pub fn gate(&self) -> Arc<SecurityGate> {
        self.gate.clone()
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        match &self.config.listener.tls {
            Some(tls) => {
                tracing::info!(address = %addr, "HTTPS server starting");
                let rustls =
                    axum_server::tls_rustls::RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path)
                        .await?;
                let handle = axum_server::Handle::new();
                let shutdown_handle = handle.clone();
                tokio::spawn(async move {
                    let _ = shutdown.recv().await;
                    shutdown_handle.graceful_shutdown(Some(Duration::from_secs(10)));
                });
                axum_server::from_tcp_rustls(listener.into_std()?, rustls)
                    .handle(handle)
                    .serve(app)
                    .await?;
            }
            None => {
                tracing::info!(address = %addr, "HTTP server starting");
                axum::serve(listener, app)
                    .with_graceful_shutdown(async move {
                        let _ = shutdown.recv().await;
                    })
                    .await?;
            }
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Build the Axum router with all middleware layers.
#[allow(deprecated)]
pub fn build_router(config: &GateConfig, state: AppState) -> Router {
    let api = Router::new()
        .route("/api/compress", post(compress_handler))
        .layer(security::cors_layer(&config.security));

    let mut router = Router::new()
        .route("/health", get(health_handler))
        .merge(api)
        .with_state(state)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(config.security.max_body_size))
        .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)));

    if config.security.enable_headers {
        router = router.layer(middleware::from_fn(security_headers_middleware));
    }

    router
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

async fn security_headers_middleware(request: Request<Body>, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    for (name, value) in security::security_headers() {
        if let Ok(name) = HeaderName::from_bytes(name.as_bytes()) {
            headers.insert(name, HeaderValue::from_static(value));
        }
    }
    response
}

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// `POST /api/compress`.
async fn compress_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let start = Instant::now();
    let client = client_ip(request.headers(), peer).to_string();

    let response = match compress(&state, &client, request).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    };

    let status = response.status().as_u16();
    tracing::debug!(client = %client, status, elapsed = ?start.elapsed(), "Compress request finished");
    metrics::record_request(COMPRESS_ENDPOINT, status, start);
    response
}

async fn compress(state: &AppState, client: &str, request: Request<Body>) -> Result<Response, ApiError> {
    let decision = state
        .gate
        .admit(COMPRESS_ENDPOINT, client, state.compress_limit())?;

    require_multipart(request.headers())?;
    require_user_agent(request.headers(), state.config.security.min_user_agent_len)?;

    let multipart = Multipart::from_request(request, state)
        .await
        .map_err(|_| ApiError::InvalidContentType)?;
    let form = read_upload_form(multipart, state.config.conversion.default_quality).await?;

    state.gate.check_structure(&form.files)?;

    let quality = u8::try_from(form.quality)
        .ok()
        .filter(|q| is_valid_quality(*q))
        .ok_or(ApiError::InvalidCompressionLevel)?;

    state.gate.check_signatures(&form.files)?;

    let converter = state.converter.clone();
    let format = form.format;
    let files = form.files;
    let compressed = tokio::task::spawn_blocking(move || {
        files
            .iter()
            .map(|file| compress_file(converter.as_ref(), file, format, quality))
            .collect::<Vec<_>>()
    })
    .await
    .map_err(|e| ApiError::Internal(e.to_string()))?;

    tracing::info!(
        client = %client,
        files = compressed.len(),
        format = format.as_str(),
        quality,
        "Upload processed"
    );

    let mut response = (StatusCode::OK, Json(CompressResponse::new(compressed, &decision))).into_response();
    insert_rate_limit_headers(response.headers_mut(), &decision);
    Ok(response)
}
