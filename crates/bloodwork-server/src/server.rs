use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Router, middleware, routing::get};
use bloodwork_ai::ConsultationService;
use bloodwork_storage::DynRecordStore;
use tokio::net::TcpListener;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use crate::auth::{AuthError, AuthService};
use crate::middleware::RequestId;
use crate::records::RecordService;
use crate::routes::{ai::ai_routes, analytics::analytics_routes, auth::auth_routes, codes::code_routes, fhir::fhir_routes, rest::rest_routes};
use crate::{config::AppConfig, handlers, middleware as app_middleware};

/// Shared state handed to every handler.
#[derive(Clone, Debug)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub records: Arc<RecordService>,
    pub ai: Arc<ConsultationService>,
    /// Present only when `auth.enabled`
    pub auth: Option<Arc<AuthService>>,
}

impl AppState {
    pub fn new(cfg: AppConfig, store: DynRecordStore) -> Result<Self, AuthError> {
        let auth = if cfg.auth.enabled {
            Some(Arc::new(AuthService::from_settings(&cfg.auth)?))
        } else {
            None
        };
        Ok(Self {
            records: Arc::new(RecordService::new(store, &cfg)),
            ai: Arc::new(ConsultationService::new(cfg.ai.clone())),
            auth,
            config: Arc::new(cfg),
        })
    }

    /// Replace the consultation service, e.g. with one carrying test providers.
    pub fn with_ai(mut self, ai: ConsultationService) -> Self {
        self.ai = Arc::new(ai);
        self
    }
}

pub struct BloodworkServer {
    addr: SocketAddr,
    app: Router,
}

/// Router for the in-memory store and the given configuration.
pub fn build_app(cfg: &AppConfig) -> Result<Router, AuthError> {
    let state = AppState::new(cfg.clone(), bloodwork_db_memory::create_storage())?;
    Ok(build_app_with_state(state))
}

pub fn build_app_with_state(state: AppState) -> Router {
    let body_limit = state.config.server.body_limit_bytes;
    let api = Router::new()
        .nest("/auth", auth_routes())
        .nest("/ai", ai_routes())
        .nest("/codes", code_routes())
        .nest("/analytics", analytics_routes())
        .merge(rest_routes());

    Router::new()
        .route("/", get(handlers::root))
        .route("/healthz", get(handlers::healthz))
        .route("/readyz", get(handlers::readyz))
        .nest("/api/v1", api)
        .nest("/fhir", fhir_routes())
        // Middleware stack, innermost first: auth -> content negotiation ->
        // cors/compression -> trace -> request id -> body limit
        .layer(middleware::from_fn_with_state(
            state.clone(),
            app_middleware::authentication,
        ))
        .layer(middleware::from_fn(app_middleware::content_negotiation))
        .layer(CorsLayer::permissive())
        .layer(CompressionLayer::new())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    use tracing::field::Empty;
                    let req_id = req
                        .extensions()
                        .get::<RequestId>()
                        .and_then(|id| id.0.to_str().ok())
                        .unwrap_or("")
                        .to_string();
                    tracing::info_span!(
                        "http.request",
                        http.method = %req.method(),
                        http.target = %req.uri(),
                        http.status_code = Empty,
                        request_id = %req_id
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        span.record(
                            "http.status_code",
                            tracing::field::display(res.status().as_u16()),
                        );
                        tracing::info!(
                            http.status = %res.status().as_u16(),
                            elapsed_ms = %latency.as_millis(),
                            "request handled"
                        );
                    },
                ),
        )
        .layer(middleware::from_fn(app_middleware::request_id))
        .layer(axum::extract::DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

pub struct ServerBuilder {
    addr: SocketAddr,
    config: AppConfig,
    store: Option<DynRecordStore>,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        let cfg = AppConfig::default();
        Self {
            addr: cfg.addr(),
            config: cfg,
            store: None,
        }
    }

    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.addr = cfg.addr();
        self.config = cfg;
        self
    }

    pub fn with_store(mut self, store: DynRecordStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn build(self) -> Result<BloodworkServer, AuthError> {
        let store = self
            .store
            .unwrap_or_else(bloodwork_db_memory::create_storage);
        let state = AppState::new(self.config, store)?;
        tracing::info!(
            storage = state.records.store().backend_name(),
            auth = state.auth.is_some(),
            ai_provider = %state.ai.config().provider,
            "application state initialized"
        );
        Ok(BloodworkServer {
            addr: self.addr,
            app: build_app_with_state(state),
        })
    }
}

impl BloodworkServer {
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = TcpListener::bind(self.addr).await?;
        self.run_on(listener, shutdown_signal()).await
    }

    /// Serve on an already bound listener until `shutdown` resolves.
    pub async fn run_on(
        self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        tracing::info!("listening on {}", listener.local_addr()?);
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown)
            .await?;
        Ok(())
    }
}

async fn shutdown_signal() {
    // Wait for Ctrl+C
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
