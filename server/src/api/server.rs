//! API server initialization

use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use tokio::net::TcpListener;

use super::middleware::{self, AllowedOrigins, CaptureState, capture_request};
use super::routes::{entries, health};
use crate::core::CoreApp;
use crate::core::constants::DEFAULT_BODY_LIMIT;

pub struct ApiServer {
    app: CoreApp,
    allowed_origins: AllowedOrigins,
}

impl ApiServer {
    pub fn new(app: CoreApp) -> Self {
        let allowed_origins = AllowedOrigins::new(&app.config.server.host, app.config.server.port);
        Self {
            app,
            allowed_origins,
        }
    }

    /// Router with the inspection API behind request capture
    fn router(app: &CoreApp, allowed_origins: &AllowedOrigins) -> Router {
        let capture = CaptureState {
            dispatcher: app.dispatcher.clone(),
            filter: app.filter.clone(),
            max_body_bytes: app.config.capture.max_body_bytes,
        };

        Router::new()
            .route("/api/v1/health", get(health::health))
            .nest("/api/v1", entries::routes(app.database.clone()))
            .fallback(middleware::handle_404)
            .layer(axum::middleware::from_fn_with_state(capture, capture_request))
            .layer(middleware::cors(allowed_origins))
            .layer(DefaultBodyLimit::max(DEFAULT_BODY_LIMIT))
    }

    /// Serve until shutdown. Returns CoreApp for graceful shutdown.
    pub async fn start(self) -> Result<CoreApp> {
        let Self {
            app,
            allowed_origins,
        } = self;

        let shutdown = app.shutdown.clone();

        let host = app.config.server.host.clone();
        let port = app.config.server.port;
        let addr = SocketAddr::new(
            host.parse()
                .with_context(|| format!("Invalid listen address: {}", host))?,
            port,
        );

        let router = Self::router(&app, &allowed_origins);

        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;
        tracing::debug!(%addr, "API server listening");

        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown.wait())
        .await?;

        Ok(app)
    }
}
