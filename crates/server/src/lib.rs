//! HTTP surface of the supervised worker: a health endpoint that reports the
//! identity of the running build, request tracing, and graceful shutdown.

pub mod config;
pub mod error;

pub use config::ServerConfig;
pub use error::{Result, ServerError};

use axum::{body::Body, extract::State, http::Request, routing::get, Json, Router};
use serde::Serialize;
use std::future::IntoFuture;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{info, info_span, warn};
use uuid::Uuid;

/// Identity of the running build, as reported by `/health`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildInfo {
    pub version: String,
    pub commit: String,
    /// Hex SHA-256 of the running executable.
    pub sha256: String,
}

#[derive(Debug, Serialize)]
struct HealthResp {
    status: &'static str,
    sha256: String,
    version: String,
    commit: String,
}

async fn health(State(info): State<Arc<BuildInfo>>) -> Json<HealthResp> {
    info!(target: "server", "health check endpoint hit");
    Json(HealthResp {
        status: "OK",
        sha256: info.sha256.clone(),
        version: info.version.clone(),
        commit: info.commit.clone(),
    })
}

/// Routes with per-request tracing spans.
pub fn router(info: BuildInfo) -> Router {
    Router::new()
        .route("/health", get(health))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                info_span!(
                    target: "server",
                    "request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %Uuid::new_v4(),
                )
            }),
        )
        .with_state(Arc::new(info))
}

/// A bound, not yet serving, HTTP application.
pub struct Application {
    listener: TcpListener,
    router: Router,
    shutdown_grace: Duration,
}

impl Application {
    /// Bind to `0.0.0.0:<port>`; port `0` picks a free one.
    pub async fn bind(config: &ServerConfig, info: BuildInfo) -> Result<Self> {
        let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, config.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;

        Ok(Self {
            listener,
            router: router(info),
            shutdown_grace: config.shutdown_grace,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener.local_addr().map_err(ServerError::Serve)
    }

    /// Serve until `shutdown` fires, then let in-flight requests finish for at
    /// most the grace period.
    pub async fn serve(self, shutdown: CancellationToken) -> Result<()> {
        let addr = self.local_addr()?;
        info!(target: "server", %addr, "http server listening");

        let signal = shutdown.clone();
        let serve = axum::serve(self.listener, self.router)
            .with_graceful_shutdown(async move { signal.cancelled().await })
            .into_future();
        tokio::pin!(serve);

        tokio::select! {
            result = &mut serve => return result.map_err(ServerError::Serve),
            _ = shutdown.cancelled() => {
                info!(target: "server", "shutdown requested; draining connections");
            }
        }

        match tokio::time::timeout(self.shutdown_grace, serve).await {
            Ok(result) => result.map_err(ServerError::Serve)?,
            Err(_) => warn!(
                target: "server",
                grace = ?self.shutdown_grace,
                "grace period elapsed; dropping open connections"
            ),
        }
        info!(target: "server", "http server stopped");
        Ok(())
    }
}
