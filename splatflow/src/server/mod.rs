//! HTTP service around the pipeline.
//!
//! One endpoint turns a lesson video into an uploaded Gaussian splat; the
//! rest is liveness probing. Middleware follows the usual stack: CORS,
//! request ids, request tracing and panic recovery.

mod error;
mod routes;
mod state;

pub use error::{ApiError, ApiResult};
pub use routes::{ExtractPlyRequest, ExtractPlyResponse, VIDEO_FILE_NAME};
pub use state::{build_store, AppState};

use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, HeaderValue, Method};
use axum::Router;
use std::time::Duration;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::errors::{Result, SplatflowError};

/// Builds the application router with its middleware stack.
///
/// # Errors
///
/// Returns [`SplatflowError::Config`] if a configured CORS origin is not a
/// valid header value.
pub fn build_router(state: AppState) -> Result<Router> {
    let cors = build_cors_layer(&state.config.cors_origins)?;
    let request_id_header = HeaderName::from_static("x-request-id");

    Ok(Router::new()
        .merge(routes::router())
        // -- Middleware stack (applied bottom-up) --
        .layer(CatchPanicLayer::new())
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .layer(cors)
        .with_state(state))
}

/// Builds the CORS layer.
///
/// A `*` entry allows any origin without credentials; otherwise only the
/// listed origins are allowed, with credentials.
///
/// # Errors
///
/// Returns [`SplatflowError::Config`] for an origin that is not a valid
/// header value.
pub fn build_cors_layer(origins: &[String]) -> Result<CorsLayer> {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .max_age(Duration::from_secs(3600));

    if origins.is_empty() || origins.iter().any(|origin| origin == "*") {
        return Ok(layer.allow_origin(Any).allow_headers(Any));
    }

    let origins = origins
        .iter()
        .map(|origin| {
            origin
                .parse::<HeaderValue>()
                .map_err(|e| SplatflowError::config(format!("invalid CORS origin '{origin}': {e}")))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(layer
        .allow_origin(origins)
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_credentials(true))
}

/// Waits for Ctrl-C or, on Unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
