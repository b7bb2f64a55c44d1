//! MathSpace Server - HTTP surface
//!
//! Routes:
//! - `POST /api/chat`: run one instruction through the pipeline
//! - `POST /api/reset`: clear the live scene, history and videos
//! - `GET /api/code/current`: raw text of the live scene
//! - `GET /api/context`: digest, live snapshot and recent turns
//! - `GET /api/debug`: version, workspace paths and the current digest
//! - `GET /health`
//! - `/static/*`: published videos

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod api;
mod error;

pub use api::{
    ChatRequest, ChatResponse, DebugResponse, FailureResponse, ResetResponse, SystemInfo, Timing,
};
pub use error::ApiError;

use axum::http::Method;
use axum::routing::{get, post};
use axum::Router;
use mathspace_core::Pipeline;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;

/// Build the router over a shared pipeline
pub fn app(pipeline: Arc<Pipeline>) -> Router {
    let static_dir = pipeline.workspace().static_dir().to_path_buf();

    Router::new()
        .route("/health", get(api::health))
        .route("/api/chat", post(api::chat))
        .route("/api/reset", post(api::reset))
        .route("/api/code/current", get(api::current_code))
        .route("/api/context", get(api::context))
        .route("/api/debug", get(api::debug))
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(cors_layer())
        .with_state(pipeline)
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
