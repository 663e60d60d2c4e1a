//! HTTP application wiring (Axum router + shared services).
//!
//! - `services.rs`: stores and token service, plus startup wiring
//! - `routes/`: handlers, one file per area, each route registered with a policy
//! - `dto.rs`: request/response bodies
//! - `extract.rs`: extractors that reject into the envelope
//! - `errors.rs`: the envelope and `ApiError`

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod extract;
pub mod routes;
pub mod services;

pub use services::AppServices;

/// Build the full HTTP router (used by `main.rs` and the black-box tests).
pub fn build_app(services: Arc<AppServices>) -> Router {
    let api = routes::router(&services);

    let app = Router::new()
        .route("/health", get(routes::system::health))
        .route("/", get(routes::system::welcome));

    let app = if services.api_prefix.is_empty() {
        app.merge(api)
    } else {
        app.nest(&services.api_prefix, api)
    };

    app.fallback(routes::system::fallback).layer(
        ServiceBuilder::new()
            .layer(axum::middleware::from_fn(middleware::access_log))
            .layer(axum::middleware::from_fn(middleware::method_not_allowed))
            .layer(Extension(services)),
    )
}
