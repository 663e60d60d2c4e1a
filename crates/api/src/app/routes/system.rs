use std::sync::Arc;

use axum::{extract::Extension, http::StatusCode};
use serde_json::{json, Value};

use crate::app::errors::{ApiError, ApiResponse};
use crate::app::services::AppServices;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn welcome(Extension(services): Extension<Arc<AppServices>>) -> ApiResponse<Value> {
    let base = if services.api_prefix.is_empty() {
        "/"
    } else {
        services.api_prefix.as_str()
    };
    ApiResponse::ok(json!({
        "message": "Welcome to the Roster API",
        "docs": base,
    }))
}

pub async fn fallback() -> ApiError {
    ApiError::NotFound("route not found".to_string())
}
