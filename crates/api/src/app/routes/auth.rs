use std::sync::Arc;

use axum::{extract::Extension, routing::post, Router};

use roster_auth::{verify_login, Policy};

use crate::app::dto::{CurrentUserResponse, LoginRequest, TokenResponse};
use crate::app::errors::{ApiError, ApiResponse, ApiResult};
use crate::app::extract::ValidJson;
use crate::app::routes::guarded;
use crate::app::services::AppServices;
use crate::context::CallerContext;

pub fn router(services: &Arc<AppServices>) -> Router {
    Router::new()
        .route("/auth/token", post(login))
        .route(
            "/auth/currentUser",
            guarded(post(current_user), services, Policy::Authenticated),
        )
}

/// POST /auth/token - exchange username + password for a bearer token
pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    ValidJson(body): ValidJson<LoginRequest>,
) -> ApiResult<TokenResponse> {
    let found = services.stores.users.find_by_username(&body.username).await?;
    let verified = verify_login(
        &body.password,
        found.as_ref().map(|user| user.password_hash.as_str()),
    );
    let user = found
        .filter(|_| verified)
        .ok_or(ApiError::InvalidCredentials)?;

    if !user.is_active {
        return Err(ApiError::Forbidden("user is inactive".to_string()));
    }

    let access_token = services.tokens.issue(user.id)?;
    tracing::info!(user_id = %user.id, "access token issued");

    Ok(ApiResponse::ok(TokenResponse {
        login_type: "account",
        access_token,
        token_type: "bearer",
        user_id: user.id,
        username: user.username,
        role: user.role,
    }))
}

/// POST /auth/currentUser - profile and effective permissions of the caller
pub async fn current_user(Extension(caller): Extension<CallerContext>) -> ApiResult<CurrentUserResponse> {
    let user = caller.user();
    Ok(ApiResponse::ok(CurrentUserResponse {
        userid: user.id,
        name: user.username.clone(),
        avatar: user.avatar.clone(),
        email: user.email.clone(),
        role: user.role.clone(),
        is_active: user.is_active,
        permissions: caller.principal().permissions.codes(),
    }))
}
