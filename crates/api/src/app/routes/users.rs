//! User management in the POST-body style: every operation is a POST whose
//! body carries its arguments.

use std::sync::Arc;

use axum::{extract::Extension, routing::post, Router};

use roster_auth::{authorize_privileged_update, hash_password, NewUser, Policy, RoleKind, UserChanges};
use roster_core::{Page, UserId};

use crate::app::dto::{CreateUserRequest, ListUsersRequest, UpdateUserRequest, UserIdRequest, UserView};
use crate::app::errors::{ApiError, ApiResponse, ApiResult};
use crate::app::extract::ValidJson;
use crate::app::routes::guarded;
use crate::app::services::AppServices;
use crate::authz;
use crate::context::CallerContext;

pub fn router(services: &Arc<AppServices>) -> Router {
    Router::new()
        .route("/users/list", guarded(post(list_users), services, Policy::Admin))
        .route("/users/get", guarded(post(get_user), services, Policy::SelfOrAdmin))
        .route("/users/create", guarded(post(create_user), services, Policy::Admin))
        .route("/users/update", guarded(post(update_user), services, Policy::SelfOrAdmin))
        .route("/users/delete", guarded(post(delete_user), services, Policy::Admin))
}

fn parse_role(label: &str) -> Result<RoleKind, ApiError> {
    RoleKind::parse(label).ok_or_else(|| ApiError::validation("role", "role must be 'admin' or 'user'"))
}

pub async fn list_users(
    Extension(services): Extension<Arc<AppServices>>,
    ValidJson(body): ValidJson<ListUsersRequest>,
) -> ApiResult<Vec<UserView>> {
    let page = Page::new(Some(body.current), Some(body.page_size))?;
    let users = services.stores.users.list(page).await?;
    Ok(ApiResponse::ok(users.into_iter().map(UserView::from).collect()))
}

pub async fn get_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<CallerContext>,
    ValidJson(body): ValidJson<UserIdRequest>,
) -> ApiResult<UserView> {
    let target = UserId::new(body.user_id);
    authz::check(&caller, &Policy::SelfOrAdmin, Some(target))?;

    let user = services
        .stores
        .users
        .get(target)
        .await?
        .ok_or_else(|| ApiError::not_found("user"))?;
    Ok(ApiResponse::ok(user.into()))
}

pub async fn create_user(
    Extension(services): Extension<Arc<AppServices>>,
    ValidJson(body): ValidJson<CreateUserRequest>,
) -> ApiResult<UserView> {
    let role = parse_role(&body.role)?;
    let users = &services.stores.users;

    if users.find_by_username(&body.username).await?.is_some() {
        return Err(ApiError::Conflict("username is already taken".to_string()));
    }
    if users.find_by_email(&body.email).await?.is_some() {
        return Err(ApiError::Conflict("email is already registered".to_string()));
    }

    let user = users
        .create(NewUser {
            username: body.username,
            email: body.email,
            password_hash: hash_password(&body.password)?,
            role,
        })
        .await?;
    tracing::info!(user_id = %user.id, role = %role, "user created");

    Ok(ApiResponse::created(user.into()).with_msg("user created"))
}

pub async fn update_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<CallerContext>,
    ValidJson(body): ValidJson<UpdateUserRequest>,
) -> ApiResult<UserView> {
    let target = UserId::new(body.user_id);
    authz::check(&caller, &Policy::SelfOrAdmin, Some(target))?;

    let changes = UserChanges {
        username: body.username,
        email: body.email,
        password_hash: body.password.as_deref().map(hash_password).transpose()?,
        role: body.role.as_deref().map(parse_role).transpose()?,
        is_active: body.is_active,
        avatar: body.avatar,
        signature: body.signature,
        title: body.title,
        phone: body.phone,
        group: body.group,
    };
    authorize_privileged_update(caller.principal(), &changes)?;

    let users = &services.stores.users;
    if users.get(target).await?.is_none() {
        return Err(ApiError::not_found("user"));
    }
    if let Some(username) = &changes.username {
        if users.find_by_username(username).await?.is_some_and(|u| u.id != target) {
            return Err(ApiError::Conflict("username is already taken".to_string()));
        }
    }
    if let Some(email) = &changes.email {
        if users.find_by_email(email).await?.is_some_and(|u| u.id != target) {
            return Err(ApiError::Conflict("email is already registered".to_string()));
        }
    }

    let user = users.update(target, &changes).await?;
    Ok(ApiResponse::ok(user.into()).with_msg("user updated"))
}

pub async fn delete_user(
    Extension(services): Extension<Arc<AppServices>>,
    ValidJson(body): ValidJson<UserIdRequest>,
) -> ApiResult<()> {
    let target = UserId::new(body.user_id);
    services.stores.users.delete(target).await?;
    tracing::info!(user_id = %target, "user deleted");
    Ok(ApiResponse::ok(()).with_msg("user deleted"))
}
