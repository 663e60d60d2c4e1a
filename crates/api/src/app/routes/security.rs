//! Role and permission administration. Every route requires `role:manage`.

use std::sync::Arc;

use axum::{
    extract::Extension,
    routing::{get, post},
    Router,
};

use roster_auth::permissions::ROLE_MANAGE;
use roster_auth::{NewPermission, NewRole, PermissionCode, Policy, Role, RoleChanges};
use roster_core::Page;

use crate::app::dto::{
    CreatePermissionRequest, CreateRoleRequest, PageQuery, PermissionPath, PermissionView,
    RolePath, RolePermissionLink, RolePermissionPath, RoleView, UpdateRoleRequest,
};
use crate::app::errors::{ApiError, ApiResponse, ApiResult};
use crate::app::extract::{PathParams, QueryParams, ValidJson};
use crate::app::routes::guarded;
use crate::app::services::AppServices;

pub fn router(services: &Arc<AppServices>) -> Router {
    let manage = || Policy::permission(ROLE_MANAGE);

    Router::new()
        .route(
            "/security/roles",
            guarded(get(list_roles).post(create_role), services, manage()),
        )
        .route(
            "/security/roles/:role_id",
            guarded(
                get(get_role).put(update_role).delete(delete_role),
                services,
                manage(),
            ),
        )
        .route(
            "/security/permissions",
            guarded(get(list_permissions).post(create_permission), services, manage()),
        )
        .route(
            "/security/permissions/:permission_id",
            guarded(get(get_permission).delete(delete_permission), services, manage()),
        )
        .route(
            "/security/roles/:role_id/permissions/:permission_id",
            guarded(
                post(attach_permission).delete(detach_permission),
                services,
                manage(),
            ),
        )
}

async fn role_view(services: &AppServices, role: Role) -> Result<RoleView, ApiError> {
    let permissions = services.stores.rbac.role_permissions(role.id).await?;
    Ok(RoleView::new(role, permissions))
}

pub async fn list_roles(
    Extension(services): Extension<Arc<AppServices>>,
    QueryParams(query): QueryParams<PageQuery>,
) -> ApiResult<Vec<RoleView>> {
    let page = Page::new(query.current, query.page_size)?;
    let roles = services.stores.rbac.list_roles(page).await?;

    let mut views = Vec::with_capacity(roles.len());
    for role in roles {
        views.push(role_view(&services, role).await?);
    }
    Ok(ApiResponse::ok(views))
}

pub async fn create_role(
    Extension(services): Extension<Arc<AppServices>>,
    ValidJson(body): ValidJson<CreateRoleRequest>,
) -> ApiResult<RoleView> {
    let role = services
        .stores
        .rbac
        .create_role(NewRole {
            name: body.name,
            description: body.description,
        })
        .await?;
    tracing::info!(role_id = %role.id, name = %role.name, "role created");
    Ok(ApiResponse::created(RoleView::new(role, Vec::new())))
}

pub async fn get_role(
    Extension(services): Extension<Arc<AppServices>>,
    PathParams(path): PathParams<RolePath>,
) -> ApiResult<RoleView> {
    let role = services
        .stores
        .rbac
        .get_role(path.role_id)
        .await?
        .ok_or_else(|| ApiError::not_found("role"))?;
    Ok(ApiResponse::ok(role_view(&services, role).await?))
}

pub async fn update_role(
    Extension(services): Extension<Arc<AppServices>>,
    PathParams(path): PathParams<RolePath>,
    ValidJson(body): ValidJson<UpdateRoleRequest>,
) -> ApiResult<RoleView> {
    let changes = RoleChanges {
        name: body.name,
        description: body.description,
    };
    let role = services.stores.rbac.update_role(path.role_id, &changes).await?;
    Ok(ApiResponse::ok(role_view(&services, role).await?))
}

pub async fn delete_role(
    Extension(services): Extension<Arc<AppServices>>,
    PathParams(path): PathParams<RolePath>,
) -> ApiResult<()> {
    services.stores.rbac.delete_role(path.role_id).await?;
    tracing::info!(role_id = %path.role_id, "role deleted");
    Ok(ApiResponse::ok(()).with_msg("role deleted"))
}

pub async fn list_permissions(
    Extension(services): Extension<Arc<AppServices>>,
    QueryParams(query): QueryParams<PageQuery>,
) -> ApiResult<Vec<PermissionView>> {
    let page = Page::new(query.current, query.page_size)?;
    let permissions = services.stores.rbac.list_permissions(page).await?;
    Ok(ApiResponse::ok(permissions.into_iter().map(PermissionView::from).collect()))
}

pub async fn create_permission(
    Extension(services): Extension<Arc<AppServices>>,
    ValidJson(body): ValidJson<CreatePermissionRequest>,
) -> ApiResult<PermissionView> {
    let permission = services
        .stores
        .rbac
        .create_permission(NewPermission {
            code: PermissionCode::new(body.code),
            name: body.name,
            description: body.description,
        })
        .await?;
    tracing::info!(permission_id = %permission.id, code = %permission.code, "permission created");
    Ok(ApiResponse::created(permission.into()))
}

pub async fn get_permission(
    Extension(services): Extension<Arc<AppServices>>,
    PathParams(path): PathParams<PermissionPath>,
) -> ApiResult<PermissionView> {
    let permission = services
        .stores
        .rbac
        .get_permission(path.permission_id)
        .await?
        .ok_or_else(|| ApiError::not_found("permission"))?;
    Ok(ApiResponse::ok(permission.into()))
}

pub async fn delete_permission(
    Extension(services): Extension<Arc<AppServices>>,
    PathParams(path): PathParams<PermissionPath>,
) -> ApiResult<()> {
    services.stores.rbac.delete_permission(path.permission_id).await?;
    tracing::info!(permission_id = %path.permission_id, "permission deleted");
    Ok(ApiResponse::ok(()).with_msg("permission deleted"))
}

pub async fn attach_permission(
    Extension(services): Extension<Arc<AppServices>>,
    PathParams(path): PathParams<RolePermissionPath>,
) -> ApiResult<RolePermissionLink> {
    services
        .stores
        .rbac
        .attach_permission(path.role_id, path.permission_id)
        .await?;
    tracing::info!(role_id = %path.role_id, permission_id = %path.permission_id, "permission attached");
    Ok(ApiResponse::ok(RolePermissionLink {
        role_id: path.role_id,
        permission_id: path.permission_id,
    })
    .with_msg("permission attached"))
}

pub async fn detach_permission(
    Extension(services): Extension<Arc<AppServices>>,
    PathParams(path): PathParams<RolePermissionPath>,
) -> ApiResult<RolePermissionLink> {
    services
        .stores
        .rbac
        .detach_permission(path.role_id, path.permission_id)
        .await?;
    tracing::info!(role_id = %path.role_id, permission_id = %path.permission_id, "permission detached");
    Ok(ApiResponse::ok(RolePermissionLink {
        role_id: path.role_id,
        permission_id: path.permission_id,
    })
    .with_msg("permission detached"))
}
