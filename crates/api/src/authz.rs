//! Request-side authorization: turn a token subject into a resolved caller and
//! evaluate route policies against it.

use roster_auth::{evaluate, resolve_kind, Policy, Principal};
use roster_core::UserId;

use crate::app::errors::ApiError;
use crate::app::services::AppServices;
use crate::context::CallerContext;

/// Load the subject's current record and resolve its permissions.
///
/// The role always comes from storage, never from the token.
pub async fn load_caller(services: &AppServices, subject: UserId) -> Result<CallerContext, ApiError> {
    let user = services
        .stores
        .users
        .get(subject)
        .await?
        .ok_or_else(|| ApiError::InvalidToken("could not validate credentials".to_string()))?;

    if !user.is_active {
        return Err(ApiError::Forbidden("user is inactive".to_string()));
    }

    let role = user.role_kind();
    if role.is_none() {
        tracing::warn!(user_id = %user.id, role = %user.role, "unrecognized role label; no permissions granted");
    }
    let permissions = resolve_kind(services.stores.rbac.as_ref(), role).await?;

    Ok(CallerContext::new(user, Principal::new(subject, role, permissions)))
}

/// Evaluate `policy` for the caller, logging denials.
pub fn check(caller: &CallerContext, policy: &Policy, target: Option<UserId>) -> Result<(), ApiError> {
    evaluate(caller.principal(), policy, target).map_err(|e| {
        tracing::debug!(user_id = %caller.id(), %policy, error = %e, "authorization denied");
        ApiError::from(e)
    })
}
