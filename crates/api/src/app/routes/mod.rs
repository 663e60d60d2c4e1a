use std::sync::Arc;

use axum::{routing::MethodRouter, Router};

use roster_auth::Policy;

use crate::app::services::AppServices;
use crate::middleware::{policy_guard, GuardState};

pub mod attendance;
pub mod auth;
pub mod security;
pub mod system;
pub mod users;

/// Router for everything mounted under the API prefix.
pub fn router(services: &Arc<AppServices>) -> Router {
    Router::new()
        .merge(auth::router(services))
        .merge(users::router(services))
        .merge(security::router(services))
        .merge(attendance::router(services))
}

/// Put `route` behind the bearer guard with the given policy.
pub(crate) fn guarded(route: MethodRouter, services: &Arc<AppServices>, policy: Policy) -> MethodRouter {
    route.route_layer(axum::middleware::from_fn_with_state(
        GuardState {
            services: services.clone(),
            policy,
        },
        policy_guard,
    ))
}
