use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use roster_auth::Policy;

use crate::app::errors::{ApiError, OutcomeCode};
use crate::app::services::AppServices;
use crate::authz;
use crate::context::{CallerContext, CallerId};

/// State for a route-level guard: which policy the route was registered with.
#[derive(Clone)]
pub struct GuardState {
    pub services: Arc<AppServices>,
    pub policy: Policy,
}

/// Authenticate the bearer token, resolve the caller and enforce the route policy.
///
/// Policies that need a target record (self-or-admin) are left to the handler,
/// which reads the target from the request.
pub async fn policy_guard(State(guard): State<GuardState>, mut req: Request, next: Next) -> Response {
    let caller = match authenticate(&guard.services, req.headers()).await {
        Ok(caller) => caller,
        Err(e) => return e.into_response(),
    };
    let caller_id = CallerId(caller.id());

    let verdict = if guard.policy.needs_target() {
        Ok(())
    } else {
        authz::check(&caller, &guard.policy, None)
    };

    let mut response = match verdict {
        Ok(()) => {
            req.extensions_mut().insert(caller);
            next.run(req).await
        }
        Err(e) => e.into_response(),
    };
    response.extensions_mut().insert(caller_id);
    response
}

pub async fn authenticate(services: &AppServices, headers: &HeaderMap) -> Result<CallerContext, ApiError> {
    let token = extract_bearer(headers)?;
    let subject = services.tokens.verify(token)?;
    authz::load_caller(services, subject).await
}

fn extract_bearer(headers: &HeaderMap) -> Result<&str, ApiError> {
    let missing = || ApiError::InvalidToken("not authenticated".to_string());

    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or_else(missing)?
        .to_str()
        .map_err(|_| missing())?;

    let credentials = value.strip_prefix("Bearer ").ok_or_else(missing)?;

    let token = credentials.trim();
    if token.is_empty() {
        return Err(missing());
    }

    Ok(token)
}

/// Render the router's bare 405 (known path, wrong method) as an envelope.
pub async fn method_not_allowed(req: Request, next: Next) -> Response {
    let response = next.run(req).await;
    if response.status() != StatusCode::METHOD_NOT_ALLOWED {
        return response;
    }

    let allow = response.headers().get(header::ALLOW).cloned();
    let mut rendered = ApiError::MethodNotAllowed.into_response();
    if let Some(allow) = allow {
        rendered.headers_mut().insert(header::ALLOW, allow);
    }
    rendered
}

/// One log line per request. Bodies are never logged.
pub async fn access_log(req: Request, next: Next) -> Response {
    let started = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let query = req.uri().query().unwrap_or_default().to_string();

    let response = next.run(req).await;

    let caller = response
        .extensions()
        .get::<CallerId>()
        .map(|c| c.0.to_string())
        .unwrap_or_else(|| "anonymous".to_string());
    let code = response
        .extensions()
        .get::<OutcomeCode>()
        .map(|c| c.0)
        .unwrap_or_else(|| response.status().as_u16());

    tracing::info!(
        %method,
        path = %path,
        query = %query,
        status = response.status().as_u16(),
        code,
        caller = %caller,
        latency_ms = started.elapsed().as_millis() as u64,
        "request"
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(axum::http::header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn bearer_token_is_extracted() {
        assert_eq!(extract_bearer(&headers("Bearer abc.def.ghi")).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn malformed_authorization_is_invalid_token() {
        assert!(matches!(extract_bearer(&HeaderMap::new()), Err(ApiError::InvalidToken(_))));
        assert!(matches!(extract_bearer(&headers("Basic abc")), Err(ApiError::InvalidToken(_))));
        assert!(matches!(extract_bearer(&headers("Bearer   ")), Err(ApiError::InvalidToken(_))));
    }
}
