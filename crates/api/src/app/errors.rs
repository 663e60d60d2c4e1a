//! Response envelope and the API error type.
//!
//! Every business outcome is rendered as `{code, msg, data}` with HTTP 200;
//! the outcome lives in `code`.

use std::borrow::Cow;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

use roster_auth::{AuthzError, PasswordError, TokenError};
use roster_core::DomainError;
use roster_infra::StoreError;

#[derive(Debug, Clone, Serialize)]
pub struct Envelope<T> {
    pub code: u16,
    pub msg: String,
    pub data: T,
}

/// Successful handler output.
#[derive(Debug)]
pub struct ApiResponse<T> {
    code: StatusCode,
    msg: Cow<'static, str>,
    data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            code: StatusCode::OK,
            msg: Cow::Borrowed("success"),
            data,
        }
    }

    pub fn created(data: T) -> Self {
        Self {
            code: StatusCode::CREATED,
            msg: Cow::Borrowed("success"),
            data,
        }
    }

    pub fn with_msg(mut self, msg: impl Into<Cow<'static, str>>) -> Self {
        self.msg = msg.into();
        self
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        envelope(self.code, self.msg, self.data)
    }
}

pub type ApiResult<T> = Result<ApiResponse<T>, ApiError>;

/// Envelope code of a rendered response, kept for the access log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutcomeCode(pub u16);

fn envelope<T: Serialize>(code: StatusCode, msg: impl Into<String>, data: T) -> Response {
    let mut response = (
        StatusCode::OK,
        Json(Envelope {
            code: code.as_u16(),
            msg: msg.into(),
            data,
        }),
    )
        .into_response();
    response.extensions_mut().insert(OutcomeCode(code.as_u16()));
    response
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("incorrect username or password")]
    InvalidCredentials,

    #[error("{0}")]
    InvalidToken(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("method not allowed")]
    MethodNotAllowed,

    #[error("{0}")]
    Conflict(String),

    #[error("{message}")]
    Validation {
        message: String,
        errors: Vec<FieldError>,
    },

    /// Detail is logged, never sent to the client.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn not_found(what: &str) -> Self {
        Self::NotFound(format!("{what} not found"))
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        let error = FieldError::new(field, message);
        Self::Validation {
            message: format!("invalid {}: {}", error.field, error.message),
            errors: vec![error],
        }
    }

    pub fn code(&self) -> StatusCode {
        match self {
            ApiError::InvalidCredentials | ApiError::InvalidToken(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Validation { .. } => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.code();
        match self {
            ApiError::Validation { message, errors } => {
                envelope(code, message, json!({ "errors": errors }))
            }
            ApiError::Internal(detail) => {
                tracing::error!(error = %detail, "request failed");
                envelope(code, "internal server error", Value::Null)
            }
            other => envelope(code, other.to_string(), Value::Null),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        let mut errors: Vec<FieldError> = err
            .field_errors()
            .into_iter()
            .flat_map(|(field, list)| {
                list.iter().map(move |e| {
                    let message = e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string());
                    FieldError::new(field.to_string(), message)
                })
            })
            .collect();
        errors.sort_by(|a, b| a.field.cmp(&b.field));

        let message = match errors.first() {
            Some(first) => format!("invalid {}: {}", first.field, first.message),
            None => "validation failed".to_string(),
        };
        ApiError::Validation { message, errors }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => ApiError::not_found(what),
            StoreError::Conflict(msg) => ApiError::Conflict(msg),
            StoreError::Database(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(msg) => ApiError::Validation {
                message: msg.clone(),
                errors: vec![FieldError::new("body", msg)],
            },
            DomainError::InvalidId(msg) => ApiError::validation("id", msg),
        }
    }
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Signing(msg) => ApiError::Internal(msg),
            TokenError::Expired => ApiError::InvalidToken("token has expired".to_string()),
            _ => ApiError::InvalidToken("could not validate credentials".to_string()),
        }
    }
}

impl From<AuthzError> for ApiError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::Forbidden(msg) => ApiError::Forbidden(msg),
        }
    }
}

impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        ApiError::Internal(err.to_string())
    }
}
