//! Error types for the task API client.
//!
//! # Design
//! `ApiError` is what the HTTP layer and the task client return; callers of
//! task operations get it raw. Auth operations fold it into `AuthFailure`,
//! which carries a human-readable message plus whatever payload the server
//! sent, so login and registration failures share one shape.

use serde_json::Value;
use thiserror::Error;

/// Errors returned by requests made through `ApiClient`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The server could not be reached or the connection broke mid-response.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The server returned 400 with field-level errors.
    #[error("validation failed: {body}")]
    Validation { body: Value },

    /// The server returned 401 and a token refresh did not resolve it.
    #[error("not authorized")]
    Unauthorized { body: String },

    /// The server returned 404.
    #[error("resource not found")]
    NotFound,

    /// Any other non-2xx status.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The response body could not be deserialized into the expected type.
    #[error("deserialization failed: {0}")]
    Deserialization(String),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ApiError {
    /// HTTP status behind this error, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Validation { .. } => Some(400),
            ApiError::Unauthorized { .. } => Some(401),
            ApiError::NotFound => Some(404),
            ApiError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// The server's error payload as JSON, when it sent one.
    pub fn payload(&self) -> Option<Value> {
        match self {
            ApiError::Validation { body } => Some(body.clone()),
            ApiError::Unauthorized { body } | ApiError::Http { body, .. } => {
                serde_json::from_str(body).ok()
            }
            _ => None,
        }
    }
}

/// Failures of the persistent token store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("token store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("token store is not valid JSON: {0}")]
    Format(#[from] serde_json::Error),
}

/// Outcome of a failed login or registration.
///
/// `message` is always fit for display. `details` holds the raw server
/// payload, un-normalized, when the server sent JSON.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct AuthFailure {
    pub message: String,
    pub details: Option<Value>,
}

pub(crate) const LOGIN_FALLBACK: &str = "Login failed";
pub(crate) const REGISTER_FALLBACK: &str = "Registration failed";
pub(crate) const PROFILE_FALLBACK: &str = "Could not load profile";

impl AuthFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            details: None,
        }
    }

    /// Uses the server's `detail` string when present.
    pub(crate) fn from_login_error(err: &ApiError) -> Self {
        let details = err.payload();
        let message = details
            .as_ref()
            .and_then(|payload| payload.get("detail"))
            .and_then(Value::as_str)
            .unwrap_or(LOGIN_FALLBACK)
            .to_string();
        Self { message, details }
    }

    /// Summarizes the first field error but keeps the whole payload.
    pub(crate) fn from_registration_error(err: &ApiError) -> Self {
        let details = err.payload();
        let message = details
            .as_ref()
            .and_then(first_field_error)
            .unwrap_or_else(|| REGISTER_FALLBACK.to_string());
        Self { message, details }
    }
}

/// Picks a readable line out of a `{"field": ["msg", ..]}` style payload.
fn first_field_error(payload: &Value) -> Option<String> {
    if let Some(detail) = payload.get("detail").and_then(Value::as_str) {
        return Some(detail.to_string());
    }
    let fields = payload.as_object()?;
    fields.iter().find_map(|(field, value)| {
        let text = match value {
            Value::String(text) => Some(text.as_str()),
            Value::Array(items) => items.first().and_then(Value::as_str),
            _ => None,
        }?;
        if field == "non_field_errors" {
            Some(text.to_string())
        } else {
            Some(format!("{field}: {text}"))
        }
    })
}

pub type ApiResult<T> = Result<T, ApiError>;
pub type StoreResult<T> = Result<T, StoreError>;
