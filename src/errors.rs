use crate::{
    models::request::RequestError,
    services::{access::Denied, kv_store::StorageError, object_service::ServiceError},
};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

pub const INVALID_MAIN_KEY: &str = "INVALID_MAIN_KEY";
pub const INVALID_ACCESS_KEY: &str = "INVALID_ACCESS_KEY";
pub const OBJECT_NOT_FOUND: &str = "OBJECT_NOT_FOUND";
pub const INVALID_REQUEST: &str = "INVALID_REQUEST";
pub const STORAGE_ERROR: &str = "STORAGE_ERROR";

/// Error returned to HTTP clients: a stable code plus an optional message.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: Option<String>,
}

impl AppError {
    pub fn new(status: StatusCode, code: &'static str) -> Self {
        Self {
            status,
            code,
            message: None,
        }
    }

    pub fn with_message(mut self, msg: impl Into<String>) -> Self {
        self.message = Some(msg.into());
        self
    }

    /// Shortcut for a 400 malformed request.
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, INVALID_REQUEST).with_message(msg)
    }

    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, OBJECT_NOT_FOUND)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) => write!(f, "{}: {}", self.code, message),
            None => f.write_str(self.code),
        }
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = match self.message {
            Some(message) => json!({ "error": self.code, "message": message }),
            None => json!({ "error": self.code }),
        };

        (self.status, Json(body)).into_response()
    }
}

impl From<Denied> for AppError {
    fn from(denied: Denied) -> Self {
        let code = match denied {
            Denied::MainKey => INVALID_MAIN_KEY,
            Denied::AccessKey => INVALID_ACCESS_KEY,
        };
        AppError::new(StatusCode::UNAUTHORIZED, code)
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        let status = if err.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            tracing::error!("storage failure: {}", err);
            StatusCode::INTERNAL_SERVER_ERROR
        };
        AppError::new(status, STORAGE_ERROR).with_message(err.to_string())
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Denied(denied) => denied.into(),
            ServiceError::NotFound(_) => AppError::not_found(),
            ServiceError::Storage(err) => err.into(),
        }
    }
}

impl From<RequestError> for AppError {
    fn from(err: RequestError) -> Self {
        AppError::invalid_request(err.to_string())
    }
}
