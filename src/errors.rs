use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

pub const MISSING_PARAMETERS: &str = "Missing required parameters.";
pub const CROSS_BUCKET_RENAME: &str = "Cross-bucket renaming is not supported.";

/// Error response of a handler.
///
/// The body is always `{"error": message}`; `echo_status` additionally adds a
/// `status` field, which is how the browser UI learns the backend status for
/// mutating operations.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
    pub echo_status: Option<u16>,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
            echo_status: None,
        }
    }

    /// 400 for missing or invalid client input.
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    /// Failure reported with HTTP 200, as the read-only endpoints always have.
    pub fn reported(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::OK, msg)
    }

    /// HTTP 200 whose body carries `status`.
    pub fn in_band(status: u16, msg: impl Into<String>) -> Self {
        Self {
            echo_status: Some(status),
            ..Self::reported(msg)
        }
    }

    /// Forward a storage backend error: HTTP status and body both carry `status`.
    pub fn backend(status: u16, msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            message: msg.into(),
            echo_status: Some(status),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = match self.echo_status {
            Some(status) => json!({
                "error": self.message,
                "status": status
            }),
            None => json!({ "error": self.message }),
        };

        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_status_outside_http_range_falls_back_to_500() {
        let err = AppError::backend(42, "odd");
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.echo_status, Some(42));
    }

    #[test]
    fn in_band_keeps_http_200() {
        let err = AppError::in_band(400, MISSING_PARAMETERS);
        assert_eq!(err.status, StatusCode::OK);
        assert_eq!(err.echo_status, Some(400));
    }
}
