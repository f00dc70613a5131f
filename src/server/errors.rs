use std::fmt;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::status::StatusError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("The server encountered an internal error")]
    Internal,
}

impl AppError {
    /// Logs the underlying failure and hides it from the caller.
    pub fn internal<E: fmt::Debug>(e: E) -> Self {
        tracing::error!("Service failure: {e:?}");
        AppError::Internal
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            AppError::BadRequest(_) => "bad_request",
            AppError::NotFound(_) => "not_found",
            AppError::Internal => "internal_error",
        }
    }
}

impl From<StatusError> for AppError {
    fn from(error: StatusError) -> Self {
        match error {
            StatusError::InvalidSerial(e) => AppError::BadRequest(e.to_string()),
            StatusError::Store(e) => AppError::internal(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": self.code(),
            "message": self.to_string(),
        });
        (self.status_code(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crl::SerialError;
    use crate::store::StoreError;

    #[test]
    fn status_errors_map_to_http() {
        let bad: AppError = StatusError::InvalidSerial(SerialError::Empty).into();
        assert_eq!(bad.into_response().status(), StatusCode::BAD_REQUEST);

        let internal: AppError = StatusError::Store(StoreError::msg("pool timed out")).into();
        assert!(matches!(internal, AppError::Internal));
        assert_eq!(
            internal.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
