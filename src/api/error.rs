//! Maps [`Error`] onto HTTP responses.

use crate::errors::Error;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

impl Error {
    /// HTTP status a client sees for this error
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::NoMembership { .. }
            | Self::OrderNotFound { .. }
            | Self::CheckInNotFound { .. }
            | Self::RuleNotFound { .. } => StatusCode::NOT_FOUND,
            Self::MembershipInactive { .. } | Self::InvalidOrderState { .. } => {
                StatusCode::CONFLICT
            }
            Self::InvalidAmount { .. }
            | Self::InvalidRate { .. }
            | Self::Validation { .. }
            | Self::Webhook { .. } => StatusCode::BAD_REQUEST,
            Self::Database(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Config { .. }
            | Self::Io(_)
            | Self::EnvVar(_)
            | Self::Framework(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
            match status {
                StatusCode::SERVICE_UNAVAILABLE => "Storage temporarily unavailable, retry later",
                _ => "Unexpected server error",
            }
            .to_string()
        } else {
            self.to_string()
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
