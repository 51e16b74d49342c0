// SPDX-License-Identifier: MIT OR Apache-2.0
//! REST error rendering: maps [`AgentError`]'s broad [`ErrorKind`] onto an
//! HTTP status per §7, rendering only `message` — stack traces and
//! `context` stay in the structured log, never the response body.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use zka_error::{AgentError, ErrorKind};

/// Thin `IntoResponse` wrapper around [`AgentError`].
#[derive(Debug)]
pub struct ApiError(pub AgentError);

impl From<AgentError> for ApiError {
    fn from(err: AgentError) -> Self {
        Self(err)
    }
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::PaymentRequired => StatusCode::PAYMENT_REQUIRED,
        ErrorKind::InvalidState => StatusCode::BAD_REQUEST,
        ErrorKind::Transient => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Permanent => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(self.0.kind);
        let body = Json(json!({
            "error": {
                "code": self.0.code,
                "message": self.0.message,
            }
        }));
        (status, body).into_response()
    }
}
