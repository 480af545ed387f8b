//! Mapping from engine errors to HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::error;

use reviewer_core::AssignmentError;

use super::types::{ErrorBody, ErrorDetail};

/// An engine error on its way out of a handler.
#[derive(Debug)]
pub struct ApiError(pub AssignmentError);

impl From<AssignmentError> for ApiError {
    fn from(err: AssignmentError) -> Self {
        Self(err)
    }
}

impl ApiError {
    /// Status code and stable error code for this error.
    pub fn classify(&self) -> (StatusCode, &'static str) {
        match &self.0 {
            AssignmentError::TeamExists(_) => (StatusCode::BAD_REQUEST, "TEAM_EXISTS"),
            AssignmentError::NotFound { .. } | AssignmentError::NoTeam(_) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND")
            }
            AssignmentError::PrExists(_) => (StatusCode::CONFLICT, "PR_EXISTS"),
            AssignmentError::InvalidState(_) => (StatusCode::CONFLICT, "PR_MERGED"),
            AssignmentError::NotAssigned { .. } => (StatusCode::CONFLICT, "NOT_ASSIGNED"),
            AssignmentError::NoCandidate(_) => (StatusCode::CONFLICT, "NO_CANDIDATE"),
            AssignmentError::Repository(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.classify();
        let message = match &self.0 {
            AssignmentError::Repository(e) => {
                error!("Repository failure: {}", e);
                "internal storage error".to_string()
            }
            other => other.to_string(),
        };

        (
            status,
            Json(ErrorBody {
                error: ErrorDetail { code, message },
            }),
        )
            .into_response()
    }
}
