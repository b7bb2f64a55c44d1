//! Failure envelope for the HTTP layer

use crate::api::FailureResponse;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use mathspace_core::{PipelineError, PipelineFailure, PipelineRunResult};

const INTERNAL_ERROR: &str = "internal error";

/// An error response: status code plus the JSON failure envelope
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: FailureResponse,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: FailureResponse::message(message),
        }
    }

    /// Render loop ran out of attempts
    pub fn exhausted(result: &PipelineRunResult) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: FailureResponse {
                error: format!("render failed after {} attempt(s)", result.attempts),
                details: result.outcome.diagnostic().map(str::to_string),
                critique: Some(result.critique.clone()),
                intent_classification: result.intent.clone(),
            },
        }
    }
}

impl From<PipelineFailure> for ApiError {
    fn from(failure: PipelineFailure) -> Self {
        let status = if failure.error.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };

        let (error, details) = match &failure.error {
            PipelineError::Stage(stage_failure) => (
                format!("{} stage failed", stage_failure.stage),
                Some(stage_failure.to_string()),
            ),
            PipelineError::Internal(details) => {
                tracing::error!("Internal pipeline error: {}", details);
                (INTERNAL_ERROR.to_string(), None)
            }
            other => (other.to_string(), None),
        };

        Self {
            status,
            body: FailureResponse {
                error,
                details,
                critique: failure.critique,
                intent_classification: failure.intent,
            },
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(error: PipelineError) -> Self {
        PipelineFailure::bare(error).into()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mathspace_core::{FailureReason, Stage, StageFailure};

    #[test]
    fn empty_instruction_maps_to_bad_request() {
        let error = ApiError::from(PipelineError::InvalidInstruction);
        assert_eq!(error.status, StatusCode::BAD_REQUEST);
        assert_eq!(error.body.error, "instruction must not be empty");
    }

    #[test]
    fn stage_failure_keeps_critique() {
        let failure = PipelineFailure::bare(StageFailure::new(
            Stage::Reviser,
            FailureReason::Timeout,
            "request timed out after 120s",
        ))
        .with_critique(Some("[Overall Rating] WARN".to_string()));

        let error = ApiError::from(failure);
        assert_eq!(error.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error.body.error, "reviser stage failed");
        assert!(error.body.details.unwrap().contains("timed out"));
        assert_eq!(error.body.critique.as_deref(), Some("[Overall Rating] WARN"));
    }

    #[test]
    fn internal_details_are_not_leaked() {
        let error = ApiError::from(PipelineError::Internal("secret path /etc".to_string()));
        assert_eq!(error.body.error, INTERNAL_ERROR);
        assert!(error.body.details.is_none());
    }
}
