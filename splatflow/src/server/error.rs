use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::errors::{SplatflowError, PIPELINE_ERROR_CODE};

/// Error type of every HTTP handler.
///
/// All variants render as `{"error_code": 1001, "detail": <message>}`; only
/// the status code differs.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// A pipeline, storage or workspace failure.
    #[error(transparent)]
    Pipeline(#[from] SplatflowError),

    /// The request body could not be read.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// A failure outside the pipeline, such as a crashed job task.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience type alias for handler return values.
pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    /// HTTP status for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Pipeline(SplatflowError::WorkspaceBusy(_)) => StatusCode::CONFLICT,
            Self::Pipeline(SplatflowError::InvalidJob(_)) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Pipeline(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = self.to_string();
        if status.is_server_error() {
            let kind = match &self {
                Self::Pipeline(err) => err.kind(),
                Self::BadRequest(_) => "BadRequest",
                Self::Internal(_) => "Internal",
            };
            tracing::error!(kind, error = %detail, "Request failed");
        } else {
            tracing::warn!(status = status.as_u16(), error = %detail, "Request rejected");
        }

        let body = json!({
            "error_code": PIPELINE_ERROR_CODE,
            "detail": detail,
        });
        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Stage;
    use http_body_util::BodyExt;
    use std::path::PathBuf;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_stage_failure_maps_to_500_with_code() {
        let err = ApiError::from(SplatflowError::RetryExhausted {
            attempts: 3,
            last: Box::new(SplatflowError::stage_execution(
                Stage::SceneReconstruction,
                "python",
                Some(1),
            )),
        });
        let message = err.to_string();
        let response = err.into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        assert_eq!(json["error_code"], 1001);
        assert_eq!(json["detail"], message);
        assert!(message.contains("after 3 attempt(s)"));
    }

    #[tokio::test]
    async fn test_busy_workspace_maps_to_409() {
        let response =
            ApiError::from(SplatflowError::WorkspaceBusy(PathBuf::from("/lessons/a_1"))).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(body_json(response).await["error_code"], 1001);
    }

    #[test]
    fn test_invalid_input_maps_to_400() {
        assert_eq!(
            ApiError::from(SplatflowError::invalid_job("lesson_id must not be empty")).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::BadRequest("missing field".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::from(SplatflowError::storage("bucket unreachable")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
