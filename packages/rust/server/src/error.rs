//! Mapping from [`ChargenError`] to HTTP responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::{error, warn};

use chargen_shared::ChargenError;

/// Handler error: renders as `{ "error": message }`.
#[derive(Debug)]
pub struct ApiError(pub ChargenError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            e if e.is_client_error() => StatusCode::BAD_REQUEST,
            ChargenError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ChargenError> for ApiError {
    fn from(err: ChargenError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self.0, "request failed");
        } else {
            warn!(error = %self.0, %status, "request rejected");
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(
            ApiError(ChargenError::missing_input("prompt")).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError(ChargenError::MissingCredential).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError(ChargenError::NotFound("backup x".into())).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError(ChargenError::malformed("no JSON object found")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError(ChargenError::UpstreamGenerationFailure("402".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
