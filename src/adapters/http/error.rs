use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::{error, warn};

use crate::application::dto::ErrorResponse;
use crate::domain::errors::{DomainError, ErrorClass};

/// The single place where domain errors become HTTP responses.
#[derive(Debug)]
pub struct ApiError {
    pub error: DomainError,
    pub debug: bool,
}

pub fn status_for(error: &DomainError) -> StatusCode {
    match error.class() {
        ErrorClass::Client => StatusCode::BAD_REQUEST,
        ErrorClass::Server => StatusCode::INTERNAL_SERVER_ERROR,
        // nginx's "client closed request"
        ErrorClass::Cancelled => StatusCode::from_u16(499).unwrap_or(StatusCode::BAD_REQUEST),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.error);
        if status.is_server_error() {
            error!(code = self.error.code(), error = %self.error, "request failed");
        } else {
            warn!(code = self.error.code(), error = %self.error, "request rejected");
        }

        let body = ErrorResponse {
            error: self.error.public_message(),
            code: self.error.code().to_string(),
            details: self.debug.then(|| self.error.to_string()),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_error_class() {
        assert_eq!(status_for(&DomainError::InvalidConfidence("1.5".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(&DomainError::FetchFailed("timeout".into())), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_for(&DomainError::InferenceFailed("boom".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_for(&DomainError::ModelNotFound { model: "m".into(), requested: true }),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_for(&DomainError::Cancelled).as_u16(), 499);
    }
}
