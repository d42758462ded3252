use serde_json::json;
use std::fmt::Display;

use anyhow::Error as anyhowError;
use axum::{http::StatusCode, response::IntoResponse};

#[derive(Debug)]
pub enum AppError {
    // 400 bad request
    BadRequest(anyhowError),
    // 401 missing or invalid credential
    Unauthorized(anyhowError),
    // 403 actor lacks the required relationship to the entity
    Forbidden(anyhowError),
    // 404 not found
    NotFound(anyhowError),
    // 409 entity is terminal or in the wrong status
    InvalidState(anyhowError),
    // 410 scheduled call is past its duration window
    Expired(anyhowError),
    // 500 internal server error
    InternalServerError(anyhowError),
    // 502 video backend or repository failure
    UpstreamFailure(anyhowError),
}

impl Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::BadRequest(e) => write!(f, "BadRequest: {}", e),
            AppError::Unauthorized(e) => write!(f, "Unauthorized: {}", e),
            AppError::Forbidden(e) => write!(f, "Forbidden: {}", e),
            AppError::NotFound(e) => write!(f, "NotFound: {}", e),
            AppError::InvalidState(e) => write!(f, "InvalidState: {}", e),
            AppError::Expired(e) => write!(f, "Expired: {}", e),
            AppError::InternalServerError(e) => write!(f, "InternalServerError: {}", e),
            AppError::UpstreamFailure(e) => write!(f, "UpstreamFailure: {}", e),
        }
    }
}

impl std::error::Error for AppError {}

impl From<anyhowError> for AppError {
    fn from(e: anyhowError) -> Self {
        AppError::InternalServerError(e)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        AppError::UpstreamFailure(anyhow::anyhow!("storage error: {}", e))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, error_message) = match &self {
            Self::BadRequest(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            Self::Unauthorized(err) => (StatusCode::UNAUTHORIZED, err.to_string()),
            Self::Forbidden(err) => (StatusCode::FORBIDDEN, err.to_string()),
            Self::NotFound(err) => (StatusCode::NOT_FOUND, err.to_string()),
            Self::InvalidState(err) => (StatusCode::CONFLICT, err.to_string()),
            Self::Expired(err) => (StatusCode::GONE, err.to_string()),
            Self::InternalServerError(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
            Self::UpstreamFailure(err) => {
                tracing::error!(error = %err, "upstream failure");
                (StatusCode::BAD_GATEWAY, err.to_string())
            }
        };

        #[cfg(debug_assertions)]
        let error_response = json!({
            "error": {
                "message": error_message,
                "type": format!("{:?}", self),
            }
        });

        #[cfg(not(debug_assertions))]
        let error_response = json!({
            "error": {
                "message": match status {
                    StatusCode::INTERNAL_SERVER_ERROR | StatusCode::BAD_GATEWAY => {
                        status.canonical_reason().unwrap_or("An error occurred").to_string()
                    }
                    _ => error_message,
                },
            }
        });
        (status, axum::Json(error_response)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

/// Runs a non-fatal side effect: the error is logged and swallowed so the
/// primary operation still succeeds.
pub fn best_effort<T>(operation: &str, result: AppResult<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(operation, error = %e, "non-fatal side effect failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_taxonomy() {
        let cases = [
            (AppError::NotFound(anyhow::anyhow!("x")), StatusCode::NOT_FOUND),
            (AppError::Forbidden(anyhow::anyhow!("x")), StatusCode::FORBIDDEN),
            (AppError::InvalidState(anyhow::anyhow!("x")), StatusCode::CONFLICT),
            (AppError::Expired(anyhow::anyhow!("x")), StatusCode::GONE),
            (AppError::UpstreamFailure(anyhow::anyhow!("x")), StatusCode::BAD_GATEWAY),
        ];
        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }

    #[test]
    fn best_effort_swallows_errors() {
        let failed: AppResult<u8> = Err(AppError::UpstreamFailure(anyhow::anyhow!("down")));
        assert_eq!(best_effort("history", failed), None);
        assert_eq!(best_effort("history", Ok::<_, AppError>(7)), Some(7));
    }
}
