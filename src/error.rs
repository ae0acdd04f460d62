use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::api::response;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid JSON")]
    InvalidJson,

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Invalid secret")]
    InvalidSecret,

    #[error("All {0} browser sessions are busy, try again later")]
    SessionsExhausted(usize),

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Failed to fetch data: {0}")]
    FetchError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidJson | AppError::InvalidPayload(_) | AppError::InvalidQuery(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::InvalidSecret => StatusCode::FORBIDDEN,
            AppError::SessionsExhausted(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::JobNotFound(_) => StatusCode::NOT_FOUND,
            AppError::FetchError(_) => StatusCode::BAD_GATEWAY,
            AppError::ConfigError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        response::error(self.status(), self.to_string()).into_response()
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::FetchError(err.to_string())
    }
}

impl From<std::env::VarError> for AppError {
    fn from(err: std::env::VarError) -> Self {
        AppError::ConfigError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_are_client_errors() {
        assert_eq!(AppError::InvalidJson.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::InvalidPayload("missing field `url`".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::InvalidQuery("wait: invalid type".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AppError::InvalidSecret.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn exhausted_sessions_report_the_limit() {
        let err = AppError::SessionsExhausted(4);
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(err.to_string().contains("All 4 browser sessions"));
    }
}
