use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

/// Every failure a request can end in. Input and access errors carry a
/// message for the client; internal errors are logged and hidden.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Input(String),

    #[error("{0}")]
    Access(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn input(msg: impl Into<String>) -> Self {
        ApiError::Input(msg.into())
    }

    pub fn access(msg: impl Into<String>) -> Self {
        ApiError::Access(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Input(_) => StatusCode::BAD_REQUEST,
            ApiError::Access(_) => StatusCode::FORBIDDEN,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<rusqlite::Error> for ApiError {
    fn from(e: rusqlite::Error) -> Self {
        ApiError::Internal(e.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            ApiError::Internal(e) => {
                error!("Internal error: {:#}", e);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = serde_json::json!({
            "code": status.as_u16(),
            "name": "System Error",
            "message": message,
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        assert_eq!(ApiError::input("x").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::access("x").status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            ApiError::from(anyhow::anyhow!("boom")).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
