use thiserror::Error;

/// Error taxonomy shared by the core pipeline and the web layer.
///
/// Core operations are pure apart from the store access they perform; they
/// never retry or suppress. A storage failure aborts the whole request and
/// surfaces as `Internal` with no partial results.
#[derive(Debug, Error)]
pub enum ApiError {
    /// No or invalid caller identity
    #[error("Unauthorized")]
    Unauthorized,

    /// Caller is authenticated but lacks access to the specific resource
    #[error("Forbidden")]
    Forbidden,

    /// Dataset or row absent, or not visible to the caller
    #[error("Not found")]
    NotFound,

    /// Malformed request data (bad filter JSON, non-positive page, ...)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Storage or other unexpected failure
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        ApiError::InvalidInput(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        ApiError::Internal(msg.into())
    }
}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        ApiError::Internal(err.to_string())
    }
}

#[cfg(feature = "web")]
impl axum::response::IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;

        let status = match &self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = axum::Json(serde_json::json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}
