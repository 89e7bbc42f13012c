use lambda_http::http::StatusCode;

/// Errors raised while serving a `/users` request
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Invalid form data: {0}")]
    Form(String),

    #[error("Database error: {0}")]
    Persistence(#[from] sqlx::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::Form(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Persistence(_) | ApiError::Storage(_) | ApiError::Config(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Client errors are reported with their own message, everything else
    /// gets wrapped in a generic failure envelope.
    pub fn is_client_error(&self) -> bool {
        self.status().is_client_error()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::Validation("Invalid user ID".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Form("missing boundary".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::NotFound("User with ID 7 not found".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Storage("bucket gone".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::Persistence(sqlx::Error::RowNotFound).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_validation_message_is_verbatim() {
        let err = ApiError::Validation("Invalid user ID".into());
        assert_eq!(err.to_string(), "Invalid user ID");
        assert!(err.is_client_error());
        assert!(!ApiError::Storage("x".into()).is_client_error());
    }
}
