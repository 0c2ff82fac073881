use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error};

/// JSON body of every error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Error, Debug)]
pub enum ApiError {
    /// A required query parameter was absent or empty. Holds the display name.
    #[error("{0} query is required")]
    MissingQuery(&'static str),

    #[error("Recipe not found")]
    NotFound,

    /// Store or transport failure. The cause is logged, never sent.
    #[error("Database error")]
    Database(anyhow::Error),
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        ApiError::Database(e)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingQuery(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            ApiError::Database(e) => error!(error = ?e, "database error"),
            other => debug!(error = %other, "request rejected"),
        }
        let body = ErrorBody {
            error: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_error_hides_cause() {
        let err = ApiError::from(anyhow::anyhow!("connection refused on 10.0.0.3"));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "Database error");
    }

    #[test]
    fn missing_query_names_parameter() {
        let err = ApiError::MissingQuery("Cuisine");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "Cuisine query is required");
    }

    #[test]
    fn not_found_is_404() {
        let res = ApiError::NotFound.into_response();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }
}
