use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use thiserror::Error;

use crate::fare_models::ApiResponse;

#[derive(Error, Debug)]
pub enum FareError {
    #[error("{0}")]
    Validation(String),

    #[error("Invalid admin credentials")]
    Unauthorized,

    #[error("{0}")]
    UnsupportedFormat(String),

    #[error("No valid routes found. Please check your Excel file format.")]
    EmptyResult,

    #[error("{0}")]
    NotFound(String),

    #[error("File error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{message}")]
    Internal {
        message: String,
        details: Option<String>,
    },
}

impl FareError {
    /// A 500 whose message is safe to show; `details` is only set for admin-facing calls.
    pub fn internal(message: impl Into<String>) -> Self {
        FareError::Internal {
            message: message.into(),
            details: None,
        }
    }

    pub fn internal_with_details(message: impl Into<String>, details: impl ToString) -> Self {
        FareError::Internal {
            message: message.into(),
            details: Some(details.to_string()),
        }
    }
}

impl ResponseError for FareError {
    fn status_code(&self) -> StatusCode {
        match self {
            FareError::Validation(_) => StatusCode::BAD_REQUEST,
            FareError::UnsupportedFormat(_) => StatusCode::BAD_REQUEST,
            FareError::EmptyResult => StatusCode::BAD_REQUEST,
            FareError::Unauthorized => StatusCode::UNAUTHORIZED,
            FareError::NotFound(_) => StatusCode::NOT_FOUND,
            FareError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            FareError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
            FareError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        // Raw I/O and JSON failures never reach the client verbatim.
        let body = match self {
            FareError::Io(_) | FareError::Json(_) => {
                ApiResponse::<()>::error("Internal server error".to_string())
            }
            FareError::Internal {
                message,
                details: Some(details),
            } => ApiResponse::<()>::error(message.clone()).with_details(details.clone()),
            other => ApiResponse::<()>::error(other.to_string()),
        };

        HttpResponse::build(self.status_code()).json(body)
    }
}

pub type Result<T> = std::result::Result<T, FareError>;
