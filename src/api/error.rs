use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde::Serialize;
use tracing::error;

use crate::errors::LinkgateError;

/// JSON error body shared by every endpoint
#[derive(Debug, Serialize)]
pub struct ErrorBody<'a> {
    pub code: &'a str,
    pub error: &'a str,
    pub message: &'a str,
}

impl ResponseError for LinkgateError {
    fn status_code(&self) -> StatusCode {
        match self {
            LinkgateError::NotFound(_) => StatusCode::NOT_FOUND,
            LinkgateError::Conflict(_) => StatusCode::CONFLICT,
            LinkgateError::Validation(_) => StatusCode::BAD_REQUEST,
            LinkgateError::Exhausted(_) => StatusCode::SERVICE_UNAVAILABLE,
            LinkgateError::Storage(_) | LinkgateError::Config(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }
        HttpResponse::build(status).json(ErrorBody {
            code: self.code(),
            error: self.error_type(),
            message: self.message(),
        })
    }
}
