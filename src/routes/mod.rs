// Route exports
pub mod matches;
pub mod viewer;

use crate::models::ErrorResponse;
use actix_web::{error, http::StatusCode, web, HttpRequest, HttpResponse};

pub use matches::{AppState, ListLimits};
pub use viewer::{AuthenticatedViewer, ViewerAuth};

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .configure(matches::configure),
    );
}

/// JSON error body for payloads actix rejects before a handler runs
#[derive(Debug)]
pub struct PayloadError {
    pub error: &'static str,
    pub message: String,
}

impl std::fmt::Display for PayloadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error, self.message)
    }
}

impl std::error::Error for PayloadError {}

impl error::ResponseError for PayloadError {
    fn status_code(&self) -> StatusCode {
        StatusCode::BAD_REQUEST
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::BadRequest().json(ErrorResponse {
            error: self.error.to_string(),
            message: self.message.clone(),
            status_code: 400,
            retryable: false,
        })
    }
}

/// Handle JSON payload errors
pub fn handle_json_payload_error(err: error::JsonPayloadError, req: &HttpRequest) -> actix_web::Error {
    tracing::info!("JSON payload error on {}: {}", req.path(), err);
    PayloadError {
        error: "invalid_json",
        message: format!("Invalid JSON: {}", err),
    }
    .into()
}

/// Handle query payload errors
pub fn handle_query_payload_error(err: error::QueryPayloadError, req: &HttpRequest) -> actix_web::Error {
    tracing::info!("Query error on {}: {}", req.path(), err);
    PayloadError {
        error: "invalid_query",
        message: format!("Invalid query: {}", err),
    }
    .into()
}

/// Handle path parameter errors
pub fn handle_path_error(err: error::PathError, req: &HttpRequest) -> actix_web::Error {
    tracing::info!("Path error on {}: {}", req.path(), err);
    PayloadError {
        error: "invalid_path",
        message: format!("Invalid path: {}", err),
    }
    .into()
}
