//! Mapping from serve errors to HTTP responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use searchlight_core::streaming::range_not_satisfiable;
use searchlight_core::{ErrorKind, ServeError};
use serde_json::json;
use tracing::{debug, error, warn};

/// Handler error wrapper; renders as `{"error": "..."}` with a fixed status.
#[derive(Debug)]
pub struct ApiError(pub ServeError);

impl From<ServeError> for ApiError {
    fn from(err: ServeError) -> Self {
        ApiError(err)
    }
}

/// Status code for each failure category.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidArgument => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Upstream => StatusCode::BAD_GATEWAY,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;

        if let ServeError::InvalidRange { file_size, .. } = &err {
            debug!("{}", err);
            return range_not_satisfiable(*file_size);
        }

        let status = status_for(err.kind());
        match err.kind() {
            ErrorKind::Internal => error!("{}", err),
            ErrorKind::Upstream | ErrorKind::Unavailable => warn!("{}", err),
            ErrorKind::InvalidArgument | ErrorKind::NotFound => debug!("{}", err),
        }

        (status, Json(json!({ "error": err.user_message() }))).into_response()
    }
}
