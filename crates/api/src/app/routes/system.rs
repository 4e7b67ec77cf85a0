use axum::http::{StatusCode, Uri};
use axum::response::Response;

use crate::app::errors::json_error;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn not_found(uri: Uri) -> Response {
    tracing::debug!(path = %uri.path(), "unknown path");
    json_error(StatusCode::NOT_FOUND, "Invalid path")
}
