//! Raw file uploads.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use event_store::EventStore;
use workflow::{FileUpload, StoredFile, UploadPurpose};

use super::AppState;
use crate::auth::CurrentActor;
use crate::error::ApiError;

pub(crate) fn content_type(headers: &HeaderMap) -> String {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string()
}

fn parse_purpose(purpose: &str) -> Result<UploadPurpose, ApiError> {
    serde_json::from_value(serde_json::Value::String(purpose.to_string()))
        .map_err(|_| ApiError::BadRequest(format!("unknown upload purpose: {purpose}")))
}

/// POST /uploads/{purpose}: Stores the request body as-is.
pub async fn upload<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentActor(actor): CurrentActor,
    Path(purpose): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<StoredFile>), ApiError> {
    let purpose = parse_purpose(&purpose)?;
    let file = FileUpload::new(body.to_vec(), content_type(&headers));
    let stored = state.licensing.uploads.upload(&actor, purpose, file).await?;
    Ok((StatusCode::CREATED, Json(stored)))
}
