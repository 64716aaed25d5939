//! Public card verification.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use event_store::EventStore;
use workflow::VerificationReport;

use super::AppState;
use crate::error::ApiError;

/// GET /verify/{barcode}: No identity required.
pub async fn verify<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(barcode): Path<String>,
) -> Result<Json<VerificationReport>, ApiError> {
    Ok(Json(state.licensing.verification.verify(&barcode).await?))
}
