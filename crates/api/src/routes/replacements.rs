//! Lost-card replacement endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{AggregateId, UserId};
use domain::{Aggregate, Replacement, RequestStatus};
use event_store::EventStore;
use projections::ReplacementSummary;
use serde::Serialize;
use workflow::{ReplacementApplication, ReplacementApproval};

use super::renewals::RejectRequest;
use super::{AppState, parse_aggregate_id};
use crate::auth::CurrentActor;
use crate::error::ApiError;

#[derive(Serialize)]
pub struct ReplacementResponse {
    pub id: Option<AggregateId>,
    pub license_id: Option<AggregateId>,
    pub user_id: Option<UserId>,
    pub tracking_code: String,
    /// Returned to the requesting citizen so they can quote it at payment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_code: Option<String>,
    pub police_report: Option<String>,
    pub status: RequestStatus,
    pub old_barcode: Option<String>,
    pub new_barcode: Option<String>,
    pub officer_notes: Option<String>,
    pub requested_at: Option<DateTime<Utc>>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

impl ReplacementResponse {
    fn new(replacement: &Replacement, with_payment_code: bool) -> Self {
        Self {
            id: replacement.id(),
            license_id: replacement.license_id(),
            user_id: replacement.user_id(),
            tracking_code: replacement.tracking_code().to_string(),
            payment_code: with_payment_code.then(|| replacement.payment_code().to_string()),
            police_report: replacement.police_report().map(str::to_string),
            status: replacement.status(),
            old_barcode: replacement.old_barcode().map(str::to_string),
            new_barcode: replacement.new_barcode().map(str::to_string),
            officer_notes: replacement.officer_notes().map(str::to_string),
            requested_at: replacement.requested_at(),
            reviewed_at: replacement.reviewed_at(),
        }
    }
}

/// POST /replacements
pub async fn apply<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentActor(actor): CurrentActor,
    Json(application): Json<ReplacementApplication>,
) -> Result<(StatusCode, Json<ReplacementResponse>), ApiError> {
    let replacement = state
        .licensing
        .replacements
        .apply(&actor, application)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(ReplacementResponse::new(&replacement, true)),
    ))
}

/// GET /replacements/mine
pub async fn mine<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentActor(actor): CurrentActor,
) -> Result<Json<Vec<ReplacementSummary>>, ApiError> {
    Ok(Json(state.licensing.queries.my_replacements(&actor).await?))
}

/// GET /replacements/pending
pub async fn pending<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentActor(actor): CurrentActor,
) -> Result<Json<Vec<ReplacementSummary>>, ApiError> {
    Ok(Json(
        state.licensing.queries.pending_replacements(&actor).await?,
    ))
}

/// POST /replacements/{id}/approve
pub async fn approve<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
    Json(approval): Json<ReplacementApproval>,
) -> Result<Json<ReplacementResponse>, ApiError> {
    let replacement_id = parse_aggregate_id(&id)?;
    let replacement = state
        .licensing
        .replacements
        .approve(&actor, replacement_id, approval)
        .await?;
    Ok(Json(ReplacementResponse::new(&replacement, false)))
}

/// POST /replacements/{id}/reject
pub async fn reject<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
    Json(req): Json<RejectRequest>,
) -> Result<Json<ReplacementResponse>, ApiError> {
    let replacement_id = parse_aggregate_id(&id)?;
    let replacement = state
        .licensing
        .replacements
        .reject(&actor, replacement_id, req.notes)
        .await?;
    Ok(Json(ReplacementResponse::new(&replacement, false)))
}
