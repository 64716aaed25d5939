//! Renewal request endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, NaiveDate, Utc};
use common::{AggregateId, UserId};
use domain::{Aggregate, ExamResult, Money, Renewal, RequestStatus};
use event_store::EventStore;
use projections::RenewalSummary;
use serde::{Deserialize, Serialize};
use workflow::RenewalApplication;

use super::{AppState, parse_aggregate_id};
use crate::auth::CurrentActor;
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct StatusFilter {
    pub status: Option<RequestStatus>,
}

#[derive(Deserialize)]
pub struct VisionScheduleRequest {
    pub scheduled_date: DateTime<Utc>,
}

#[derive(Deserialize)]
pub struct VisionResultRequest {
    pub result: ExamResult,
    pub notes: Option<String>,
}

#[derive(Deserialize)]
pub struct ApproveRequest {
    #[serde(default)]
    pub payment_confirmed: bool,
    pub notes: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct RejectRequest {
    pub notes: Option<String>,
}

#[derive(Serialize)]
pub struct RenewalResponse {
    pub id: Option<AggregateId>,
    pub license_id: Option<AggregateId>,
    pub user_id: Option<UserId>,
    pub tracking_code: String,
    pub status: RequestStatus,
    pub fee: Money,
    pub new_photo: Option<String>,
    pub old_expiry_date: Option<NaiveDate>,
    pub new_expiry_date: Option<NaiveDate>,
    pub vision_exam_date: Option<DateTime<Utc>>,
    pub vision_exam_result: Option<ExamResult>,
    pub payment_confirmed: bool,
    pub officer_notes: Option<String>,
    pub requested_at: Option<DateTime<Utc>>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

impl From<&Renewal> for RenewalResponse {
    fn from(renewal: &Renewal) -> Self {
        Self {
            id: renewal.id(),
            license_id: renewal.license_id(),
            user_id: renewal.user_id(),
            tracking_code: renewal.tracking_code().to_string(),
            status: renewal.status(),
            fee: renewal.fee(),
            new_photo: renewal.new_photo().map(str::to_string),
            old_expiry_date: renewal.old_expiry_date(),
            new_expiry_date: renewal.new_expiry_date(),
            vision_exam_date: renewal.vision_exam_date(),
            vision_exam_result: renewal.vision_exam_result(),
            payment_confirmed: renewal.payment_confirmed(),
            officer_notes: renewal.officer_notes().map(str::to_string),
            requested_at: renewal.requested_at(),
            reviewed_at: renewal.reviewed_at(),
        }
    }
}

/// POST /renewals
pub async fn apply<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentActor(actor): CurrentActor,
    Json(application): Json<RenewalApplication>,
) -> Result<(StatusCode, Json<RenewalResponse>), ApiError> {
    let renewal = state.licensing.renewals.apply(&actor, application).await?;
    Ok((StatusCode::CREATED, Json(RenewalResponse::from(&renewal))))
}

/// GET /renewals/mine
pub async fn mine<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentActor(actor): CurrentActor,
) -> Result<Json<Vec<RenewalSummary>>, ApiError> {
    Ok(Json(state.licensing.queries.my_renewals(&actor).await?))
}

/// GET /renewals?status=PENDING
pub async fn list<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentActor(actor): CurrentActor,
    Query(filter): Query<StatusFilter>,
) -> Result<Json<Vec<RenewalSummary>>, ApiError> {
    Ok(Json(
        state.licensing.queries.renewals(&actor, filter.status).await?,
    ))
}

/// POST /renewals/{id}/vision-exam/schedule
pub async fn schedule_vision_exam<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
    Json(req): Json<VisionScheduleRequest>,
) -> Result<Json<RenewalResponse>, ApiError> {
    let renewal_id = parse_aggregate_id(&id)?;
    let outcome = state
        .licensing
        .renewals
        .schedule_vision_exam(&actor, renewal_id, req.scheduled_date)
        .await?;
    let renewal = state.deliver(outcome).await;
    Ok(Json(RenewalResponse::from(&renewal)))
}

/// POST /renewals/{id}/vision-exam/result
pub async fn submit_vision_exam_result<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
    Json(req): Json<VisionResultRequest>,
) -> Result<Json<RenewalResponse>, ApiError> {
    let renewal_id = parse_aggregate_id(&id)?;
    let outcome = state
        .licensing
        .renewals
        .submit_vision_exam_result(&actor, renewal_id, req.result, req.notes)
        .await?;
    let renewal = state.deliver(outcome).await;
    Ok(Json(RenewalResponse::from(&renewal)))
}

/// POST /renewals/{id}/approve
pub async fn approve<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
    Json(req): Json<ApproveRequest>,
) -> Result<Json<RenewalResponse>, ApiError> {
    let renewal_id = parse_aggregate_id(&id)?;
    let renewal = state
        .licensing
        .renewals
        .approve(&actor, renewal_id, req.payment_confirmed, req.notes)
        .await?;
    Ok(Json(RenewalResponse::from(&renewal)))
}

/// POST /renewals/{id}/reject
pub async fn reject<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
    Json(req): Json<RejectRequest>,
) -> Result<Json<RenewalResponse>, ApiError> {
    let renewal_id = parse_aggregate_id(&id)?;
    let renewal = state
        .licensing
        .renewals
        .reject(&actor, renewal_id, req.notes)
        .await?;
    Ok(Json(RenewalResponse::from(&renewal)))
}
