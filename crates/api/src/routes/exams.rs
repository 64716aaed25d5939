//! Exam scheduling and grading endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{AggregateId, UserId};
use domain::{Aggregate, Exam, ExamPayment, ExamResult, ExamTypeId};
use event_store::EventStore;
use serde::{Deserialize, Serialize};
use workflow::{BundleFailure, BundleItem};

use super::{AppState, parse_aggregate_id};
use crate::auth::CurrentActor;
use crate::error::{ApiError, status_for};

// -- Request types --

#[derive(Deserialize)]
pub struct ScheduleRequest {
    pub exam_type_id: ExamTypeId,
    pub scheduled_date: DateTime<Utc>,
}

#[derive(Deserialize)]
pub struct RescheduleRequest {
    pub scheduled_date: DateTime<Utc>,
}

#[derive(Deserialize)]
pub struct BundleRequest {
    pub exams: Vec<BundleItem>,
}

#[derive(Deserialize)]
pub struct ResultRequest {
    pub result: ExamResult,
    pub score: Option<u32>,
    pub notes: Option<String>,
}

// -- Response types --

#[derive(Serialize)]
pub struct ExamResponse {
    pub id: Option<AggregateId>,
    pub license_id: Option<AggregateId>,
    pub exam_type_id: Option<ExamTypeId>,
    pub state: &'static str,
    pub scheduled_date: Option<DateTime<Utc>>,
    pub exam_date: Option<DateTime<Utc>>,
    pub result: Option<ExamResult>,
    pub score: Option<u32>,
    pub notes: Option<String>,
    pub conducted_by: Option<UserId>,
    pub payment: Option<ExamPayment>,
}

impl From<&Exam> for ExamResponse {
    fn from(exam: &Exam) -> Self {
        Self {
            id: exam.id(),
            license_id: exam.license_id(),
            exam_type_id: exam.exam_type_id(),
            state: exam.state().as_str(),
            scheduled_date: exam.scheduled_date(),
            exam_date: exam.exam_date(),
            result: exam.result(),
            score: exam.score(),
            notes: exam.notes().map(str::to_string),
            conducted_by: exam.conducted_by(),
            payment: exam.payment().copied(),
        }
    }
}

#[derive(Serialize)]
pub struct BundleResponse {
    pub scheduled: Vec<ExamResponse>,
    pub failure: Option<BundleFailure>,
}

// -- Handlers --

/// GET /licenses/{id}/exams
pub async fn list_for_license<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
) -> Result<Json<Vec<ExamResponse>>, ApiError> {
    let license_id = parse_aggregate_id(&id)?;
    let exams = state
        .licensing
        .applications
        .exams_for(&actor, license_id)
        .await?;
    Ok(Json(exams.iter().map(ExamResponse::from).collect()))
}

/// POST /licenses/{id}/exams/schedule
pub async fn schedule<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
    Json(req): Json<ScheduleRequest>,
) -> Result<(StatusCode, Json<ExamResponse>), ApiError> {
    let license_id = parse_aggregate_id(&id)?;
    let outcome = state
        .licensing
        .exams
        .schedule(&actor, license_id, req.exam_type_id, req.scheduled_date)
        .await?;
    let exam = state.deliver(outcome).await;
    Ok((StatusCode::CREATED, Json(ExamResponse::from(&exam))))
}

/// POST /licenses/{id}/exams/schedule-bundle
///
/// Items before a failing one stay scheduled. A partial bundle answers
/// with the status of the failure and lists what was scheduled.
pub async fn schedule_bundle<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
    Json(req): Json<BundleRequest>,
) -> Result<(StatusCode, Json<BundleResponse>), ApiError> {
    let license_id = parse_aggregate_id(&id)?;
    let outcome = state
        .licensing
        .exams
        .schedule_bundle(&actor, license_id, req.exams)
        .await?;
    let report = state.deliver(outcome).await;

    let status = match &report.failure {
        None => StatusCode::CREATED,
        Some(failure) => status_for(failure.kind),
    };
    Ok((
        status,
        Json(BundleResponse {
            scheduled: report.scheduled.iter().map(ExamResponse::from).collect(),
            failure: report.failure,
        }),
    ))
}

/// POST /exams/{id}/schedule: Moves an existing exam to a new date.
pub async fn reschedule<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
    Json(req): Json<RescheduleRequest>,
) -> Result<Json<ExamResponse>, ApiError> {
    let exam_id = parse_aggregate_id(&id)?;
    let outcome = state
        .licensing
        .exams
        .reschedule(&actor, exam_id, req.scheduled_date)
        .await?;
    let exam = state.deliver(outcome).await;
    Ok(Json(ExamResponse::from(&exam)))
}

/// POST /exams/{id}/result
pub async fn submit_result<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
    Json(req): Json<ResultRequest>,
) -> Result<Json<ExamResponse>, ApiError> {
    let exam_id = parse_aggregate_id(&id)?;
    let outcome = state
        .licensing
        .exams
        .submit_result(&actor, exam_id, req.result, req.score, req.notes)
        .await?;
    let exam = state.deliver(outcome).await;
    Ok(Json(ExamResponse::from(&exam)))
}
