//! License application, review and officer queue endpoints.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use chrono::{DateTime, NaiveDate, Utc};
use common::{AggregateId, Clock, UserId};
use domain::{
    Aggregate, ApplicantDocuments, ApplicantProfile, ApplicationForm, DeptApproval, ExamResult,
    ExamTypeId, ImportantInfo, ImportantInfoUpdate, License, LicenseKind, LicenseStatus,
    LicenseTypeId, ReviewDecision,
};
use event_store::EventStore;
use projections::LicenseSummary;
use serde::{Deserialize, Serialize};
use workflow::FileUpload;

use super::uploads::content_type;
use super::{AppState, parse_aggregate_id};
use crate::auth::CurrentActor;
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
pub struct ReviewRequest {
    #[serde(flatten)]
    pub decision: ReviewDecision,
    pub notes: Option<String>,
}

#[derive(Deserialize)]
pub struct KindFilter {
    pub kind: Option<LicenseKind>,
}

// -- Response types --

#[derive(Serialize)]
pub struct ExamEntryResponse {
    pub exam_id: AggregateId,
    pub exam_type_id: ExamTypeId,
    pub result: Option<ExamResult>,
}

#[derive(Serialize)]
pub struct LicenseResponse {
    pub id: Option<AggregateId>,
    pub owner: Option<UserId>,
    pub profile: Option<ApplicantProfile>,
    pub documents: ApplicantDocuments,
    pub license_type_id: Option<LicenseTypeId>,
    pub kind: LicenseKind,
    pub category: Option<String>,
    /// Status as of today, with expiry derived.
    pub status: LicenseStatus,
    pub application_date: Option<DateTime<Utc>>,
    pub review_date: Option<DateTime<Utc>>,
    pub review_notes: Option<String>,
    pub rejection_reason: Option<String>,
    pub license_number: Option<String>,
    pub barcode: Option<String>,
    pub public_token: Option<String>,
    pub issued_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
    pub dept_approval: DeptApproval,
    pub important_info: ImportantInfo,
    pub printable: bool,
    pub exams: Vec<ExamEntryResponse>,
}

impl LicenseResponse {
    pub fn new(license: &License, today: NaiveDate) -> Self {
        Self {
            id: license.id(),
            owner: license.owner(),
            profile: license.profile().cloned(),
            documents: license.documents().clone(),
            license_type_id: license.license_type_id(),
            kind: license.kind(),
            category: license.category().map(str::to_string),
            status: license.effective_status(today),
            application_date: license.application_date(),
            review_date: license.review_date(),
            review_notes: license.review_notes().map(str::to_string),
            rejection_reason: license.rejection_reason().map(str::to_string),
            license_number: license.license_number().map(str::to_string),
            barcode: license.barcode().map(str::to_string),
            public_token: license.public_token().map(str::to_string),
            issued_date: license.issued_date(),
            expiry_date: license.expiry_date(),
            dept_approval: license.dept_approval().clone(),
            important_info: license.important_info().clone(),
            printable: license.is_printable(today),
            exams: license
                .exams()
                .map(|(id, entry)| ExamEntryResponse {
                    exam_id: *id,
                    exam_type_id: entry.exam_type_id,
                    result: entry.result,
                })
                .collect(),
        }
    }
}

fn respond<S: EventStore>(state: &AppState<S>, license: &License) -> Json<LicenseResponse> {
    Json(LicenseResponse::new(license, state.clock.today()))
}

// -- Handlers --

/// POST /licenses: Files a license application.
pub async fn apply<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentActor(actor): CurrentActor,
    Json(form): Json<ApplicationForm>,
) -> Result<(StatusCode, Json<LicenseResponse>), ApiError> {
    let license = state.licensing.applications.apply(&actor, form).await?;
    Ok((StatusCode::CREATED, respond(&state, &license)))
}

/// GET /licenses/mine: The caller's own applications.
pub async fn mine<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentActor(actor): CurrentActor,
) -> Result<Json<Vec<LicenseResponse>>, ApiError> {
    let today = state.clock.today();
    let licenses = state.licensing.applications.list_mine(&actor).await?;
    Ok(Json(
        licenses
            .iter()
            .map(|l| LicenseResponse::new(l, today))
            .collect(),
    ))
}

/// GET /licenses/{id}
pub async fn get<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
) -> Result<Json<LicenseResponse>, ApiError> {
    let license_id = parse_aggregate_id(&id)?;
    let license = state.licensing.applications.get(&actor, license_id).await?;
    Ok(respond(&state, &license))
}

/// POST /licenses/{id}/review
pub async fn review<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
    Json(req): Json<ReviewRequest>,
) -> Result<Json<LicenseResponse>, ApiError> {
    let license_id = parse_aggregate_id(&id)?;
    let outcome = state
        .licensing
        .applications
        .review(&actor, license_id, req.decision, req.notes)
        .await?;
    let license = state.deliver(outcome).await;
    Ok(respond(&state, &license))
}

/// PUT /licenses/{id}/important-info
pub async fn update_important_info<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
    Json(update): Json<ImportantInfoUpdate>,
) -> Result<Json<LicenseResponse>, ApiError> {
    let license_id = parse_aggregate_id(&id)?;
    let license = state
        .licensing
        .applications
        .update_important_info(&actor, license_id, update)
        .await?;
    Ok(respond(&state, &license))
}

/// GET /licenses/by-barcode/{barcode}
pub async fn by_barcode<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentActor(actor): CurrentActor,
    Path(barcode): Path<String>,
) -> Result<Json<LicenseResponse>, ApiError> {
    let license = state
        .licensing
        .applications
        .by_barcode(&actor, &barcode)
        .await?;
    Ok(respond(&state, &license))
}

/// POST /licenses/{id}/dept-approval/submit
pub async fn submit_dept_approval<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
) -> Result<Json<LicenseResponse>, ApiError> {
    let license_id = parse_aggregate_id(&id)?;
    let license = state
        .licensing
        .dept_approval
        .submit(&actor, license_id)
        .await?;
    Ok(respond(&state, &license))
}

/// POST /licenses/{id}/dept-approval/approve
///
/// The body, when present, is the signature image; its media type comes
/// from the `Content-Type` header.
pub async fn approve_dept_approval<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<LicenseResponse>, ApiError> {
    let license_id = parse_aggregate_id(&id)?;
    let signature = (!body.is_empty())
        .then(|| FileUpload::new(body.to_vec(), content_type(&headers)));
    let license = state
        .licensing
        .dept_approval
        .approve(&actor, license_id, signature)
        .await?;
    Ok(respond(&state, &license))
}

// -- Officer queues --

/// GET /licenses/officer/pending
pub async fn pending<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentActor(actor): CurrentActor,
) -> Result<Json<Vec<LicenseSummary>>, ApiError> {
    Ok(Json(state.licensing.queries.pending(&actor).await?))
}

/// GET /licenses/officer/all?kind=PRIVATE
pub async fn all<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentActor(actor): CurrentActor,
    Query(filter): Query<KindFilter>,
) -> Result<Json<Vec<LicenseSummary>>, ApiError> {
    Ok(Json(state.licensing.queries.all(&actor, filter.kind).await?))
}

/// GET /licenses/officer/printable
pub async fn printable<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentActor(actor): CurrentActor,
) -> Result<Json<Vec<LicenseSummary>>, ApiError> {
    Ok(Json(state.licensing.queries.printable(&actor).await?))
}

/// GET /licenses/officer/dept-approval/queue
pub async fn dept_approval_queue<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentActor(actor): CurrentActor,
) -> Result<Json<Vec<LicenseSummary>>, ApiError> {
    Ok(Json(state.licensing.queries.dept_approval_queue(&actor).await?))
}

/// GET /licenses/officer/dept-approval/signature-pending
pub async fn signature_pending<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentActor(actor): CurrentActor,
) -> Result<Json<Vec<LicenseSummary>>, ApiError> {
    Ok(Json(state.licensing.queries.signature_pending(&actor).await?))
}
