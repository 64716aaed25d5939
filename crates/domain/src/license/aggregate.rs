//! License aggregate implementation.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDate, Utc};
use common::{AggregateId, UserId};
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;
use crate::catalog::{ExamTypeId, LicenseTypeId};
use crate::request::{RequestRef, RequestStatus};
use crate::values::{
    ApplicantDocuments, ApplicantProfile, ExamResult, ImportantInfo, ImportantInfoUpdate,
    LicenseKind,
};

use super::{
    DeptApproval, LicenseError, LicenseEvent, LicenseStatus, ScreenedApplication,
    events::{
        ApplicationRejectedData, ApplicationReviewedData, ApplicationSubmittedData,
        CredentialReplacedData, DeptApprovalGrantedData, DeptApprovalRequestedData,
        ExamAttachedData, ExamOutcomeRecordedData, ImportantInfoUpdatedData, LicenseIssuedData,
        LicenseRenewedData, RequestLinkData,
    },
};

/// Officer review decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewDecision {
    Approved,
    Rejected { reason: String },
    ExamPassed,
    ExamFailed,
}

impl ReviewDecision {
    pub fn reject(reason: impl Into<String>) -> Self {
        ReviewDecision::Rejected {
            reason: reason.into(),
        }
    }
}

/// Codes and dates assigned when a license is issued.
pub type Issuance = LicenseIssuedData;

/// One exam attached to the license, as the license sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamEntry {
    pub exam_type_id: ExamTypeId,
    pub result: Option<ExamResult>,
}

/// License aggregate root.
///
/// One per application attempt. Also records the outcome of its exams and
/// the status of its latest renewal and replacement request so that the
/// rules spanning them are decided on a single stream.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct License {
    id: Option<AggregateId>,

    #[serde(default)]
    version: Version,

    owner: Option<UserId>,
    profile: Option<ApplicantProfile>,
    age: i32,
    documents: ApplicantDocuments,
    license_type_id: Option<LicenseTypeId>,
    kind: LicenseKind,
    category: Option<String>,
    status: LicenseStatus,
    application_date: Option<DateTime<Utc>>,

    reviewed_by: Option<UserId>,
    review_date: Option<DateTime<Utc>>,
    review_notes: Option<String>,
    rejection_reason: Option<String>,

    license_number: Option<String>,
    barcode: Option<String>,
    public_token: Option<String>,
    issued_date: Option<NaiveDate>,
    expiry_date: Option<NaiveDate>,

    dept_approval: DeptApproval,
    important_info: ImportantInfo,

    exams: BTreeMap<AggregateId, ExamEntry>,
    latest_renewal: Option<RequestRef>,
    latest_replacement: Option<RequestRef>,
}

impl Aggregate for License {
    type Event = LicenseEvent;
    type Error = LicenseError;

    fn aggregate_type() -> &'static str {
        "License"
    }

    fn id(&self) -> Option<AggregateId> {
        self.id
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            LicenseEvent::ApplicationSubmitted(data) => self.apply_submitted(data),
            LicenseEvent::ApplicationReviewed(data) => {
                self.status = data.status;
                self.reviewed_by = Some(data.reviewed_by);
                self.review_date = Some(data.review_date);
                self.review_notes = data.notes;
            }
            LicenseEvent::ApplicationRejected(data) => {
                self.status = LicenseStatus::Rejected;
                self.rejection_reason = Some(data.reason);
                self.reviewed_by = Some(data.rejected_by);
                self.review_date = Some(data.review_date);
                if data.notes.is_some() {
                    self.review_notes = data.notes;
                }
            }
            LicenseEvent::ExamAttached(data) => {
                self.exams.insert(
                    data.exam_id,
                    ExamEntry {
                        exam_type_id: data.exam_type_id,
                        result: None,
                    },
                );
            }
            LicenseEvent::ExamOutcomeRecorded(data) => {
                let entry = self.exams.entry(data.exam_id).or_insert(ExamEntry {
                    exam_type_id: data.exam_type_id,
                    result: None,
                });
                entry.result = Some(data.result);
            }
            LicenseEvent::LicenseIssued(data) => {
                self.status = LicenseStatus::Issued;
                self.license_number = Some(data.license_number);
                self.barcode = Some(data.barcode);
                self.public_token = Some(data.public_token);
                self.issued_date = Some(data.issued_date);
                self.expiry_date = Some(data.expiry_date);
            }
            LicenseEvent::DeptApprovalRequested(data) => {
                self.dept_approval.requested = Some(true);
                self.dept_approval.requested_by = Some(data.requested_by);
                self.dept_approval.requested_at = Some(data.requested_at);
            }
            LicenseEvent::DeptApprovalGranted(data) => {
                self.dept_approval.approved = Some(true);
                self.dept_approval.approved_by = Some(data.approved_by);
                self.dept_approval.approved_at = Some(data.approved_at);
                if data.signature.is_some() {
                    self.dept_approval.signature = data.signature;
                }
            }
            LicenseEvent::ImportantInfoUpdated(data) => self.important_info = data.info,
            LicenseEvent::RenewalOpened(data) => {
                self.latest_renewal = Some(RequestRef {
                    id: data.request_id,
                    status: RequestStatus::Pending,
                });
            }
            LicenseEvent::RenewalRejected(data) => {
                Self::settle(&mut self.latest_renewal, data.request_id, RequestStatus::Rejected)
            }
            LicenseEvent::LicenseRenewed(data) => {
                Self::settle(&mut self.latest_renewal, data.renewal_id, RequestStatus::Approved);
                self.status = LicenseStatus::Issued;
                if data.photo.is_some() {
                    self.documents.photo = data.photo;
                }
                self.issued_date = Some(data.issued_date);
                self.expiry_date = Some(data.expiry_date);
            }
            LicenseEvent::ReplacementOpened(data) => {
                self.latest_replacement = Some(RequestRef {
                    id: data.request_id,
                    status: RequestStatus::Pending,
                });
            }
            LicenseEvent::ReplacementRejected(data) => Self::settle(
                &mut self.latest_replacement,
                data.request_id,
                RequestStatus::Rejected,
            ),
            LicenseEvent::CredentialReplaced(data) => {
                Self::settle(
                    &mut self.latest_replacement,
                    data.replacement_id,
                    RequestStatus::Approved,
                );
                if data.new_barcode.is_some() {
                    self.barcode = data.new_barcode;
                }
                self.public_token = Some(data.public_token);
                self.dept_approval.rearm(data.replaced_by, data.replaced_at);
            }
        }
    }
}

impl License {
    fn apply_submitted(&mut self, data: ApplicationSubmittedData) {
        self.id = Some(data.license_id);
        self.owner = Some(data.owner);
        self.profile = Some(data.profile);
        self.age = data.age;
        self.documents = data.documents;
        self.license_type_id = data.license_type_id;
        self.kind = data.kind;
        self.category = data.category;
        self.status = LicenseStatus::Pending;
        self.application_date = Some(data.application_date);
        self.dept_approval = if data.tracks_dept_approval {
            DeptApproval::fresh()
        } else {
            DeptApproval::default()
        };
    }

    fn settle(slot: &mut Option<RequestRef>, id: AggregateId, status: RequestStatus) {
        if let Some(request) = slot.as_mut().filter(|r| r.id == id) {
            request.status = status;
        }
    }
}

// Query methods
impl License {
    pub fn owner(&self) -> Option<UserId> {
        self.owner
    }

    pub fn is_owned_by(&self, user: UserId) -> bool {
        self.owner == Some(user)
    }

    pub fn profile(&self) -> Option<&ApplicantProfile> {
        self.profile.as_ref()
    }

    pub fn age(&self) -> i32 {
        self.age
    }

    pub fn documents(&self) -> &ApplicantDocuments {
        &self.documents
    }

    pub fn license_type_id(&self) -> Option<LicenseTypeId> {
        self.license_type_id
    }

    pub fn kind(&self) -> LicenseKind {
        self.kind
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    /// Stored status. Never `Expired`.
    pub fn status(&self) -> LicenseStatus {
        self.status
    }

    /// Status as of `today`: an issued license past its expiry date reads
    /// as `Expired`.
    pub fn effective_status(&self, today: NaiveDate) -> LicenseStatus {
        match (self.status, self.expiry_date) {
            (LicenseStatus::Issued, Some(expiry)) if expiry < today => LicenseStatus::Expired,
            (status, _) => status,
        }
    }

    pub fn application_date(&self) -> Option<DateTime<Utc>> {
        self.application_date
    }

    pub fn reviewed_by(&self) -> Option<UserId> {
        self.reviewed_by
    }

    pub fn review_date(&self) -> Option<DateTime<Utc>> {
        self.review_date
    }

    pub fn review_notes(&self) -> Option<&str> {
        self.review_notes.as_deref()
    }

    pub fn rejection_reason(&self) -> Option<&str> {
        self.rejection_reason.as_deref()
    }

    pub fn license_number(&self) -> Option<&str> {
        self.license_number.as_deref()
    }

    /// The current barcode. Rotated on replacement.
    pub fn barcode(&self) -> Option<&str> {
        self.barcode.as_deref()
    }

    pub fn public_token(&self) -> Option<&str> {
        self.public_token.as_deref()
    }

    pub fn issued_date(&self) -> Option<NaiveDate> {
        self.issued_date
    }

    pub fn expiry_date(&self) -> Option<NaiveDate> {
        self.expiry_date
    }

    pub fn dept_approval(&self) -> &DeptApproval {
        &self.dept_approval
    }

    pub fn important_info(&self) -> &ImportantInfo {
        &self.important_info
    }

    /// Issued, unexpired and department-approved (or untracked).
    pub fn is_printable(&self, today: NaiveDate) -> bool {
        self.effective_status(today) == LicenseStatus::Issued && self.dept_approval.allows_printing()
    }

    pub fn exams(&self) -> impl Iterator<Item = (&AggregateId, &ExamEntry)> {
        self.exams.iter()
    }

    pub fn has_exam(&self, exam_id: AggregateId) -> bool {
        self.exams.contains_key(&exam_id)
    }

    /// Distinct exam types with at least one passing result.
    pub fn passed_exam_types(&self) -> BTreeSet<ExamTypeId> {
        self.exams
            .values()
            .filter(|e| e.result.is_some_and(|r| r.is_passed()))
            .map(|e| e.exam_type_id)
            .collect()
    }

    /// Number of passing exams, counting repeats of a type.
    pub fn passed_exam_count(&self) -> usize {
        self.exams
            .values()
            .filter(|e| e.result.is_some_and(|r| r.is_passed()))
            .count()
    }

    pub fn latest_renewal(&self) -> Option<RequestRef> {
        self.latest_renewal
    }

    pub fn latest_replacement(&self) -> Option<RequestRef> {
        self.latest_replacement
    }

    /// True when issuance would assign codes; false once they exist.
    pub fn needs_issuance(&self) -> bool {
        self.license_number.is_none() && self.status.can_issue()
    }
}

// Command methods (return events)
impl License {
    /// Records a screened application as a new pending license.
    pub fn submit(
        &self,
        license_id: AggregateId,
        owner: UserId,
        application: ScreenedApplication,
        at: DateTime<Utc>,
    ) -> Result<Vec<LicenseEvent>, LicenseError> {
        if self.id.is_some() {
            return Err(LicenseError::AlreadyCreated);
        }

        Ok(vec![LicenseEvent::ApplicationSubmitted(
            ApplicationSubmittedData {
                license_id,
                owner,
                profile: application.profile,
                age: application.age,
                documents: application.documents,
                license_type_id: application.license_type_id,
                kind: application.kind,
                category: application.category,
                application_date: at,
                tracks_dept_approval: true,
            },
        )])
    }

    /// Records an officer review decision.
    ///
    /// Approval does not issue by itself; the caller follows up with
    /// [`issue`](Self::issue) when the exams are already complete.
    pub fn review(
        &self,
        decision: ReviewDecision,
        officer: UserId,
        at: DateTime<Utc>,
    ) -> Result<Vec<LicenseEvent>, LicenseError> {
        self.review_with_notes(decision, None, officer, at)
    }

    pub fn review_with_notes(
        &self,
        decision: ReviewDecision,
        notes: Option<String>,
        officer: UserId,
        at: DateTime<Utc>,
    ) -> Result<Vec<LicenseEvent>, LicenseError> {
        let notes = notes
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());

        let status = match decision {
            ReviewDecision::Rejected { reason } => {
                if !self.status.can_reject() {
                    return Err(LicenseError::InvalidStateTransition {
                        current_state: self.status,
                        action: "reject",
                    });
                }
                let reason = reason.trim();
                if reason.is_empty() {
                    return Err(LicenseError::MissingRejectionReason);
                }
                return Ok(vec![LicenseEvent::ApplicationRejected(
                    ApplicationRejectedData {
                        reason: reason.to_string(),
                        rejected_by: officer,
                        review_date: at,
                        notes,
                        failed_exam: None,
                    },
                )]);
            }
            ReviewDecision::Approved => LicenseStatus::Approved,
            ReviewDecision::ExamPassed => LicenseStatus::ExamPassed,
            ReviewDecision::ExamFailed => LicenseStatus::ExamFailed,
        };

        if !self.status.can_review() {
            return Err(LicenseError::InvalidStateTransition {
                current_state: self.status,
                action: "review",
            });
        }

        Ok(vec![LicenseEvent::ApplicationReviewed(
            ApplicationReviewedData {
                status,
                reviewed_by: officer,
                review_date: at,
                notes,
            },
        )])
    }

    /// Links a newly created exam. Only allowed after review approval.
    pub fn attach_exam(
        &self,
        exam_id: AggregateId,
        exam_type_id: ExamTypeId,
    ) -> Result<Vec<LicenseEvent>, LicenseError> {
        self.ensure_exams_allowed()?;
        if self.exams.contains_key(&exam_id) {
            return Ok(vec![]);
        }
        Ok(vec![LicenseEvent::ExamAttached(ExamAttachedData {
            exam_id,
            exam_type_id,
        })])
    }

    pub fn ensure_exams_allowed(&self) -> Result<(), LicenseError> {
        if !self.status.can_schedule_exams() {
            return Err(LicenseError::LicenseNotApprovedYet {
                status: self.status,
            });
        }
        Ok(())
    }

    /// Records a graded exam.
    ///
    /// A failed exam rejects the whole application on the spot and restarts
    /// the cooldown, even if other exam types were already passed. An
    /// issued license only records the outcome.
    pub fn record_exam_outcome(
        &self,
        exam_id: AggregateId,
        result: ExamResult,
        exam_type_name: &str,
        officer: UserId,
        at: DateTime<Utc>,
    ) -> Result<Vec<LicenseEvent>, LicenseError> {
        let entry = self
            .exams
            .get(&exam_id)
            .ok_or(LicenseError::UnknownExam(exam_id))?;

        let mut events = vec![LicenseEvent::ExamOutcomeRecorded(ExamOutcomeRecordedData {
            exam_id,
            exam_type_id: entry.exam_type_id,
            result,
        })];

        if result == ExamResult::Failed && self.status != LicenseStatus::Issued {
            events.push(LicenseEvent::ApplicationRejected(ApplicationRejectedData {
                reason: format!("Failed {exam_type_name} exam"),
                rejected_by: officer,
                review_date: at,
                notes: None,
                failed_exam: Some(exam_id),
            }));
        }

        Ok(events)
    }

    /// Assigns number, barcode and dates.
    ///
    /// Idempotent: once a license number exists this produces no events.
    pub fn issue(&self, issuance: Issuance) -> Result<Vec<LicenseEvent>, LicenseError> {
        if self.license_number.is_some() {
            return Ok(vec![]);
        }
        if !self.status.can_issue() {
            return Err(LicenseError::InvalidStateTransition {
                current_state: self.status,
                action: "issue",
            });
        }
        Ok(vec![LicenseEvent::LicenseIssued(issuance)])
    }

    fn ensure_issued(&self, today: NaiveDate) -> Result<(), LicenseError> {
        match self.effective_status(today) {
            LicenseStatus::Issued => Ok(()),
            status => Err(LicenseError::NotIssuedYet { status }),
        }
    }

    /// Sends an issued license to the department for signature.
    pub fn submit_for_dept_approval(
        &self,
        officer: UserId,
        at: DateTime<Utc>,
    ) -> Result<Vec<LicenseEvent>, LicenseError> {
        self.ensure_issued(at.date_naive())?;
        if self.dept_approval.is_approved() {
            return Err(LicenseError::AlreadyApproved);
        }
        if self.dept_approval.is_requested() {
            return Err(LicenseError::AlreadySubmitted);
        }
        Ok(vec![LicenseEvent::DeptApprovalRequested(
            DeptApprovalRequestedData {
                requested_by: officer,
                requested_at: at,
            },
        )])
    }

    /// Checks that department approval may be granted now.
    pub fn ensure_dept_approvable(&self, today: NaiveDate) -> Result<(), LicenseError> {
        self.ensure_issued(today)?;
        if !self.dept_approval.is_requested() {
            return Err(LicenseError::NotSubmitted);
        }
        if self.dept_approval.is_approved() {
            return Err(LicenseError::AlreadyApproved);
        }
        Ok(())
    }

    pub fn grant_dept_approval(
        &self,
        approver: UserId,
        signature: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<Vec<LicenseEvent>, LicenseError> {
        self.ensure_dept_approvable(at.date_naive())?;
        Ok(vec![LicenseEvent::DeptApprovalGranted(
            DeptApprovalGrantedData {
                approved_by: approver,
                approved_at: at,
                signature,
            },
        )])
    }

    /// Owner edits the emergency details on an issued license.
    pub fn update_important_info(
        &self,
        user: UserId,
        update: &ImportantInfoUpdate,
        today: NaiveDate,
    ) -> Result<Vec<LicenseEvent>, LicenseError> {
        if !self.is_owned_by(user) {
            return Err(LicenseError::NotOwner);
        }
        self.ensure_issued(today)?;

        let info = update.merge_into(&self.important_info);
        if info == self.important_info {
            return Ok(vec![]);
        }
        Ok(vec![LicenseEvent::ImportantInfoUpdated(
            ImportantInfoUpdatedData { info },
        )])
    }

    /// Opens a renewal. Only after expiry, and only if the previous renewal
    /// request (if any) was rejected.
    pub fn open_renewal(
        &self,
        renewal_id: AggregateId,
        user: UserId,
        today: NaiveDate,
    ) -> Result<Vec<LicenseEvent>, LicenseError> {
        if !self.is_owned_by(user) {
            return Err(LicenseError::NotOwner);
        }
        match self.effective_status(today) {
            LicenseStatus::Issued | LicenseStatus::Expired => {}
            status => return Err(LicenseError::NotRenewable { status }),
        }
        match self.expiry_date {
            Some(expiry) if expiry < today => {}
            _ => return Err(LicenseError::NotYetExpired),
        }
        if self
            .latest_renewal
            .is_some_and(|r| r.status.blocks_new_request())
        {
            return Err(LicenseError::RequestAlreadyActive { request: "renewal" });
        }

        Ok(vec![LicenseEvent::RenewalOpened(RequestLinkData {
            request_id: renewal_id,
        })])
    }

    pub fn reject_renewal(&self, renewal_id: AggregateId) -> Vec<LicenseEvent> {
        vec![LicenseEvent::RenewalRejected(RequestLinkData {
            request_id: renewal_id,
        })]
    }

    /// Refreshes the license from an approved renewal. Department approval
    /// is left as it was.
    pub fn renew(
        &self,
        renewal_id: AggregateId,
        photo: Option<String>,
        issued_date: NaiveDate,
        expiry_date: NaiveDate,
    ) -> Result<Vec<LicenseEvent>, LicenseError> {
        match self.status {
            LicenseStatus::Issued => {}
            status => return Err(LicenseError::NotRenewable { status }),
        }
        Ok(vec![LicenseEvent::LicenseRenewed(LicenseRenewedData {
            renewal_id,
            photo,
            issued_date,
            expiry_date,
        })])
    }

    /// Opens a replacement for a lost card. The license must still be valid.
    pub fn open_replacement(
        &self,
        replacement_id: AggregateId,
        user: UserId,
        today: NaiveDate,
    ) -> Result<Vec<LicenseEvent>, LicenseError> {
        if !self.is_owned_by(user) {
            return Err(LicenseError::NotOwner);
        }
        match self.effective_status(today) {
            LicenseStatus::Issued => {}
            LicenseStatus::Expired => return Err(LicenseError::Expired),
            status => return Err(LicenseError::NotIssuedYet { status }),
        }
        if self
            .latest_replacement
            .is_some_and(|r| r.status.blocks_new_request())
        {
            return Err(LicenseError::RequestAlreadyActive {
                request: "replacement",
            });
        }

        Ok(vec![LicenseEvent::ReplacementOpened(RequestLinkData {
            request_id: replacement_id,
        })])
    }

    pub fn reject_replacement(&self, replacement_id: AggregateId) -> Vec<LicenseEvent> {
        vec![LicenseEvent::ReplacementRejected(RequestLinkData {
            request_id: replacement_id,
        })]
    }

    /// Rotates barcode and public token and sends the card back through
    /// department approval.
    ///
    /// `new_barcode` is `None` for licenses that never got a number; their
    /// barcode is left unchanged.
    pub fn replace_credential(
        &self,
        replacement_id: AggregateId,
        new_barcode: Option<String>,
        public_token: String,
        officer: UserId,
        at: DateTime<Utc>,
    ) -> Result<Vec<LicenseEvent>, LicenseError> {
        if self.status != LicenseStatus::Issued {
            return Err(LicenseError::NotIssuedYet {
                status: self.status,
            });
        }
        Ok(vec![LicenseEvent::CredentialReplaced(
            CredentialReplacedData {
                replacement_id,
                old_barcode: self.barcode.clone(),
                new_barcode,
                public_token,
                replaced_by: officer,
                replaced_at: at,
            },
        )])
    }
}
