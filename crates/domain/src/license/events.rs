//! License domain events.

use chrono::{DateTime, NaiveDate, Utc};
use common::{AggregateId, UserId};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;
use crate::catalog::{ExamTypeId, LicenseTypeId};
use crate::values::{ApplicantDocuments, ApplicantProfile, ExamResult, ImportantInfo, LicenseKind};

use super::LicenseStatus;

/// Events that can occur on a license aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum LicenseEvent {
    /// Citizen filed an application.
    ApplicationSubmitted(ApplicationSubmittedData),

    /// Officer recorded a non-rejecting review decision.
    ApplicationReviewed(ApplicationReviewedData),

    /// Application rejected by review or by a failed exam.
    ApplicationRejected(ApplicationRejectedData),

    /// An exam was created for this license.
    ExamAttached(ExamAttachedData),

    /// One of the license's exams was graded.
    ExamOutcomeRecorded(ExamOutcomeRecordedData),

    /// Number and barcode assigned.
    LicenseIssued(LicenseIssuedData),

    DeptApprovalRequested(DeptApprovalRequestedData),

    DeptApprovalGranted(DeptApprovalGrantedData),

    ImportantInfoUpdated(ImportantInfoUpdatedData),

    /// A renewal request was opened against this license.
    RenewalOpened(RequestLinkData),

    RenewalRejected(RequestLinkData),

    /// An approved renewal refreshed the license.
    LicenseRenewed(LicenseRenewedData),

    /// A replacement request was opened against this license.
    ReplacementOpened(RequestLinkData),

    ReplacementRejected(RequestLinkData),

    /// An approved replacement rotated the card credentials.
    CredentialReplaced(CredentialReplacedData),
}

impl DomainEvent for LicenseEvent {
    fn event_type(&self) -> &'static str {
        match self {
            LicenseEvent::ApplicationSubmitted(_) => "ApplicationSubmitted",
            LicenseEvent::ApplicationReviewed(_) => "ApplicationReviewed",
            LicenseEvent::ApplicationRejected(_) => "ApplicationRejected",
            LicenseEvent::ExamAttached(_) => "ExamAttached",
            LicenseEvent::ExamOutcomeRecorded(_) => "ExamOutcomeRecorded",
            LicenseEvent::LicenseIssued(_) => "LicenseIssued",
            LicenseEvent::DeptApprovalRequested(_) => "DeptApprovalRequested",
            LicenseEvent::DeptApprovalGranted(_) => "DeptApprovalGranted",
            LicenseEvent::ImportantInfoUpdated(_) => "ImportantInfoUpdated",
            LicenseEvent::RenewalOpened(_) => "RenewalOpened",
            LicenseEvent::RenewalRejected(_) => "RenewalRejected",
            LicenseEvent::LicenseRenewed(_) => "LicenseRenewed",
            LicenseEvent::ReplacementOpened(_) => "ReplacementOpened",
            LicenseEvent::ReplacementRejected(_) => "ReplacementRejected",
            LicenseEvent::CredentialReplaced(_) => "CredentialReplaced",
        }
    }
}

/// Data for ApplicationSubmitted event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationSubmittedData {
    pub license_id: AggregateId,
    pub owner: UserId,
    pub profile: ApplicantProfile,
    /// Age on the application date.
    pub age: i32,
    pub documents: ApplicantDocuments,
    pub license_type_id: Option<LicenseTypeId>,
    pub kind: LicenseKind,
    pub category: Option<String>,
    pub application_date: DateTime<Utc>,
    /// False on applications recorded before department approval existed.
    #[serde(default)]
    pub tracks_dept_approval: bool,
}

/// Data for ApplicationReviewed event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationReviewedData {
    /// One of `Approved`, `ExamPassed`, `ExamFailed`.
    pub status: LicenseStatus,
    pub reviewed_by: UserId,
    pub review_date: DateTime<Utc>,
    pub notes: Option<String>,
}

/// Data for ApplicationRejected event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationRejectedData {
    pub reason: String,
    pub rejected_by: UserId,
    /// Start of the reapplication cooldown.
    pub review_date: DateTime<Utc>,
    pub notes: Option<String>,
    /// Set when a failed exam caused the rejection.
    pub failed_exam: Option<AggregateId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamAttachedData {
    pub exam_id: AggregateId,
    pub exam_type_id: ExamTypeId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamOutcomeRecordedData {
    pub exam_id: AggregateId,
    pub exam_type_id: ExamTypeId,
    pub result: ExamResult,
}

/// Data for LicenseIssued event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseIssuedData {
    pub license_number: String,
    pub barcode: String,
    /// Opaque token for the public edit link.
    pub public_token: String,
    pub issued_date: NaiveDate,
    pub expiry_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeptApprovalRequestedData {
    pub requested_by: UserId,
    pub requested_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeptApprovalGrantedData {
    pub approved_by: UserId,
    pub approved_at: DateTime<Utc>,
    /// Blob handle of the signature, when one was supplied and stored.
    pub signature: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportantInfoUpdatedData {
    /// The full set of fields after the update.
    pub info: ImportantInfo,
}

/// Links a renewal or replacement request to the license.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestLinkData {
    pub request_id: AggregateId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LicenseRenewedData {
    pub renewal_id: AggregateId,
    pub photo: Option<String>,
    pub issued_date: NaiveDate,
    pub expiry_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialReplacedData {
    pub replacement_id: AggregateId,
    pub old_barcode: Option<String>,
    pub new_barcode: Option<String>,
    pub public_token: String,
    /// Officer who approved; becomes the new department-approval requester.
    pub replaced_by: UserId,
    pub replaced_at: DateTime<Utc>,
}
