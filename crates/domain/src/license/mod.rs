//! License aggregate and related types.

mod aggregate;
mod dept_approval;
mod events;
mod screening;
mod state;

pub use aggregate::{ExamEntry, Issuance, License, ReviewDecision};
pub use dept_approval::DeptApproval;
pub use events::{
    ApplicationRejectedData, ApplicationReviewedData, ApplicationSubmittedData,
    CredentialReplacedData, DeptApprovalGrantedData, DeptApprovalRequestedData, ExamAttachedData,
    ExamOutcomeRecordedData, ImportantInfoUpdatedData, LicenseEvent, LicenseIssuedData,
    LicenseRenewedData, RequestLinkData,
};
pub use screening::{ApplicationForm, ScreenedApplication, screen_application};
pub use state::LicenseStatus;

use thiserror::Error;

use crate::catalog::LicenseTypeId;
use crate::eligibility::AgeRequirement;
use crate::error::ErrorKind;

/// Errors that can occur during license operations.
#[derive(Debug, Error)]
pub enum LicenseError {
    /// License is already created.
    #[error("License already created")]
    AlreadyCreated,

    /// Applicant already holds a valid license of this type.
    #[error("An active license of this type already exists")]
    ActiveLicenseExists,

    /// Applicant has an application of this type still in progress.
    #[error("An application of this type is already in progress")]
    PendingRequestExists,

    /// A recent rejection blocks reapplication.
    #[error("Reapplication blocked for {days_remaining} more day(s) after rejection")]
    CooldownActive { days_remaining: i64 },

    /// Applicant's age does not satisfy the degree rule.
    #[error("Applicant is {age}; this license type requires age {required}")]
    UnderAge { age: i32, required: AgeRequirement },

    /// The license type has categories and none was chosen.
    #[error("A category must be selected for this license type")]
    CategoryRequired,

    /// The chosen category is not configured for the license type.
    #[error("Category {code} is not offered for this license type")]
    InvalidCategory { code: String },

    /// Catalog type missing or inactive.
    #[error("License type {id} is not available")]
    LicenseTypeUnavailable { id: LicenseTypeId },

    /// Neither a catalog type nor a legacy kind was given.
    #[error("A license type is required")]
    TypeRequired,

    /// A required applicant field is blank.
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("A rejection reason is required")]
    MissingRejectionReason,

    /// License is not in the expected status.
    #[error("Invalid state transition: cannot {action} from {current_state} status")]
    InvalidStateTransition {
        current_state: LicenseStatus,
        action: &'static str,
    },

    /// Exams can only be scheduled after review approval.
    #[error("License is not approved yet (status {status})")]
    LicenseNotApprovedYet { status: LicenseStatus },

    #[error("License is not issued (status {status})")]
    NotIssuedYet { status: LicenseStatus },

    #[error("License was already submitted for department approval")]
    AlreadySubmitted,

    #[error("License is already department-approved")]
    AlreadyApproved,

    #[error("License has not been submitted for department approval")]
    NotSubmitted,

    /// Signature upload is not an image.
    #[error("Signature must be an image, got {content_type}")]
    InvalidSignatureFile { content_type: String },

    /// Actor does not own the license.
    #[error("License belongs to another user")]
    NotOwner,

    /// Only issued or expired licenses can be renewed.
    #[error("License cannot be renewed from status {status}")]
    NotRenewable { status: LicenseStatus },

    /// Renewal is only possible after the expiry date.
    #[error("License has not expired yet")]
    NotYetExpired,

    /// Replacement needs a license that is still valid.
    #[error("License has expired")]
    Expired,

    /// The previous request for this license was not rejected.
    #[error("A {request} request is already active for this license")]
    RequestAlreadyActive { request: &'static str },

    /// Exam is not attached to this license.
    #[error("Exam {0} does not belong to this license")]
    UnknownExam(common::AggregateId),
}

impl LicenseError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LicenseError::AlreadyCreated
            | LicenseError::ActiveLicenseExists
            | LicenseError::PendingRequestExists
            | LicenseError::RequestAlreadyActive { .. } => ErrorKind::Conflict,
            LicenseError::CooldownActive { .. } => ErrorKind::CooldownActive,
            LicenseError::UnderAge { .. }
            | LicenseError::CategoryRequired
            | LicenseError::InvalidCategory { .. } => ErrorKind::Ineligible,
            LicenseError::LicenseTypeUnavailable { .. }
            | LicenseError::TypeRequired
            | LicenseError::MissingField(_)
            | LicenseError::MissingRejectionReason
            | LicenseError::InvalidSignatureFile { .. } => ErrorKind::Validation,
            LicenseError::InvalidStateTransition { .. }
            | LicenseError::LicenseNotApprovedYet { .. }
            | LicenseError::NotIssuedYet { .. }
            | LicenseError::AlreadySubmitted
            | LicenseError::AlreadyApproved
            | LicenseError::NotSubmitted
            | LicenseError::NotRenewable { .. }
            | LicenseError::NotYetExpired
            | LicenseError::Expired => ErrorKind::InvalidTransition,
            LicenseError::NotOwner => ErrorKind::PermissionDenied,
            LicenseError::UnknownExam(_) => ErrorKind::NotFound,
        }
    }
}
