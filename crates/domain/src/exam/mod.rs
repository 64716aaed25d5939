//! Exam aggregate: one scheduled exam of one type for one license.

mod aggregate;
mod events;

pub use aggregate::{Exam, ExamState};
pub use events::{
    ExamCreatedData, ExamEvent, ExamGradedData, ExamPayment, ExamScheduledData,
};

use thiserror::Error;

use crate::catalog::ExamTypeId;
use crate::error::ErrorKind;

/// Errors that can occur during exam operations.
#[derive(Debug, Error)]
pub enum ExamError {
    /// Citizens may never schedule exams.
    #[error("Only license officers can schedule exams")]
    NotLicenseOfficerRole,

    #[error("Exam already created")]
    AlreadyCreated,

    /// Exam is terminal once graded.
    #[error("Exam has already been graded")]
    AlreadyGraded,

    /// Exam type missing or inactive in the catalog.
    #[error("Exam type {id} is not available")]
    ExamTypeUnavailable { id: ExamTypeId },
}

impl ExamError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExamError::NotLicenseOfficerRole => ErrorKind::PermissionDenied,
            ExamError::AlreadyCreated => ErrorKind::Conflict,
            ExamError::AlreadyGraded => ErrorKind::InvalidTransition,
            ExamError::ExamTypeUnavailable { .. } => ErrorKind::Validation,
        }
    }
}
