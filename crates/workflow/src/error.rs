//! Workflow error types.

use common::AccessDenied;
use domain::{
    ApplicantError, CatalogError, ClaimError, DomainError, ErrorKind, ExamError, LicenseError,
    RenewalError, ReplacementError,
};
use event_store::EventStoreError;
use projections::ProjectionError;
use thiserror::Error;

use crate::services::{BlobError, LookupError};

/// Errors returned by the workflow engines.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// A business rule or the store rejected the operation.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// The actor's role may not perform the operation.
    #[error(transparent)]
    AccessDenied(#[from] AccessDenied),

    /// Malformed input that no aggregate rule covers (empty upload, bad
    /// content type, nothing to update).
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The blob store failed an upload the caller depends on.
    #[error(transparent)]
    Blob(#[from] BlobError),

    /// Violation lookup failed during verification.
    #[error(transparent)]
    Violations(#[from] LookupError),

    /// A read model could not be brought up to date.
    #[error("Read model error: {0}")]
    Projection(#[from] ProjectionError),
}

impl WorkflowError {
    pub fn validation(message: impl Into<String>) -> Self {
        WorkflowError::Validation(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            WorkflowError::Domain(e) => e.kind(),
            WorkflowError::AccessDenied(_) => ErrorKind::PermissionDenied,
            WorkflowError::Validation(_) => ErrorKind::Validation,
            WorkflowError::Blob(_) | WorkflowError::Violations(_) | WorkflowError::Projection(_) => {
                ErrorKind::Infrastructure
            }
        }
    }

    /// Days left in the reapplication cooldown, when that is the failure.
    pub fn cooldown_days_remaining(&self) -> Option<i64> {
        match self {
            WorkflowError::Domain(DomainError::License(LicenseError::CooldownActive {
                days_remaining,
            })) => Some(*days_remaining),
            _ => None,
        }
    }
}

macro_rules! via_domain {
    ($($error:ty),+ $(,)?) => {
        $(
            impl From<$error> for WorkflowError {
                fn from(err: $error) -> Self {
                    WorkflowError::Domain(DomainError::from(err))
                }
            }
        )+
    };
}

via_domain!(
    LicenseError,
    ExamError,
    RenewalError,
    ReplacementError,
    ApplicantError,
    ClaimError,
    CatalogError,
    EventStoreError,
);

/// Convenience type alias for workflow results.
pub type Result<T> = std::result::Result<T, WorkflowError>;
