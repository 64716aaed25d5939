//! Domain error types.

use event_store::EventStoreError;
use serde::Serialize;
use thiserror::Error;

use crate::applicant::ApplicantError;
use crate::catalog::CatalogError;
use crate::codes::{ClaimError, CodeKind};
use crate::exam::ExamError;
use crate::license::LicenseError;
use crate::renewal::RenewalError;
use crate::replacement::ReplacementError;

/// Coarse classification of every failure the workflow can report.
///
/// Boundary layers map these to user-facing responses without matching on
/// individual variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    Conflict,
    Ineligible,
    CooldownActive,
    InvalidTransition,
    PermissionDenied,
    PaymentNotConfirmed,
    PaymentCodeMismatch,
    Validation,
    /// Store or collaborator failure. Not a business rule.
    Infrastructure,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Ineligible => "ineligible",
            ErrorKind::CooldownActive => "cooldown_active",
            ErrorKind::InvalidTransition => "invalid_transition",
            ErrorKind::PermissionDenied => "permission_denied",
            ErrorKind::PaymentNotConfirmed => "payment_not_confirmed",
            ErrorKind::PaymentCodeMismatch => "payment_code_mismatch",
            ErrorKind::Validation => "validation",
            ErrorKind::Infrastructure => "infrastructure",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// An error occurred in the event store.
    #[error("Event store error: {0}")]
    EventStore(#[from] EventStoreError),

    #[error(transparent)]
    License(#[from] LicenseError),

    #[error(transparent)]
    Exam(#[from] ExamError),

    #[error(transparent)]
    Renewal(#[from] RenewalError),

    #[error(transparent)]
    Replacement(#[from] ReplacementError),

    #[error(transparent)]
    Applicant(#[from] ApplicantError),

    #[error(transparent)]
    Claim(#[from] ClaimError),

    /// Aggregate not found.
    #[error("{aggregate_type} not found: {aggregate_id}")]
    AggregateNotFound {
        aggregate_type: &'static str,
        aggregate_id: String,
    },

    /// No free code was found within the attempt budget.
    #[error("could not generate a unique {kind} code")]
    CodeSpaceExhausted { kind: CodeKind },

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DomainError {
    pub fn not_found(aggregate_type: &'static str, aggregate_id: impl ToString) -> Self {
        DomainError::AggregateNotFound {
            aggregate_type,
            aggregate_id: aggregate_id.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            DomainError::EventStore(EventStoreError::ConcurrencyConflict { .. }) => {
                ErrorKind::Conflict
            }
            DomainError::EventStore(_)
            | DomainError::CodeSpaceExhausted { .. }
            | DomainError::Catalog(_)
            | DomainError::Serialization(_) => ErrorKind::Infrastructure,
            DomainError::License(e) => e.kind(),
            DomainError::Exam(e) => e.kind(),
            DomainError::Renewal(e) => e.kind(),
            DomainError::Replacement(e) => e.kind(),
            DomainError::Applicant(_) | DomainError::Claim(_) => ErrorKind::Conflict,
            DomainError::AggregateNotFound { .. } => ErrorKind::NotFound,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::AggregateId;
    use event_store::Version;

    #[test]
    fn test_version_conflicts_surface_as_conflict() {
        let err = DomainError::from(EventStoreError::ConcurrencyConflict {
            aggregate_id: AggregateId::new(),
            expected: Version::new(3),
            actual: Version::new(4),
        });
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[test]
    fn test_malformed_commits_are_infrastructure() {
        let err = DomainError::from(EventStoreError::InvalidAppend("gap".into()));
        assert_eq!(err.kind(), ErrorKind::Infrastructure);
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::PaymentCodeMismatch).unwrap();
        assert_eq!(json, "\"payment_code_mismatch\"");
        assert_eq!(ErrorKind::CooldownActive.to_string(), "cooldown_active");
    }
}
