//! License status machine.

use serde::{Deserialize, Serialize};

/// The status of a license application.
///
/// State transitions:
/// ```text
///                 ┌──► ExamPassed ─┐
/// Pending ────────┼──► ExamFailed ─┼──► Approved ──► Issued ┄┄► Expired
///    │            └────────────────┘       │           (derived from expiry_date)
///    │                    │                │
///    └────────────────────┴────────────────┴──► Rejected
/// ```
///
/// `Expired` is never stored; see [`License::effective_status`](super::License::effective_status).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LicenseStatus {
    /// Submitted, awaiting officer review.
    #[default]
    Pending,

    /// Officer marked the exams as passed; review continues.
    ExamPassed,

    /// Officer marked the exams as failed; review continues.
    ExamFailed,

    /// Reviewed and approved; issuance waits for the required exams.
    Approved,

    /// Rejected by review or by a failed exam (terminal).
    Rejected,

    /// Number and barcode assigned.
    Issued,

    /// Issued and past its expiry date.
    Expired,
}

impl LicenseStatus {
    /// Returns true if an officer review decision may be recorded.
    pub fn can_review(&self) -> bool {
        matches!(
            self,
            LicenseStatus::Pending | LicenseStatus::ExamPassed | LicenseStatus::ExamFailed
        )
    }

    /// Rejection is also allowed after approval, until issuance.
    pub fn can_reject(&self) -> bool {
        self.can_review() || matches!(self, LicenseStatus::Approved)
    }

    /// Returns true if exams may be scheduled for the license.
    pub fn can_schedule_exams(&self) -> bool {
        matches!(
            self,
            LicenseStatus::Approved | LicenseStatus::ExamPassed | LicenseStatus::ExamFailed
        )
    }

    /// Returns true if the license may be issued from this status.
    pub fn can_issue(&self) -> bool {
        self.can_schedule_exams()
    }

    /// Returns true while the application is still moving through review.
    pub fn is_open_request(&self) -> bool {
        matches!(
            self,
            LicenseStatus::Pending
                | LicenseStatus::ExamPassed
                | LicenseStatus::ExamFailed
                | LicenseStatus::Approved
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LicenseStatus::Pending => "PENDING",
            LicenseStatus::ExamPassed => "EXAM_PASSED",
            LicenseStatus::ExamFailed => "EXAM_FAILED",
            LicenseStatus::Approved => "APPROVED",
            LicenseStatus::Rejected => "REJECTED",
            LicenseStatus::Issued => "ISSUED",
            LicenseStatus::Expired => "EXPIRED",
        }
    }
}

impl std::fmt::Display for LicenseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
