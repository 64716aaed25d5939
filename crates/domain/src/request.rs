//! Status shared by renewal and replacement requests.

use common::AggregateId;
use serde::{Deserialize, Serialize};

/// Lifecycle of a renewal or replacement request.
///
/// ```text
/// Pending ──┬──► Approved
///           └──► Rejected
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub fn is_pending(&self) -> bool {
        matches!(self, RequestStatus::Pending)
    }

    /// A request blocks new ones until it has been rejected.
    pub fn blocks_new_request(&self) -> bool {
        !matches!(self, RequestStatus::Rejected)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "PENDING",
            RequestStatus::Approved => "APPROVED",
            RequestStatus::Rejected => "REJECTED",
        }
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The license's view of its most recent renewal or replacement request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestRef {
    pub id: AggregateId,
    pub status: RequestStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_rejection_unblocks() {
        assert!(RequestStatus::Pending.blocks_new_request());
        assert!(RequestStatus::Approved.blocks_new_request());
        assert!(!RequestStatus::Rejected.blocks_new_request());
    }

    #[test]
    fn test_serializes_upper_case() {
        let json = serde_json::to_string(&RequestStatus::Rejected).unwrap();
        assert_eq!(json, "\"REJECTED\"");
    }
}
