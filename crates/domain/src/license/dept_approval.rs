//! Department approval flags carried by an issued license.

use chrono::{DateTime, Utc};
use common::UserId;
use serde::{Deserialize, Serialize};

/// Submit/approve gate in front of printing.
///
/// Both flags are three-valued. `None` marks licenses created before the
/// gate existed; those count as approved so they stay printable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeptApproval {
    pub requested: Option<bool>,
    pub requested_at: Option<DateTime<Utc>>,
    pub requested_by: Option<UserId>,
    pub approved: Option<bool>,
    pub approved_at: Option<DateTime<Utc>>,
    pub approved_by: Option<UserId>,
    /// Blob handle of the signature image.
    pub signature: Option<String>,
}

impl DeptApproval {
    /// Flags of a newly submitted application: neither requested nor approved.
    pub fn fresh() -> Self {
        Self {
            requested: Some(false),
            approved: Some(false),
            ..Self::default()
        }
    }

    pub fn is_requested(&self) -> bool {
        self.requested == Some(true)
    }

    pub fn is_approved(&self) -> bool {
        self.approved == Some(true)
    }

    /// Approved, or untracked legacy.
    pub fn allows_printing(&self) -> bool {
        self.approved != Some(false)
    }

    pub fn awaiting_submission(&self) -> bool {
        !self.is_requested() && !self.is_approved()
    }

    pub fn awaiting_signature(&self) -> bool {
        self.is_requested() && !self.is_approved()
    }

    /// Resets the gate after the card was replaced: requested again by
    /// `by`, any earlier approval cleared.
    pub fn rearm(&mut self, by: UserId, at: DateTime<Utc>) {
        *self = Self {
            requested: Some(true),
            requested_at: Some(at),
            requested_by: Some(by),
            approved: Some(false),
            ..Self::default()
        };
    }
}
