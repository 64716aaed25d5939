//! Renewal domain events.

use chrono::{DateTime, NaiveDate, Utc};
use common::{AggregateId, UserId};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;
use crate::values::{ExamResult, Money};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum RenewalEvent {
    RenewalRequested(RenewalRequestedData),
    VisionExamScheduled(VisionExamScheduledData),
    VisionExamRecorded(VisionExamRecordedData),
    RenewalApproved(RenewalApprovedData),
    RenewalRejected(RenewalRejectedData),
}

impl DomainEvent for RenewalEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RenewalEvent::RenewalRequested(_) => "RenewalRequested",
            RenewalEvent::VisionExamScheduled(_) => "VisionExamScheduled",
            RenewalEvent::VisionExamRecorded(_) => "VisionExamRecorded",
            RenewalEvent::RenewalApproved(_) => "RenewalApproved",
            RenewalEvent::RenewalRejected(_) => "RenewalRejected",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenewalRequestedData {
    pub renewal_id: AggregateId,
    pub license_id: AggregateId,
    pub user_id: UserId,
    pub tracking_code: String,
    pub new_photo: String,
    pub citizen_notes: Option<String>,
    pub old_expiry_date: Option<NaiveDate>,
    pub fee: Money,
    pub requested_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisionExamScheduledData {
    pub date: DateTime<Utc>,
    pub scheduled_by: UserId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisionExamRecordedData {
    pub result: ExamResult,
    pub conducted_by: UserId,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenewalApprovedData {
    pub reviewed_by: UserId,
    pub reviewed_at: DateTime<Utc>,
    pub notes: Option<String>,
    pub new_expiry_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenewalRejectedData {
    pub reviewed_by: UserId,
    pub reviewed_at: DateTime<Utc>,
    pub notes: Option<String>,
}
