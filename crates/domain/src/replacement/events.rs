//! Replacement domain events.

use chrono::{DateTime, Utc};
use common::{AggregateId, UserId};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ReplacementEvent {
    ReplacementRequested(ReplacementRequestedData),
    ReplacementApproved(ReplacementApprovedData),
    ReplacementRejected(ReplacementRejectedData),
}

impl DomainEvent for ReplacementEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ReplacementEvent::ReplacementRequested(_) => "ReplacementRequested",
            ReplacementEvent::ReplacementApproved(_) => "ReplacementApproved",
            ReplacementEvent::ReplacementRejected(_) => "ReplacementRejected",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplacementRequestedData {
    pub replacement_id: AggregateId,
    pub license_id: AggregateId,
    pub user_id: UserId,
    pub tracking_code: String,
    pub payment_code: String,
    pub police_report: String,
    pub citizen_notes: Option<String>,
    pub requested_at: DateTime<Utc>,
}

/// Data for ReplacementApproved event. Snapshots both barcodes so the old
/// card can be shown to be void.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplacementApprovedData {
    pub old_barcode: Option<String>,
    pub new_barcode: Option<String>,
    pub reviewed_by: UserId,
    pub reviewed_at: DateTime<Utc>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplacementRejectedData {
    pub reviewed_by: UserId,
    pub reviewed_at: DateTime<Utc>,
    pub notes: Option<String>,
}
