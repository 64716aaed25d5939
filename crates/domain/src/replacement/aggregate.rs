//! Replacement aggregate implementation.

use chrono::{DateTime, Utc};
use common::{AggregateId, UserId};
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;
use crate::request::RequestStatus;

use super::{
    ReplacementError, ReplacementEvent,
    events::{ReplacementApprovedData, ReplacementRejectedData, ReplacementRequestedData},
};

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// What the citizen supplies when reporting a lost card.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReplacementRequest {
    pub police_report: Option<String>,
    pub citizen_notes: Option<String>,
}

/// A request to replace a lost card.
///
/// The payment code generated with the request works as a shared secret:
/// the approving officer has to enter it again.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Replacement {
    id: Option<AggregateId>,
    #[serde(default)]
    version: Version,
    license_id: Option<AggregateId>,
    user_id: Option<UserId>,
    tracking_code: String,
    payment_code: String,
    police_report: Option<String>,
    citizen_notes: Option<String>,
    status: RequestStatus,
    requested_at: Option<DateTime<Utc>>,
    payment_confirmed: bool,
    old_barcode: Option<String>,
    new_barcode: Option<String>,
    officer_notes: Option<String>,
    reviewed_by: Option<UserId>,
    reviewed_at: Option<DateTime<Utc>>,
}

impl Aggregate for Replacement {
    type Event = ReplacementEvent;
    type Error = ReplacementError;

    fn aggregate_type() -> &'static str {
        "Replacement"
    }

    fn id(&self) -> Option<AggregateId> {
        self.id
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            ReplacementEvent::ReplacementRequested(data) => {
                self.id = Some(data.replacement_id);
                self.license_id = Some(data.license_id);
                self.user_id = Some(data.user_id);
                self.tracking_code = data.tracking_code;
                self.payment_code = data.payment_code;
                self.police_report = Some(data.police_report);
                self.citizen_notes = data.citizen_notes;
                self.requested_at = Some(data.requested_at);
                self.status = RequestStatus::Pending;
            }
            ReplacementEvent::ReplacementApproved(data) => {
                self.status = RequestStatus::Approved;
                self.payment_confirmed = true;
                self.old_barcode = data.old_barcode;
                self.new_barcode = data.new_barcode;
                self.reviewed_by = Some(data.reviewed_by);
                self.reviewed_at = Some(data.reviewed_at);
                self.officer_notes = data.notes;
            }
            ReplacementEvent::ReplacementRejected(data) => {
                self.status = RequestStatus::Rejected;
                self.reviewed_by = Some(data.reviewed_by);
                self.reviewed_at = Some(data.reviewed_at);
                self.officer_notes = data.notes;
            }
        }
    }
}

// Query methods
impl Replacement {
    pub fn license_id(&self) -> Option<AggregateId> {
        self.license_id
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    pub fn tracking_code(&self) -> &str {
        &self.tracking_code
    }

    pub fn payment_code(&self) -> &str {
        &self.payment_code
    }

    pub fn police_report(&self) -> Option<&str> {
        self.police_report.as_deref()
    }

    pub fn citizen_notes(&self) -> Option<&str> {
        self.citizen_notes.as_deref()
    }

    pub fn status(&self) -> RequestStatus {
        self.status
    }

    pub fn requested_at(&self) -> Option<DateTime<Utc>> {
        self.requested_at
    }

    pub fn payment_confirmed(&self) -> bool {
        self.payment_confirmed
    }

    pub fn old_barcode(&self) -> Option<&str> {
        self.old_barcode.as_deref()
    }

    pub fn new_barcode(&self) -> Option<&str> {
        self.new_barcode.as_deref()
    }

    pub fn officer_notes(&self) -> Option<&str> {
        self.officer_notes.as_deref()
    }

    pub fn reviewed_by(&self) -> Option<UserId> {
        self.reviewed_by
    }

    pub fn reviewed_at(&self) -> Option<DateTime<Utc>> {
        self.reviewed_at
    }
}

// Command methods (return events)
impl Replacement {
    #[allow(clippy::too_many_arguments)]
    pub fn request(
        &self,
        replacement_id: AggregateId,
        license_id: AggregateId,
        user_id: UserId,
        tracking_code: String,
        payment_code: String,
        request: ReplacementRequest,
        at: DateTime<Utc>,
    ) -> Result<Vec<ReplacementEvent>, ReplacementError> {
        if self.id.is_some() {
            return Err(ReplacementError::AlreadyCreated);
        }
        let police_report =
            clean(request.police_report).ok_or(ReplacementError::MissingPoliceReport)?;

        Ok(vec![ReplacementEvent::ReplacementRequested(
            ReplacementRequestedData {
                replacement_id,
                license_id,
                user_id,
                tracking_code,
                payment_code,
                police_report,
                citizen_notes: clean(request.citizen_notes),
                requested_at: at,
            },
        )])
    }

    fn ensure_pending(&self) -> Result<(), ReplacementError> {
        if !self.status.is_pending() {
            return Err(ReplacementError::NotPending {
                status: self.status,
            });
        }
        Ok(())
    }

    /// Checks, in order: still pending, fee confirmed, payment code matches
    /// (surrounding whitespace ignored).
    pub fn ensure_approvable(
        &self,
        payment_confirmed: bool,
        payment_code: &str,
    ) -> Result<(), ReplacementError> {
        self.ensure_pending()?;
        if !payment_confirmed {
            return Err(ReplacementError::PaymentNotConfirmed);
        }
        if payment_code.trim() != self.payment_code {
            return Err(ReplacementError::PaymentCodeMismatch);
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    pub fn approve(
        &self,
        payment_confirmed: bool,
        payment_code: &str,
        notes: Option<String>,
        old_barcode: Option<String>,
        new_barcode: Option<String>,
        officer: UserId,
        at: DateTime<Utc>,
    ) -> Result<Vec<ReplacementEvent>, ReplacementError> {
        self.ensure_approvable(payment_confirmed, payment_code)?;
        Ok(vec![ReplacementEvent::ReplacementApproved(
            ReplacementApprovedData {
                old_barcode,
                new_barcode,
                reviewed_by: officer,
                reviewed_at: at,
                notes: clean(notes),
            },
        )])
    }

    pub fn reject(
        &self,
        notes: Option<String>,
        officer: UserId,
        at: DateTime<Utc>,
    ) -> Result<Vec<ReplacementEvent>, ReplacementError> {
        self.ensure_pending()?;
        Ok(vec![ReplacementEvent::ReplacementRejected(
            ReplacementRejectedData {
                reviewed_by: officer,
                reviewed_at: at,
                notes: clean(notes),
            },
        )])
    }
}
