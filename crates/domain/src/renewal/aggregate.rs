//! Renewal aggregate implementation.

use chrono::{DateTime, NaiveDate, Utc};
use common::{AggregateId, UserId};
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;
use crate::request::RequestStatus;
use crate::values::{ExamResult, Money, RENEWAL_FEE};

use super::{
    RenewalError, RenewalEvent,
    events::{
        RenewalApprovedData, RenewalRejectedData, RenewalRequestedData, VisionExamRecordedData,
        VisionExamScheduledData,
    },
};

fn clean(notes: Option<String>) -> Option<String> {
    notes
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
}

/// A citizen's request to renew an expired license.
///
/// Approval needs a confirmed fee and a passed vision exam.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Renewal {
    id: Option<AggregateId>,
    #[serde(default)]
    version: Version,
    license_id: Option<AggregateId>,
    user_id: Option<UserId>,
    tracking_code: String,
    new_photo: Option<String>,
    citizen_notes: Option<String>,
    old_expiry_date: Option<NaiveDate>,
    new_expiry_date: Option<NaiveDate>,
    fee: Money,
    status: RequestStatus,
    requested_at: Option<DateTime<Utc>>,
    vision_exam_date: Option<DateTime<Utc>>,
    vision_exam_result: Option<ExamResult>,
    vision_exam_conducted_by: Option<UserId>,
    payment_confirmed: bool,
    officer_notes: Option<String>,
    reviewed_by: Option<UserId>,
    reviewed_at: Option<DateTime<Utc>>,
}

impl Aggregate for Renewal {
    type Event = RenewalEvent;
    type Error = RenewalError;

    fn aggregate_type() -> &'static str {
        "Renewal"
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
            RenewalEvent::RenewalRequested(data) => {
                self.id = Some(data.renewal_id);
                self.license_id = Some(data.license_id);
                self.user_id = Some(data.user_id);
                self.tracking_code = data.tracking_code;
                self.new_photo = Some(data.new_photo);
                self.citizen_notes = data.citizen_notes;
                self.old_expiry_date = data.old_expiry_date;
                self.fee = data.fee;
                self.requested_at = Some(data.requested_at);
                self.status = RequestStatus::Pending;
            }
            RenewalEvent::VisionExamScheduled(data) => {
                self.vision_exam_date = Some(data.date);
            }
            RenewalEvent::VisionExamRecorded(data) => {
                self.vision_exam_result = Some(data.result);
                self.vision_exam_conducted_by = Some(data.conducted_by);
                if data.notes.is_some() {
                    self.officer_notes = data.notes;
                }
            }
            RenewalEvent::RenewalApproved(data) => {
                self.status = RequestStatus::Approved;
                self.payment_confirmed = true;
                self.reviewed_by = Some(data.reviewed_by);
                self.reviewed_at = Some(data.reviewed_at);
                self.new_expiry_date = Some(data.new_expiry_date);
                if data.notes.is_some() {
                    self.officer_notes = data.notes;
                }
            }
            RenewalEvent::RenewalRejected(data) => {
                self.status = RequestStatus::Rejected;
                self.reviewed_by = Some(data.reviewed_by);
                self.reviewed_at = Some(data.reviewed_at);
                if data.notes.is_some() {
                    self.officer_notes = data.notes;
                }
            }
        }
    }
}

// Query methods
impl Renewal {
    pub fn license_id(&self) -> Option<AggregateId> {
        self.license_id
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    pub fn tracking_code(&self) -> &str {
        &self.tracking_code
    }

    pub fn new_photo(&self) -> Option<&str> {
        self.new_photo.as_deref()
    }

    pub fn citizen_notes(&self) -> Option<&str> {
        self.citizen_notes.as_deref()
    }

    pub fn old_expiry_date(&self) -> Option<NaiveDate> {
        self.old_expiry_date
    }

    pub fn new_expiry_date(&self) -> Option<NaiveDate> {
        self.new_expiry_date
    }

    pub fn fee(&self) -> Money {
        self.fee
    }

    pub fn status(&self) -> RequestStatus {
        self.status
    }

    pub fn requested_at(&self) -> Option<DateTime<Utc>> {
        self.requested_at
    }

    pub fn vision_exam_date(&self) -> Option<DateTime<Utc>> {
        self.vision_exam_date
    }

    pub fn vision_exam_result(&self) -> Option<ExamResult> {
        self.vision_exam_result
    }

    pub fn vision_exam_conducted_by(&self) -> Option<UserId> {
        self.vision_exam_conducted_by
    }

    pub fn payment_confirmed(&self) -> bool {
        self.payment_confirmed
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
impl Renewal {
    #[allow(clippy::too_many_arguments)]
    pub fn request(
        &self,
        renewal_id: AggregateId,
        license_id: AggregateId,
        user_id: UserId,
        tracking_code: String,
        new_photo: Option<String>,
        citizen_notes: Option<String>,
        old_expiry_date: Option<NaiveDate>,
        at: DateTime<Utc>,
    ) -> Result<Vec<RenewalEvent>, RenewalError> {
        if self.id.is_some() {
            return Err(RenewalError::AlreadyCreated);
        }
        let new_photo = clean(new_photo).ok_or(RenewalError::MissingPhoto)?;

        Ok(vec![RenewalEvent::RenewalRequested(RenewalRequestedData {
            renewal_id,
            license_id,
            user_id,
            tracking_code,
            new_photo,
            citizen_notes: clean(citizen_notes),
            old_expiry_date,
            fee: RENEWAL_FEE,
            requested_at: at,
        })])
    }

    fn ensure_pending(&self) -> Result<(), RenewalError> {
        if !self.status.is_pending() {
            return Err(RenewalError::NotPending {
                status: self.status,
            });
        }
        Ok(())
    }

    pub fn schedule_vision_exam(
        &self,
        date: DateTime<Utc>,
        officer: UserId,
    ) -> Result<Vec<RenewalEvent>, RenewalError> {
        self.ensure_pending()?;
        Ok(vec![RenewalEvent::VisionExamScheduled(
            VisionExamScheduledData {
                date,
                scheduled_by: officer,
            },
        )])
    }

    pub fn record_vision_exam(
        &self,
        result: ExamResult,
        notes: Option<String>,
        officer: UserId,
    ) -> Result<Vec<RenewalEvent>, RenewalError> {
        self.ensure_pending()?;
        if self.vision_exam_date.is_none() {
            return Err(RenewalError::VisionExamNotScheduled);
        }
        Ok(vec![RenewalEvent::VisionExamRecorded(VisionExamRecordedData {
            result,
            conducted_by: officer,
            notes: clean(notes),
        })])
    }

    /// Checks, in order: still pending, fee confirmed, vision exam recorded,
    /// vision exam passed.
    pub fn ensure_approvable(&self, payment_confirmed: bool) -> Result<(), RenewalError> {
        self.ensure_pending()?;
        if !payment_confirmed {
            return Err(RenewalError::PaymentNotConfirmed);
        }
        match self.vision_exam_result {
            None => Err(RenewalError::VisionExamMissing),
            Some(ExamResult::Failed) => Err(RenewalError::VisionExamFailed),
            Some(ExamResult::Passed) => Ok(()),
        }
    }

    pub fn approve(
        &self,
        payment_confirmed: bool,
        notes: Option<String>,
        new_expiry_date: NaiveDate,
        officer: UserId,
        at: DateTime<Utc>,
    ) -> Result<Vec<RenewalEvent>, RenewalError> {
        self.ensure_approvable(payment_confirmed)?;
        Ok(vec![RenewalEvent::RenewalApproved(RenewalApprovedData {
            reviewed_by: officer,
            reviewed_at: at,
            notes: clean(notes),
            new_expiry_date,
        })])
    }

    pub fn reject(
        &self,
        notes: Option<String>,
        officer: UserId,
        at: DateTime<Utc>,
    ) -> Result<Vec<RenewalEvent>, RenewalError> {
        self.ensure_pending()?;
        Ok(vec![RenewalEvent::RenewalRejected(RenewalRejectedData {
            reviewed_by: officer,
            reviewed_at: at,
            notes: clean(notes),
        })])
    }
}
