//! Renewal of an expired license.

mod aggregate;
mod events;

pub use aggregate::Renewal;
pub use events::{
    RenewalApprovedData, RenewalEvent, RenewalRejectedData, RenewalRequestedData,
    VisionExamRecordedData, VisionExamScheduledData,
};

use thiserror::Error;

use crate::error::ErrorKind;
use crate::request::RequestStatus;

#[derive(Debug, Error)]
pub enum RenewalError {
    #[error("Renewal already created")]
    AlreadyCreated,

    /// A new photo must accompany every renewal.
    #[error("A new photo is required")]
    MissingPhoto,

    /// The request was already approved or rejected.
    #[error("Renewal is not pending (status {status})")]
    NotPending { status: RequestStatus },

    #[error("Renewal fee payment has not been confirmed")]
    PaymentNotConfirmed,

    /// A vision exam result is required before approval.
    #[error("Vision exam result is missing")]
    VisionExamMissing,

    #[error("Vision exam was not passed")]
    VisionExamFailed,

    /// A result was submitted before the exam was scheduled.
    #[error("Vision exam has not been scheduled")]
    VisionExamNotScheduled,
}

impl RenewalError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RenewalError::AlreadyCreated => ErrorKind::Conflict,
            RenewalError::MissingPhoto => ErrorKind::Validation,
            RenewalError::NotPending { .. }
            | RenewalError::VisionExamMissing
            | RenewalError::VisionExamNotScheduled => ErrorKind::InvalidTransition,
            RenewalError::PaymentNotConfirmed => ErrorKind::PaymentNotConfirmed,
            RenewalError::VisionExamFailed => ErrorKind::Ineligible,
        }
    }
}
