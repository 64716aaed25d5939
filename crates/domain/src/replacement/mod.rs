//! Replacement of a lost or damaged card.

mod aggregate;
mod events;

pub use aggregate::{Replacement, ReplacementRequest};
pub use events::{
    ReplacementApprovedData, ReplacementEvent, ReplacementRejectedData, ReplacementRequestedData,
};

use thiserror::Error;

use crate::error::ErrorKind;
use crate::request::RequestStatus;

#[derive(Debug, Error)]
pub enum ReplacementError {
    #[error("Replacement already created")]
    AlreadyCreated,

    /// A police report must accompany every replacement request.
    #[error("A police report is required")]
    MissingPoliceReport,

    #[error("Replacement is not pending (status {status})")]
    NotPending { status: RequestStatus },

    #[error("Replacement fee payment has not been confirmed")]
    PaymentNotConfirmed,

    /// Officer did not echo back the request's payment code.
    #[error("Payment code does not match")]
    PaymentCodeMismatch,
}

impl ReplacementError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ReplacementError::AlreadyCreated => ErrorKind::Conflict,
            ReplacementError::MissingPoliceReport => ErrorKind::Validation,
            ReplacementError::NotPending { .. } => ErrorKind::InvalidTransition,
            ReplacementError::PaymentNotConfirmed => ErrorKind::PaymentNotConfirmed,
            ReplacementError::PaymentCodeMismatch => ErrorKind::PaymentCodeMismatch,
        }
    }
}
