//! HTTP route handlers.

pub mod exams;
pub mod health;
pub mod licenses;
pub mod metrics;
pub mod renewals;
pub mod replacements;
pub mod uploads;
pub mod verify;

use std::sync::Arc;

use common::{AggregateId, Clock};
use event_store::EventStore;
use workflow::{Licensing, Outcome};

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S: EventStore> {
    pub licensing: Licensing<S>,
    /// Same clock the engines use, so responses derive expiry consistently.
    pub clock: Arc<dyn Clock>,
}

impl<S: EventStore> AppState<S> {
    /// Sends the notifications of a committed operation and returns its value.
    pub async fn deliver<T>(&self, outcome: Outcome<T>) -> T {
        self.licensing.dispatcher.deliver(outcome).await
    }
}

pub fn parse_aggregate_id(id: &str) -> Result<AggregateId, ApiError> {
    uuid::Uuid::parse_str(id)
        .map(AggregateId::from_uuid)
        .map_err(|_| ApiError::BadRequest(format!("invalid id: {id}")))
}
