//! Projection error types.

use thiserror::Error;

/// Errors that can occur while feeding events into the read models.
#[derive(Debug, Error)]
pub enum ProjectionError {
    /// An error occurred in the event store.
    #[error("Event store error: {0}")]
    EventStore(#[from] event_store::EventStoreError),

    /// An event payload did not decode into the expected domain event.
    #[error("Cannot decode {event_type} event: {source}")]
    Decode {
        event_type: String,
        #[source]
        source: event_store::EventStoreError,
    },
}

impl ProjectionError {
    pub(crate) fn decode(event: &event_store::EventEnvelope, source: event_store::EventStoreError) -> Self {
        ProjectionError::Decode {
            event_type: event.event_type.clone(),
            source,
        }
    }
}

/// Result type for projection operations.
pub type Result<T> = std::result::Result<T, ProjectionError>;
