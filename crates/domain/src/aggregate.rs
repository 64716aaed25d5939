//! Core aggregate and domain event traits.

use common::AggregateId;
use event_store::Version;
use serde::{Serialize, de::DeserializeOwned};

/// A fact recorded on one aggregate's stream. Named in the past tense.
pub trait DomainEvent: Serialize + DeserializeOwned + Send + Sync + Clone {
    /// Name stored in the envelope's `event_type`, used for filtering.
    fn event_type(&self) -> &'static str;
}

/// Trait for event-sourced aggregates (License, Exam, Renewal, ...).
///
/// Command methods take `&self` and return the events a command would
/// produce; nothing changes until those events are applied. State is only
/// ever rebuilt by replaying events through [`Aggregate::apply`].
pub trait Aggregate: Default + Send + Sync + Sized {
    type Event: DomainEvent;

    type Error: std::error::Error + Send + Sync;

    /// Stored as the envelope's `aggregate_type`.
    fn aggregate_type() -> &'static str;

    /// `None` until the creation event has been applied.
    fn id(&self) -> Option<AggregateId>;

    /// Number of events applied so far. 0 for a fresh instance.
    fn version(&self) -> Version;

    fn set_version(&mut self, version: Version);

    /// Folds one event into the state. Must not fail: the event already happened.
    fn apply(&mut self, event: Self::Event);

    fn apply_events(&mut self, events: impl IntoIterator<Item = Self::Event>) {
        for event in events {
            self.apply(event);
        }
    }
}
