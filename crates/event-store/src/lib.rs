//! Event storage for the licensing workflow.
//!
//! Streams are keyed by [`AggregateId`]. A single [`EventStore::commit`] may
//! touch several streams and is applied all-or-nothing, each stream guarded
//! by its own expected version.

pub mod error;
pub mod event;
pub mod memory;
pub mod query;
pub mod store;

pub use common::AggregateId;
pub use error::{EventStoreError, Result};
pub use event::{EventEnvelope, EventEnvelopeBuilder, EventId, Version};
pub use memory::InMemoryEventStore;
pub use query::EventQuery;
pub use store::{AppendOptions, EventStore, EventStoreExt, EventStream, StreamAppend};
