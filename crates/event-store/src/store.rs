use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;

use crate::{AggregateId, EventEnvelope, EventQuery, EventStoreError, Result, Version};

/// Options for appending events to a stream.
#[derive(Debug, Clone, Copy, Default)]
pub struct AppendOptions {
    /// Expected version of the aggregate for optimistic concurrency control.
    /// If None, no version check is performed (use with caution).
    pub expected_version: Option<Version>,
}

impl AppendOptions {
    /// Creates options with no version check.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates options expecting the aggregate to be at a specific version.
    pub fn expect_version(version: Version) -> Self {
        Self {
            expected_version: Some(version),
        }
    }

    /// Creates options expecting the aggregate to not exist (new aggregate).
    pub fn expect_new() -> Self {
        Self {
            expected_version: Some(Version::initial()),
        }
    }
}

/// The part of a commit that targets one stream.
///
/// An append with no events is a *guard*: it only asserts that the stream is
/// still at the expected version, so a decision that read the stream fails
/// if someone else wrote to it in between.
#[derive(Debug, Clone)]
pub struct StreamAppend {
    pub aggregate_id: AggregateId,
    pub options: AppendOptions,
    pub events: Vec<EventEnvelope>,
}

impl StreamAppend {
    pub fn new(aggregate_id: AggregateId, options: AppendOptions, events: Vec<EventEnvelope>) -> Self {
        Self {
            aggregate_id,
            options,
            events,
        }
    }

    /// A version assertion with no events.
    pub fn guard(aggregate_id: AggregateId, version: Version) -> Self {
        Self::new(aggregate_id, AppendOptions::expect_version(version), Vec::new())
    }

    pub fn is_guard(&self) -> bool {
        self.events.is_empty()
    }
}

/// A stream of events.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<EventEnvelope>> + Send>>;

/// Core trait for event store implementations.
///
/// An event store is responsible for persisting and retrieving events.
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Commits appends to one or more streams atomically.
    ///
    /// Either every stream in the batch is written or none is. Any stream
    /// whose current version differs from its `expected_version` fails the
    /// whole commit with `ConcurrencyConflict`.
    ///
    /// Returns the version of each stream after the commit, in batch order.
    async fn commit(&self, batch: Vec<StreamAppend>) -> Result<Vec<Version>>;

    /// Retrieves all events for a specific aggregate.
    ///
    /// Events are returned in version order (oldest first).
    async fn get_events_for_aggregate(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<Vec<EventEnvelope>>;

    /// Retrieves events matching a query.
    async fn query_events(&self, query: EventQuery) -> Result<Vec<EventEnvelope>>;

    /// Retrieves events by type.
    async fn get_events_by_type(&self, event_type: &str) -> Result<Vec<EventEnvelope>>;

    /// Streams all events in the store.
    ///
    /// Events are returned in commit order.
    async fn stream_all_events(&self) -> Result<EventStream>;

    /// Gets the current version of an aggregate.
    ///
    /// Returns None if the aggregate doesn't exist.
    async fn get_aggregate_version(&self, aggregate_id: AggregateId) -> Result<Option<Version>>;
}

/// Extension trait providing convenience methods for event stores.
#[async_trait]
pub trait EventStoreExt: EventStore {
    /// Appends events to a single stream.
    async fn append(&self, events: Vec<EventEnvelope>, options: AppendOptions) -> Result<Version> {
        let aggregate_id = events
            .first()
            .map(|e| e.aggregate_id)
            .ok_or_else(|| EventStoreError::InvalidAppend("cannot append empty event list".into()))?;
        let versions = self
            .commit(vec![StreamAppend::new(aggregate_id, options, events)])
            .await?;
        Ok(versions.into_iter().next().unwrap_or_default())
    }

    /// Appends a single event to the store.
    async fn append_event(&self, event: EventEnvelope, options: AppendOptions) -> Result<Version> {
        self.append(vec![event], options).await
    }

    /// Checks if an aggregate exists (has any events).
    async fn aggregate_exists(&self, aggregate_id: AggregateId) -> Result<bool> {
        Ok(self.get_aggregate_version(aggregate_id).await?.is_some())
    }
}

// Blanket implementation for all EventStore implementations
impl<T: EventStore + ?Sized> EventStoreExt for T {}

/// Validates the shape of a batch before any version check.
///
/// Each stream may appear once, its events must all belong to it, share one
/// aggregate type, and carry consecutive versions.
pub fn validate_batch(batch: &[StreamAppend]) -> Result<()> {
    if batch.is_empty() {
        return Err(EventStoreError::InvalidAppend("cannot commit an empty batch".into()));
    }

    for (i, append) in batch.iter().enumerate() {
        if batch[..i].iter().any(|a| a.aggregate_id == append.aggregate_id) {
            return Err(EventStoreError::InvalidAppend(format!(
                "stream {} appears more than once in one commit",
                append.aggregate_id
            )));
        }

        let Some(first) = append.events.first() else {
            if append.options.expected_version.is_none() {
                return Err(EventStoreError::InvalidAppend(format!(
                    "guard on stream {} has no expected version",
                    append.aggregate_id
                )));
            }
            continue;
        };

        let mut expected_version = first.version;
        for (n, event) in append.events.iter().enumerate() {
            if event.aggregate_id != append.aggregate_id {
                return Err(EventStoreError::InvalidAppend(
                    "all events must be for the same aggregate".into(),
                ));
            }
            if event.aggregate_type != first.aggregate_type {
                return Err(EventStoreError::InvalidAppend(
                    "all events must have the same aggregate type".into(),
                ));
            }
            if n > 0 {
                expected_version = expected_version.next();
                if event.version != expected_version {
                    return Err(EventStoreError::InvalidAppend(format!(
                        "event versions must be sequential. Expected {}, got {}",
                        expected_version, event.version
                    )));
                }
            }
        }
    }

    Ok(())
}
