use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    AggregateId, EventEnvelope, EventQuery, EventStoreError, Result, Version,
    store::{EventStore, EventStream, StreamAppend, validate_batch},
};

#[derive(Default)]
struct Log {
    /// Every event in commit order.
    events: Vec<EventEnvelope>,
    /// Current version per stream.
    heads: HashMap<AggregateId, Version>,
}

impl Log {
    fn head(&self, aggregate_id: AggregateId) -> Version {
        self.heads
            .get(&aggregate_id)
            .copied()
            .unwrap_or(Version::initial())
    }
}

/// In-memory event store.
///
/// The whole log sits behind one lock, so a commit is checked and applied
/// without any other writer interleaving.
#[derive(Clone, Default)]
pub struct InMemoryEventStore {
    log: Arc<RwLock<Log>>,
}

impl InMemoryEventStore {
    /// Creates a new empty in-memory event store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of events stored.
    pub async fn event_count(&self) -> usize {
        self.log.read().await.events.len()
    }

    /// Clears all events.
    pub async fn clear(&self) {
        let mut log = self.log.write().await;
        log.events.clear();
        log.heads.clear();
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn commit(&self, batch: Vec<StreamAppend>) -> Result<Vec<Version>> {
        validate_batch(&batch)?;

        let mut log = self.log.write().await;

        // Check every stream before touching any of them.
        for append in &batch {
            let current = log.head(append.aggregate_id);

            if let Some(expected) = append.options.expected_version
                && current != expected
            {
                metrics::counter!("event_store_conflicts_total").increment(1);
                tracing::debug!(
                    aggregate_id = %append.aggregate_id,
                    %expected,
                    actual = %current,
                    "commit rejected on version check"
                );
                return Err(EventStoreError::ConcurrencyConflict {
                    aggregate_id: append.aggregate_id,
                    expected,
                    actual: current,
                });
            }

            if let Some(first) = append.events.first()
                && first.version != current.next()
            {
                metrics::counter!("event_store_conflicts_total").increment(1);
                return Err(EventStoreError::ConcurrencyConflict {
                    aggregate_id: append.aggregate_id,
                    expected: append.options.expected_version.unwrap_or(current),
                    actual: current,
                });
            }
        }

        let mut versions = Vec::with_capacity(batch.len());
        let mut appended = 0u64;
        for append in batch {
            let head = match append.events.last() {
                Some(last) => last.version,
                None => log.head(append.aggregate_id),
            };
            if !append.events.is_empty() {
                appended += append.events.len() as u64;
                log.heads.insert(append.aggregate_id, head);
                log.events.extend(append.events);
            }
            versions.push(head);
        }

        metrics::counter!("event_store_events_appended_total").increment(appended);

        Ok(versions)
    }

    async fn get_events_for_aggregate(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<Vec<EventEnvelope>> {
        let log = self.log.read().await;
        let mut events: Vec<_> = log
            .events
            .iter()
            .filter(|e| e.aggregate_id == aggregate_id)
            .cloned()
            .collect();
        events.sort_by_key(|e| e.version);
        Ok(events)
    }

    async fn query_events(&self, query: EventQuery) -> Result<Vec<EventEnvelope>> {
        let log = self.log.read().await;
        let events = log
            .events
            .iter()
            .filter(|e| {
                if let Some(id) = query.aggregate_id
                    && e.aggregate_id != id
                {
                    return false;
                }
                if let Some(ref agg_type) = query.aggregate_type
                    && &e.aggregate_type != agg_type
                {
                    return false;
                }
                if let Some(ref types) = query.event_types
                    && !types.contains(&e.event_type)
                {
                    return false;
                }
                if let Some(from) = query.from_version
                    && e.version < from
                {
                    return false;
                }
                if let Some(to) = query.to_version
                    && e.version > to
                {
                    return false;
                }
                if let Some(from) = query.from_timestamp
                    && e.timestamp < from
                {
                    return false;
                }
                if let Some(to) = query.to_timestamp
                    && e.timestamp > to
                {
                    return false;
                }
                true
            })
            .skip(query.offset.unwrap_or(0))
            .take(query.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect();

        Ok(events)
    }

    async fn get_events_by_type(&self, event_type: &str) -> Result<Vec<EventEnvelope>> {
        let log = self.log.read().await;
        Ok(log
            .events
            .iter()
            .filter(|e| e.event_type == event_type)
            .cloned()
            .collect())
    }

    async fn stream_all_events(&self) -> Result<EventStream> {
        use futures_util::stream;

        let events = self.log.read().await.events.clone();
        let stream = stream::iter(events.into_iter().map(Ok));
        Ok(Box::pin(stream))
    }

    async fn get_aggregate_version(&self, aggregate_id: AggregateId) -> Result<Option<Version>> {
        let log = self.log.read().await;
        Ok(log.heads.get(&aggregate_id).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AppendOptions, EventStoreExt};

    fn create_test_event(
        aggregate_id: AggregateId,
        version: Version,
        event_type: &str,
    ) -> EventEnvelope {
        EventEnvelope::builder()
            .aggregate_id(aggregate_id)
            .aggregate_type("TestAggregate")
            .event_type(event_type)
            .version(version)
            .payload_raw(serde_json::json!({"test": true}))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_append_single_event() {
        let store = InMemoryEventStore::new();
        let aggregate_id = AggregateId::new();
        let event = create_test_event(aggregate_id, Version::first(), "TestEvent");

        let version = store
            .append(vec![event], AppendOptions::expect_new())
            .await
            .unwrap();
        assert_eq!(version, Version::first());

        let events = store.get_events_for_aggregate(aggregate_id).await.unwrap();
        assert_eq!(events.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrency_conflict_on_wrong_version() {
        let store = InMemoryEventStore::new();
        let aggregate_id = AggregateId::new();

        let event1 = create_test_event(aggregate_id, Version::first(), "Event1");
        store
            .append(vec![event1], AppendOptions::expect_new())
            .await
            .unwrap();

        let event2 = create_test_event(aggregate_id, Version::new(2), "Event2");
        let result = store
            .append(
                vec![event2],
                AppendOptions::expect_version(Version::initial()),
            )
            .await;

        assert!(matches!(
            result,
            Err(EventStoreError::ConcurrencyConflict { .. })
        ));
    }

    #[tokio::test]
    async fn test_unchecked_append_still_rejects_reused_versions() {
        let store = InMemoryEventStore::new();
        let aggregate_id = AggregateId::new();

        store
            .append(
                vec![create_test_event(aggregate_id, Version::first(), "A")],
                AppendOptions::new(),
            )
            .await
            .unwrap();
        let result = store
            .append(
                vec![create_test_event(aggregate_id, Version::first(), "B")],
                AppendOptions::new(),
            )
            .await;

        assert!(matches!(
            result,
            Err(EventStoreError::ConcurrencyConflict { .. })
        ));
    }

    #[tokio::test]
    async fn test_multi_stream_commit_is_all_or_nothing() {
        let store = InMemoryEventStore::new();
        let license = AggregateId::new();
        let claim = AggregateId::new();

        // Someone already holds the claim stream.
        store
            .append(
                vec![create_test_event(claim, Version::first(), "CodeClaimed")],
                AppendOptions::expect_new(),
            )
            .await
            .unwrap();

        let result = store
            .commit(vec![
                StreamAppend::new(
                    license,
                    AppendOptions::expect_new(),
                    vec![create_test_event(license, Version::first(), "LicenseIssued")],
                ),
                StreamAppend::new(
                    claim,
                    AppendOptions::expect_new(),
                    vec![create_test_event(claim, Version::first(), "CodeClaimed")],
                ),
            ])
            .await;

        assert!(matches!(
            result,
            Err(EventStoreError::ConcurrencyConflict { aggregate_id, .. }) if aggregate_id == claim
        ));
        assert!(store.get_events_for_aggregate(license).await.unwrap().is_empty());
        assert_eq!(store.event_count().await, 1);
    }

    #[tokio::test]
    async fn test_guard_fails_commit_when_stream_moved() {
        let store = InMemoryEventStore::new();
        let watched = AggregateId::new();
        let target = AggregateId::new();

        store
            .append(
                vec![create_test_event(watched, Version::first(), "A")],
                AppendOptions::new(),
            )
            .await
            .unwrap();
        store
            .append(
                vec![create_test_event(watched, Version::new(2), "B")],
                AppendOptions::new(),
            )
            .await
            .unwrap();

        let result = store
            .commit(vec![
                StreamAppend::new(
                    target,
                    AppendOptions::expect_new(),
                    vec![create_test_event(target, Version::first(), "C")],
                ),
                StreamAppend::guard(watched, Version::first()),
            ])
            .await;
        assert!(result.is_err());

        let versions = store
            .commit(vec![
                StreamAppend::new(
                    target,
                    AppendOptions::expect_new(),
                    vec![create_test_event(target, Version::first(), "C")],
                ),
                StreamAppend::guard(watched, Version::new(2)),
            ])
            .await
            .unwrap();
        assert_eq!(versions, vec![Version::first(), Version::new(2)]);
    }

    #[tokio::test]
    async fn test_get_events_by_type() {
        let store = InMemoryEventStore::new();
        let id1 = AggregateId::new();
        let id2 = AggregateId::new();

        store
            .append(
                vec![create_test_event(id1, Version::first(), "ExamScheduled")],
                AppendOptions::new(),
            )
            .await
            .unwrap();
        store
            .append(
                vec![create_test_event(id2, Version::first(), "ExamGraded")],
                AppendOptions::new(),
            )
            .await
            .unwrap();
        store
            .append(
                vec![create_test_event(id1, Version::new(2), "ExamScheduled")],
                AppendOptions::new(),
            )
            .await
            .unwrap();

        let scheduled = store.get_events_by_type("ExamScheduled").await.unwrap();
        assert_eq!(scheduled.len(), 2);

        let graded = store.get_events_by_type("ExamGraded").await.unwrap();
        assert_eq!(graded.len(), 1);
    }

    #[tokio::test]
    async fn test_query_events_with_filters() {
        let store = InMemoryEventStore::new();
        let id1 = AggregateId::new();

        let events = vec![
            create_test_event(id1, Version::new(1), "Event1"),
            create_test_event(id1, Version::new(2), "Event2"),
            create_test_event(id1, Version::new(3), "Event3"),
        ];
        store.append(events, AppendOptions::new()).await.unwrap();

        let query = EventQuery::new()
            .aggregate_id(id1)
            .from_version(Version::new(2))
            .to_version(Version::new(2));

        let results = store.query_events(query).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].version, Version::new(2));
    }

    #[tokio::test]
    async fn test_stream_all_events_keeps_commit_order() {
        use futures_util::StreamExt;

        let store = InMemoryEventStore::new();
        let id1 = AggregateId::new();
        let id2 = AggregateId::new();

        store
            .commit(vec![
                StreamAppend::new(
                    id2,
                    AppendOptions::expect_new(),
                    vec![create_test_event(id2, Version::first(), "First")],
                ),
                StreamAppend::new(
                    id1,
                    AppendOptions::expect_new(),
                    vec![create_test_event(id1, Version::first(), "Second")],
                ),
            ])
            .await
            .unwrap();

        let stream = store.stream_all_events().await.unwrap();
        let events: Vec<_> = stream.collect().await;
        let types: Vec<_> = events
            .into_iter()
            .map(|e| e.unwrap().event_type)
            .collect();
        assert_eq!(types, vec!["First", "Second"]);
    }

    #[tokio::test]
    async fn test_get_aggregate_version() {
        let store = InMemoryEventStore::new();
        let aggregate_id = AggregateId::new();

        assert!(
            store
                .get_aggregate_version(aggregate_id)
                .await
                .unwrap()
                .is_none()
        );

        let events = vec![
            create_test_event(aggregate_id, Version::new(1), "Event1"),
            create_test_event(aggregate_id, Version::new(2), "Event2"),
        ];
        store.append(events, AppendOptions::new()).await.unwrap();

        let version = store.get_aggregate_version(aggregate_id).await.unwrap();
        assert_eq!(version, Some(Version::new(2)));
        assert!(store.aggregate_exists(aggregate_id).await.unwrap());
    }
}
