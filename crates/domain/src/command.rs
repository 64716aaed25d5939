//! Command handling infrastructure.
//!
//! A command runs against aggregates loaded from the store, and every event
//! it produces is committed in one [`UnitOfWork`]. Streams that were only
//! read can be added as guards so the commit fails if they moved meanwhile.

use std::marker::PhantomData;

use chrono::{DateTime, Utc};
use common::{Actor, AggregateId};
use event_store::{AppendOptions, EventEnvelope, EventStore, StreamAppend, Version};
use uuid::Uuid;

use crate::aggregate::{Aggregate, DomainEvent};
use crate::codes::{CodeClaim, CodeKind, claim_stream_id};
use crate::error::DomainError;

/// Rebuilds an aggregate by replaying its stream.
///
/// A stream with no events yields `A::default()` at version 0.
pub async fn load_aggregate<S, A>(store: &S, aggregate_id: AggregateId) -> Result<A, DomainError>
where
    S: EventStore + ?Sized,
    A: Aggregate,
{
    let mut aggregate = A::default();
    for envelope in store.get_events_for_aggregate(aggregate_id).await? {
        let event: A::Event = envelope.decode()?;
        aggregate.apply(event);
        aggregate.set_version(envelope.version);
    }
    Ok(aggregate)
}

/// Events gathered across one or more streams, committed atomically.
#[derive(Debug)]
pub struct UnitOfWork {
    actor: Actor,
    at: DateTime<Utc>,
    correlation_id: Uuid,
    streams: Vec<StreamAppend>,
}

impl UnitOfWork {
    pub fn new(actor: Actor, at: DateTime<Utc>) -> Self {
        Self {
            actor,
            at,
            correlation_id: Uuid::new_v4(),
            streams: Vec::new(),
        }
    }

    pub fn actor(&self) -> &Actor {
        &self.actor
    }

    pub fn at(&self) -> DateTime<Utc> {
        self.at
    }

    /// Applies `events` to `aggregate` and queues them for its stream.
    ///
    /// The stream's expected version is the aggregate's version the first
    /// time it is recorded; later calls on the same stream chain on.
    pub fn record<A: Aggregate>(
        &mut self,
        aggregate_id: AggregateId,
        aggregate: &mut A,
        events: Vec<A::Event>,
    ) -> Result<(), DomainError> {
        if events.is_empty() {
            return Ok(());
        }

        let start = aggregate.version();
        let mut envelopes = Vec::with_capacity(events.len());
        for event in events {
            let version = aggregate.version().next();
            let envelope = EventEnvelope::builder()
                .aggregate_id(aggregate_id)
                .aggregate_type(A::aggregate_type())
                .event_type(event.event_type())
                .version(version)
                .timestamp(self.at)
                .payload(&event)?
                .actor(&self.actor)
                .correlation_id(self.correlation_id)
                .build()?;
            aggregate.apply(event);
            aggregate.set_version(version);
            envelopes.push(envelope);
        }

        match self
            .streams
            .iter_mut()
            .find(|s| s.aggregate_id == aggregate_id)
        {
            Some(stream) => stream.events.extend(envelopes),
            None => self.streams.push(StreamAppend::new(
                aggregate_id,
                AppendOptions::expect_version(start),
                envelopes,
            )),
        }
        Ok(())
    }

    /// Requires `aggregate_id` to still be at `version` when the work commits.
    pub fn guard(&mut self, aggregate_id: AggregateId, version: Version) {
        if !self.streams.iter().any(|s| s.aggregate_id == aggregate_id) {
            self.streams.push(StreamAppend::guard(aggregate_id, version));
        }
    }

    /// Reserves `code` for `owner`. The commit fails if anyone holds it already.
    pub fn claim(
        &mut self,
        kind: CodeKind,
        code: &str,
        owner: AggregateId,
    ) -> Result<(), DomainError> {
        let mut claim = CodeClaim::default();
        let events = claim.claim(kind, code, owner, self.at)?;
        self.record(claim_stream_id(kind, code), &mut claim, events)
    }

    /// True when nothing would be written.
    pub fn is_empty(&self) -> bool {
        self.streams.iter().all(|s| s.is_guard())
    }

    pub async fn commit<S: EventStore + ?Sized>(self, store: &S) -> Result<(), DomainError> {
        if self.is_empty() {
            return Ok(());
        }
        store.commit(self.streams).await?;
        Ok(())
    }
}

/// Result of command execution.
#[derive(Debug)]
pub struct CommandResult<A: Aggregate> {
    /// The aggregate after applying the new events.
    pub aggregate: A,

    /// The events that were generated and persisted.
    pub events: Vec<A::Event>,

    /// The new version of the aggregate after the command.
    pub new_version: Version,
}

/// Runs single-stream commands: load, decide, commit.
///
/// Fixtures and benches use this to drive one aggregate at a time. Work that
/// touches several streams, guards or code claims builds a [`UnitOfWork`]
/// directly.
pub struct CommandHandler<S, A>
where
    S: EventStore,
    A: Aggregate,
{
    store: S,
    _phantom: PhantomData<A>,
}

impl<S, A> CommandHandler<S, A>
where
    S: EventStore,
    A: Aggregate,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            _phantom: PhantomData,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Loads an aggregate from the event store.
    ///
    /// If the aggregate doesn't exist, returns a default instance.
    pub async fn load(&self, aggregate_id: AggregateId) -> Result<A, DomainError> {
        load_aggregate(&self.store, aggregate_id).await
    }

    /// Loads an aggregate, returning None if it doesn't exist.
    pub async fn load_existing(&self, aggregate_id: AggregateId) -> Result<Option<A>, DomainError> {
        let aggregate = self.load(aggregate_id).await?;
        Ok(aggregate.id().is_some().then_some(aggregate))
    }

    /// Loads an aggregate or fails with `AggregateNotFound`.
    pub async fn load_required(&self, aggregate_id: AggregateId) -> Result<A, DomainError> {
        self.load_existing(aggregate_id)
            .await?
            .ok_or_else(|| DomainError::not_found(A::aggregate_type(), aggregate_id))
    }

    /// Executes a command against a possibly new aggregate and persists the
    /// resulting events with an optimistic version check.
    pub async fn execute<F>(
        &self,
        actor: &Actor,
        at: DateTime<Utc>,
        aggregate_id: AggregateId,
        command_fn: F,
    ) -> Result<CommandResult<A>, DomainError>
    where
        F: FnOnce(&A) -> Result<Vec<A::Event>, A::Error>,
        DomainError: From<A::Error>,
    {
        let aggregate = self.load(aggregate_id).await?;
        self.run(actor, at, aggregate_id, aggregate, command_fn).await
    }

    /// Like [`execute`](Self::execute) but the aggregate must already exist.
    pub async fn execute_existing<F>(
        &self,
        actor: &Actor,
        at: DateTime<Utc>,
        aggregate_id: AggregateId,
        command_fn: F,
    ) -> Result<CommandResult<A>, DomainError>
    where
        F: FnOnce(&A) -> Result<Vec<A::Event>, A::Error>,
        DomainError: From<A::Error>,
    {
        let aggregate = self.load_required(aggregate_id).await?;
        self.run(actor, at, aggregate_id, aggregate, command_fn).await
    }

    async fn run<F>(
        &self,
        actor: &Actor,
        at: DateTime<Utc>,
        aggregate_id: AggregateId,
        mut aggregate: A,
        command_fn: F,
    ) -> Result<CommandResult<A>, DomainError>
    where
        F: FnOnce(&A) -> Result<Vec<A::Event>, A::Error>,
        DomainError: From<A::Error>,
    {
        let events = command_fn(&aggregate)?;

        let mut work = UnitOfWork::new(*actor, at);
        work.record(aggregate_id, &mut aggregate, events.clone())?;
        work.commit(&self.store).await?;

        let new_version = aggregate.version();
        Ok(CommandResult {
            aggregate,
            events,
            new_version,
        })
    }
}
