//! Projection processor for feeding events to projections.

use event_store::EventStore;
use futures_util::StreamExt;
use tokio::sync::Mutex;

use crate::Result;
use crate::projection::{Projection, ProjectionPosition};

/// Delivers events from an event store to the registered projections.
///
/// The processor owns a single cursor into the commit-ordered log. A
/// catch-up skips everything before the cursor, so each event reaches each
/// projection once. Concurrent catch-ups are serialised on the cursor lock.
pub struct ProjectionProcessor<S: EventStore> {
    store: S,
    projections: Vec<Box<dyn Projection>>,
    cursor: Mutex<ProjectionPosition>,
}

impl<S: EventStore> ProjectionProcessor<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            projections: Vec::new(),
            cursor: Mutex::new(ProjectionPosition::zero()),
        }
    }

    /// Registers a projection. Register every projection before the first
    /// catch-up; a late one only sees events after the cursor.
    pub fn register(&mut self, projection: Box<dyn Projection>) {
        self.projections.push(projection);
    }

    pub fn projection_count(&self) -> usize {
        self.projections.len()
    }

    pub async fn position(&self) -> ProjectionPosition {
        *self.cursor.lock().await
    }

    /// Streams the store and delivers every event past the cursor.
    #[tracing::instrument(skip(self))]
    pub async fn run_catch_up(&self) -> Result<()> {
        let mut cursor = self.cursor.lock().await;
        let mut stream = self.store.stream_all_events().await?;
        let mut event_index: u64 = 0;
        let mut delivered: u64 = 0;

        while let Some(result) = stream.next().await {
            let event = result?;
            event_index += 1;
            if event_index <= cursor.events_processed {
                continue;
            }

            for projection in &self.projections {
                if projection.handles(&event.aggregate_type) {
                    projection.handle(&event).await?;
                }
            }
            *cursor = cursor.advance();
            delivered += 1;
            metrics::counter!("projections_events_processed").increment(1);
        }

        if delivered > 0 {
            tracing::debug!(delivered, position = %*cursor, "catch-up complete");
        }

        Ok(())
    }

    /// Resets every projection and replays the whole log.
    #[tracing::instrument(skip(self))]
    pub async fn rebuild_all(&self) -> Result<()> {
        {
            let mut cursor = self.cursor.lock().await;
            for projection in &self.projections {
                projection.reset().await?;
            }
            *cursor = ProjectionPosition::zero();
        }
        self.run_catch_up().await?;
        tracing::info!(projections = self.projections.len(), "projections rebuilt");
        Ok(())
    }
}
