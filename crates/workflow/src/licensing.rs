//! Wires the engines to one store and one set of collaborators.

use std::sync::Arc;

use common::{Clock, SystemClock};
use domain::{InMemoryCatalog, ReferenceCatalog};
use event_store::EventStore;
use projections::{LicenseQueuesView, ProjectionProcessor, ReadModel, RequestDeskView};

use crate::applications::LicenseApplications;
use crate::context::WorkflowContext;
use crate::dept_approval::DepartmentApproval;
use crate::effects::NotificationDispatcher;
use crate::examinations::Examinations;
use crate::queries::OfficerQueries;
use crate::renewals::Renewals;
use crate::replacements::Replacements;
use crate::services::{
    BlobStore, InMemoryBlobStore, InMemoryNotifier, InMemoryViolations, Notifier, ViolationLookup,
};
use crate::uploads::Uploads;
use crate::verification::Verification;

/// External dependencies of the engines.
#[derive(Clone)]
pub struct Collaborators {
    pub catalog: Arc<dyn ReferenceCatalog>,
    pub clock: Arc<dyn Clock>,
    pub notifier: Arc<dyn Notifier>,
    pub blobs: Arc<dyn BlobStore>,
    pub violations: Arc<dyn ViolationLookup>,
}

impl Collaborators {
    /// Seeded catalog, wall clock and in-memory services.
    pub fn in_memory() -> Self {
        Self {
            catalog: Arc::new(InMemoryCatalog::seeded()),
            clock: Arc::new(SystemClock),
            notifier: Arc::new(InMemoryNotifier::new()),
            blobs: Arc::new(InMemoryBlobStore::new()),
            violations: Arc::new(InMemoryViolations::new()),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

/// Every engine of the licensing workflow over a shared store.
pub struct Licensing<S: EventStore> {
    pub applications: LicenseApplications<S>,
    pub exams: Examinations<S>,
    pub dept_approval: DepartmentApproval<S>,
    pub renewals: Renewals<S>,
    pub replacements: Replacements<S>,
    pub verification: Verification<S>,
    pub uploads: Uploads,
    pub queries: OfficerQueries<S>,
    pub dispatcher: NotificationDispatcher,
    read_models: Vec<Box<dyn ReadModel>>,
}

impl<S: EventStore + Clone + 'static> Licensing<S> {
    pub fn new(store: S, collaborators: Collaborators) -> Self {
        let ctx = WorkflowContext::new(
            store.clone(),
            collaborators.catalog,
            collaborators.clock,
        );

        let queues = LicenseQueuesView::new();
        let desk = RequestDeskView::new();
        let mut processor = ProjectionProcessor::new(store);
        processor.register(Box::new(queues.clone()));
        processor.register(Box::new(desk.clone()));
        let read_models: Vec<Box<dyn ReadModel>> =
            vec![Box::new(queues.clone()), Box::new(desk.clone())];

        Self {
            applications: LicenseApplications::new(ctx.clone()),
            exams: Examinations::new(ctx.clone()),
            dept_approval: DepartmentApproval::new(ctx.clone(), collaborators.blobs.clone()),
            renewals: Renewals::new(ctx.clone()),
            replacements: Replacements::new(ctx.clone()),
            verification: Verification::new(ctx.clone(), collaborators.violations),
            uploads: Uploads::new(collaborators.blobs),
            queries: OfficerQueries::new(ctx, Arc::new(processor), queues, desk),
            dispatcher: NotificationDispatcher::new(collaborators.notifier),
            read_models,
        }
    }

    /// Entry counts of the read models, for health reporting.
    pub fn read_model_counts(&self) -> Vec<(&'static str, usize)> {
        self.read_models
            .iter()
            .map(|model| (model.name(), model.count()))
            .collect()
    }
}
