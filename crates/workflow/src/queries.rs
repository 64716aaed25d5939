//! Officer and citizen lists served from the read models.
//!
//! Every query first brings the views up to date, so a list read right
//! after a command reflects it.

use std::sync::Arc;

use chrono::NaiveDate;
use common::{Actor, Role};
use domain::{LicenseKind, RequestStatus};
use event_store::EventStore;
use projections::{
    LicenseQueuesView, LicenseSummary, ProjectionProcessor, RenewalSummary, ReplacementSummary,
    RequestDeskView,
};

use crate::context::WorkflowContext;
use crate::error::Result;

pub struct OfficerQueries<S: EventStore> {
    ctx: WorkflowContext<S>,
    processor: Arc<ProjectionProcessor<S>>,
    queues: LicenseQueuesView,
    desk: RequestDeskView,
}

impl<S: EventStore + Clone> OfficerQueries<S> {
    pub fn new(
        ctx: WorkflowContext<S>,
        processor: Arc<ProjectionProcessor<S>>,
        queues: LicenseQueuesView,
        desk: RequestDeskView,
    ) -> Self {
        Self {
            ctx,
            processor,
            queues,
            desk,
        }
    }

    async fn refresh(&self, actor: &Actor, required: Role, action: &'static str) -> Result<NaiveDate> {
        actor.require(&[required], action)?;
        self.processor.run_catch_up().await?;
        Ok(self.ctx.now().date_naive())
    }

    pub async fn pending(&self, actor: &Actor) -> Result<Vec<LicenseSummary>> {
        let today = self.refresh(actor, Role::LicenseOfficer, "list pending applications").await?;
        Ok(self.queues.pending(today).await)
    }

    pub async fn all(&self, actor: &Actor, kind: Option<LicenseKind>) -> Result<Vec<LicenseSummary>> {
        let today = self.refresh(actor, Role::LicenseOfficer, "list licenses").await?;
        Ok(self.queues.all(kind, today).await)
    }

    /// Issued licenses not yet sent to the department.
    pub async fn dept_approval_queue(&self, actor: &Actor) -> Result<Vec<LicenseSummary>> {
        let today = self.refresh(actor, Role::LicenseOfficer, "list the department queue").await?;
        Ok(self.queues.dept_approval_queue(today).await)
    }

    /// Licenses waiting for the super admin's signature.
    pub async fn signature_pending(&self, actor: &Actor) -> Result<Vec<LicenseSummary>> {
        let today = self.refresh(actor, Role::LicenseOfficer, "list pending signatures").await?;
        Ok(self.queues.signature_pending(today).await)
    }

    pub async fn printable(&self, actor: &Actor) -> Result<Vec<LicenseSummary>> {
        let today = self.refresh(actor, Role::LicenseOfficer, "list printable licenses").await?;
        Ok(self.queues.printable(today).await)
    }

    pub async fn renewals(
        &self,
        actor: &Actor,
        status: Option<RequestStatus>,
    ) -> Result<Vec<RenewalSummary>> {
        self.refresh(actor, Role::LicenseOfficer, "list renewals").await?;
        Ok(self.desk.renewals(status).await)
    }

    /// Pending replacements without their payment codes.
    pub async fn pending_replacements(&self, actor: &Actor) -> Result<Vec<ReplacementSummary>> {
        self.refresh(actor, Role::LicenseOfficer, "list replacements").await?;
        Ok(self.desk.pending_replacements().await)
    }

    pub async fn my_renewals(&self, actor: &Actor) -> Result<Vec<RenewalSummary>> {
        self.refresh(actor, Role::Citizen, "list own renewals").await?;
        Ok(self.desk.renewals_for_user(actor.id).await)
    }

    pub async fn my_replacements(&self, actor: &Actor) -> Result<Vec<ReplacementSummary>> {
        self.refresh(actor, Role::Citizen, "list own replacements").await?;
        Ok(self.desk.replacements_for_user(actor.id).await)
    }
}
