//! Renewal Engine.

use std::time::Instant;

use chrono::{DateTime, Utc};
use common::{Actor, AggregateId, Role, UserId};
use domain::{CodeKind, ExamResult, License, Renewal, UnitOfWork, allocate_code, random_code};
use event_store::EventStore;
use serde::Deserialize;

use crate::context::{WorkflowContext, observe};
use crate::effects::{self, Outcome};
use crate::error::{Result, WorkflowError};
use crate::services::Notification;

/// A citizen's renewal request.
#[derive(Debug, Clone, Deserialize)]
pub struct RenewalApplication {
    pub license_id: AggregateId,
    /// Blob handle of the new photo.
    pub new_photo: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

pub struct Renewals<S: EventStore> {
    ctx: WorkflowContext<S>,
}

impl<S: EventStore + Clone> Renewals<S> {
    pub fn new(ctx: WorkflowContext<S>) -> Self {
        Self { ctx }
    }

    /// Opens a renewal for an expired license the citizen owns.
    #[tracing::instrument(skip(self, application), fields(user_id = %actor.id))]
    pub async fn apply(&self, actor: &Actor, application: RenewalApplication) -> Result<Renewal> {
        let started = Instant::now();
        actor.require(&[Role::Citizen], "request a renewal")?;
        let now = self.ctx.now();
        let license_id = application.license_id;

        let mut license: License = self.ctx.load_required(license_id).await?;
        let renewal_id = AggregateId::new();
        let opened = license.open_renewal(renewal_id, actor.id, now.date_naive())?;

        let tracking = allocate_code(self.ctx.store(), CodeKind::RenewalTracking, |_| {
            random_code(CodeKind::RenewalTracking.prefix())
        })
        .await?;

        let mut renewal = Renewal::default();
        let requested = renewal.request(
            renewal_id,
            license_id,
            actor.id,
            tracking.clone(),
            application.new_photo,
            application.notes,
            license.expiry_date(),
            now,
        )?;

        let mut work = UnitOfWork::new(*actor, now);
        work.record(license_id, &mut license, opened)?;
        work.record(renewal_id, &mut renewal, requested)?;
        work.claim(CodeKind::RenewalTracking, &tracking, renewal_id)?;
        self.ctx.commit(work).await?;

        tracing::info!(%renewal_id, %license_id, %tracking, "renewal requested");
        observe("renewal_apply", started);
        Ok(renewal)
    }

    async fn load_for_officer(&self, actor: &Actor, renewal_id: AggregateId) -> Result<Renewal> {
        actor.require(&[Role::LicenseOfficer], "process renewals")?;
        self.ctx.load_required(renewal_id).await
    }

    fn with_owner_effect(
        renewal: Renewal,
        effect: impl FnOnce(UserId) -> Notification,
    ) -> Outcome<Renewal> {
        match renewal.user_id() {
            Some(owner) => {
                let note = effect(owner);
                Outcome::new(renewal).with_effect(note)
            }
            None => Outcome::new(renewal),
        }
    }

    #[tracing::instrument(skip(self), fields(role = %actor.role))]
    pub async fn schedule_vision_exam(
        &self,
        actor: &Actor,
        renewal_id: AggregateId,
        date: DateTime<Utc>,
    ) -> Result<Outcome<Renewal>> {
        let mut renewal = self.load_for_officer(actor, renewal_id).await?;
        let events = renewal.schedule_vision_exam(date, actor.id)?;
        let mut work = UnitOfWork::new(*actor, self.ctx.now());
        work.record(renewal_id, &mut renewal, events)?;
        self.ctx.commit(work).await?;

        let fee = renewal.fee();
        Ok(Self::with_owner_effect(renewal, |owner| {
            effects::vision_exam_scheduled(owner, renewal_id, date, fee)
        }))
    }

    #[tracing::instrument(skip(self, notes), fields(role = %actor.role))]
    pub async fn submit_vision_exam_result(
        &self,
        actor: &Actor,
        renewal_id: AggregateId,
        result: ExamResult,
        notes: Option<String>,
    ) -> Result<Outcome<Renewal>> {
        let mut renewal = self.load_for_officer(actor, renewal_id).await?;
        let events = renewal.record_vision_exam(result, notes, actor.id)?;
        let mut work = UnitOfWork::new(*actor, self.ctx.now());
        work.record(renewal_id, &mut renewal, events)?;
        self.ctx.commit(work).await?;

        let fee = renewal.fee();
        Ok(Self::with_owner_effect(renewal, |owner| {
            effects::vision_exam_result(owner, renewal_id, result, fee)
        }))
    }

    /// Approves a renewal and refreshes the license's photo, issue date and
    /// expiry. Department approval is left untouched.
    #[tracing::instrument(skip(self, notes), fields(role = %actor.role))]
    pub async fn approve(
        &self,
        actor: &Actor,
        renewal_id: AggregateId,
        payment_confirmed: bool,
        notes: Option<String>,
    ) -> Result<Renewal> {
        let started = Instant::now();
        let mut renewal = self.load_for_officer(actor, renewal_id).await?;
        renewal.ensure_approvable(payment_confirmed)?;

        let license_id = renewal
            .license_id()
            .ok_or_else(|| WorkflowError::validation("renewal is not linked to a license"))?;
        let mut license: License = self.ctx.load_required(license_id).await?;
        let now = self.ctx.now();
        let today = now.date_naive();
        let new_expiry = self.ctx.expiry_for(&license, today).await?;

        let mut work = UnitOfWork::new(*actor, now);
        let approved = renewal.approve(payment_confirmed, notes, new_expiry, actor.id, now)?;
        work.record(renewal_id, &mut renewal, approved)?;
        let renewed = license.renew(
            renewal_id,
            renewal.new_photo().map(str::to_string),
            today,
            new_expiry,
        )?;
        work.record(license_id, &mut license, renewed)?;
        self.ctx.commit(work).await?;

        metrics::counter!("renewals_approved_total").increment(1);
        tracing::info!(%renewal_id, %license_id, %new_expiry, "renewal approved");
        observe("renewal_approve", started);
        Ok(renewal)
    }

    /// Rejects a pending renewal, which unblocks a new request.
    #[tracing::instrument(skip(self, notes), fields(role = %actor.role))]
    pub async fn reject(
        &self,
        actor: &Actor,
        renewal_id: AggregateId,
        notes: Option<String>,
    ) -> Result<Renewal> {
        let mut renewal = self.load_for_officer(actor, renewal_id).await?;
        let now = self.ctx.now();
        let mut work = UnitOfWork::new(*actor, now);
        let rejected = renewal.reject(notes, actor.id, now)?;
        work.record(renewal_id, &mut renewal, rejected)?;

        if let Some(license_id) = renewal.license_id() {
            let mut license: License = self.ctx.load_required(license_id).await?;
            let unlinked = license.reject_renewal(renewal_id);
            work.record(license_id, &mut license, unlinked)?;
        }
        self.ctx.commit(work).await?;

        tracing::info!(%renewal_id, "renewal rejected");
        Ok(renewal)
    }
}
