//! Replacement ("lost card") Engine.

use std::time::Instant;

use common::{Actor, AggregateId, Role};
use domain::{
    CodeKind, License, Replacement, ReplacementRequest, UnitOfWork, allocate_code, barcode,
    random_code,
};
use event_store::EventStore;
use serde::Deserialize;

use crate::context::{WorkflowContext, observe, public_token};
use crate::error::{Result, WorkflowError};

/// A citizen's replacement request.
#[derive(Debug, Clone, Deserialize)]
pub struct ReplacementApplication {
    pub license_id: AggregateId,
    /// Blob handle of the police report.
    pub police_report: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Officer's approval input.
#[derive(Debug, Clone, Deserialize)]
pub struct ReplacementApproval {
    pub payment_confirmed: bool,
    pub payment_code: String,
    #[serde(default)]
    pub notes: Option<String>,
}

pub struct Replacements<S: EventStore> {
    ctx: WorkflowContext<S>,
}

impl<S: EventStore + Clone> Replacements<S> {
    pub fn new(ctx: WorkflowContext<S>) -> Self {
        Self { ctx }
    }

    /// Opens a replacement for a valid license the citizen owns. The
    /// returned request carries the payment code the citizen pays with.
    #[tracing::instrument(skip(self, application), fields(user_id = %actor.id))]
    pub async fn apply(
        &self,
        actor: &Actor,
        application: ReplacementApplication,
    ) -> Result<Replacement> {
        let started = Instant::now();
        actor.require(&[Role::Citizen], "request a replacement")?;
        let now = self.ctx.now();
        let license_id = application.license_id;

        let mut license: License = self.ctx.load_required(license_id).await?;
        let replacement_id = AggregateId::new();
        let opened = license.open_replacement(replacement_id, actor.id, now.date_naive())?;

        let tracking = allocate_code(self.ctx.store(), CodeKind::ReplacementTracking, |_| {
            random_code(CodeKind::ReplacementTracking.prefix())
        })
        .await?;
        let payment_code = allocate_code(self.ctx.store(), CodeKind::PaymentCode, |_| {
            random_code(CodeKind::PaymentCode.prefix())
        })
        .await?;

        let mut replacement = Replacement::default();
        let requested = replacement.request(
            replacement_id,
            license_id,
            actor.id,
            tracking.clone(),
            payment_code.clone(),
            ReplacementRequest {
                police_report: application.police_report,
                citizen_notes: application.notes,
            },
            now,
        )?;

        let mut work = UnitOfWork::new(*actor, now);
        work.record(license_id, &mut license, opened)?;
        work.record(replacement_id, &mut replacement, requested)?;
        work.claim(CodeKind::ReplacementTracking, &tracking, replacement_id)?;
        work.claim(CodeKind::PaymentCode, &payment_code, replacement_id)?;
        self.ctx.commit(work).await?;

        tracing::info!(%replacement_id, %license_id, %tracking, "replacement requested");
        observe("replacement_apply", started);
        Ok(replacement)
    }

    async fn load_for_officer(
        &self,
        actor: &Actor,
        replacement_id: AggregateId,
    ) -> Result<Replacement> {
        actor.require(&[Role::LicenseOfficer], "process replacements")?;
        self.ctx.load_required(replacement_id).await
    }

    /// Approves a replacement: rotates the barcode and public token and
    /// re-arms department approval.
    ///
    /// Every check runs before anything is generated, so a wrong payment
    /// code leaves the license untouched.
    #[tracing::instrument(skip(self, approval), fields(role = %actor.role))]
    pub async fn approve(
        &self,
        actor: &Actor,
        replacement_id: AggregateId,
        approval: ReplacementApproval,
    ) -> Result<Replacement> {
        let started = Instant::now();
        let mut replacement = self.load_for_officer(actor, replacement_id).await?;
        replacement.ensure_approvable(approval.payment_confirmed, &approval.payment_code)?;

        let license_id = replacement
            .license_id()
            .ok_or_else(|| WorkflowError::validation("replacement is not linked to a license"))?;
        let mut license: License = self.ctx.load_required(license_id).await?;
        let now = self.ctx.now();

        let new_barcode = match (license.license_number(), license.owner()) {
            (Some(number), Some(owner)) => {
                let number = number.to_string();
                let code = allocate_code(self.ctx.store(), CodeKind::Barcode, |attempt| {
                    barcode(&number, owner, now, attempt)
                })
                .await?;
                Some(code)
            }
            _ => None,
        };
        let old_barcode = license.barcode().map(str::to_string);

        let mut work = UnitOfWork::new(*actor, now);
        let approved = replacement.approve(
            approval.payment_confirmed,
            &approval.payment_code,
            approval.notes,
            old_barcode,
            new_barcode.clone(),
            actor.id,
            now,
        )?;
        work.record(replacement_id, &mut replacement, approved)?;
        let rotated = license.replace_credential(
            replacement_id,
            new_barcode.clone(),
            public_token(),
            actor.id,
            now,
        )?;
        work.record(license_id, &mut license, rotated)?;
        if let Some(code) = &new_barcode {
            work.claim(CodeKind::Barcode, code, license_id)?;
        }
        self.ctx.commit(work).await?;

        metrics::counter!("replacements_approved_total").increment(1);
        tracing::info!(%replacement_id, %license_id, "credential replaced");
        observe("replacement_approve", started);
        Ok(replacement)
    }

    /// Rejects a pending replacement, which unblocks a new request.
    #[tracing::instrument(skip(self, notes), fields(role = %actor.role))]
    pub async fn reject(
        &self,
        actor: &Actor,
        replacement_id: AggregateId,
        notes: Option<String>,
    ) -> Result<Replacement> {
        let mut replacement = self.load_for_officer(actor, replacement_id).await?;
        let now = self.ctx.now();
        let mut work = UnitOfWork::new(*actor, now);
        let rejected = replacement.reject(notes, actor.id, now)?;
        work.record(replacement_id, &mut replacement, rejected)?;

        if let Some(license_id) = replacement.license_id() {
            let mut license: License = self.ctx.load_required(license_id).await?;
            let unlinked = license.reject_replacement(replacement_id);
            work.record(license_id, &mut license, unlinked)?;
        }
        self.ctx.commit(work).await?;

        tracing::info!(%replacement_id, "replacement rejected");
        Ok(replacement)
    }
}
