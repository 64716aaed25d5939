//! License Application Engine: apply, review, reads and the citizen's
//! important-info edits.

use std::time::Instant;

use common::{Actor, AggregateId, Role};
use domain::{
    Aggregate, Applicant, ApplicationForm, CodeKind, DomainError, Exam, ImportantInfoUpdate,
    License, LicenseError, ReviewDecision, UnitOfWork, code_owner, screen_application,
};
use event_store::EventStore;

use crate::context::{WorkflowContext, observe};
use crate::effects::{self, Outcome};
use crate::error::{Result, WorkflowError};

/// Roles that may read any license.
const LICENSE_READERS: &[Role] = &[Role::LicenseOfficer, Role::SuperAdmin];

/// Roles allowed to look a license up by barcode.
const BARCODE_READERS: &[Role] = &[Role::TrafficPolice, Role::ViolationOfficer, Role::LicenseOfficer];

pub struct LicenseApplications<S: EventStore> {
    ctx: WorkflowContext<S>,
}

impl<S: EventStore + Clone> LicenseApplications<S> {
    pub fn new(ctx: WorkflowContext<S>) -> Self {
        Self { ctx }
    }

    /// Files a new application for the acting citizen.
    ///
    /// The citizen's applicant stream is appended in the same commit, so two
    /// concurrent applications by one citizen cannot both pass the checks.
    #[tracing::instrument(skip(self, form), fields(user_id = %actor.id))]
    pub async fn apply(&self, actor: &Actor, form: ApplicationForm) -> Result<License> {
        let started = Instant::now();
        actor.require(&[Role::Citizen], "apply for a license")?;
        let now = self.ctx.now();

        let applicant_id = Applicant::stream_id(actor.id);
        let mut applicant: Applicant = self.ctx.load(applicant_id).await?;
        let mut existing = Vec::with_capacity(applicant.applications().len());
        for filed in applicant.applications() {
            existing.push(self.ctx.load::<License>(filed.license_id).await?);
        }

        let license_type = match form.license_type_id {
            Some(id) => self.ctx.catalog().license_type(id).await?,
            None => None,
        };
        let screened = screen_application(form, license_type.as_ref(), &existing, now)?;

        let license_id = AggregateId::new();
        let mut license = License::default();
        let mut work = UnitOfWork::new(*actor, now);

        let filed = applicant.file(
            actor.id,
            license_id,
            screened.license_type_id,
            screened.kind,
            now,
        )?;
        let submitted = license.submit(license_id, actor.id, screened, now)?;
        work.record(license_id, &mut license, submitted)?;
        work.record(applicant_id, &mut applicant, filed)?;
        self.ctx.commit(work).await?;

        metrics::counter!("license_applications_total").increment(1);
        tracing::info!(%license_id, kind = %license.kind(), "application submitted");
        observe("apply", started);
        Ok(license)
    }

    /// Records an officer review. Approval issues at once when the exams
    /// are already complete.
    #[tracing::instrument(skip(self, decision, notes), fields(role = %actor.role))]
    pub async fn review(
        &self,
        actor: &Actor,
        license_id: AggregateId,
        decision: ReviewDecision,
        notes: Option<String>,
    ) -> Result<Outcome<License>> {
        let started = Instant::now();
        actor.require(&[Role::LicenseOfficer], "review applications")?;
        let now = self.ctx.now();

        let mut license: License = self.ctx.load_required(license_id).await?;
        let approving = decision == ReviewDecision::Approved;
        let events = license.review_with_notes(decision, notes, actor.id, now)?;

        let mut work = UnitOfWork::new(*actor, now);
        work.record(license_id, &mut license, events)?;

        let issued = if approving && self.ctx.exams_complete(&license).await? {
            self.ctx.issue(&mut work, license_id, &mut license).await?
        } else {
            None
        };
        self.ctx.commit(work).await?;

        let mut outcome = Outcome::new(license);
        if let Some(owner) = outcome.value.owner() {
            if approving {
                outcome = outcome.with_effect(effects::license_approved(owner, license_id));
            }
            if let Some(issuance) = &issued {
                metrics::counter!("licenses_issued_total").increment(1);
                tracing::info!(%license_id, number = %issuance.license_number, "license issued");
                outcome = outcome.with_effect(effects::license_issued(
                    owner,
                    license_id,
                    &issuance.license_number,
                    issuance.expiry_date,
                ));
            }
        }
        observe("review", started);
        Ok(outcome)
    }

    /// Owner edits the emergency details of an issued license.
    #[tracing::instrument(skip(self, update), fields(user_id = %actor.id))]
    pub async fn update_important_info(
        &self,
        actor: &Actor,
        license_id: AggregateId,
        update: ImportantInfoUpdate,
    ) -> Result<License> {
        actor.require(&[Role::Citizen], "update important info")?;
        if update.is_empty() {
            return Err(WorkflowError::validation("no important-info fields supplied"));
        }
        let now = self.ctx.now();

        let mut license: License = self.ctx.load_required(license_id).await?;
        let events = license.update_important_info(actor.id, &update, now.date_naive())?;
        let mut work = UnitOfWork::new(*actor, now);
        work.record(license_id, &mut license, events)?;
        self.ctx.commit(work).await?;
        Ok(license)
    }

    /// Loads a license the actor may see: their own, or any for officers.
    pub async fn get(&self, actor: &Actor, license_id: AggregateId) -> Result<License> {
        if !actor.is(Role::Citizen) {
            actor.require(LICENSE_READERS, "read licenses")?;
        }
        let license: License = self.ctx.load_required(license_id).await?;
        if actor.is(Role::Citizen) && !license.is_owned_by(actor.id) {
            return Err(LicenseError::NotOwner.into());
        }
        Ok(license)
    }

    /// The acting citizen's licenses in filing order.
    pub async fn list_mine(&self, actor: &Actor) -> Result<Vec<License>> {
        actor.require(&[Role::Citizen], "list own licenses")?;
        let applicant: Applicant = self.ctx.load(Applicant::stream_id(actor.id)).await?;
        let mut licenses = Vec::with_capacity(applicant.applications().len());
        for filed in applicant.applications() {
            licenses.push(self.ctx.load_required(filed.license_id).await?);
        }
        Ok(licenses)
    }

    /// Every exam attached to the license, oldest first.
    pub async fn exams_for(&self, actor: &Actor, license_id: AggregateId) -> Result<Vec<Exam>> {
        actor.require(&[Role::LicenseOfficer], "list exams")?;
        let license: License = self.ctx.load_required(license_id).await?;
        let mut exams = Vec::new();
        for (exam_id, _) in license.exams() {
            exams.push(self.ctx.load_required::<Exam>(*exam_id).await?);
        }
        exams.sort_by_key(|e| e.created_at());
        Ok(exams)
    }

    /// Loads a license by its current barcode. Rotated barcodes are not found.
    #[tracing::instrument(skip(self), fields(role = %actor.role))]
    pub async fn by_barcode(&self, actor: &Actor, barcode: &str) -> Result<License> {
        actor.require(BARCODE_READERS, "look up licenses by barcode")?;
        current_barcode_holder(&self.ctx, barcode).await
    }
}

/// The license whose current barcode is `barcode`.
pub(crate) async fn current_barcode_holder<S: EventStore + Clone>(
    ctx: &WorkflowContext<S>,
    barcode: &str,
) -> Result<License> {
    let code = barcode.trim();
    let not_found = || WorkflowError::from(DomainError::not_found(License::aggregate_type(), code));

    let license_id = code_owner(ctx.store(), CodeKind::Barcode, code)
        .await?
        .ok_or_else(not_found)?;
    let license: License = ctx.load(license_id).await?;
    if license.barcode() != Some(code) {
        return Err(not_found());
    }
    Ok(license)
}
