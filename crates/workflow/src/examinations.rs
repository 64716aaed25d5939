//! Exam Engine: scheduling, bundles and grading.

use std::time::Instant;

use chrono::{DateTime, Utc};
use common::{Actor, AggregateId, Role};
use domain::{
    Aggregate, ErrorKind, Exam, ExamError, ExamResult, ExamTypeId, License, UnitOfWork,
};
use event_store::EventStore;
use serde::{Deserialize, Serialize};

use crate::context::{WorkflowContext, observe};
use crate::effects::{self, Outcome};
use crate::error::{Result, WorkflowError};

/// One exam of a bundle request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleItem {
    pub exam_type_id: ExamTypeId,
    pub scheduled_date: DateTime<Utc>,
}

/// The item that stopped a bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BundleFailure {
    pub exam_type_id: ExamTypeId,
    pub kind: ErrorKind,
    pub message: String,
}

/// Exams scheduled by a bundle, in request order.
#[derive(Debug, Clone, Serialize)]
pub struct BundleReport {
    pub scheduled: Vec<Exam>,
    pub failure: Option<BundleFailure>,
}

impl BundleReport {
    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }
}

pub struct Examinations<S: EventStore> {
    ctx: WorkflowContext<S>,
}

impl<S: EventStore + Clone> Examinations<S> {
    pub fn new(ctx: WorkflowContext<S>) -> Self {
        Self { ctx }
    }

    fn require_officer(actor: &Actor) -> Result<()> {
        if actor.is(Role::Citizen) {
            return Err(ExamError::NotLicenseOfficerRole.into());
        }
        actor.require(&[Role::LicenseOfficer], "manage exams")?;
        Ok(())
    }

    async fn active_exam_type(&self, id: ExamTypeId) -> Result<String> {
        match self.ctx.catalog().exam_type(id).await? {
            Some(entry) if entry.active => Ok(entry.name),
            _ => Err(ExamError::ExamTypeUnavailable { id }.into()),
        }
    }

    /// Creates and schedules a new exam of `exam_type_id` for an approved
    /// license.
    #[tracing::instrument(skip(self), fields(role = %actor.role))]
    pub async fn schedule(
        &self,
        actor: &Actor,
        license_id: AggregateId,
        exam_type_id: ExamTypeId,
        date: DateTime<Utc>,
    ) -> Result<Outcome<Exam>> {
        let started = Instant::now();
        Self::require_officer(actor)?;

        let mut license: License = self.ctx.load_required(license_id).await?;
        license.ensure_exams_allowed()?;
        let type_name = self.active_exam_type(exam_type_id).await?;

        let outcome = self
            .create_scheduled(actor, license_id, &mut license, exam_type_id, &type_name, date)
            .await?;
        observe("schedule_exam", started);
        Ok(outcome)
    }

    async fn create_scheduled(
        &self,
        actor: &Actor,
        license_id: AggregateId,
        license: &mut License,
        exam_type_id: ExamTypeId,
        type_name: &str,
        date: DateTime<Utc>,
    ) -> Result<Outcome<Exam>> {
        let now = self.ctx.now();
        let exam_id = AggregateId::new();
        let mut exam = Exam::default();
        let mut work = UnitOfWork::new(*actor, now);

        let attached = license.attach_exam(exam_id, exam_type_id)?;
        work.record(license_id, license, attached)?;
        let created = exam.create(exam_id, license_id, exam_type_id, actor.id, now)?;
        work.record(exam_id, &mut exam, created)?;
        let scheduled = exam.schedule(date, actor.id)?;
        work.record(exam_id, &mut exam, scheduled)?;
        self.ctx.commit(work).await?;

        tracing::info!(%exam_id, %license_id, exam_type = %exam_type_id, "exam scheduled");
        Ok(self.scheduled_outcome(license, exam_id, license_id, type_name, date, exam))
    }

    fn scheduled_outcome(
        &self,
        license: &License,
        exam_id: AggregateId,
        license_id: AggregateId,
        type_name: &str,
        date: DateTime<Utc>,
        exam: Exam,
    ) -> Outcome<Exam> {
        let outcome = Outcome::new(exam);
        match license.owner() {
            Some(owner) => outcome.with_effect(effects::exam_scheduled(
                owner, exam_id, license_id, type_name, date,
            )),
            None => outcome,
        }
    }

    /// Moves an ungraded exam to a new date.
    #[tracing::instrument(skip(self), fields(role = %actor.role))]
    pub async fn reschedule(
        &self,
        actor: &Actor,
        exam_id: AggregateId,
        date: DateTime<Utc>,
    ) -> Result<Outcome<Exam>> {
        Self::require_officer(actor)?;
        let mut exam: Exam = self.ctx.load_required(exam_id).await?;
        let license_id = exam
            .license_id()
            .ok_or_else(|| WorkflowError::validation("exam is not linked to a license"))?;
        let license: License = self.ctx.load_required(license_id).await?;
        self.reschedule_loaded(actor, &license, license_id, exam_id, &mut exam, date)
            .await?;

        let type_name = match exam.exam_type_id() {
            Some(id) => self.ctx.exam_type_name(id).await?,
            None => String::from("exam"),
        };
        Ok(self.scheduled_outcome(&license, exam_id, license_id, &type_name, date, exam))
    }

    async fn reschedule_loaded(
        &self,
        actor: &Actor,
        license: &License,
        license_id: AggregateId,
        exam_id: AggregateId,
        exam: &mut Exam,
        date: DateTime<Utc>,
    ) -> Result<()> {
        license.ensure_exams_allowed()?;
        let mut work = UnitOfWork::new(*actor, self.ctx.now());
        work.guard(license_id, license.version());
        let events = exam.schedule(date, actor.id)?;
        work.record(exam_id, exam, events)?;
        self.ctx.commit(work).await
    }

    /// Most recently created ungraded exam of `exam_type_id` on the license.
    async fn open_exam_of_type(
        &self,
        license: &License,
        exam_type_id: ExamTypeId,
    ) -> Result<Option<(AggregateId, Exam)>> {
        let mut latest: Option<(AggregateId, Exam)> = None;
        for (id, entry) in license.exams() {
            if entry.exam_type_id != exam_type_id || entry.result.is_some() {
                continue;
            }
            let exam: Exam = self.ctx.load_required(*id).await?;
            if exam.state().is_graded() {
                continue;
            }
            let newer = latest
                .as_ref()
                .is_none_or(|(_, current)| exam.created_at() > current.created_at());
            if newer {
                latest = Some((*id, exam));
            }
        }
        Ok(latest)
    }

    /// Schedules several exam types at once, reusing an open exam of the
    /// same type when there is one.
    ///
    /// Items are committed one at a time; processing stops at the first
    /// failure and the exams scheduled before it stay scheduled.
    #[tracing::instrument(skip(self, items), fields(role = %actor.role, count = items.len()))]
    pub async fn schedule_bundle(
        &self,
        actor: &Actor,
        license_id: AggregateId,
        items: Vec<BundleItem>,
    ) -> Result<Outcome<BundleReport>> {
        let started = Instant::now();
        Self::require_officer(actor)?;
        if items.is_empty() {
            return Err(WorkflowError::validation("bundle contains no exams"));
        }
        // Missing license fails the whole call rather than the first item.
        let _: License = self.ctx.load_required(license_id).await?;

        let mut report = BundleReport {
            scheduled: Vec::with_capacity(items.len()),
            failure: None,
        };
        let mut notes = Vec::new();
        for item in items {
            match self.schedule_item(actor, license_id, item).await {
                Ok(outcome) => {
                    notes.extend(outcome.effects);
                    report.scheduled.push(outcome.value);
                }
                Err(e) => {
                    tracing::warn!(%license_id, exam_type = %item.exam_type_id, error = %e, "bundle stopped");
                    report.failure = Some(BundleFailure {
                        exam_type_id: item.exam_type_id,
                        kind: e.kind(),
                        message: e.to_string(),
                    });
                    break;
                }
            }
        }

        observe("schedule_bundle", started);
        Ok(Outcome {
            value: report,
            effects: notes,
        })
    }

    async fn schedule_item(
        &self,
        actor: &Actor,
        license_id: AggregateId,
        item: BundleItem,
    ) -> Result<Outcome<Exam>> {
        let mut license: License = self.ctx.load_required(license_id).await?;
        license.ensure_exams_allowed()?;
        let type_name = self.active_exam_type(item.exam_type_id).await?;

        match self.open_exam_of_type(&license, item.exam_type_id).await? {
            Some((exam_id, mut exam)) => {
                self.reschedule_loaded(actor, &license, license_id, exam_id, &mut exam, item.scheduled_date)
                    .await?;
                Ok(self.scheduled_outcome(
                    &license,
                    exam_id,
                    license_id,
                    &type_name,
                    item.scheduled_date,
                    exam,
                ))
            }
            None => {
                self.create_scheduled(
                    actor,
                    license_id,
                    &mut license,
                    item.exam_type_id,
                    &type_name,
                    item.scheduled_date,
                )
                .await
            }
        }
    }

    /// Grades an exam and applies the outcome to its license.
    ///
    /// A failure rejects the application. A pass that completes the required
    /// exam types issues the license in the same commit.
    #[tracing::instrument(skip(self, notes), fields(role = %actor.role))]
    pub async fn submit_result(
        &self,
        actor: &Actor,
        exam_id: AggregateId,
        result: ExamResult,
        score: Option<u32>,
        notes: Option<String>,
    ) -> Result<Outcome<Exam>> {
        let started = Instant::now();
        Self::require_officer(actor)?;
        let now = self.ctx.now();

        let mut exam: Exam = self.ctx.load_required(exam_id).await?;
        let license_id = exam
            .license_id()
            .ok_or_else(|| WorkflowError::validation("exam is not linked to a license"))?;
        let mut license: License = self.ctx.load_required(license_id).await?;
        let type_name = match exam.exam_type_id() {
            Some(id) => self.ctx.exam_type_name(id).await?,
            None => String::from("exam"),
        };

        let mut work = UnitOfWork::new(*actor, now);
        let graded = exam.grade(result, score, notes, actor.id, now)?;
        work.record(exam_id, &mut exam, graded)?;
        let recorded = license.record_exam_outcome(exam_id, result, &type_name, actor.id, now)?;
        work.record(license_id, &mut license, recorded)?;

        let issued = if result == ExamResult::Passed && self.ctx.exams_complete(&license).await? {
            self.ctx.issue(&mut work, license_id, &mut license).await?
        } else {
            None
        };
        self.ctx.commit(work).await?;

        metrics::counter!("exam_results_total", "result" => result.to_string()).increment(1);
        tracing::info!(%exam_id, %license_id, %result, "exam graded");

        let mut outcome = Outcome::new(exam);
        if let Some(owner) = license.owner() {
            outcome = outcome.with_effect(effects::exam_graded(
                owner, exam_id, license_id, &type_name, result, score,
            ));
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
        observe("submit_exam_result", started);
        Ok(outcome)
    }

    pub async fn get(&self, actor: &Actor, exam_id: AggregateId) -> Result<Exam> {
        Self::require_officer(actor)?;
        self.ctx.load_required(exam_id).await
    }
}
