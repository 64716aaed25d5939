//! Shared dependencies of the engines and the issuance step they share.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, NaiveDate, Utc};
use common::{AggregateId, Clock};
use domain::{
    Aggregate, CodeKind, DomainError, ExamTypeId, Issuance, License, ReferenceCatalog, UnitOfWork,
    allocate_code, barcode, eligibility, load_aggregate, random_code,
};
use event_store::EventStore;
use uuid::Uuid;

use crate::error::{Result, WorkflowError};

/// Store, catalog and clock, cloned into every engine.
#[derive(Clone)]
pub struct WorkflowContext<S: EventStore> {
    store: S,
    catalog: Arc<dyn ReferenceCatalog>,
    clock: Arc<dyn Clock>,
}

impl<S: EventStore + Clone> WorkflowContext<S> {
    pub fn new(store: S, catalog: Arc<dyn ReferenceCatalog>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            catalog,
            clock,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn catalog(&self) -> &dyn ReferenceCatalog {
        self.catalog.as_ref()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Replays `id`; a missing stream yields the default aggregate.
    pub async fn load<A: Aggregate>(&self, id: AggregateId) -> Result<A> {
        Ok(load_aggregate(&self.store, id).await?)
    }

    pub async fn load_required<A: Aggregate>(&self, id: AggregateId) -> Result<A> {
        let aggregate: A = self.load(id).await?;
        match aggregate.id() {
            Some(_) => Ok(aggregate),
            None => Err(DomainError::not_found(A::aggregate_type(), id).into()),
        }
    }

    pub async fn commit(&self, work: UnitOfWork) -> Result<()> {
        work.commit(&self.store).await?;
        Ok(())
    }

    /// Active exam types in catalog order.
    pub async fn required_exam_types(&self) -> Result<Vec<ExamTypeId>> {
        Ok(self
            .catalog
            .active_exam_types()
            .await?
            .into_iter()
            .map(|e| e.id)
            .collect())
    }

    /// Whether `license` has passed every required exam type.
    pub async fn exams_complete(&self, license: &License) -> Result<bool> {
        let required = self.required_exam_types().await?;
        Ok(eligibility::exams_complete(
            &required,
            &license.passed_exam_types(),
            license.passed_exam_count(),
        ))
    }

    /// Display name of an exam type, falling back to its id.
    pub async fn exam_type_name(&self, id: ExamTypeId) -> Result<String> {
        Ok(self
            .catalog
            .exam_type(id)
            .await?
            .map(|e| e.name)
            .unwrap_or_else(|| format!("type {id}")))
    }

    /// Expiry for a license issued or renewed on `from`.
    pub async fn expiry_for(&self, license: &License, from: NaiveDate) -> Result<NaiveDate> {
        let entry = match license.license_type_id() {
            Some(id) => self.catalog.license_type(id).await?,
            None => None,
        };
        let years = eligibility::validity_years(entry.as_ref(), license.kind());
        eligibility::expiry_date(from, years)
            .ok_or_else(|| WorkflowError::validation(format!("expiry out of range for {from}")))
    }

    /// Assigns number, barcode and dates inside `work`, claiming both codes.
    ///
    /// Returns `None` when the license already has a number. Nothing is
    /// persisted until `work` commits.
    pub async fn issue(
        &self,
        work: &mut UnitOfWork,
        license_id: AggregateId,
        license: &mut License,
    ) -> Result<Option<Issuance>> {
        if !license.needs_issuance() {
            return Ok(None);
        }
        let Some(owner) = license.owner() else {
            return Ok(None);
        };

        let at = work.at();
        let today = at.date_naive();
        let license_number = allocate_code(&self.store, CodeKind::LicenseNumber, |_| {
            random_code(CodeKind::LicenseNumber.prefix())
        })
        .await?;
        let code = allocate_code(&self.store, CodeKind::Barcode, |attempt| {
            barcode(&license_number, owner, at, attempt)
        })
        .await?;

        let issuance = Issuance {
            license_number,
            barcode: code,
            public_token: public_token(),
            issued_date: today,
            expiry_date: self.expiry_for(license, today).await?,
        };

        let events = license.issue(issuance.clone())?;
        if events.is_empty() {
            return Ok(None);
        }
        work.record(license_id, license, events)?;
        work.claim(CodeKind::LicenseNumber, &issuance.license_number, license_id)?;
        work.claim(CodeKind::Barcode, &issuance.barcode, license_id)?;
        Ok(Some(issuance))
    }
}

/// Fresh token for the public edit link.
pub(crate) fn public_token() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Records how long an engine operation took.
pub(crate) fn observe(operation: &'static str, started: Instant) {
    metrics::histogram!("workflow_operation_duration_seconds", "operation" => operation)
        .record(started.elapsed().as_secs_f64());
}
