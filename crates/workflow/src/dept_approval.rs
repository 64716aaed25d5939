//! Department Approval Engine: officer submission and the super admin's
//! signature.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use common::{Actor, AggregateId, Role};
use domain::{License, LicenseError, UnitOfWork};
use event_store::EventStore;

use crate::context::{WorkflowContext, observe};
use crate::error::Result;
use crate::services::BlobStore;
use crate::uploads::{FileUpload, extension_for, is_image};

pub struct DepartmentApproval<S: EventStore> {
    ctx: WorkflowContext<S>,
    blobs: Arc<dyn BlobStore>,
}

impl<S: EventStore + Clone> DepartmentApproval<S> {
    pub fn new(ctx: WorkflowContext<S>, blobs: Arc<dyn BlobStore>) -> Self {
        Self { ctx, blobs }
    }

    /// Sends an issued license to the department.
    #[tracing::instrument(skip(self), fields(role = %actor.role))]
    pub async fn submit(&self, actor: &Actor, license_id: AggregateId) -> Result<License> {
        actor.require(&[Role::LicenseOfficer], "submit for department approval")?;
        let now = self.ctx.now();

        let mut license: License = self.ctx.load_required(license_id).await?;
        let events = license.submit_for_dept_approval(actor.id, now)?;
        let mut work = UnitOfWork::new(*actor, now);
        work.record(license_id, &mut license, events)?;
        self.ctx.commit(work).await?;

        tracing::info!(%license_id, "submitted for department approval");
        Ok(license)
    }

    /// Grants approval, optionally with a signature image.
    ///
    /// Nothing is stored unless the license is approvable and the file is an
    /// image. A blob store failure does not block the approval; the license
    /// is approved without a signature handle. If the commit fails after the
    /// signature was stored, the blob is removed again.
    #[tracing::instrument(skip(self, signature), fields(role = %actor.role))]
    pub async fn approve(
        &self,
        actor: &Actor,
        license_id: AggregateId,
        signature: Option<FileUpload>,
    ) -> Result<License> {
        let started = Instant::now();
        actor.require(&[Role::SuperAdmin], "grant department approval")?;
        let now = self.ctx.now();

        let mut license: License = self.ctx.load_required(license_id).await?;
        license.ensure_dept_approvable(now.date_naive())?;

        let handle = match signature {
            Some(file) => self.store_signature(file).await?,
            None => None,
        };

        let committed = self
            .record_approval(actor, license_id, &mut license, handle.clone(), now)
            .await;
        if let Err(e) = committed {
            if let Some(handle) = handle {
                self.discard_signature(&handle).await;
            }
            return Err(e);
        }

        metrics::counter!("dept_approvals_total").increment(1);
        tracing::info!(%license_id, "department approval granted");
        observe("dept_approve", started);
        Ok(license)
    }

    async fn record_approval(
        &self,
        actor: &Actor,
        license_id: AggregateId,
        license: &mut License,
        handle: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let events = license.grant_dept_approval(actor.id, handle, now)?;
        let mut work = UnitOfWork::new(*actor, now);
        work.record(license_id, license, events)?;
        self.ctx.commit(work).await
    }

    async fn discard_signature(&self, handle: &str) {
        match self.blobs.remove(handle).await {
            Ok(()) => tracing::info!(%handle, "signature of uncommitted approval removed"),
            Err(e) => {
                metrics::counter!("orphaned_blobs_total").increment(1);
                tracing::warn!(%handle, error = %e, "signature left orphaned");
            }
        }
    }

    async fn store_signature(&self, file: FileUpload) -> Result<Option<String>> {
        let media = file.media_type();
        if !is_image(&media) {
            return Err(LicenseError::InvalidSignatureFile {
                content_type: file.content_type,
            }
            .into());
        }
        if file.bytes.is_empty() {
            return Ok(None);
        }
        match self.blobs.store(&file.bytes, extension_for(&media)).await {
            Ok(handle) => Ok(Some(handle)),
            Err(e) => {
                metrics::counter!("blob_store_failures_total").increment(1);
                tracing::warn!(error = %e, "signature not stored; approving without it");
                Ok(None)
            }
        }
    }
}
