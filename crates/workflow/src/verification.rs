//! Public verification of a card by its barcode. No actor is required.

use std::sync::Arc;

use chrono::NaiveDate;
use domain::{Aggregate, ImportantInfo, LicenseError, LicenseKind, LicenseStatus};
use event_store::EventStore;
use serde::Serialize;

use crate::applications::current_barcode_holder;
use crate::context::WorkflowContext;
use crate::error::Result;
use crate::services::{ViolationLookup, ViolationSummary};

/// What a scanned card reveals.
#[derive(Debug, Clone, Serialize)]
pub struct VerificationReport {
    pub license_number: Option<String>,
    pub full_name: Option<String>,
    pub kind: LicenseKind,
    pub issued_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
    pub is_expired: bool,
    pub status: LicenseStatus,
    pub important_info: ImportantInfo,
    pub open_violations: Vec<ViolationSummary>,
    pub open_violation_count: usize,
}

pub struct Verification<S: EventStore> {
    ctx: WorkflowContext<S>,
    violations: Arc<dyn ViolationLookup>,
}

impl<S: EventStore + Clone> Verification<S> {
    pub fn new(ctx: WorkflowContext<S>, violations: Arc<dyn ViolationLookup>) -> Self {
        Self { ctx, violations }
    }

    /// Reports on the license currently carrying `barcode`.
    #[tracing::instrument(skip(self))]
    pub async fn verify(&self, barcode: &str) -> Result<VerificationReport> {
        let license = current_barcode_holder(&self.ctx, barcode).await?;
        let today = self.ctx.now().date_naive();

        let status = license.effective_status(today);
        if !matches!(status, LicenseStatus::Issued | LicenseStatus::Expired) {
            return Err(LicenseError::NotIssuedYet { status }.into());
        }

        let mut open = Vec::new();
        if let Some(license_id) = license.id() {
            open = self
                .violations
                .violations_for(license_id)
                .await?
                .into_iter()
                .filter(|v| v.status.is_open())
                .collect();
        }

        Ok(VerificationReport {
            license_number: license.license_number().map(str::to_string),
            full_name: license.profile().map(|p| p.full_name.clone()),
            kind: license.kind(),
            issued_date: license.issued_date(),
            expiry_date: license.expiry_date(),
            is_expired: status == LicenseStatus::Expired,
            status,
            important_info: license.important_info().clone(),
            open_violation_count: open.len(),
            open_violations: open,
        })
    }
}
