//! Read-only access to traffic violations recorded against a license.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::AggregateId;
use domain::Money;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViolationStatus {
    Pending,
    Paid,
    Cancelled,
    Appealed,
}

impl ViolationStatus {
    /// Still outstanding: pending payment or under appeal.
    pub fn is_open(&self) -> bool {
        matches!(self, ViolationStatus::Pending | ViolationStatus::Appealed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViolationSummary {
    pub violation_type: String,
    pub fine: Money,
    pub status: ViolationStatus,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Error)]
#[error("violation lookup failed: {0}")]
pub struct LookupError(pub String);

#[async_trait]
pub trait ViolationLookup: Send + Sync {
    async fn violations_for(&self, license_id: AggregateId) -> Result<Vec<ViolationSummary>, LookupError>;
}

/// Violations held in memory, keyed by license.
#[derive(Debug, Clone, Default)]
pub struct InMemoryViolations {
    records: Arc<RwLock<HashMap<AggregateId, Vec<ViolationSummary>>>>,
}

impl InMemoryViolations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, license_id: AggregateId, violation: ViolationSummary) {
        self.records
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .entry(license_id)
            .or_default()
            .push(violation);
    }
}

#[async_trait]
impl ViolationLookup for InMemoryViolations {
    async fn violations_for(&self, license_id: AggregateId) -> Result<Vec<ViolationSummary>, LookupError> {
        Ok(self
            .records
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&license_id)
            .cloned()
            .unwrap_or_default())
    }
}
