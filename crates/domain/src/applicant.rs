//! Per-citizen index of filed license applications.
//!
//! Each new application appends to the applicant's stream, so two
//! applications submitted at the same time by one citizen conflict on the
//! stream version instead of both passing the duplicate checks.

use chrono::{DateTime, Utc};
use common::{AggregateId, UserId};
use event_store::Version;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::aggregate::{Aggregate, DomainEvent};
use crate::catalog::LicenseTypeId;
use crate::values::LicenseKind;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ApplicantEvent {
    ApplicationFiled(ApplicationFiledData),
}

impl DomainEvent for ApplicantEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ApplicantEvent::ApplicationFiled(_) => "ApplicationFiled",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationFiledData {
    pub user_id: UserId,
    pub license_id: AggregateId,
    pub license_type_id: Option<LicenseTypeId>,
    pub kind: LicenseKind,
    pub filed_at: DateTime<Utc>,
}

/// One application in the applicant's index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FiledApplication {
    pub license_id: AggregateId,
    pub license_type_id: Option<LicenseTypeId>,
    pub kind: LicenseKind,
    pub filed_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum ApplicantError {
    /// The license was already filed under this applicant.
    #[error("application {0} already filed")]
    AlreadyFiled(AggregateId),
}

#[derive(Debug, Clone, Default)]
pub struct Applicant {
    id: Option<AggregateId>,
    user_id: Option<UserId>,
    applications: Vec<FiledApplication>,
    version: Version,
}

impl Applicant {
    /// Stream id of a user's applicant index.
    pub fn stream_id(user: UserId) -> AggregateId {
        AggregateId::derived("applicant", &user.to_string())
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    /// Applications in filing order.
    pub fn applications(&self) -> &[FiledApplication] {
        &self.applications
    }

    pub fn file(
        &self,
        user_id: UserId,
        license_id: AggregateId,
        license_type_id: Option<LicenseTypeId>,
        kind: LicenseKind,
        at: DateTime<Utc>,
    ) -> Result<Vec<ApplicantEvent>, ApplicantError> {
        if self.applications.iter().any(|a| a.license_id == license_id) {
            return Err(ApplicantError::AlreadyFiled(license_id));
        }
        Ok(vec![ApplicantEvent::ApplicationFiled(ApplicationFiledData {
            user_id,
            license_id,
            license_type_id,
            kind,
            filed_at: at,
        })])
    }
}

impl Aggregate for Applicant {
    type Event = ApplicantEvent;
    type Error = ApplicantError;

    fn aggregate_type() -> &'static str {
        "Applicant"
    }

    fn id(&self) -> Option<AggregateId> {
        self.id
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            ApplicantEvent::ApplicationFiled(data) => {
                self.id = Some(Self::stream_id(data.user_id));
                self.user_id = Some(data.user_id);
                self.applications.push(FiledApplication {
                    license_id: data.license_id,
                    license_type_id: data.license_type_id,
                    kind: data.kind,
                    filed_at: data.filed_at,
                });
            }
        }
    }
}
