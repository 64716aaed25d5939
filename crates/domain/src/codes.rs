//! Unique code generation and reservation.
//!
//! Every generated code (license number, barcode, tracking and payment
//! codes) is reserved by appending to a [`CodeClaim`] stream whose id is
//! derived from the code itself. Appending with "expect new" inside the
//! same commit that uses the code means two commits can never persist the
//! same code.

use chrono::{DateTime, Utc};
use common::{AggregateId, UserId};
use event_store::{EventStore, Version};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::aggregate::{Aggregate, DomainEvent};
use crate::command::load_aggregate;
use crate::error::DomainError;

/// Attempts made before giving up on finding a free code.
pub const MAX_CODE_ATTEMPTS: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeKind {
    LicenseNumber,
    Barcode,
    RenewalTracking,
    ReplacementTracking,
    PaymentCode,
}

impl CodeKind {
    /// Prefix of random codes of this kind. Barcodes are hashes and have none.
    pub fn prefix(&self) -> &'static str {
        match self {
            CodeKind::LicenseNumber => "LIC",
            CodeKind::Barcode => "",
            CodeKind::RenewalTracking => "REN",
            CodeKind::ReplacementTracking => "LOS",
            CodeKind::PaymentCode => "PAY",
        }
    }

    fn namespace(&self) -> &'static str {
        match self {
            CodeKind::LicenseNumber => "license-number",
            CodeKind::Barcode => "barcode",
            CodeKind::RenewalTracking => "renewal-tracking",
            CodeKind::ReplacementTracking => "replacement-tracking",
            CodeKind::PaymentCode => "payment-code",
        }
    }
}

impl std::fmt::Display for CodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.namespace())
    }
}

/// `prefix` followed by eight random digits.
pub fn random_code(prefix: &str) -> String {
    let n: u32 = rand::thread_rng().gen_range(0..100_000_000);
    format!("{prefix}{n:08}")
}

/// Barcode for a license: the first 16 hex digits (upper case) of a SHA-256
/// over the license number, owner and issue time. Retries append the
/// attempt number to the hashed text.
pub fn barcode(license_number: &str, user: UserId, at: DateTime<Utc>, attempt: u32) -> String {
    let mut source = format!("{license_number}_{user}_{}", at.timestamp_micros());
    if attempt > 0 {
        source.push_str(&format!("_{attempt}"));
    }

    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..16].to_ascii_uppercase()
}

/// Stream id of the claim for `code`.
pub fn claim_stream_id(kind: CodeKind, code: &str) -> AggregateId {
    AggregateId::derived(kind.namespace(), code)
}

#[derive(Debug, Error)]
pub enum ClaimError {
    /// The code is already reserved by another aggregate.
    #[error("{kind} {code} is already taken")]
    AlreadyClaimed { kind: CodeKind, code: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ClaimEvent {
    CodeClaimed(CodeClaimedData),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeClaimedData {
    pub kind: CodeKind,
    pub code: String,
    /// The aggregate the code was generated for.
    pub owner: AggregateId,
    pub claimed_at: DateTime<Utc>,
}

impl DomainEvent for ClaimEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ClaimEvent::CodeClaimed(_) => "CodeClaimed",
        }
    }
}

/// Reservation of one code.
#[derive(Debug, Clone, Default)]
pub struct CodeClaim {
    id: Option<AggregateId>,
    owner: Option<AggregateId>,
    version: Version,
}

impl Aggregate for CodeClaim {
    type Event = ClaimEvent;
    type Error = ClaimError;

    fn aggregate_type() -> &'static str {
        "CodeClaim"
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
            ClaimEvent::CodeClaimed(data) => {
                self.id = Some(claim_stream_id(data.kind, &data.code));
                self.owner = Some(data.owner);
            }
        }
    }
}

impl CodeClaim {
    pub fn owner(&self) -> Option<AggregateId> {
        self.owner
    }

    pub fn claim(
        &self,
        kind: CodeKind,
        code: &str,
        owner: AggregateId,
        at: DateTime<Utc>,
    ) -> Result<Vec<ClaimEvent>, ClaimError> {
        if self.owner.is_some() {
            return Err(ClaimError::AlreadyClaimed {
                kind,
                code: code.to_string(),
            });
        }
        Ok(vec![ClaimEvent::CodeClaimed(CodeClaimedData {
            kind,
            code: code.to_string(),
            owner,
            claimed_at: at,
        })])
    }
}

/// Finds a code of `kind` that nobody has claimed yet.
///
/// `generate` receives the attempt number and returns a candidate. The code
/// is not reserved until a [`UnitOfWork`](crate::UnitOfWork) claiming it
/// commits; a racing commit for the same code fails as a conflict.
pub async fn allocate_code<S, F>(store: &S, kind: CodeKind, mut generate: F) -> Result<String, DomainError>
where
    S: EventStore + ?Sized,
    F: FnMut(u32) -> String,
{
    for attempt in 0..MAX_CODE_ATTEMPTS {
        let candidate = generate(attempt);
        if code_owner(store, kind, &candidate).await?.is_none() {
            return Ok(candidate);
        }
        metrics::counter!("code_collisions_total", "kind" => kind.namespace()).increment(1);
        tracing::debug!(%kind, attempt, "code collision, retrying");
    }
    Err(DomainError::CodeSpaceExhausted { kind })
}

/// The aggregate holding `code`, if it has been claimed.
pub async fn code_owner<S>(store: &S, kind: CodeKind, code: &str) -> Result<Option<AggregateId>, DomainError>
where
    S: EventStore + ?Sized,
{
    let claim: CodeClaim = load_aggregate(store, claim_stream_id(kind, code)).await?;
    Ok(claim.owner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::UnitOfWork;
    use chrono::TimeZone;
    use common::{Actor, Role};
    use event_store::InMemoryEventStore;

    #[test]
    fn test_random_codes_are_prefixed_and_padded() {
        let code = random_code(CodeKind::RenewalTracking.prefix());
        assert!(code.starts_with("REN"));
        assert_eq!(code.len(), 11);
        assert!(code[3..].chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_barcode_is_sixteen_upper_hex_digits() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
        let user = UserId::new();
        let code = barcode("LIC12345678", user, at, 0);

        assert_eq!(code.len(), 16);
        assert!(code.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
        assert_eq!(code, barcode("LIC12345678", user, at, 0));
        assert_ne!(code, barcode("LIC12345678", user, at, 1));
    }

    #[tokio::test]
    async fn test_allocate_skips_claimed_codes() {
        let store = InMemoryEventStore::new();
        let actor = Actor::new(UserId::new(), Role::LicenseOfficer);
        let owner = AggregateId::new();

        let mut work = UnitOfWork::new(actor, Utc::now());
        work.claim(CodeKind::PaymentCode, "PAY00000000", owner).unwrap();
        work.commit(&store).await.unwrap();

        let code = allocate_code(&store, CodeKind::PaymentCode, |attempt| {
            format!("PAY{attempt:08}")
        })
        .await
        .unwrap();
        assert_eq!(code, "PAY00000001");
        assert_eq!(
            code_owner(&store, CodeKind::PaymentCode, "PAY00000000")
                .await
                .unwrap(),
            Some(owner)
        );
    }

    #[tokio::test]
    async fn test_allocate_gives_up_after_max_attempts() {
        let store = InMemoryEventStore::new();
        let actor = Actor::new(UserId::new(), Role::LicenseOfficer);

        let mut work = UnitOfWork::new(actor, Utc::now());
        work.claim(CodeKind::LicenseNumber, "LIC00000007", AggregateId::new())
            .unwrap();
        work.commit(&store).await.unwrap();

        let result = allocate_code(&store, CodeKind::LicenseNumber, |_| "LIC00000007".into()).await;
        assert!(matches!(
            result,
            Err(DomainError::CodeSpaceExhausted {
                kind: CodeKind::LicenseNumber
            })
        ));
    }

    #[test]
    fn test_claim_streams_are_scoped_by_kind() {
        assert_ne!(
            claim_stream_id(CodeKind::RenewalTracking, "X1"),
            claim_stream_id(CodeKind::ReplacementTracking, "X1")
        );
    }
}
