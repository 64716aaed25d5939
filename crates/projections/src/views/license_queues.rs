//! Officer license queues.
//!
//! Keeps a replica of every license, folded with the same `apply` the
//! command side uses, and answers the officer list queries from it.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use common::{AggregateId, UserId};
use domain::{
    Aggregate, DeptApproval, License, LicenseEvent, LicenseKind, LicenseStatus, LicenseTypeId,
};
use event_store::EventEnvelope;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::error::ProjectionError;
use crate::read_model::ReadModel;
use crate::{Projection, Result};

/// One row of an officer queue.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LicenseSummary {
    pub license_id: AggregateId,
    pub owner: Option<UserId>,
    pub full_name: String,
    pub passport_number: String,
    pub license_type_id: Option<LicenseTypeId>,
    pub kind: LicenseKind,
    pub category: Option<String>,
    /// Status as of the query date, with expiry derived.
    pub status: LicenseStatus,
    pub application_date: Option<DateTime<Utc>>,
    pub license_number: Option<String>,
    pub barcode: Option<String>,
    pub issued_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
    pub dept_approval: DeptApproval,
    pub printable: bool,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct Entry {
    license: License,
    updated_at: DateTime<Utc>,
}

impl Entry {
    fn summary(&self, id: AggregateId, today: NaiveDate) -> LicenseSummary {
        let license = &self.license;
        let (full_name, passport_number) = license
            .profile()
            .map(|p| (p.full_name.clone(), p.passport_number.clone()))
            .unwrap_or_default();
        LicenseSummary {
            license_id: id,
            owner: license.owner(),
            full_name,
            passport_number,
            license_type_id: license.license_type_id(),
            kind: license.kind(),
            category: license.category().map(str::to_owned),
            status: license.effective_status(today),
            application_date: license.application_date(),
            license_number: license.license_number().map(str::to_owned),
            barcode: license.barcode().map(str::to_owned),
            issued_date: license.issued_date(),
            expiry_date: license.expiry_date(),
            dept_approval: license.dept_approval().clone(),
            printable: license.is_printable(today),
            updated_at: self.updated_at,
        }
    }

    fn is_effectively_issued(&self, today: NaiveDate) -> bool {
        self.license.effective_status(today) == LicenseStatus::Issued
    }
}

#[derive(Debug, Default)]
struct State {
    licenses: HashMap<AggregateId, Entry>,
    /// Current barcode to license. Rotated barcodes are removed.
    barcodes: HashMap<String, AggregateId>,
}

/// Read model behind the officer license lists.
#[derive(Clone, Default)]
pub struct LicenseQueuesView {
    state: Arc<RwLock<State>>,
}

impl LicenseQueuesView {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, license_id: AggregateId, today: NaiveDate) -> Option<LicenseSummary> {
        let state = self.state.read().await;
        state
            .licenses
            .get(&license_id)
            .map(|e| e.summary(license_id, today))
    }

    /// Applications waiting for review, oldest first.
    pub async fn pending(&self, today: NaiveDate) -> Vec<LicenseSummary> {
        self.select(today, |e| e.license.status() == LicenseStatus::Pending)
            .await
            .sorted_by_application(false)
    }

    /// Every license, optionally narrowed to one legacy kind. Newest first.
    pub async fn all(&self, kind: Option<LicenseKind>, today: NaiveDate) -> Vec<LicenseSummary> {
        self.select(today, |e| kind.is_none_or(|k| e.license.kind() == k))
            .await
            .sorted_by_application(true)
    }

    /// Issued licenses not yet submitted for department approval.
    pub async fn dept_approval_queue(&self, today: NaiveDate) -> Vec<LicenseSummary> {
        self.select(today, |e| {
            e.is_effectively_issued(today) && e.license.dept_approval().awaiting_submission()
        })
        .await
        .sorted_by_application(false)
    }

    /// Submitted licenses waiting for the department head's signature.
    pub async fn signature_pending(&self, today: NaiveDate) -> Vec<LicenseSummary> {
        self.select(today, |e| {
            e.is_effectively_issued(today) && e.license.dept_approval().awaiting_signature()
        })
        .await
        .sorted_by_application(false)
    }

    pub async fn printable(&self, today: NaiveDate) -> Vec<LicenseSummary> {
        self.select(today, |e| e.license.is_printable(today))
            .await
            .sorted_by_application(false)
    }

    /// A citizen's own licenses, newest first.
    pub async fn for_owner(&self, owner: UserId, today: NaiveDate) -> Vec<LicenseSummary> {
        self.select(today, |e| e.license.owner() == Some(owner))
            .await
            .sorted_by_application(true)
    }

    /// Looks a license up by its current barcode.
    pub async fn by_barcode(&self, barcode: &str, today: NaiveDate) -> Option<LicenseSummary> {
        let state = self.state.read().await;
        let id = *state.barcodes.get(barcode)?;
        state.licenses.get(&id).map(|e| e.summary(id, today))
    }

    async fn select(
        &self,
        today: NaiveDate,
        filter: impl Fn(&Entry) -> bool,
    ) -> Vec<LicenseSummary> {
        let state = self.state.read().await;
        state
            .licenses
            .iter()
            .filter(|(_, e)| filter(e))
            .map(|(id, e)| e.summary(*id, today))
            .collect()
    }
}

trait SortByApplication {
    fn sorted_by_application(self, newest_first: bool) -> Self;
}

impl SortByApplication for Vec<LicenseSummary> {
    fn sorted_by_application(mut self, newest_first: bool) -> Self {
        self.sort_by_key(|s| (s.application_date, s.license_id.as_uuid()));
        if newest_first {
            self.reverse();
        }
        self
    }
}

#[async_trait]
impl Projection for LicenseQueuesView {
    fn name(&self) -> &'static str {
        "LicenseQueuesView"
    }

    fn handles(&self, aggregate_type: &str) -> bool {
        aggregate_type == License::aggregate_type()
    }

    async fn handle(&self, event: &EventEnvelope) -> Result<()> {
        let license_event: LicenseEvent = event
            .decode()
            .map_err(|e| ProjectionError::decode(event, e))?;
        let license_id = event.aggregate_id;

        let mut state = self.state.write().await;
        let State { licenses, barcodes } = &mut *state;

        let entry = licenses.entry(license_id).or_insert_with(|| Entry {
            license: License::default(),
            updated_at: event.timestamp,
        });
        let old_barcode = entry.license.barcode().map(str::to_owned);

        entry.license.apply(license_event);
        entry.license.set_version(event.version);
        entry.updated_at = event.timestamp;

        let new_barcode = entry.license.barcode();
        if old_barcode.as_deref() != new_barcode {
            if let Some(old) = old_barcode {
                barcodes.remove(&old);
            }
            if let Some(new) = new_barcode {
                barcodes.insert(new.to_owned(), license_id);
            }
        }

        Ok(())
    }

    async fn reset(&self) -> Result<()> {
        *self.state.write().await = State::default();
        Ok(())
    }
}

impl ReadModel for LicenseQueuesView {
    fn name(&self) -> &'static str {
        "LicenseQueuesView"
    }

    fn count(&self) -> usize {
        self.state.try_read().map(|s| s.licenses.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use domain::license::{
        ApplicationReviewedData, ApplicationSubmittedData, CredentialReplacedData,
        DeptApprovalGrantedData, DeptApprovalRequestedData, LicenseIssuedData,
    };
    use domain::{ApplicantDocuments, ApplicantProfile, DomainEvent, Gender};
    use event_store::Version;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, 9, 0, 0).unwrap()
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 28).unwrap()
    }

    fn make_envelope(id: AggregateId, version: i64, event: &LicenseEvent) -> EventEnvelope {
        EventEnvelope::builder()
            .aggregate_id(id)
            .aggregate_type("License")
            .event_type(event.event_type())
            .version(Version::new(version))
            .timestamp(at(version as u32))
            .payload(event)
            .unwrap()
            .build()
            .unwrap()
    }

    fn submitted(id: AggregateId, owner: UserId, kind: LicenseKind, day: u32) -> LicenseEvent {
        LicenseEvent::ApplicationSubmitted(ApplicationSubmittedData {
            license_id: id,
            owner,
            profile: ApplicantProfile {
                full_name: "Layla Haddad".into(),
                birth_date: NaiveDate::from_ymd_opt(1995, 6, 1).unwrap(),
                gender: Gender::Female,
                passport_number: "N0041".into(),
                nationality: None,
                blood_type: None,
                email: None,
                place_of_birth: None,
                residence_address: None,
            },
            age: 28,
            documents: ApplicantDocuments::default(),
            license_type_id: None,
            kind,
            category: None,
            application_date: at(day),
            tracks_dept_approval: true,
        })
    }

    fn approved() -> LicenseEvent {
        LicenseEvent::ApplicationReviewed(ApplicationReviewedData {
            status: LicenseStatus::Approved,
            reviewed_by: UserId::new(),
            review_date: at(3),
            notes: None,
        })
    }

    fn issued(barcode: &str, expiry: NaiveDate) -> LicenseEvent {
        LicenseEvent::LicenseIssued(LicenseIssuedData {
            license_number: "LIC00001234".into(),
            barcode: barcode.into(),
            public_token: "tok".into(),
            issued_date: NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(),
            expiry_date: expiry,
        })
    }

    fn far_expiry() -> NaiveDate {
        NaiveDate::from_ymd_opt(2034, 3, 4).unwrap()
    }

    async fn feed(view: &LicenseQueuesView, id: AggregateId, events: &[LicenseEvent]) {
        for (i, event) in events.iter().enumerate() {
            view.handle(&make_envelope(id, i as i64 + 1, event))
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_pending_queue_tracks_review() {
        let view = LicenseQueuesView::new();
        let id = AggregateId::new();
        let owner = UserId::new();

        feed(&view, id, &[submitted(id, owner, LicenseKind::Private, 1)]).await;
        let pending = view.pending(today()).await;
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].full_name, "Layla Haddad");
        assert_eq!(pending[0].status, LicenseStatus::Pending);

        view.handle(&make_envelope(id, 2, &approved())).await.unwrap();
        assert!(view.pending(today()).await.is_empty());
        assert_eq!(view.count(), 1);
    }

    #[tokio::test]
    async fn test_dept_approval_queues() {
        let view = LicenseQueuesView::new();
        let id = AggregateId::new();
        let owner = UserId::new();

        feed(
            &view,
            id,
            &[
                submitted(id, owner, LicenseKind::Private, 1),
                approved(),
                issued("AB12CD34EF56AB78", far_expiry()),
            ],
        )
        .await;

        assert_eq!(view.dept_approval_queue(today()).await.len(), 1);
        assert!(view.signature_pending(today()).await.is_empty());
        assert!(view.printable(today()).await.is_empty());

        let requested = LicenseEvent::DeptApprovalRequested(DeptApprovalRequestedData {
            requested_by: UserId::new(),
            requested_at: at(5),
        });
        view.handle(&make_envelope(id, 4, &requested)).await.unwrap();
        assert!(view.dept_approval_queue(today()).await.is_empty());
        assert_eq!(view.signature_pending(today()).await.len(), 1);

        let granted = LicenseEvent::DeptApprovalGranted(DeptApprovalGrantedData {
            approved_by: UserId::new(),
            approved_at: at(6),
            signature: Some("signatures/1.png".into()),
        });
        view.handle(&make_envelope(id, 5, &granted)).await.unwrap();
        assert!(view.signature_pending(today()).await.is_empty());

        let printable = view.printable(today()).await;
        assert_eq!(printable.len(), 1);
        assert!(printable[0].printable);
    }

    #[tokio::test]
    async fn test_expired_license_leaves_issued_queues() {
        let view = LicenseQueuesView::new();
        let id = AggregateId::new();
        let expiry = NaiveDate::from_ymd_opt(2024, 3, 20).unwrap();

        feed(
            &view,
            id,
            &[
                submitted(id, UserId::new(), LicenseKind::Private, 1),
                approved(),
                issued("AB12CD34EF56AB78", expiry),
            ],
        )
        .await;

        assert!(view.dept_approval_queue(today()).await.is_empty());
        let summary = view.get(id, today()).await.unwrap();
        assert_eq!(summary.status, LicenseStatus::Expired);
    }

    #[tokio::test]
    async fn test_barcode_index_follows_rotation() {
        let view = LicenseQueuesView::new();
        let id = AggregateId::new();

        feed(
            &view,
            id,
            &[
                submitted(id, UserId::new(), LicenseKind::Private, 1),
                approved(),
                issued("OLD0000000000000", far_expiry()),
            ],
        )
        .await;
        assert!(view.by_barcode("OLD0000000000000", today()).await.is_some());

        let replaced = LicenseEvent::CredentialReplaced(CredentialReplacedData {
            replacement_id: AggregateId::new(),
            old_barcode: Some("OLD0000000000000".into()),
            new_barcode: Some("NEW0000000000000".into()),
            public_token: "tok2".into(),
            replaced_by: UserId::new(),
            replaced_at: at(10),
        });
        view.handle(&make_envelope(id, 4, &replaced)).await.unwrap();

        assert!(view.by_barcode("OLD0000000000000", today()).await.is_none());
        let found = view.by_barcode("NEW0000000000000", today()).await.unwrap();
        assert_eq!(found.license_id, id);
        assert_eq!(view.signature_pending(today()).await.len(), 1);
    }

    #[tokio::test]
    async fn test_all_filters_by_kind_and_owner() {
        let view = LicenseQueuesView::new();
        let owner = UserId::new();
        let a = AggregateId::new();
        let b = AggregateId::new();

        feed(&view, a, &[submitted(a, owner, LicenseKind::Private, 1)]).await;
        feed(&view, b, &[submitted(b, UserId::new(), LicenseKind::Truck, 2)]).await;

        assert_eq!(view.all(None, today()).await.len(), 2);
        let trucks = view.all(Some(LicenseKind::Truck), today()).await;
        assert_eq!(trucks.len(), 1);
        assert_eq!(trucks[0].license_id, b);

        let mine = view.for_owner(owner, today()).await;
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].license_id, a);
    }

    #[tokio::test]
    async fn test_reset_clears_state() {
        let view = LicenseQueuesView::new();
        let id = AggregateId::new();
        feed(&view, id, &[submitted(id, UserId::new(), LicenseKind::Private, 1)]).await;

        view.reset().await.unwrap();
        assert_eq!(view.count(), 0);
        assert!(view.pending(today()).await.is_empty());
    }

    #[test]
    fn test_handles_only_licenses() {
        let view = LicenseQueuesView::new();
        assert!(view.handles("License"));
        assert!(!view.handles("Renewal"));
    }
}
