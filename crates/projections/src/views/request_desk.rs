//! Renewal and replacement request desk.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use common::{AggregateId, UserId};
use domain::{
    Aggregate, ExamResult, Money, Renewal, RenewalEvent, Replacement, ReplacementEvent,
    RequestStatus,
};
use event_store::EventEnvelope;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::error::ProjectionError;
use crate::read_model::ReadModel;
use crate::{Projection, Result};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenewalSummary {
    pub renewal_id: AggregateId,
    pub license_id: Option<AggregateId>,
    pub user_id: Option<UserId>,
    pub tracking_code: String,
    pub status: RequestStatus,
    pub fee: Money,
    pub old_expiry_date: Option<NaiveDate>,
    pub new_expiry_date: Option<NaiveDate>,
    pub vision_exam_date: Option<DateTime<Utc>>,
    pub vision_exam_result: Option<ExamResult>,
    pub payment_confirmed: bool,
    pub requested_at: Option<DateTime<Utc>>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

impl RenewalSummary {
    fn from_renewal(id: AggregateId, renewal: &Renewal) -> Self {
        Self {
            renewal_id: id,
            license_id: renewal.license_id(),
            user_id: renewal.user_id(),
            tracking_code: renewal.tracking_code().to_owned(),
            status: renewal.status(),
            fee: renewal.fee(),
            old_expiry_date: renewal.old_expiry_date(),
            new_expiry_date: renewal.new_expiry_date(),
            vision_exam_date: renewal.vision_exam_date(),
            vision_exam_result: renewal.vision_exam_result(),
            payment_confirmed: renewal.payment_confirmed(),
            requested_at: renewal.requested_at(),
            reviewed_at: renewal.reviewed_at(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplacementSummary {
    pub replacement_id: AggregateId,
    pub license_id: Option<AggregateId>,
    pub user_id: Option<UserId>,
    pub tracking_code: String,
    /// Shown to the requesting citizen only; officer lists leave it out.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_code: Option<String>,
    pub police_report: Option<String>,
    pub status: RequestStatus,
    pub old_barcode: Option<String>,
    pub new_barcode: Option<String>,
    pub requested_at: Option<DateTime<Utc>>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

impl ReplacementSummary {
    fn from_replacement(id: AggregateId, replacement: &Replacement, with_code: bool) -> Self {
        Self {
            replacement_id: id,
            license_id: replacement.license_id(),
            user_id: replacement.user_id(),
            tracking_code: replacement.tracking_code().to_owned(),
            payment_code: with_code.then(|| replacement.payment_code().to_owned()),
            police_report: replacement.police_report().map(str::to_owned),
            status: replacement.status(),
            old_barcode: replacement.old_barcode().map(str::to_owned),
            new_barcode: replacement.new_barcode().map(str::to_owned),
            requested_at: replacement.requested_at(),
            reviewed_at: replacement.reviewed_at(),
        }
    }
}

#[derive(Debug, Default)]
struct Desk {
    renewals: HashMap<AggregateId, Renewal>,
    replacements: HashMap<AggregateId, Replacement>,
}

/// Read model for the renewal and replacement lists.
#[derive(Clone, Default)]
pub struct RequestDeskView {
    desk: Arc<RwLock<Desk>>,
}

impl RequestDeskView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Renewals, optionally filtered by status. Newest first.
    pub async fn renewals(&self, status: Option<RequestStatus>) -> Vec<RenewalSummary> {
        self.collect_renewals(|r| status.is_none_or(|s| r.status() == s))
            .await
    }

    pub async fn renewals_for_user(&self, user: UserId) -> Vec<RenewalSummary> {
        self.collect_renewals(|r| r.user_id() == Some(user)).await
    }

    /// Replacements waiting for an officer, oldest first.
    pub async fn pending_replacements(&self) -> Vec<ReplacementSummary> {
        let mut list = self
            .collect_replacements(false, |r| r.status().is_pending())
            .await;
        list.reverse();
        list
    }

    /// A citizen's own replacement requests, newest first, payment codes included.
    pub async fn replacements_for_user(&self, user: UserId) -> Vec<ReplacementSummary> {
        self.collect_replacements(true, |r| r.user_id() == Some(user))
            .await
    }

    async fn collect_renewals(&self, filter: impl Fn(&Renewal) -> bool) -> Vec<RenewalSummary> {
        let desk = self.desk.read().await;
        let mut list: Vec<_> = desk
            .renewals
            .iter()
            .filter(|(_, r)| filter(r))
            .map(|(id, r)| RenewalSummary::from_renewal(*id, r))
            .collect();
        list.sort_by(|a, b| b.requested_at.cmp(&a.requested_at));
        list
    }

    async fn collect_replacements(
        &self,
        with_code: bool,
        filter: impl Fn(&Replacement) -> bool,
    ) -> Vec<ReplacementSummary> {
        let desk = self.desk.read().await;
        let mut list: Vec<_> = desk
            .replacements
            .iter()
            .filter(|(_, r)| filter(r))
            .map(|(id, r)| ReplacementSummary::from_replacement(*id, r, with_code))
            .collect();
        list.sort_by(|a, b| b.requested_at.cmp(&a.requested_at));
        list
    }
}

#[async_trait]
impl Projection for RequestDeskView {
    fn name(&self) -> &'static str {
        "RequestDeskView"
    }

    fn handles(&self, aggregate_type: &str) -> bool {
        aggregate_type == Renewal::aggregate_type()
            || aggregate_type == Replacement::aggregate_type()
    }

    async fn handle(&self, event: &EventEnvelope) -> Result<()> {
        let mut desk = self.desk.write().await;
        let id = event.aggregate_id;

        if event.aggregate_type == Renewal::aggregate_type() {
            let renewal_event: RenewalEvent = event
                .decode()
                .map_err(|e| ProjectionError::decode(event, e))?;
            let renewal = desk.renewals.entry(id).or_default();
            renewal.apply(renewal_event);
            renewal.set_version(event.version);
        } else {
            let replacement_event: ReplacementEvent = event
                .decode()
                .map_err(|e| ProjectionError::decode(event, e))?;
            let replacement = desk.replacements.entry(id).or_default();
            replacement.apply(replacement_event);
            replacement.set_version(event.version);
        }

        Ok(())
    }

    async fn reset(&self) -> Result<()> {
        *self.desk.write().await = Desk::default();
        Ok(())
    }
}

impl ReadModel for RequestDeskView {
    fn name(&self) -> &'static str {
        "RequestDeskView"
    }

    fn count(&self) -> usize {
        self.desk
            .try_read()
            .map(|d| d.renewals.len() + d.replacements.len())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use domain::renewal::{RenewalRejectedData, RenewalRequestedData};
    use domain::replacement::{ReplacementApprovedData, ReplacementRequestedData};
    use domain::{DomainEvent, RENEWAL_FEE};
    use event_store::Version;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, day, 12, 0, 0).unwrap()
    }

    fn make_envelope<E: DomainEvent>(
        aggregate_type: &str,
        id: AggregateId,
        version: i64,
        event: &E,
    ) -> EventEnvelope {
        EventEnvelope::builder()
            .aggregate_id(id)
            .aggregate_type(aggregate_type)
            .event_type(event.event_type())
            .version(Version::new(version))
            .payload(event)
            .unwrap()
            .build()
            .unwrap()
    }

    fn renewal_requested(id: AggregateId, user: UserId, day: u32) -> RenewalEvent {
        RenewalEvent::RenewalRequested(RenewalRequestedData {
            renewal_id: id,
            license_id: AggregateId::new(),
            user_id: user,
            tracking_code: format!("REN000000{day:02}"),
            new_photo: "photos/new.jpg".into(),
            citizen_notes: None,
            old_expiry_date: NaiveDate::from_ymd_opt(2024, 1, 1),
            fee: RENEWAL_FEE,
            requested_at: at(day),
        })
    }

    fn replacement_requested(id: AggregateId, user: UserId, day: u32) -> ReplacementEvent {
        ReplacementEvent::ReplacementRequested(ReplacementRequestedData {
            replacement_id: id,
            license_id: AggregateId::new(),
            user_id: user,
            tracking_code: format!("LOS000000{day:02}"),
            payment_code: "PAY12345678".into(),
            police_report: "reports/lost.pdf".into(),
            citizen_notes: Some("lost at the market".into()),
            requested_at: at(day),
        })
    }

    #[tokio::test]
    async fn test_renewals_filter_by_status_newest_first() {
        let view = RequestDeskView::new();
        let user = UserId::new();
        let first = AggregateId::new();
        let second = AggregateId::new();

        view.handle(&make_envelope("Renewal", first, 1, &renewal_requested(first, user, 1)))
            .await
            .unwrap();
        view.handle(&make_envelope("Renewal", second, 1, &renewal_requested(second, user, 9)))
            .await
            .unwrap();

        let rejected = RenewalEvent::RenewalRejected(RenewalRejectedData {
            reviewed_by: UserId::new(),
            reviewed_at: at(3),
            notes: Some("photo unclear".into()),
        });
        view.handle(&make_envelope("Renewal", first, 2, &rejected))
            .await
            .unwrap();

        let mine = view.renewals_for_user(user).await;
        assert_eq!(mine.len(), 2);
        assert_eq!(mine[0].renewal_id, second);
        assert_eq!(mine[0].fee, RENEWAL_FEE);

        let pending = view.renewals(Some(RequestStatus::Pending)).await;
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].renewal_id, second);
        assert_eq!(view.renewals(None).await.len(), 2);
    }

    #[tokio::test]
    async fn test_pending_replacements_hide_payment_code() {
        let view = RequestDeskView::new();
        let user = UserId::new();
        let id = AggregateId::new();

        view.handle(&make_envelope("Replacement", id, 1, &replacement_requested(id, user, 2)))
            .await
            .unwrap();

        let pending = view.pending_replacements().await;
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].payment_code, None);

        let mine = view.replacements_for_user(user).await;
        assert_eq!(mine[0].payment_code.as_deref(), Some("PAY12345678"));
    }

    #[tokio::test]
    async fn test_approved_replacement_leaves_pending_list() {
        let view = RequestDeskView::new();
        let user = UserId::new();
        let id = AggregateId::new();

        view.handle(&make_envelope("Replacement", id, 1, &replacement_requested(id, user, 2)))
            .await
            .unwrap();
        let approved = ReplacementEvent::ReplacementApproved(ReplacementApprovedData {
            old_barcode: Some("OLD0000000000000".into()),
            new_barcode: Some("NEW0000000000000".into()),
            reviewed_by: UserId::new(),
            reviewed_at: at(4),
            notes: None,
        });
        view.handle(&make_envelope("Replacement", id, 2, &approved))
            .await
            .unwrap();

        assert!(view.pending_replacements().await.is_empty());
        let mine = view.replacements_for_user(user).await;
        assert_eq!(mine[0].status, RequestStatus::Approved);
        assert_eq!(mine[0].new_barcode.as_deref(), Some("NEW0000000000000"));
        assert_eq!(view.count(), 1);
    }

    #[test]
    fn test_handles_request_streams_only() {
        let view = RequestDeskView::new();
        assert!(view.handles("Renewal"));
        assert!(view.handles("Replacement"));
        assert!(!view.handles("License"));
    }
}
