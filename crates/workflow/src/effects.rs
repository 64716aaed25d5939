//! Side effects returned by the engines and dispatched after commit.
//!
//! Engines never talk to the notifier. They return the committed value
//! together with the notifications it warrants; the caller hands those to a
//! [`NotificationDispatcher`] once the commit succeeded.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use common::{AggregateId, UserId};
use domain::{EXAM_FEE, ExamResult, Money};

use crate::services::{Notification, Notifier};

/// A committed result plus the notifications to attempt.
#[derive(Debug, Clone)]
pub struct Outcome<T> {
    pub value: T,
    pub effects: Vec<Notification>,
}

impl<T> Outcome<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            effects: Vec::new(),
        }
    }

    pub fn with_effect(mut self, effect: Notification) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        Outcome {
            value: f(self.value),
            effects: self.effects,
        }
    }
}

/// Counts from one dispatch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub sent: usize,
    pub failed: usize,
}

/// Attempts each notification once. Failures are logged and counted,
/// never returned.
#[derive(Clone)]
pub struct NotificationDispatcher {
    notifier: Arc<dyn Notifier>,
}

impl NotificationDispatcher {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }

    #[tracing::instrument(skip_all, fields(count = effects.len()))]
    pub async fn dispatch(&self, effects: Vec<Notification>) -> DispatchReport {
        let mut report = DispatchReport::default();
        for effect in effects {
            match self.notifier.notify(&effect).await {
                Ok(()) => {
                    report.sent += 1;
                    metrics::counter!("notifications_sent_total").increment(1);
                }
                Err(e) => {
                    report.failed += 1;
                    metrics::counter!("notifications_failed_total").increment(1);
                    tracing::warn!(
                        user_id = %effect.user_id,
                        kind = effect.kind().unwrap_or("unknown"),
                        error = %e,
                        "notification not delivered"
                    );
                }
            }
        }
        report
    }

    /// Dispatches the effects and returns the value.
    pub async fn deliver<T>(&self, outcome: Outcome<T>) -> T {
        self.dispatch(outcome.effects).await;
        outcome.value
    }
}

pub(crate) fn exam_scheduled(
    owner: UserId,
    exam_id: AggregateId,
    license_id: AggregateId,
    exam_type: &str,
    date: DateTime<Utc>,
) -> Notification {
    Notification::new(
        owner,
        "Exam scheduled",
        format!(
            "Your {exam_type} exam is scheduled for {}.",
            date.format("%Y-%m-%d %H:%M")
        ),
    )
    .with("type", "exam_scheduled")
    .with("exam_id", exam_id)
    .with("license_id", license_id)
    .with("scheduled_date", date.to_rfc3339())
    .with("exam_fee", EXAM_FEE)
}

pub(crate) fn exam_graded(
    owner: UserId,
    exam_id: AggregateId,
    license_id: AggregateId,
    exam_type: &str,
    result: ExamResult,
    score: Option<u32>,
) -> Notification {
    let body = match result {
        ExamResult::Passed => format!("You passed the {exam_type} exam."),
        ExamResult::Failed => format!(
            "You did not pass the {exam_type} exam. Your application was rejected; you may reapply after the waiting period."
        ),
    };
    let mut note = Notification::new(owner, "Exam result", body)
        .with("type", format!("exam_{result}"))
        .with("exam_id", exam_id)
        .with("license_id", license_id)
        .with("result", result)
        .with("exam_fee", EXAM_FEE);
    if let Some(score) = score {
        note = note.with("score", score);
    }
    note
}

pub(crate) fn license_approved(owner: UserId, license_id: AggregateId) -> Notification {
    Notification::new(
        owner,
        "Application approved",
        "Your license application was approved. Exams will be scheduled next.",
    )
    .with("type", "license_approved")
    .with("license_id", license_id)
}

pub(crate) fn license_issued(
    owner: UserId,
    license_id: AggregateId,
    license_number: &str,
    expiry: NaiveDate,
) -> Notification {
    Notification::new(
        owner,
        "License issued",
        format!("License {license_number} was issued and is valid until {expiry}."),
    )
    .with("type", "license_issued")
    .with("license_id", license_id)
    .with("license_number", license_number)
    .with("expiry_date", expiry)
}

pub(crate) fn vision_exam_scheduled(
    owner: UserId,
    renewal_id: AggregateId,
    date: DateTime<Utc>,
    fee: Money,
) -> Notification {
    Notification::new(
        owner,
        "Vision exam scheduled",
        format!(
            "Your renewal vision exam is on {}. Renewal fee: {fee}.",
            date.format("%Y-%m-%d %H:%M")
        ),
    )
    .with("type", "renewal_vision_exam_scheduled")
    .with("renewal_id", renewal_id)
    .with("scheduled_date", date.to_rfc3339())
    .with("fee", fee)
}

pub(crate) fn vision_exam_result(
    owner: UserId,
    renewal_id: AggregateId,
    result: ExamResult,
    fee: Money,
) -> Notification {
    Notification::new(
        owner,
        "Vision exam result",
        format!("Your renewal vision exam result: {result}."),
    )
    .with("type", "renewal_vision_exam_result")
    .with("renewal_id", renewal_id)
    .with("result", result)
    .with("fee", fee)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::InMemoryNotifier;

    #[tokio::test]
    async fn test_dispatch_counts_failures_without_erroring() {
        let notifier = InMemoryNotifier::new();
        let dispatcher = NotificationDispatcher::new(Arc::new(notifier.clone()));
        let user = UserId::new();
        let effects = vec![
            license_approved(user, AggregateId::new()),
            license_approved(user, AggregateId::new()),
        ];

        let report = dispatcher.dispatch(effects.clone()).await;
        assert_eq!(report, DispatchReport { sent: 2, failed: 0 });

        notifier.set_fail(true);
        let report = dispatcher.dispatch(effects).await;
        assert_eq!(report, DispatchReport { sent: 0, failed: 2 });
        assert_eq!(notifier.sent().len(), 2);
    }

    #[tokio::test]
    async fn test_deliver_returns_value() {
        let notifier = InMemoryNotifier::new();
        let dispatcher = NotificationDispatcher::new(Arc::new(notifier.clone()));
        let user = UserId::new();

        let outcome = Outcome::new(7).with_effect(license_approved(user, AggregateId::new()));
        assert_eq!(dispatcher.deliver(outcome).await, 7);
        assert_eq!(notifier.sent_to(user).len(), 1);
    }

    #[test]
    fn test_exam_notification_data() {
        let note = exam_graded(
            UserId::new(),
            AggregateId::new(),
            AggregateId::new(),
            "Road",
            ExamResult::Failed,
            Some(41),
        );
        assert_eq!(note.kind(), Some("exam_failed"));
        assert_eq!(note.data.get("score").map(String::as_str), Some("41"));
        assert_eq!(note.data.get("exam_fee").map(String::as_str), Some("10.50"));
    }
}
