//! Exam aggregate implementation.

use chrono::{DateTime, Utc};
use common::{AggregateId, UserId};
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;
use crate::catalog::ExamTypeId;
use crate::values::{EXAM_FEE, ExamResult};

use super::{
    ExamError, ExamEvent, ExamPayment,
    events::{ExamCreatedData, ExamGradedData, ExamScheduledData},
};

/// ```text
/// Created ──► Scheduled ──► Graded
///    │          ▲   │
///    │          └───┘ (reschedule)
///    └──────────────────► Graded
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ExamState {
    #[default]
    Created,
    Scheduled,
    /// Terminal. A retake is a new exam.
    Graded,
}

impl ExamState {
    pub fn is_graded(&self) -> bool {
        matches!(self, ExamState::Graded)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExamState::Created => "Created",
            ExamState::Scheduled => "Scheduled",
            ExamState::Graded => "Graded",
        }
    }
}

impl std::fmt::Display for ExamState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Exam {
    id: Option<AggregateId>,
    #[serde(default)]
    version: Version,
    license_id: Option<AggregateId>,
    exam_type_id: Option<ExamTypeId>,
    state: ExamState,
    created_at: Option<DateTime<Utc>>,
    scheduled_date: Option<DateTime<Utc>>,
    scheduled_by: Option<UserId>,
    result: Option<ExamResult>,
    score: Option<u32>,
    notes: Option<String>,
    conducted_by: Option<UserId>,
    exam_date: Option<DateTime<Utc>>,
    payment: Option<ExamPayment>,
}

impl Aggregate for Exam {
    type Event = ExamEvent;
    type Error = ExamError;

    fn aggregate_type() -> &'static str {
        "Exam"
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
            ExamEvent::ExamCreated(data) => {
                self.id = Some(data.exam_id);
                self.license_id = Some(data.license_id);
                self.exam_type_id = Some(data.exam_type_id);
                self.created_at = Some(data.created_at);
            }
            ExamEvent::ExamScheduled(data) => {
                self.state = ExamState::Scheduled;
                self.scheduled_date = Some(data.scheduled_date);
                self.scheduled_by = Some(data.scheduled_by);
            }
            ExamEvent::ExamGraded(data) => {
                self.state = ExamState::Graded;
                self.result = Some(data.result);
                self.score = data.score;
                self.notes = data.notes;
                self.conducted_by = Some(data.conducted_by);
                self.exam_date = Some(data.exam_date);
                if self.payment.is_none() {
                    self.payment = data.payment;
                }
            }
        }
    }
}

// Query methods
impl Exam {
    pub fn license_id(&self) -> Option<AggregateId> {
        self.license_id
    }

    pub fn exam_type_id(&self) -> Option<ExamTypeId> {
        self.exam_type_id
    }

    pub fn state(&self) -> ExamState {
        self.state
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn scheduled_date(&self) -> Option<DateTime<Utc>> {
        self.scheduled_date
    }

    pub fn result(&self) -> Option<ExamResult> {
        self.result
    }

    pub fn score(&self) -> Option<u32> {
        self.score
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn conducted_by(&self) -> Option<UserId> {
        self.conducted_by
    }

    pub fn exam_date(&self) -> Option<DateTime<Utc>> {
        self.exam_date
    }

    pub fn payment(&self) -> Option<&ExamPayment> {
        self.payment.as_ref()
    }
}

// Command methods (return events)
impl Exam {
    pub fn create(
        &self,
        exam_id: AggregateId,
        license_id: AggregateId,
        exam_type_id: ExamTypeId,
        officer: UserId,
        at: DateTime<Utc>,
    ) -> Result<Vec<ExamEvent>, ExamError> {
        if self.id.is_some() {
            return Err(ExamError::AlreadyCreated);
        }
        Ok(vec![ExamEvent::ExamCreated(ExamCreatedData {
            exam_id,
            license_id,
            exam_type_id,
            created_by: officer,
            created_at: at,
        })])
    }

    /// Sets or replaces the scheduled date of an ungraded exam.
    pub fn schedule(
        &self,
        date: DateTime<Utc>,
        officer: UserId,
    ) -> Result<Vec<ExamEvent>, ExamError> {
        if self.state.is_graded() {
            return Err(ExamError::AlreadyGraded);
        }
        Ok(vec![ExamEvent::ExamScheduled(ExamScheduledData {
            scheduled_date: date,
            scheduled_by: officer,
        })])
    }

    /// Records the result. The exam fee is snapshotted on the first grading.
    pub fn grade(
        &self,
        result: ExamResult,
        score: Option<u32>,
        notes: Option<String>,
        officer: UserId,
        at: DateTime<Utc>,
    ) -> Result<Vec<ExamEvent>, ExamError> {
        if self.state.is_graded() {
            return Err(ExamError::AlreadyGraded);
        }

        let payment = self.payment.is_none().then_some(ExamPayment {
            amount: EXAM_FEE,
            paid_at: at,
            paid_by: officer,
        });

        Ok(vec![ExamEvent::ExamGraded(ExamGradedData {
            result,
            score,
            notes: notes.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
            conducted_by: officer,
            exam_date: at,
            payment,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::values::Money;
    use chrono::{Duration, TimeZone};

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 4, 2, 8, 30, 0).unwrap()
    }

    fn created() -> Exam {
        let mut exam = Exam::default();
        let events = exam
            .create(
                AggregateId::new(),
                AggregateId::new(),
                ExamTypeId(2),
                UserId::new(),
                at(),
            )
            .unwrap();
        exam.apply_events(events);
        exam
    }

    #[test]
    fn test_reschedule_replaces_date() {
        let mut exam = created();
        let officer = UserId::new();
        let first = at() + Duration::days(3);
        let second = at() + Duration::days(5);

        exam.apply_events(exam.schedule(first, officer).unwrap());
        exam.apply_events(exam.schedule(second, officer).unwrap());

        assert_eq!(exam.state(), ExamState::Scheduled);
        assert_eq!(exam.scheduled_date(), Some(second));
    }

    #[test]
    fn test_grading_snapshots_fee_once() {
        let mut exam = created();
        let officer = UserId::new();
        exam.apply_events(
            exam.grade(ExamResult::Passed, Some(88), Some(" clean run ".into()), officer, at())
                .unwrap(),
        );

        assert_eq!(exam.result(), Some(ExamResult::Passed));
        assert_eq!(exam.score(), Some(88));
        assert_eq!(exam.notes(), Some("clean run"));
        let payment = exam.payment().unwrap();
        assert_eq!(payment.amount, Money::from_cents(1050));
        assert_eq!(payment.paid_by, officer);
        assert_eq!(payment.paid_at, at());
    }

    #[test]
    fn test_graded_exam_is_terminal() {
        let mut exam = created();
        exam.apply_events(
            exam.grade(ExamResult::Failed, None, None, UserId::new(), at())
                .unwrap(),
        );

        assert!(matches!(
            exam.grade(ExamResult::Passed, None, None, UserId::new(), at()),
            Err(ExamError::AlreadyGraded)
        ));
        assert!(matches!(
            exam.schedule(at(), UserId::new()),
            Err(ExamError::AlreadyGraded)
        ));
    }
}
