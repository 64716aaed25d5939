//! Exam domain events.

use chrono::{DateTime, Utc};
use common::{AggregateId, UserId};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;
use crate::catalog::ExamTypeId;
use crate::values::{ExamResult, Money};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ExamEvent {
    ExamCreated(ExamCreatedData),
    ExamScheduled(ExamScheduledData),
    ExamGraded(ExamGradedData),
}

impl DomainEvent for ExamEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ExamEvent::ExamCreated(_) => "ExamCreated",
            ExamEvent::ExamScheduled(_) => "ExamScheduled",
            ExamEvent::ExamGraded(_) => "ExamGraded",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamCreatedData {
    pub exam_id: AggregateId,
    pub license_id: AggregateId,
    pub exam_type_id: ExamTypeId,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
}

/// Data for ExamScheduled event. A later schedule replaces the earlier date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamScheduledData {
    pub scheduled_date: DateTime<Utc>,
    pub scheduled_by: UserId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamGradedData {
    pub result: ExamResult,
    pub score: Option<u32>,
    pub notes: Option<String>,
    pub conducted_by: UserId,
    pub exam_date: DateTime<Utc>,
    /// Fee snapshot; only present the first time the exam is graded.
    pub payment: Option<ExamPayment>,
}

/// Payment recorded automatically when an exam is graded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamPayment {
    pub amount: Money,
    pub paid_at: DateTime<Utc>,
    pub paid_by: UserId,
}
