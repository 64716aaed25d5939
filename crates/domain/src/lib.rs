//! Domain layer of the licensing workflow.
//!
//! This crate provides:
//! - the `Aggregate`/`DomainEvent` traits and the command plumbing
//!   (`CommandHandler`, `UnitOfWork`)
//! - the License, Exam, Renewal and Replacement aggregates with their
//!   state machines
//! - the Eligibility Evaluator and reference-catalog lookups
//! - unique code generation backed by `CodeClaim` streams

pub mod aggregate;
pub mod applicant;
pub mod catalog;
pub mod codes;
pub mod command;
pub mod eligibility;
pub mod error;
pub mod exam;
pub mod license;
pub mod renewal;
pub mod replacement;
pub mod request;
pub mod values;

pub use aggregate::{Aggregate, DomainEvent};
pub use applicant::{Applicant, ApplicantError, ApplicantEvent, FiledApplication};
pub use catalog::{
    CatalogError, ExamTypeEntry, ExamTypeId, InMemoryCatalog, LicenseCategory, LicenseTypeEntry,
    LicenseTypeId, ReferenceCatalog,
};
pub use codes::{ClaimError, CodeClaim, CodeKind, allocate_code, barcode, code_owner, random_code};
pub use command::{CommandHandler, CommandResult, UnitOfWork, load_aggregate};
pub use error::{DomainError, ErrorKind};
pub use exam::{Exam, ExamError, ExamEvent, ExamPayment, ExamState};
pub use license::{
    ApplicationForm, DeptApproval, ExamEntry, Issuance, License, LicenseError, LicenseEvent,
    LicenseStatus, ReviewDecision, ScreenedApplication, screen_application,
};
pub use renewal::{Renewal, RenewalError, RenewalEvent};
pub use replacement::{Replacement, ReplacementError, ReplacementEvent, ReplacementRequest};
pub use request::{RequestRef, RequestStatus};
pub use values::{
    ApplicantDocuments, ApplicantProfile, BloodType, EXAM_FEE, ExamResult, Gender, ImportantInfo,
    ImportantInfoUpdate, LicenseKind, Money, RENEWAL_FEE, UnknownValue,
};
