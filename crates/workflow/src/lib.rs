//! License lifecycle engines.
//!
//! This crate provides:
//! - the License Application, Exam, Department Approval, Renewal and
//!   Replacement engines, plus public verification and uploads
//! - the collaborator traits (`Notifier`, `BlobStore`, `ViolationLookup`)
//!   with in-memory implementations
//! - [`Outcome`] and the [`NotificationDispatcher`] that sends the
//!   notifications an operation produced once it has committed
//!
//! Every operation takes the calling [`common::Actor`], checks its role,
//! and commits all resulting events in one unit of work.

pub mod applications;
pub mod context;
pub mod dept_approval;
pub mod effects;
pub mod error;
pub mod examinations;
pub mod licensing;
pub mod queries;
pub mod renewals;
pub mod replacements;
pub mod services;
pub mod uploads;
pub mod verification;

pub use applications::LicenseApplications;
pub use context::WorkflowContext;
pub use dept_approval::DepartmentApproval;
pub use effects::{DispatchReport, NotificationDispatcher, Outcome};
pub use error::{Result, WorkflowError};
pub use examinations::{BundleFailure, BundleItem, BundleReport, Examinations};
pub use licensing::{Collaborators, Licensing};
pub use queries::OfficerQueries;
pub use renewals::{RenewalApplication, Renewals};
pub use replacements::{ReplacementApplication, ReplacementApproval, Replacements};
pub use services::{
    BlobError, BlobStore, InMemoryBlobStore, InMemoryNotifier, InMemoryViolations, LookupError,
    Notification, Notifier, NotifyError, ViolationLookup, ViolationStatus, ViolationSummary,
};
pub use uploads::{FileUpload, StoredFile, UploadPurpose, Uploads};
pub use verification::{Verification, VerificationReport};
