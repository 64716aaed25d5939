//! Read model views.

pub mod license_queues;
pub mod request_desk;

pub use license_queues::{LicenseQueuesView, LicenseSummary};
pub use request_desk::{RenewalSummary, ReplacementSummary, RequestDeskView};
