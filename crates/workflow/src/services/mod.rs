//! External collaborator traits and in-memory implementations.

pub mod blob_store;
pub mod notifier;
pub mod violations;

pub use blob_store::{BlobError, BlobStore, InMemoryBlobStore};
pub use notifier::{InMemoryNotifier, Notification, NotifyError, Notifier};
pub use violations::{InMemoryViolations, LookupError, ViolationLookup, ViolationStatus, ViolationSummary};
