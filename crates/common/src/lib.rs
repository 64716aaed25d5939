pub mod actor;
pub mod clock;
pub mod types;

pub use actor::{AccessDenied, Actor, Role};
pub use clock::{Clock, FixedClock, SystemClock};
pub use types::{AggregateId, UserId};
