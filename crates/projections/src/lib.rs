//! Read models and projections for the query side.
//!
//! This crate provides:
//! - [`Projection`] trait for folding events into read models
//! - [`ReadModel`] trait for reporting view sizes
//! - [`ProjectionProcessor`] for feeding events from the store to projections
//! - Two views: the officer license queues and the renewal/replacement desk

pub mod error;
pub mod processor;
pub mod projection;
pub mod read_model;
pub mod views;

pub use error::{ProjectionError, Result};
pub use processor::ProjectionProcessor;
pub use projection::{Projection, ProjectionPosition};
pub use read_model::ReadModel;
pub use views::{
    LicenseQueuesView, LicenseSummary, RenewalSummary, ReplacementSummary, RequestDeskView,
};
