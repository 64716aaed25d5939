//! HTTP surface of the driving-license workflow.
//!
//! Exposes the license, exam, renewal, replacement and verification
//! engines as REST endpoints, with structured logging (tracing) and
//! Prometheus metrics. Callers identify themselves through the
//! `X-Actor-Id` and `X-Actor-Role` headers.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use event_store::EventStore;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use workflow::{Collaborators, Licensing};

use routes::AppState;
use routes::{exams, health, licenses, renewals, replacements, uploads, verify};

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: EventStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(health::check::<S>))
        // Licenses
        .route("/licenses", post(licenses::apply::<S>))
        .route("/licenses/mine", get(licenses::mine::<S>))
        .route("/licenses/{id}", get(licenses::get::<S>))
        .route("/licenses/{id}/review", post(licenses::review::<S>))
        .route(
            "/licenses/{id}/important-info",
            put(licenses::update_important_info::<S>),
        )
        .route(
            "/licenses/by-barcode/{barcode}",
            get(licenses::by_barcode::<S>),
        )
        .route("/licenses/officer/pending", get(licenses::pending::<S>))
        .route("/licenses/officer/all", get(licenses::all::<S>))
        .route("/licenses/officer/printable", get(licenses::printable::<S>))
        .route(
            "/licenses/officer/dept-approval/queue",
            get(licenses::dept_approval_queue::<S>),
        )
        .route(
            "/licenses/officer/dept-approval/signature-pending",
            get(licenses::signature_pending::<S>),
        )
        .route(
            "/licenses/{id}/dept-approval/submit",
            post(licenses::submit_dept_approval::<S>),
        )
        .route(
            "/licenses/{id}/dept-approval/approve",
            post(licenses::approve_dept_approval::<S>),
        )
        // Exams
        .route("/licenses/{id}/exams", get(exams::list_for_license::<S>))
        .route("/licenses/{id}/exams/schedule", post(exams::schedule::<S>))
        .route(
            "/licenses/{id}/exams/schedule-bundle",
            post(exams::schedule_bundle::<S>),
        )
        .route("/exams/{id}/schedule", post(exams::reschedule::<S>))
        .route("/exams/{id}/result", post(exams::submit_result::<S>))
        // Verification
        .route("/verify/{barcode}", get(verify::verify::<S>))
        // Renewals
        .route(
            "/renewals",
            post(renewals::apply::<S>).get(renewals::list::<S>),
        )
        .route("/renewals/mine", get(renewals::mine::<S>))
        .route(
            "/renewals/{id}/vision-exam/schedule",
            post(renewals::schedule_vision_exam::<S>),
        )
        .route(
            "/renewals/{id}/vision-exam/result",
            post(renewals::submit_vision_exam_result::<S>),
        )
        .route("/renewals/{id}/approve", post(renewals::approve::<S>))
        .route("/renewals/{id}/reject", post(renewals::reject::<S>))
        // Replacements
        .route("/replacements", post(replacements::apply::<S>))
        .route("/replacements/mine", get(replacements::mine::<S>))
        .route("/replacements/pending", get(replacements::pending::<S>))
        .route(
            "/replacements/{id}/approve",
            post(replacements::approve::<S>),
        )
        .route("/replacements/{id}/reject", post(replacements::reject::<S>))
        // Uploads
        .route("/uploads/{purpose}", post(uploads::upload::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the application state over `event_store` with the given
/// collaborators.
pub fn create_state<S: EventStore + Clone + 'static>(
    event_store: S,
    collaborators: Collaborators,
) -> Arc<AppState<S>> {
    let clock = collaborators.clock.clone();
    Arc::new(AppState {
        licensing: Licensing::new(event_store, collaborators),
        clock,
    })
}

/// Creates the default application state: seeded catalog, wall clock and
/// in-memory notifier, blob store and violation lookup.
pub fn create_default_state<S: EventStore + Clone + 'static>(event_store: S) -> Arc<AppState<S>> {
    create_state(event_store, Collaborators::in_memory())
}
