//! Prometheus metrics endpoint and HTTP request tracking middleware.
//!
//! This module provides:
//! - A `/metrics` endpoint that returns Prometheus-formatted metrics
//! - Middleware for tracking HTTP request counts and durations
//! - Helper functions to record booking and sign-in metrics

use axum::{
    body::Body,
    extract::{MatchedPath, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::Arc;
use std::time::Instant;

use crate::db::{Role, User};
use crate::AppState;

// Metric names as constants for consistency
pub const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";
pub const HTTP_REQUEST_DURATION_SECONDS: &str = "http_request_duration_seconds";
pub const APPOINTMENTS_BOOKED_TOTAL: &str = "appointments_booked_total";
pub const APPOINTMENT_CONFLICTS_TOTAL: &str = "appointment_conflicts_total";
pub const LOGINS_TOTAL: &str = "logins_total";
pub const USERS_TOTAL: &str = "users_total";

/// Install the Prometheus recorder and return a handle for rendering metrics.
///
/// Call once during application startup.
pub fn init_metrics() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    describe_counter!(
        HTTP_REQUESTS_TOTAL,
        "Total number of HTTP requests received"
    );
    describe_histogram!(
        HTTP_REQUEST_DURATION_SECONDS,
        "HTTP request duration in seconds"
    );
    describe_counter!(
        APPOINTMENTS_BOOKED_TOTAL,
        "Total number of appointments booked, by therapy"
    );
    describe_counter!(
        APPOINTMENT_CONFLICTS_TOTAL,
        "Bookings rejected because the slot was already taken"
    );
    describe_counter!(LOGINS_TOTAL, "Sign-in attempts by method and outcome");
    describe_gauge!(USERS_TOTAL, "Registered users by role");

    Ok(handle)
}

/// GET /metrics - Returns Prometheus-formatted metrics.
///
/// This endpoint is accessible without authentication.
pub async fn metrics_endpoint(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    update_gauge_metrics(&state).await;

    match state.metrics_handle.as_ref() {
        Some(h) => (StatusCode::OK, h.render()),
        None => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Metrics not initialized".to_string(),
        ),
    }
}

/// Refresh the per-role user gauge from the database
async fn update_gauge_metrics(state: &AppState) {
    for role in [Role::Patient, Role::Doctor, Role::Admin] {
        if let Ok(count) = User::count_by_role(&state.db, role).await {
            gauge!(USERS_TOTAL, "role" => role.as_str()).set(count as f64);
        }
    }
}

/// Middleware to track HTTP request metrics.
///
/// Records:
/// - `http_requests_total` counter with method, path, and status labels
/// - `http_request_duration_seconds` histogram with method and path labels
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();

    // Matched path keeps ids out of the label set (/api/appointments/:id)
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|mp| mp.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    let method = request.method().to_string();

    let response = next.run(request).await;

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    counter!(HTTP_REQUESTS_TOTAL, "method" => method.clone(), "path" => path.clone(), "status" => status).increment(1);
    histogram!(HTTP_REQUEST_DURATION_SECONDS, "method" => method, "path" => path).record(duration);

    response
}

/// Record a committed booking.
pub fn record_appointment_booked(therapy_id: &str) {
    counter!(APPOINTMENTS_BOOKED_TOTAL, "therapy" => therapy_id.to_string()).increment(1);
}

/// Record a booking rejected by the slot uniqueness guard.
pub fn record_slot_conflict() {
    counter!(APPOINTMENT_CONFLICTS_TOTAL).increment(1);
}

/// Record a sign-in attempt. `method` is `password` or `otp`.
pub fn record_login(method: &'static str, success: bool) {
    let outcome = if success { "success" } else { "failed" };
    counter!(LOGINS_TOTAL, "method" => method, "outcome" => outcome).increment(1);
}
