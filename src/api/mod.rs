mod appointments;
pub mod auth;
mod catalog;
mod dashboard;
pub mod error;
pub mod metrics;
mod notifications;
mod users;
mod validation;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Auth routes (public)
    let auth_routes = Router::new()
        .route("/signup", post(auth::signup))
        .route("/login", post(auth::login))
        .route("/forgot-password", post(auth::forgot_password))
        .route("/reset-password", post(auth::reset_password))
        .route("/otp/request", post(auth::request_otp))
        .route("/otp/verify", post(auth::verify_otp));

    // Protected API routes
    let api_routes = Router::new()
        // Session
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me))
        // Catalog
        .route("/therapies", get(catalog::list_therapies))
        .route("/therapies/categories", get(catalog::list_categories))
        .route("/therapies/:id", get(catalog::get_therapy))
        // Practitioners and patients
        .route("/doctors", get(appointments::list_doctors))
        .route("/doctors/:id/slots", get(appointments::doctor_slots))
        .route("/patients", get(appointments::list_patients))
        // Appointments
        .route(
            "/appointments",
            get(appointments::list_appointments).post(appointments::create_appointment),
        )
        .route("/appointments/:id", get(appointments::get_appointment))
        .route("/appointments/:id/status", put(appointments::update_status))
        .route("/appointments/:id/vitals", put(appointments::record_vitals))
        .route("/appointments/:id/feedback", put(appointments::submit_feedback))
        // Notifications
        .route("/notifications", get(notifications::list_notifications))
        .route("/notifications/unread-count", get(notifications::unread_count))
        .route("/notifications/read-all", put(notifications::mark_all_read))
        .route("/notifications/:id/read", put(notifications::mark_read))
        // Dashboard
        .route("/dashboard", get(dashboard::get_dashboard))
        // Users
        .route("/users", get(users::list_users).post(users::create_user))
        .route("/users/:id", get(users::get_user))
        .route("/profile", put(users::update_profile))
        // Protected by auth
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::auth_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics::metrics_endpoint))
        .nest("/api/auth", auth_routes)
        .nest("/api", api_routes)
        .route_layer(middleware::from_fn(metrics::metrics_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
