//! Booking endpoints: practitioner lookup, open slots, and the appointment
//! lifecycle. Access is scoped by role: patients see their own bookings,
//! practitioners see their own schedule, admins see everything.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use crate::db::{
    Appointment, AppointmentResponse, AppointmentStatus, CreateAppointmentRequest, Feedback,
    ListAppointmentsQuery, RecordVitalsRequest, Role, SlotsQuery, SlotsResponse,
    UpdateStatusRequest, User, UserResponse,
};
use crate::scheduling::{self, NewAppointment, SchedulingError};
use crate::AppState;

use super::auth::require_role;
use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{validate_date, validate_slot};

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub search: Option<String>,
}

/// Today's date in the clinic's local time
pub(crate) fn today() -> chrono::NaiveDate {
    chrono::Local::now().date_naive()
}

/// Load a user and check the role, reporting failures against `field`
async fn require_user_with_role(
    state: &AppState,
    user_id: &str,
    role: Role,
    field: &str,
) -> Result<User, ApiError> {
    match User::get_by_id(&state.db, user_id).await? {
        Some(user) if user.role() == role => Ok(user),
        _ => Err(ApiError::validation_field(
            field,
            format!("No {} with id {}", role, user_id),
        )),
    }
}

/// Fetch an appointment the caller is allowed to see
async fn get_visible_appointment(
    state: &AppState,
    user: &User,
    id: &str,
) -> Result<Appointment, ApiError> {
    let appointment = Appointment::get_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Appointment not found"))?;

    if user.role() != Role::Admin && !appointment.involves(&user.id) {
        return Err(ApiError::forbidden("You do not have access to this appointment"));
    }

    Ok(appointment)
}

/// List practitioners
///
/// GET /api/doctors
pub async fn list_doctors(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    let doctors = User::list(&state.db, Some(Role::Doctor), query.search.as_deref()).await?;
    Ok(Json(doctors.into_iter().map(UserResponse::from).collect()))
}

/// Open slots for a practitioner on a date
///
/// GET /api/doctors/:id/slots?date=YYYY-MM-DD
pub async fn doctor_slots(
    State(state): State<Arc<AppState>>,
    Path(doctor_id): Path<String>,
    Query(query): Query<SlotsQuery>,
) -> Result<Json<SlotsResponse>, ApiError> {
    match User::get_by_id(&state.db, &doctor_id).await? {
        Some(doctor) if doctor.role() == Role::Doctor => {}
        _ => return Err(ApiError::not_found("Practitioner not found")),
    }

    let slots = scheduling::list_open_slots(&state.db, &doctor_id, &query.date).await?;

    Ok(Json(SlotsResponse {
        doctor_id,
        date: query.date,
        slots,
    }))
}

/// List patients for booking on someone's behalf
///
/// GET /api/patients
pub async fn list_patients(
    State(state): State<Arc<AppState>>,
    user: User,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    require_role(&user, &[Role::Doctor, Role::Admin])?;

    let patients = User::list(&state.db, Some(Role::Patient), query.search.as_deref()).await?;
    Ok(Json(patients.into_iter().map(UserResponse::from).collect()))
}

/// Book an appointment
///
/// POST /api/appointments
pub async fn create_appointment(
    State(state): State<Arc<AppState>>,
    user: User,
    Json(req): Json<CreateAppointmentRequest>,
) -> Result<(StatusCode, Json<AppointmentResponse>), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    errors.check("date", validate_date(&req.date));
    errors.check("time", validate_slot(&req.time));
    if req.doctor_id.trim().is_empty() {
        errors.add("doctor_id", "doctor_id is required");
    }
    errors.finish()?;

    // Patients always book for themselves; staff book on a patient's behalf
    let patient_id = match user.role() {
        Role::Patient => match req.patient_id.as_deref() {
            Some(id) if id != user.id => {
                return Err(ApiError::forbidden("Patients can only book for themselves"))
            }
            _ => user.id.clone(),
        },
        Role::Doctor | Role::Admin => req
            .patient_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| ApiError::validation_field("patient_id", "patient_id is required"))?,
    };

    if user.role() == Role::Doctor && req.doctor_id != user.id {
        return Err(ApiError::forbidden(
            "Practitioners can only book into their own schedule",
        ));
    }

    require_user_with_role(&state, &patient_id, Role::Patient, "patient_id").await?;
    require_user_with_role(&state, &req.doctor_id, Role::Doctor, "doctor_id").await?;

    let booking = scheduling::create_appointment(
        &state.db,
        &NewAppointment {
            patient_id,
            doctor_id: req.doctor_id,
            therapy_id: req.therapy_id,
            date: req.date,
            time: req.time,
            status: req.status,
            notes: req.notes,
        },
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(AppointmentResponse::from(booking.appointment)),
    ))
}

/// List appointments visible to the caller
///
/// GET /api/appointments
pub async fn list_appointments(
    State(state): State<Arc<AppState>>,
    user: User,
    Query(query): Query<ListAppointmentsQuery>,
) -> Result<Json<Vec<AppointmentResponse>>, ApiError> {
    if let Some(date) = &query.date {
        if let Err(e) = validate_date(date) {
            return Err(ApiError::validation_field("date", e));
        }
    }

    let appointments = match user.role() {
        Role::Patient => Appointment::list_for_patient(&state.db, &user.id).await?,
        Role::Doctor => match &query.date {
            Some(date) => Appointment::list_for_doctor_on(&state.db, &user.id, date).await?,
            None => Appointment::list_for_doctor(&state.db, &user.id).await?,
        },
        Role::Admin => {
            let from = match &query.from {
                Some(from) => {
                    if let Err(e) = validate_date(from) {
                        return Err(ApiError::validation_field("from", e));
                    }
                    from.clone()
                }
                None => today().format("%Y-%m-%d").to_string(),
            };
            Appointment::list_upcoming(&state.db, &from).await?
        }
    };

    let appointments = appointments
        .into_iter()
        .filter(|a| query.date.as_ref().map_or(true, |d| &a.date == d))
        .map(AppointmentResponse::from)
        .collect();

    Ok(Json(appointments))
}

/// GET /api/appointments/:id
pub async fn get_appointment(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
) -> Result<Json<AppointmentResponse>, ApiError> {
    let appointment = get_visible_appointment(&state, &user, &id).await?;
    Ok(Json(AppointmentResponse::from(appointment)))
}

/// Move an appointment through its lifecycle
///
/// PUT /api/appointments/:id/status
pub async fn update_status(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<AppointmentResponse>, ApiError> {
    let new_status = AppointmentStatus::from_str(&req.status)
        .ok_or_else(|| SchedulingError::UnknownStatus(req.status.clone()))?;

    let appointment = get_visible_appointment(&state, &user, &id).await?;

    if user.role() == Role::Patient {
        if new_status != AppointmentStatus::Cancelled {
            return Err(ApiError::forbidden("Patients can only cancel appointments"));
        }
        if appointment.patient_id != user.id {
            return Err(ApiError::forbidden("You do not have access to this appointment"));
        }
    }

    let updated = scheduling::update_appointment_status(&state.db, &id, new_status).await?;

    info!(
        appointment_id = %id,
        user_id = %user.id,
        status = %new_status,
        "Status change requested"
    );

    Ok(Json(AppointmentResponse::from(updated)))
}

/// Record session vitals
///
/// PUT /api/appointments/:id/vitals
pub async fn record_vitals(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
    Json(req): Json<RecordVitalsRequest>,
) -> Result<Json<AppointmentResponse>, ApiError> {
    require_role(&user, &[Role::Doctor, Role::Admin])?;
    get_visible_appointment(&state, &user, &id).await?;

    let updated =
        scheduling::record_vitals(&state.db, &id, &req.vitals, req.notes.as_deref()).await?;
    Ok(Json(AppointmentResponse::from(updated)))
}

/// Leave feedback on a completed session
///
/// PUT /api/appointments/:id/feedback
pub async fn submit_feedback(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
    Json(feedback): Json<Feedback>,
) -> Result<Json<AppointmentResponse>, ApiError> {
    require_role(&user, &[Role::Patient])?;

    let appointment = get_visible_appointment(&state, &user, &id).await?;
    if appointment.patient_id != user.id {
        return Err(ApiError::forbidden("You do not have access to this appointment"));
    }

    let updated = scheduling::submit_feedback(&state.db, &id, &feedback).await?;
    Ok(Json(AppointmentResponse::from(updated)))
}
