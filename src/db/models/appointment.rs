//! Appointment models and queries.
//!
//! An appointment is one booked therapy session between a patient and a
//! practitioner in a fixed half-hour slot. Status changes follow the
//! transition table in [`AppointmentStatus::can_transition_to`].

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

/// Lifecycle status of an appointment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
    NoShow,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::NoShow => "no_show",
        }
    }

    /// Parse a stored or requested status. Accepts the older session spellings.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "confirmed" | "scheduled" => Some(Self::Confirmed),
            "in_progress" | "in-progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "cancelled" | "canceled" => Some(Self::Cancelled),
            "no_show" | "no-show" => Some(Self::NoShow),
            _ => None,
        }
    }

    /// Statuses that hold the practitioner's slot
    pub fn occupies_slot(&self) -> bool {
        !matches!(self, Self::Cancelled | Self::NoShow)
    }

    pub fn is_terminal(&self) -> bool {
        self.valid_transitions().is_empty()
    }

    pub fn valid_transitions(&self) -> &'static [AppointmentStatus] {
        match self {
            Self::Pending => &[Self::Confirmed, Self::Cancelled],
            Self::Confirmed => &[
                Self::InProgress,
                Self::Completed,
                Self::Cancelled,
                Self::NoShow,
            ],
            Self::InProgress => &[Self::Completed],
            Self::Completed | Self::Cancelled | Self::NoShow => &[],
        }
    }

    pub fn can_transition_to(&self, next: AppointmentStatus) -> bool {
        self.valid_transitions().contains(&next)
    }
}

impl std::fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Vitals recorded by the practitioner during a session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Vitals {
    pub blood_pressure: Option<String>,
    pub pulse: Option<String>,
    pub temperature: Option<String>,
    pub weight: Option<String>,
}

/// Patient feedback on a completed session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    /// 1..=5, checked when the feedback is submitted
    pub rating: i64,
    #[serde(default)]
    pub comments: String,
    #[serde(default)]
    pub symptoms: Vec<String>,
    #[serde(default)]
    pub side_effects: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Appointment {
    pub id: String,
    pub patient_id: String,
    pub doctor_id: String,
    pub therapy_id: String,
    pub date: String,
    pub time: String,
    pub duration: i64,
    pub cost: i64,
    pub status: String,
    pub notes: Option<String>,
    pub vitals: Option<String>,   // JSON serialized Vitals
    pub feedback: Option<String>, // JSON serialized Feedback
    pub created_at: String,
    pub updated_at: String,
}

impl Appointment {
    pub fn status_enum(&self) -> AppointmentStatus {
        AppointmentStatus::from_str(&self.status).unwrap_or(AppointmentStatus::Pending)
    }

    pub fn get_vitals(&self) -> Option<Vitals> {
        self.vitals.as_deref().and_then(|v| serde_json::from_str(v).ok())
    }

    pub fn get_feedback(&self) -> Option<Feedback> {
        self.feedback.as_deref().and_then(|f| serde_json::from_str(f).ok())
    }

    pub fn involves(&self, user_id: &str) -> bool {
        self.patient_id == user_id || self.doctor_id == user_id
    }

    pub async fn get_by_id(db: &SqlitePool, id: &str) -> Result<Option<Appointment>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM appointments WHERE id = ?")
            .bind(id)
            .fetch_optional(db)
            .await
    }

    /// All appointments for a practitioner on one day, any status
    pub async fn list_for_doctor_on(
        db: &SqlitePool,
        doctor_id: &str,
        date: &str,
    ) -> Result<Vec<Appointment>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM appointments WHERE doctor_id = ? AND date = ? ORDER BY time")
            .bind(doctor_id)
            .bind(date)
            .fetch_all(db)
            .await
    }

    pub async fn list_for_doctor(
        db: &SqlitePool,
        doctor_id: &str,
    ) -> Result<Vec<Appointment>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM appointments WHERE doctor_id = ? ORDER BY date, time")
            .bind(doctor_id)
            .fetch_all(db)
            .await
    }

    pub async fn list_for_patient(
        db: &SqlitePool,
        patient_id: &str,
    ) -> Result<Vec<Appointment>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM appointments WHERE patient_id = ? ORDER BY date, time")
            .bind(patient_id)
            .fetch_all(db)
            .await
    }

    /// Every appointment on or after `from_date`, ordered by date then time
    pub async fn list_upcoming(
        db: &SqlitePool,
        from_date: &str,
    ) -> Result<Vec<Appointment>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM appointments WHERE date >= ? ORDER BY date, time")
            .bind(from_date)
            .fetch_all(db)
            .await
    }

    pub async fn count_on(db: &SqlitePool, date: &str) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM appointments WHERE date = ?")
            .bind(date)
            .fetch_one(db)
            .await
    }

    pub async fn count_from(db: &SqlitePool, from_date: &str) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM appointments WHERE date >= ?")
            .bind(from_date)
            .fetch_one(db)
            .await
    }
}

/// Response format for appointments with decoded sub-objects
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentResponse {
    pub id: String,
    pub patient_id: String,
    pub doctor_id: String,
    pub therapy_id: String,
    pub date: String,
    pub time: String,
    pub duration: i64,
    pub cost: i64,
    pub status: AppointmentStatus,
    pub notes: Option<String>,
    pub vitals: Option<Vitals>,
    pub feedback: Option<Feedback>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Appointment> for AppointmentResponse {
    fn from(appointment: Appointment) -> Self {
        let status = appointment.status_enum();
        let vitals = appointment.get_vitals();
        let feedback = appointment.get_feedback();
        Self {
            id: appointment.id,
            patient_id: appointment.patient_id,
            doctor_id: appointment.doctor_id,
            therapy_id: appointment.therapy_id,
            date: appointment.date,
            time: appointment.time,
            duration: appointment.duration,
            cost: appointment.cost,
            status,
            notes: appointment.notes,
            vitals,
            feedback,
            created_at: appointment.created_at,
            updated_at: appointment.updated_at,
        }
    }
}

/// Request to book an appointment
#[derive(Debug, Deserialize)]
pub struct CreateAppointmentRequest {
    /// Required when front desk books on a patient's behalf
    pub patient_id: Option<String>,
    pub doctor_id: String,
    pub therapy_id: String,
    pub date: String,
    pub time: String,
    pub status: Option<AppointmentStatus>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct RecordVitalsRequest {
    pub vitals: Vitals,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListAppointmentsQuery {
    pub date: Option<String>,
    /// Admin only: list from this date onwards (defaults to today)
    pub from: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SlotsQuery {
    pub date: String,
}

#[derive(Debug, Serialize)]
pub struct SlotsResponse {
    pub doctor_id: String,
    pub date: String,
    pub slots: Vec<String>,
}
