//! Per-role dashboard summaries.

use axum::{extract::State, Json};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

use crate::db::{
    Appointment, AppointmentResponse, AppointmentStatus, DbPool, NotificationResponse, Role, User,
};
use crate::notifications;
use crate::AppState;

use super::appointments::today;
use super::error::ApiError;

const RECENT_NOTIFICATIONS: i64 = 3;

#[derive(Debug, Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Dashboard {
    Patient(PatientDashboard),
    Doctor(DoctorDashboard),
    Admin(AdminDashboard),
}

#[derive(Debug, Serialize)]
pub struct PatientDashboard {
    pub next_appointment: Option<AppointmentResponse>,
    pub confirmed_count: usize,
    pub completed_count: usize,
    pub unread_notifications: i64,
    pub recent_notifications: Vec<NotificationResponse>,
}

#[derive(Debug, Serialize)]
pub struct DoctorDashboard {
    /// Today's schedule, without finished sessions
    pub today: Vec<AppointmentResponse>,
    pub total_patients: usize,
    pub unread_notifications: i64,
    pub recent_notifications: Vec<NotificationResponse>,
}

#[derive(Debug, Serialize)]
pub struct AdminDashboard {
    pub patients: i64,
    pub doctors: i64,
    pub admins: i64,
    pub today_appointments: i64,
    pub upcoming_appointments: i64,
    pub unread_notifications: i64,
}

async fn recent_notifications(
    db: &DbPool,
    user_id: &str,
) -> Result<Vec<NotificationResponse>, ApiError> {
    let recent = notifications::list_for_user(db, user_id, Some(RECENT_NOTIFICATIONS)).await?;
    Ok(recent.into_iter().map(NotificationResponse::from).collect())
}

/// Build the dashboard for `user` as of `today`
pub async fn build_dashboard(
    db: &DbPool,
    user: &User,
    today: NaiveDate,
) -> Result<Dashboard, ApiError> {
    let today = today.format("%Y-%m-%d").to_string();
    let unread = notifications::unread_count(db, &user.id).await?;

    let dashboard = match user.role() {
        Role::Patient => {
            let appointments = Appointment::list_for_patient(db, &user.id).await?;

            let count_with = |status: AppointmentStatus| {
                appointments
                    .iter()
                    .filter(|a| a.status_enum() == status)
                    .count()
            };
            let confirmed_count = count_with(AppointmentStatus::Confirmed);
            let completed_count = count_with(AppointmentStatus::Completed);

            // Already ordered by date, time
            let next_appointment = appointments
                .iter()
                .find(|a| {
                    a.date >= today
                        && matches!(
                            a.status_enum(),
                            AppointmentStatus::Pending | AppointmentStatus::Confirmed
                        )
                })
                .cloned()
                .map(AppointmentResponse::from);

            Dashboard::Patient(PatientDashboard {
                next_appointment,
                confirmed_count,
                completed_count,
                unread_notifications: unread,
                recent_notifications: recent_notifications(db, &user.id).await?,
            })
        }
        Role::Doctor => {
            let appointments = Appointment::list_for_doctor(db, &user.id).await?;

            let total_patients = appointments
                .iter()
                .map(|a| a.patient_id.as_str())
                .collect::<HashSet<_>>()
                .len();

            let todays = appointments
                .iter()
                .filter(|a| a.date == today && a.status_enum() != AppointmentStatus::Completed)
                .cloned()
                .map(AppointmentResponse::from)
                .collect();

            Dashboard::Doctor(DoctorDashboard {
                today: todays,
                total_patients,
                unread_notifications: unread,
                recent_notifications: recent_notifications(db, &user.id).await?,
            })
        }
        Role::Admin => Dashboard::Admin(AdminDashboard {
            patients: User::count_by_role(db, Role::Patient).await?,
            doctors: User::count_by_role(db, Role::Doctor).await?,
            admins: User::count_by_role(db, Role::Admin).await?,
            today_appointments: Appointment::count_on(db, &today).await?,
            upcoming_appointments: Appointment::count_from(db, &today).await?,
            unread_notifications: unread,
        }),
    };

    Ok(dashboard)
}

/// GET /api/dashboard
pub async fn get_dashboard(
    State(state): State<Arc<AppState>>,
    user: User,
) -> Result<Json<Dashboard>, ApiError> {
    Ok(Json(build_dashboard(&state.db, &user, today()).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::seed_demo_accounts;
    use crate::scheduling::{create_appointment, update_appointment_status, NewAppointment};

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    async fn demo(db: &DbPool, email: &str) -> User {
        User::get_by_email(db, email).await.unwrap().unwrap()
    }

    async fn book(db: &DbPool, patient: &User, doctor: &User, day: &str, time: &str) -> Appointment {
        create_appointment(
            db,
            &NewAppointment {
                patient_id: patient.id.clone(),
                doctor_id: doctor.id.clone(),
                therapy_id: "shirodhara".to_string(),
                date: day.to_string(),
                time: time.to_string(),
                status: None,
                notes: None,
            },
        )
        .await
        .unwrap()
        .appointment
    }

    #[tokio::test]
    async fn test_patient_dashboard() {
        let db = crate::db::init_in_memory().await.unwrap();
        seed_demo_accounts(&db, "demo1234").await.unwrap();
        let patient = demo(&db, "patient@demo.com").await;
        let doctor = demo(&db, "doctor@demo.com").await;

        let past = book(&db, &patient, &doctor, "2024-01-10", "09:00").await;
        update_appointment_status(&db, &past.id, AppointmentStatus::Completed)
            .await
            .unwrap();
        book(&db, &patient, &doctor, "2024-01-25", "14:00").await;
        book(&db, &patient, &doctor, "2024-01-22", "10:30").await;

        let dashboard = build_dashboard(&db, &patient, date("2024-01-20"))
            .await
            .unwrap();
        match dashboard {
            Dashboard::Patient(d) => {
                let next = d.next_appointment.unwrap();
                assert_eq!(next.date, "2024-01-22");
                assert_eq!(d.confirmed_count, 2);
                assert_eq!(d.completed_count, 1);
                assert_eq!(d.unread_notifications, 3);
                assert_eq!(d.recent_notifications.len(), 3);
            }
            other => panic!("unexpected dashboard {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_doctor_dashboard_hides_completed() {
        let db = crate::db::init_in_memory().await.unwrap();
        seed_demo_accounts(&db, "demo1234").await.unwrap();
        let patient = demo(&db, "patient@demo.com").await;
        let doctor = demo(&db, "doctor@demo.com").await;

        let done = book(&db, &patient, &doctor, "2024-01-20", "09:00").await;
        update_appointment_status(&db, &done.id, AppointmentStatus::Completed)
            .await
            .unwrap();
        book(&db, &patient, &doctor, "2024-01-20", "11:00").await;
        book(&db, &patient, &doctor, "2024-01-21", "11:00").await;

        match build_dashboard(&db, &doctor, date("2024-01-20")).await.unwrap() {
            Dashboard::Doctor(d) => {
                assert_eq!(d.today.len(), 1);
                assert_eq!(d.today[0].time, "11:00");
                assert_eq!(d.total_patients, 1);
            }
            other => panic!("unexpected dashboard {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_admin_dashboard_counts() {
        let db = crate::db::init_in_memory().await.unwrap();
        seed_demo_accounts(&db, "demo1234").await.unwrap();
        let patient = demo(&db, "patient@demo.com").await;
        let doctor = demo(&db, "doctor@demo.com").await;
        let admin = demo(&db, "admin@demo.com").await;

        book(&db, &patient, &doctor, "2024-01-19", "09:00").await;
        book(&db, &patient, &doctor, "2024-01-20", "09:00").await;
        book(&db, &patient, &doctor, "2024-01-21", "09:00").await;

        match build_dashboard(&db, &admin, date("2024-01-20")).await.unwrap() {
            Dashboard::Admin(d) => {
                assert_eq!((d.patients, d.doctors, d.admins), (1, 1, 1));
                assert_eq!(d.today_appointments, 1);
                assert_eq!(d.upcoming_appointments, 2);
                assert_eq!(d.unread_notifications, 0);
            }
            other => panic!("unexpected dashboard {:?}", other),
        }
    }
}
