//! Appointment scheduling.
//!
//! Open slots are the fixed daily template minus the times already present
//! for the practitioner on that day. Booking is a single transaction: the
//! appointment insert is guarded by a partial unique index on
//! (doctor_id, date, time) for occupying statuses, so two concurrent
//! requests for the same slot cannot both succeed.

use chrono::NaiveDate;
use thiserror::Error;
use tracing::{info, warn};

use crate::api::metrics::{record_appointment_booked, record_slot_conflict};
use crate::catalog;
use crate::db::{
    now_timestamp, Appointment, AppointmentStatus, Feedback, Notification, NotificationKind,
    Vitals,
};
use crate::notifications;
use crate::DbPool;

/// Daily candidate slots: a morning and an afternoon block at 30-minute steps
pub const SLOT_TEMPLATE: [&str; 12] = [
    "09:00", "09:30", "10:00", "10:30", "11:00", "11:30", "14:00", "14:30", "15:00", "15:30",
    "16:00", "16:30",
];

#[derive(Debug, Error)]
pub enum SchedulingError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("Invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("'{0}' is not a bookable slot")]
    InvalidSlot(String),

    #[error("Unknown therapy: {0}")]
    UnknownTherapy(String),

    #[error("Unknown status: {0}")]
    UnknownStatus(String),

    #[error("New appointments must be pending or confirmed, not {0}")]
    InvalidInitialStatus(AppointmentStatus),

    #[error("The {time} slot on {date} is already booked")]
    SlotTaken { date: String, time: String },

    #[error("Appointment not found")]
    NotFound,

    #[error("Cannot change appointment status from {from} to {to}")]
    InvalidTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("Appointment was modified by another request")]
    ConcurrentUpdate,

    #[error("Vitals cannot be recorded for a {0} appointment")]
    VitalsNotAllowed(AppointmentStatus),

    #[error("Feedback can only be given for completed appointments")]
    FeedbackNotAllowed,

    #[error("Rating must be between 1 and 5")]
    InvalidRating,

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Parse a zero-padded `YYYY-MM-DD` calendar date.
///
/// Dates are stored and compared as text, so only the canonical form is
/// accepted: `2024-1-5` is rejected even though it names a real day.
pub fn parse_date(date: &str) -> Result<NaiveDate, SchedulingError> {
    let parsed = NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|_| SchedulingError::InvalidDate(date.to_string()))?;
    if parsed.format("%Y-%m-%d").to_string() != date {
        return Err(SchedulingError::InvalidDate(date.to_string()));
    }
    Ok(parsed)
}

pub fn is_template_slot(time: &str) -> bool {
    SLOT_TEMPLATE.contains(&time)
}

/// Template slots not present in `booked`, in template order
pub fn open_slots<'a, I>(booked: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let booked: Vec<&str> = booked.into_iter().collect();
    SLOT_TEMPLATE
        .iter()
        .filter(|slot| !booked.contains(slot))
        .map(|slot| slot.to_string())
        .collect()
}

/// Open slots for a practitioner on a date. Every existing record removes its
/// time from the template regardless of status.
pub async fn list_open_slots(
    db: &DbPool,
    doctor_id: &str,
    date: &str,
) -> Result<Vec<String>, SchedulingError> {
    if doctor_id.trim().is_empty() {
        return Err(SchedulingError::MissingField("doctor_id"));
    }
    parse_date(date)?;

    let existing = Appointment::list_for_doctor_on(db, doctor_id, date).await?;
    Ok(open_slots(existing.iter().map(|a| a.time.as_str())))
}

/// Input for [`create_appointment`]
#[derive(Debug, Clone)]
pub struct NewAppointment {
    pub patient_id: String,
    pub doctor_id: String,
    pub therapy_id: String,
    pub date: String,
    pub time: String,
    pub status: Option<AppointmentStatus>,
    pub notes: Option<String>,
}

/// A stored appointment with the two notifications written alongside it
#[derive(Debug, Clone)]
pub struct Booking {
    pub appointment: Appointment,
    pub patient_notification: Notification,
    pub doctor_notification: Notification,
}

fn validate_new_appointment(
    new: &NewAppointment,
) -> Result<(&'static catalog::Therapy, AppointmentStatus), SchedulingError> {
    for (field, value) in [
        ("patient_id", &new.patient_id),
        ("doctor_id", &new.doctor_id),
        ("therapy_id", &new.therapy_id),
    ] {
        if value.trim().is_empty() {
            return Err(SchedulingError::MissingField(field));
        }
    }

    parse_date(&new.date)?;

    if !is_template_slot(&new.time) {
        return Err(SchedulingError::InvalidSlot(new.time.clone()));
    }

    let therapy = catalog::get(&new.therapy_id)
        .ok_or_else(|| SchedulingError::UnknownTherapy(new.therapy_id.clone()))?;

    let status = new.status.unwrap_or(AppointmentStatus::Confirmed);
    if !matches!(
        status,
        AppointmentStatus::Pending | AppointmentStatus::Confirmed
    ) {
        return Err(SchedulingError::InvalidInitialStatus(status));
    }

    Ok((therapy, status))
}

/// Book an appointment and notify both parties.
///
/// Inserts exactly one appointment and two notifications, or nothing.
pub async fn create_appointment(
    db: &DbPool,
    new: &NewAppointment,
) -> Result<Booking, SchedulingError> {
    let (therapy, status) = validate_new_appointment(new)?;

    let id = uuid::Uuid::new_v4().to_string();
    let now = now_timestamp();

    let mut tx = db.begin().await?;

    let inserted = sqlx::query(
        r#"
        INSERT INTO appointments (id, patient_id, doctor_id, therapy_id, date, time, duration, cost, status, notes, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&new.patient_id)
    .bind(&new.doctor_id)
    .bind(therapy.id)
    .bind(&new.date)
    .bind(&new.time)
    .bind(therapy.duration as i64)
    .bind(therapy.cost as i64)
    .bind(status.as_str())
    .bind(&new.notes)
    .bind(&now)
    .bind(&now)
    .execute(&mut *tx)
    .await;

    if let Err(e) = inserted {
        if let sqlx::Error::Database(db_err) = &e {
            if db_err.is_unique_violation() {
                warn!(
                    doctor_id = %new.doctor_id,
                    date = %new.date,
                    time = %new.time,
                    "Slot already booked"
                );
                record_slot_conflict();
                return Err(SchedulingError::SlotTaken {
                    date: new.date.clone(),
                    time: new.time.clone(),
                });
            }
        }
        return Err(e.into());
    }

    let patient_notification = notifications::append(
        &mut *tx,
        &new.patient_id,
        "Appointment Booked",
        &format!(
            "Your appointment has been scheduled for {} at {}",
            new.date, new.time
        ),
        NotificationKind::Appointment,
    )
    .await?;

    let doctor_notification = notifications::append(
        &mut *tx,
        &new.doctor_id,
        "New Appointment",
        &format!("New appointment scheduled for {} at {}", new.date, new.time),
        NotificationKind::Appointment,
    )
    .await?;

    let appointment: Appointment = sqlx::query_as("SELECT * FROM appointments WHERE id = ?")
        .bind(&id)
        .fetch_one(&mut *tx)
        .await?;

    tx.commit().await?;

    record_appointment_booked(therapy.id);
    info!(
        appointment_id = %appointment.id,
        doctor_id = %appointment.doctor_id,
        date = %appointment.date,
        time = %appointment.time,
        therapy = %therapy.id,
        "Appointment booked"
    );

    Ok(Booking {
        appointment,
        patient_notification,
        doctor_notification,
    })
}

async fn fetch_existing(db: &DbPool, appointment_id: &str) -> Result<Appointment, SchedulingError> {
    Appointment::get_by_id(db, appointment_id)
        .await?
        .ok_or(SchedulingError::NotFound)
}

/// Move an appointment to a new status along the transition table.
/// Writing the current status again is accepted and changes nothing.
pub async fn update_appointment_status(
    db: &DbPool,
    appointment_id: &str,
    new_status: AppointmentStatus,
) -> Result<Appointment, SchedulingError> {
    let existing = fetch_existing(db, appointment_id).await?;
    let current = existing.status_enum();

    if current == new_status {
        return Ok(existing);
    }

    if !current.can_transition_to(new_status) {
        warn!(
            appointment_id = %appointment_id,
            from = %current,
            to = %new_status,
            "Invalid status transition attempted"
        );
        return Err(SchedulingError::InvalidTransition {
            from: current,
            to: new_status,
        });
    }

    // Conditional on the status we validated against
    let result = sqlx::query(
        "UPDATE appointments SET status = ?, updated_at = ? WHERE id = ? AND status = ?",
    )
    .bind(new_status.as_str())
    .bind(now_timestamp())
    .bind(appointment_id)
    .bind(&existing.status)
    .execute(db)
    .await?;

    if result.rows_affected() == 0 {
        return Err(SchedulingError::ConcurrentUpdate);
    }

    info!(
        appointment_id = %appointment_id,
        from = %current,
        to = %new_status,
        "Appointment status updated"
    );

    fetch_existing(db, appointment_id).await
}

/// Store session vitals and optional practitioner notes
pub async fn record_vitals(
    db: &DbPool,
    appointment_id: &str,
    vitals: &Vitals,
    notes: Option<&str>,
) -> Result<Appointment, SchedulingError> {
    let existing = fetch_existing(db, appointment_id).await?;
    let status = existing.status_enum();
    if !matches!(
        status,
        AppointmentStatus::Confirmed | AppointmentStatus::InProgress | AppointmentStatus::Completed
    ) {
        return Err(SchedulingError::VitalsNotAllowed(status));
    }

    let vitals_json =
        serde_json::to_string(vitals).map_err(|e| sqlx::Error::Encode(Box::new(e)))?;

    sqlx::query(
        "UPDATE appointments SET vitals = ?, notes = COALESCE(?, notes), updated_at = ? WHERE id = ?",
    )
    .bind(&vitals_json)
    .bind(notes)
    .bind(now_timestamp())
    .bind(appointment_id)
    .execute(db)
    .await?;

    fetch_existing(db, appointment_id).await
}

/// Store the patient's feedback on a completed session
pub async fn submit_feedback(
    db: &DbPool,
    appointment_id: &str,
    feedback: &Feedback,
) -> Result<Appointment, SchedulingError> {
    if !(1..=5).contains(&feedback.rating) {
        return Err(SchedulingError::InvalidRating);
    }

    let existing = fetch_existing(db, appointment_id).await?;
    if existing.status_enum() != AppointmentStatus::Completed {
        return Err(SchedulingError::FeedbackNotAllowed);
    }

    let feedback_json =
        serde_json::to_string(feedback).map_err(|e| sqlx::Error::Encode(Box::new(e)))?;

    let mut tx = db.begin().await?;

    sqlx::query("UPDATE appointments SET feedback = ?, updated_at = ? WHERE id = ?")
        .bind(&feedback_json)
        .bind(now_timestamp())
        .bind(appointment_id)
        .execute(&mut *tx)
        .await?;

    notifications::append(
        &mut *tx,
        &existing.doctor_id,
        "Session Feedback",
        &format!(
            "A patient rated their {} session {}/5",
            existing.date, feedback.rating
        ),
        NotificationKind::Feedback,
    )
    .await?;

    tx.commit().await?;

    fetch_existing(db, appointment_id).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn booking(patient: &str, doctor: &str, date: &str, time: &str) -> NewAppointment {
        NewAppointment {
            patient_id: patient.to_string(),
            doctor_id: doctor.to_string(),
            therapy_id: "abhyanga".to_string(),
            date: date.to_string(),
            time: time.to_string(),
            status: None,
            notes: None,
        }
    }

    async fn count(db: &DbPool, table: &str) -> i64 {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(db)
            .await
            .unwrap()
    }

    #[test]
    fn test_template_shape() {
        assert_eq!(SLOT_TEMPLATE.len(), 12);
        assert_eq!(SLOT_TEMPLATE[0], "09:00");
        assert_eq!(SLOT_TEMPLATE[5], "11:30");
        assert_eq!(SLOT_TEMPLATE[6], "14:00");
        assert_eq!(SLOT_TEMPLATE[11], "16:30");
    }

    #[test]
    fn test_open_slots_preserves_template_order() {
        let open = open_slots(["14:30", "09:00", "12:00"]);
        assert_eq!(open.len(), 10);
        assert_eq!(open[0], "09:30");
        assert!(!open.contains(&"14:30".to_string()));
        let mut sorted = open.clone();
        sorted.sort();
        assert_eq!(open, sorted);
    }

    #[test]
    fn test_parse_date() {
        assert!(parse_date("2024-01-20").is_ok());
        assert!(parse_date("2024-02-30").is_err());
        assert!(parse_date("20-01-2024").is_err());
        assert!(parse_date("").is_err());

        // Unpadded and padded forms name the same day but differ as stored text
        assert!(parse_date("2024-1-5").is_err());
        assert!(parse_date("2024-01-5").is_err());
        assert!(parse_date(" 2024-01-05").is_err());
        assert_eq!(
            parse_date("2024-01-05").unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 5).unwrap()
        );
    }

    #[test]
    fn test_validation_rejects_bad_input() {
        let mut new = booking("p1", "d1", "2024-01-20", "09:00");
        new.doctor_id = " ".to_string();
        assert!(matches!(
            validate_new_appointment(&new),
            Err(SchedulingError::MissingField("doctor_id"))
        ));

        let new = booking("p1", "d1", "2024-01-20", "12:00");
        assert!(matches!(
            validate_new_appointment(&new),
            Err(SchedulingError::InvalidSlot(_))
        ));

        let mut new = booking("p1", "d1", "2024-01-20", "09:00");
        new.therapy_id = "reiki".to_string();
        assert!(matches!(
            validate_new_appointment(&new),
            Err(SchedulingError::UnknownTherapy(_))
        ));

        let mut new = booking("p1", "d1", "2024-01-20", "09:00");
        new.status = Some(AppointmentStatus::Completed);
        assert!(matches!(
            validate_new_appointment(&new),
            Err(SchedulingError::InvalidInitialStatus(AppointmentStatus::Completed))
        ));
    }

    #[tokio::test]
    async fn test_booking_abhyanga_end_to_end() {
        let db = crate::db::init_in_memory().await.unwrap();

        let booked = create_appointment(&db, &booking("p1", "d1", "2024-01-20", "09:00"))
            .await
            .unwrap();

        let a = &booked.appointment;
        assert_eq!(a.patient_id, "p1");
        assert_eq!(a.doctor_id, "d1");
        assert_eq!(a.therapy_id, "abhyanga");
        assert_eq!(a.date, "2024-01-20");
        assert_eq!(a.time, "09:00");
        assert_eq!(a.duration, 60);
        assert_eq!(a.cost, 2500);
        assert_eq!(a.status_enum(), AppointmentStatus::Confirmed);

        assert_eq!(booked.patient_notification.user_id, "p1");
        assert_eq!(booked.patient_notification.title, "Appointment Booked");
        assert_eq!(
            booked.patient_notification.message,
            "Your appointment has been scheduled for 2024-01-20 at 09:00"
        );
        assert_eq!(booked.doctor_notification.user_id, "d1");
        assert_eq!(booked.doctor_notification.title, "New Appointment");

        assert_eq!(count(&db, "appointments").await, 1);
        assert_eq!(count(&db, "notifications").await, 2);

        let open = list_open_slots(&db, "d1", "2024-01-20").await.unwrap();
        assert_eq!(open.len(), 11);
        assert!(!open.contains(&"09:00".to_string()));
        let expected: Vec<String> = SLOT_TEMPLATE[1..].iter().map(|s| s.to_string()).collect();
        assert_eq!(open, expected);

        // Other practitioners and other days are unaffected
        assert_eq!(list_open_slots(&db, "d2", "2024-01-20").await.unwrap().len(), 12);
        assert_eq!(list_open_slots(&db, "d1", "2024-01-21").await.unwrap().len(), 12);
    }

    #[tokio::test]
    async fn test_list_open_slots_validates_input() {
        let db = crate::db::init_in_memory().await.unwrap();
        assert!(matches!(
            list_open_slots(&db, "", "2024-01-20").await,
            Err(SchedulingError::MissingField(_))
        ));
        assert!(matches!(
            list_open_slots(&db, "d1", "tomorrow").await,
            Err(SchedulingError::InvalidDate(_))
        ));
    }

    #[tokio::test]
    async fn test_cancelled_slot_still_hidden_from_listing() {
        let db = crate::db::init_in_memory().await.unwrap();
        let booked = create_appointment(&db, &booking("p1", "d1", "2024-01-20", "10:00"))
            .await
            .unwrap();
        update_appointment_status(&db, &booked.appointment.id, AppointmentStatus::Cancelled)
            .await
            .unwrap();

        let open = list_open_slots(&db, "d1", "2024-01-20").await.unwrap();
        assert!(!open.contains(&"10:00".to_string()));
    }

    #[tokio::test]
    async fn test_double_booking_is_rejected() {
        let db = crate::db::init_in_memory().await.unwrap();

        create_appointment(&db, &booking("p1", "d1", "2024-01-20", "09:00"))
            .await
            .unwrap();
        let second = create_appointment(&db, &booking("p2", "d1", "2024-01-20", "09:00")).await;

        assert!(matches!(second, Err(SchedulingError::SlotTaken { .. })));
        assert_eq!(count(&db, "appointments").await, 1);
        assert_eq!(count(&db, "notifications").await, 2);
    }

    #[tokio::test]
    async fn test_unpadded_date_cannot_double_book_a_slot() {
        let db = crate::db::init_in_memory().await.unwrap();

        create_appointment(&db, &booking("p1", "d1", "2024-01-05", "09:00"))
            .await
            .unwrap();
        let second = create_appointment(&db, &booking("p2", "d1", "2024-1-5", "09:00")).await;

        assert!(matches!(second, Err(SchedulingError::InvalidDate(_))));
        assert_eq!(count(&db, "appointments").await, 1);
        assert!(matches!(
            list_open_slots(&db, "d1", "2024-1-5").await,
            Err(SchedulingError::InvalidDate(_))
        ));
        assert_eq!(list_open_slots(&db, "d1", "2024-01-05").await.unwrap().len(), 11);
    }

    #[tokio::test]
    async fn test_interleaved_bookings_for_same_slot_one_wins() {
        let db = crate::db::init_in_memory().await.unwrap();

        let first = booking("p1", "d1", "2024-01-20", "15:00");
        let second = booking("p2", "d1", "2024-01-20", "15:00");
        let (a, b) = tokio::join!(
            create_appointment(&db, &first),
            create_appointment(&db, &second)
        );

        let successes = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
        assert_eq!(successes, 1);
        assert_eq!(count(&db, "appointments").await, 1);
        assert_eq!(count(&db, "notifications").await, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_parallel_bookings_on_file_database_one_wins() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db = crate::db::init(temp_dir.path()).await.unwrap();

        let handles: Vec<_> = (0..20)
            .map(|i| {
                let db = db.clone();
                tokio::spawn(async move {
                    let new = booking(&format!("p{}", i), "d1", "2024-01-20", "15:00");
                    create_appointment(&db, &new).await
                })
            })
            .collect();

        let mut booked = 0;
        let mut taken = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => booked += 1,
                Err(SchedulingError::SlotTaken { .. }) => taken += 1,
                Err(e) => panic!("unexpected booking error: {}", e),
            }
        }

        assert_eq!(booked, 1);
        assert_eq!(taken, 19);
        assert_eq!(count(&db, "appointments").await, 1);
        assert_eq!(count(&db, "notifications").await, 2);

        db.close().await;
    }

    #[tokio::test]
    async fn test_cancelled_slot_can_be_rebooked() {
        let db = crate::db::init_in_memory().await.unwrap();
        let booked = create_appointment(&db, &booking("p1", "d1", "2024-01-20", "11:00"))
            .await
            .unwrap();
        update_appointment_status(&db, &booked.appointment.id, AppointmentStatus::Cancelled)
            .await
            .unwrap();

        assert!(create_appointment(&db, &booking("p2", "d1", "2024-01-20", "11:00"))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_status_transitions_are_validated() {
        let db = crate::db::init_in_memory().await.unwrap();
        let mut new = booking("p1", "d1", "2024-01-20", "09:30");
        new.status = Some(AppointmentStatus::Pending);
        let id = create_appointment(&db, &new).await.unwrap().appointment.id;

        let confirmed = update_appointment_status(&db, &id, AppointmentStatus::Confirmed)
            .await
            .unwrap();
        assert_eq!(confirmed.status_enum(), AppointmentStatus::Confirmed);

        let completed = update_appointment_status(&db, &id, AppointmentStatus::Completed)
            .await
            .unwrap();
        assert_eq!(completed.status_enum(), AppointmentStatus::Completed);

        // completed -> pending is not an edge
        let back = update_appointment_status(&db, &id, AppointmentStatus::Pending).await;
        assert!(matches!(
            back,
            Err(SchedulingError::InvalidTransition {
                from: AppointmentStatus::Completed,
                to: AppointmentStatus::Pending
            })
        ));

        // Same-status write is accepted
        assert!(update_appointment_status(&db, &id, AppointmentStatus::Completed)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_update_unknown_appointment() {
        let db = crate::db::init_in_memory().await.unwrap();
        let result =
            update_appointment_status(&db, "missing", AppointmentStatus::Confirmed).await;
        assert!(matches!(result, Err(SchedulingError::NotFound)));
    }

    #[tokio::test]
    async fn test_vitals_and_feedback() {
        let db = crate::db::init_in_memory().await.unwrap();
        let id = create_appointment(&db, &booking("p1", "d1", "2024-01-20", "16:00"))
            .await
            .unwrap()
            .appointment
            .id;

        let feedback = Feedback {
            rating: 4,
            comments: "Very calming".to_string(),
            symptoms: vec![],
            side_effects: vec![],
        };
        assert!(matches!(
            submit_feedback(&db, &id, &feedback).await,
            Err(SchedulingError::FeedbackNotAllowed)
        ));

        let vitals = Vitals {
            pulse: Some("72".to_string()),
            blood_pressure: Some("120/80".to_string()),
            ..Default::default()
        };
        let updated = record_vitals(&db, &id, &vitals, Some("Tolerated well"))
            .await
            .unwrap();
        assert_eq!(updated.get_vitals(), Some(vitals));
        assert_eq!(updated.notes.as_deref(), Some("Tolerated well"));

        update_appointment_status(&db, &id, AppointmentStatus::Completed)
            .await
            .unwrap();

        let bad = Feedback {
            rating: 9,
            ..feedback.clone()
        };
        assert!(matches!(
            submit_feedback(&db, &id, &bad).await,
            Err(SchedulingError::InvalidRating)
        ));

        let done = submit_feedback(&db, &id, &feedback).await.unwrap();
        assert_eq!(done.get_feedback().unwrap().rating, 4);
    }
}
