//! Database seeders for built-in accounts
//!
//! Runs on startup: the first administrator from config and, when enabled,
//! the three demo accounts used by the clinic's walkthrough.

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use tracing::{info, warn};

use super::models::{
    AdminProfile, Constitution, DoctorProfile, NewUser, PatientProfile, Role, RoleProfile, User,
};
use crate::api::auth::hash_password;
use crate::config::AuthConfig;

/// Create the configured administrator if no admin account exists yet
pub async fn ensure_admin_user(pool: &SqlitePool, auth: &AuthConfig) -> Result<Option<User>> {
    if User::count_by_role(pool, Role::Admin).await? > 0 {
        return Ok(None);
    }

    let (Some(email), Some(password)) = (&auth.admin_email, &auth.admin_password) else {
        warn!("No admin account exists and auth.admin_email/admin_password are not set");
        return Ok(None);
    };

    let email = email.trim().to_lowercase();
    if User::get_by_email(pool, &email).await?.is_some() {
        warn!(email = %email, "Configured admin email belongs to a non-admin account");
        return Ok(None);
    }

    let password_hash =
        hash_password(password).map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?;
    let profile = RoleProfile::Admin(AdminProfile::default());

    let user = User::create(
        pool,
        &NewUser {
            email: &email,
            phone: "",
            name: &auth.admin_name,
            profile: &profile,
            password_hash: &password_hash,
        },
    )
    .await
    .context("Failed to create admin user")?;

    info!(email = %email, "Created initial admin user");
    Ok(Some(user))
}

/// Seed the demo patient, doctor and admin. Existing accounts are left as-is.
pub async fn seed_demo_accounts(pool: &SqlitePool, password: &str) -> Result<usize> {
    info!("Seeding demo accounts...");

    let password_hash =
        hash_password(password).map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?;

    let accounts: Vec<(&str, &str, &str, RoleProfile)> = vec![
        (
            "patient@demo.com",
            "Rahul Sharma",
            "+91-9876543210",
            RoleProfile::Patient(PatientProfile {
                date_of_birth: Some("1990-05-15".to_string()),
                address: Some("123 MG Road, Bangalore, Karnataka".to_string()),
                emergency_contact: Some("+91-9876543211".to_string()),
                medical_history: vec!["Hypertension".to_string(), "Diabetes Type 2".to_string()],
                constitution: Some(Constitution::Vata),
                allergies: vec!["Peanuts".to_string()],
                height: Some(175.0),
                weight: Some(70.0),
                ..Default::default()
            }),
        ),
        (
            "doctor@demo.com",
            "Dr. Priya Patel",
            "+91-9876543220",
            RoleProfile::Doctor(DoctorProfile {
                specialization: vec!["Panchakarma".to_string(), "Abhyanga".to_string()],
                experience: 8,
                qualification: Some("BAMS, MD (Ayurveda)".to_string()),
                registration_number: Some("AYU12345".to_string()),
                consultation_fee: 800,
                languages: vec!["English".to_string(), "Hindi".to_string()],
                bio: Some("Ayurvedic practitioner focused on detoxification therapies.".to_string()),
                verified: true,
            }),
        ),
        (
            "admin@demo.com",
            "Admin User",
            "+91-9876543230",
            RoleProfile::Admin(AdminProfile {
                department: Some("Administration".to_string()),
                permissions: vec!["all".to_string()],
            }),
        ),
    ];

    let mut created = 0;
    for (email, name, phone, profile) in &accounts {
        if User::get_by_email(pool, email).await?.is_some() {
            continue;
        }

        User::create(
            pool,
            &NewUser {
                email: *email,
                phone: *phone,
                name: *name,
                profile,
                password_hash: &password_hash,
            },
        )
        .await
        .with_context(|| format!("Failed to seed demo account {}", email))?;
        created += 1;
    }

    info!("Seeded {} demo accounts", created);
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auth_config(email: Option<&str>, password: Option<&str>) -> AuthConfig {
        AuthConfig {
            admin_email: email.map(String::from),
            admin_password: password.map(String::from),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_seed_demo_accounts_is_idempotent() {
        let pool = crate::db::init_in_memory().await.unwrap();

        assert_eq!(seed_demo_accounts(&pool, "demo1234").await.unwrap(), 3);
        assert_eq!(seed_demo_accounts(&pool, "demo1234").await.unwrap(), 0);

        let doctor = User::get_by_email(&pool, "doctor@demo.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doctor.name, "Dr. Priya Patel");
        assert_eq!(doctor.role(), Role::Doctor);

        let patient = User::get_by_email(&pool, "patient@demo.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(patient.name, "Rahul Sharma");
        assert!(matches!(patient.profile(), RoleProfile::Patient(_)));
    }

    #[tokio::test]
    async fn test_ensure_admin_user_only_once() {
        let pool = crate::db::init_in_memory().await.unwrap();
        let config = auth_config(Some("Owner@Clinic.test"), Some("s3cure-pass"));

        let created = ensure_admin_user(&pool, &config).await.unwrap().unwrap();
        assert_eq!(created.email, "owner@clinic.test");
        assert_eq!(created.role(), Role::Admin);

        assert!(ensure_admin_user(&pool, &config).await.unwrap().is_none());
        assert_eq!(User::count_by_role(&pool, Role::Admin).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_ensure_admin_user_without_credentials() {
        let pool = crate::db::init_in_memory().await.unwrap();
        let config = auth_config(None, None);
        assert!(ensure_admin_user(&pool, &config).await.unwrap().is_none());
        assert_eq!(User::count_by_role(&pool, Role::Admin).await.unwrap(), 0);
    }
}
