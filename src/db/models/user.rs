//! User, profile and sign-in session models.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

/// The three portal roles. Fixed when the account is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Patient,
    Doctor,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Patient => "patient",
            Role::Doctor => "doctor",
            Role::Admin => "admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "patient" => Ok(Self::Patient),
            "doctor" | "practitioner" => Ok(Self::Doctor),
            "admin" => Ok(Self::Admin),
            _ => Err(format!("Unknown role: {}", s)),
        }
    }
}

/// Ayurvedic body constitution (dosha)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Constitution {
    Vata,
    Pitta,
    Kapha,
    Mixed,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatientProfile {
    pub date_of_birth: Option<String>,
    pub address: Option<String>,
    pub emergency_contact: Option<String>,
    pub medical_history: Vec<String>,
    pub current_therapies: Vec<String>,
    pub constitution: Option<Constitution>,
    pub allergies: Vec<String>,
    pub height: Option<f64>,
    pub weight: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DoctorProfile {
    pub specialization: Vec<String>,
    pub experience: u32,
    pub qualification: Option<String>,
    pub registration_number: Option<String>,
    pub consultation_fee: u32,
    pub languages: Vec<String>,
    pub bio: Option<String>,
    pub verified: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminProfile {
    pub department: Option<String>,
    pub permissions: Vec<String>,
}

/// Role-specific profile extension. The variant always matches the user's role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum RoleProfile {
    Patient(PatientProfile),
    Doctor(DoctorProfile),
    Admin(AdminProfile),
}

impl RoleProfile {
    pub fn role(&self) -> Role {
        match self {
            RoleProfile::Patient(_) => Role::Patient,
            RoleProfile::Doctor(_) => Role::Doctor,
            RoleProfile::Admin(_) => Role::Admin,
        }
    }

    pub fn default_for(role: Role) -> Self {
        match role {
            Role::Patient => RoleProfile::Patient(PatientProfile::default()),
            Role::Doctor => RoleProfile::Doctor(DoctorProfile::default()),
            Role::Admin => RoleProfile::Admin(AdminProfile::default()),
        }
    }

    /// Decode a stored profile, falling back to an empty profile for the role
    pub fn from_stored(role: Role, json: &str) -> Self {
        match serde_json::from_str::<RoleProfile>(json) {
            Ok(profile) if profile.role() == role => profile,
            _ => Self::default_for(role),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: String,
    pub email: String,
    pub phone: String,
    pub name: String,
    pub role: String,
    pub profile: String, // JSON serialized RoleProfile
    pub password_hash: String,
    pub created_at: String,
    pub updated_at: String,
}

impl User {
    /// Role of the stored record. The CHECK constraint keeps the column valid.
    pub fn role(&self) -> Role {
        self.role.parse().unwrap_or(Role::Patient)
    }

    pub fn profile(&self) -> RoleProfile {
        RoleProfile::from_stored(self.role(), &self.profile)
    }

    pub async fn get_by_id(db: &SqlitePool, id: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(db)
            .await
    }

    pub async fn get_by_email(db: &SqlitePool, email: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM users WHERE lower(email) = lower(?)")
            .bind(email)
            .fetch_optional(db)
            .await
    }

    pub async fn get_by_phone(db: &SqlitePool, phone: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM users WHERE phone = ? ORDER BY created_at LIMIT 1")
            .bind(phone)
            .fetch_optional(db)
            .await
    }

    /// Insert a new user. The role is taken from the profile variant.
    pub async fn create(
        db: &SqlitePool,
        new_user: &NewUser<'_>,
    ) -> Result<User, sqlx::Error> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = crate::db::now_timestamp();
        let profile_json =
            serde_json::to_string(new_user.profile).map_err(|e| sqlx::Error::Encode(Box::new(e)))?;

        sqlx::query(
            r#"
            INSERT INTO users (id, email, phone, name, role, profile, password_hash, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(new_user.email)
        .bind(new_user.phone)
        .bind(new_user.name)
        .bind(new_user.profile.role().as_str())
        .bind(&profile_json)
        .bind(new_user.password_hash)
        .bind(&now)
        .bind(&now)
        .execute(db)
        .await?;

        Self::get_by_id(db, &id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    /// List users, optionally restricted to a role and a name/email substring
    pub async fn list(
        db: &SqlitePool,
        role: Option<Role>,
        search: Option<&str>,
    ) -> Result<Vec<User>, sqlx::Error> {
        let pattern = search
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s));

        sqlx::query_as(
            r#"
            SELECT * FROM users
            WHERE (?1 IS NULL OR role = ?1)
              AND (?2 IS NULL OR lower(name) LIKE ?2 OR lower(email) LIKE ?2)
            ORDER BY name
            "#,
        )
        .bind(role.map(|r| r.as_str()))
        .bind(pattern)
        .fetch_all(db)
        .await
    }

    pub async fn count_by_role(db: &SqlitePool, role: Role) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role = ?")
            .bind(role.as_str())
            .fetch_one(db)
            .await
    }

    /// Update contact details and profile. The role column is never written.
    pub async fn update_details(
        db: &SqlitePool,
        id: &str,
        name: &str,
        phone: &str,
        profile: &RoleProfile,
    ) -> Result<User, sqlx::Error> {
        let profile_json =
            serde_json::to_string(profile).map_err(|e| sqlx::Error::Encode(Box::new(e)))?;

        sqlx::query("UPDATE users SET name = ?, phone = ?, profile = ?, updated_at = ? WHERE id = ?")
            .bind(name)
            .bind(phone)
            .bind(&profile_json)
            .bind(crate::db::now_timestamp())
            .bind(id)
            .execute(db)
            .await?;

        Self::get_by_id(db, id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    pub async fn set_password_hash(
        db: &SqlitePool,
        id: &str,
        password_hash: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?")
            .bind(password_hash)
            .bind(crate::db::now_timestamp())
            .bind(id)
            .execute(db)
            .await?;
        Ok(())
    }
}

/// Fields needed to insert a user
#[derive(Debug)]
pub struct NewUser<'a> {
    pub email: &'a str,
    pub phone: &'a str,
    pub name: &'a str,
    pub profile: &'a RoleProfile,
    pub password_hash: &'a str,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub phone: String,
    pub name: String,
    pub role: Role,
    pub profile: RoleProfile,
    pub created_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        let role = user.role();
        let profile = user.profile();
        Self {
            id: user.id,
            email: user.email,
            phone: user.phone,
            name: user.name,
            role,
            profile,
            created_at: user.created_at,
        }
    }
}

/// Compact listing entry for doctor/patient pickers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
}

impl From<User> for UserSummary {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            phone: user.phone,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub token_hash: String,
    pub expires_at: String,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserResponse,
}

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub name: String,
    #[serde(default)]
    pub phone: String,
    /// Defaults to an empty patient profile
    pub profile: Option<RoleProfile>,
}

/// Admin-created account. Without a password the user signs in after a reset.
#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub phone: String,
    pub password: Option<String>,
    pub profile: RoleProfile,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub profile: Option<RoleProfile>,
}

#[derive(Debug, Deserialize)]
pub struct ListUsersQuery {
    pub role: Option<Role>,
    pub search: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parsing() {
        assert_eq!("patient".parse::<Role>().unwrap(), Role::Patient);
        assert_eq!("Doctor".parse::<Role>().unwrap(), Role::Doctor);
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert!("receptionist".parse::<Role>().is_err());
    }

    #[test]
    fn test_role_profile_tagging() {
        let json = r#"{"role":"doctor","specialization":["Panchakarma"],"consultation_fee":800}"#;
        let profile: RoleProfile = serde_json::from_str(json).unwrap();
        assert_eq!(profile.role(), Role::Doctor);
        match profile {
            RoleProfile::Doctor(d) => {
                assert_eq!(d.specialization, vec!["Panchakarma".to_string()]);
                assert_eq!(d.consultation_fee, 800);
                assert!(!d.verified);
            }
            other => panic!("unexpected profile {:?}", other),
        }
    }

    #[test]
    fn test_stored_profile_mismatch_falls_back() {
        let stored = r#"{"role":"admin","department":"Front desk"}"#;
        assert_eq!(
            RoleProfile::from_stored(Role::Patient, stored),
            RoleProfile::Patient(PatientProfile::default())
        );
        assert_eq!(
            RoleProfile::from_stored(Role::Patient, "not json"),
            RoleProfile::Patient(PatientProfile::default())
        );
    }

    #[tokio::test]
    async fn test_create_and_filter_users() {
        let db = crate::db::init_in_memory().await.unwrap();

        let patient = RoleProfile::default_for(Role::Patient);
        let doctor = RoleProfile::default_for(Role::Doctor);
        for (email, name, profile) in [
            ("rahul@clinic.test", "Rahul Sharma", &patient),
            ("priya@clinic.test", "Dr. Priya Patel", &doctor),
            ("anita@clinic.test", "Anita Rao", &patient),
        ] {
            User::create(
                &db,
                &NewUser {
                    email,
                    phone: "",
                    name,
                    profile,
                    password_hash: "",
                },
            )
            .await
            .unwrap();
        }

        let patients = User::list(&db, Some(Role::Patient), None).await.unwrap();
        assert_eq!(patients.len(), 2);

        let found = User::list(&db, None, Some("PRIYA")).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].role(), Role::Doctor);

        assert_eq!(User::count_by_role(&db, Role::Doctor).await.unwrap(), 1);
        assert!(User::get_by_email(&db, "Rahul@Clinic.test").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_duplicate_email_is_rejected() {
        let db = crate::db::init_in_memory().await.unwrap();
        let profile = RoleProfile::default_for(Role::Patient);
        let new_user = NewUser {
            email: "rahul@clinic.test",
            phone: "",
            name: "Rahul",
            profile: &profile,
            password_hash: "",
        };

        User::create(&db, &new_user).await.unwrap();
        assert!(User::create(&db, &new_user).await.is_err());
    }
}
