use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    async_trait,
    body::Body,
    extract::{FromRequestParts, State},
    http::{request::Parts, HeaderMap, Request, StatusCode},
    middleware::Next,
    response::Response,
    Json,
};
use rand::Rng;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::{debug, info, warn};

use crate::db::{
    now_timestamp, timestamp, ForgotPasswordRequest, LoginRequest, LoginResponse,
    MessageResponse, NewUser, OtpRequest, OtpVerifyRequest, PasswordReset, PhoneOtp,
    ResetPasswordRequest, Role, RoleProfile, Session, SignupRequest, User, UserResponse,
};
use crate::AppState;

use super::error::{ApiError, ValidationErrorBuilder};
use super::metrics::record_login;
use super::validation::{
    validate_email, validate_name, validate_otp_code, validate_password, validate_phone,
};

const INVALID_CREDENTIALS: &str = "Invalid email or password.";
const EMAIL_TAKEN: &str = "This email address is already registered.";
const RESET_EMAIL_SENT: &str = "Password reset email sent.";
const INVALID_CODE: &str = "Invalid or expired code.";

/// Wrong guesses after which a phone code is burned
const MAX_OTP_ATTEMPTS: i64 = 5;

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2.hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a password against a hash. Accounts without a password never match.
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Generate a random token
fn generate_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();
    hex::encode(bytes)
}

/// Six-digit phone sign-in code, zero padded
fn generate_otp_code() -> String {
    let code: u32 = rand::rng().random_range(0..1_000_000);
    format!("{:06}", code)
}

/// Hash a token or code for storage
pub(crate) fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Timestamp `delta` from now
fn expires_in(delta: chrono::Duration) -> Result<String, ApiError> {
    chrono::Utc::now()
        .checked_add_signed(delta)
        .map(timestamp)
        .ok_or_else(|| ApiError::internal("Invalid expiry configuration"))
}

fn hash_password_for_api(password: &str) -> Result<String, ApiError> {
    hash_password(password).map_err(|e| ApiError::internal(format!("Failed to hash password: {}", e)))
}

/// Create a session for a user and return the raw bearer token
pub async fn create_session(
    pool: &sqlx::SqlitePool,
    user_id: &str,
    ttl_days: i64,
) -> Result<String, ApiError> {
    let token = generate_token();
    let token_hash = hash_token(&token);
    let expires_at = expires_in(chrono::Duration::days(ttl_days))?;

    let session_id = uuid::Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO sessions (id, user_id, token_hash, expires_at, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&session_id)
    .bind(user_id)
    .bind(&token_hash)
    .bind(&expires_at)
    .bind(now_timestamp())
    .execute(pool)
    .await?;

    Ok(token)
}

/// Extract the bearer token from request headers
fn extract_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Get the current user from a token
pub async fn get_current_user(pool: &sqlx::SqlitePool, token: &str) -> Result<User, ApiError> {
    let token_hash = hash_token(token);
    let session: Option<Session> =
        sqlx::query_as("SELECT * FROM sessions WHERE token_hash = ? AND expires_at > ?")
            .bind(&token_hash)
            .bind(now_timestamp())
            .fetch_optional(pool)
            .await?;

    let session = session.ok_or_else(|| ApiError::unauthorized("Session expired or invalid"))?;

    User::get_by_id(pool, &session.user_id)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Session expired or invalid"))
}

/// Reject the request unless the user holds one of `roles`
pub fn require_role(user: &User, roles: &[Role]) -> Result<(), ApiError> {
    if roles.contains(&user.role()) {
        Ok(())
    } else {
        Err(ApiError::forbidden(format!(
            "This action is not available to {} accounts",
            user.role()
        )))
    }
}

/// Auth middleware: resolves the session and stores the user on the request
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_token(request.headers())
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    let user = get_current_user(&state.db, &token).await?;
    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

/// Extractor for the current authenticated user
#[async_trait]
impl FromRequestParts<Arc<AppState>> for User {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<User>() {
            return Ok(user.clone());
        }

        let token = extract_token(&parts.headers)
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;
        get_current_user(&state.db, &token).await
    }
}

/// Sign up as a patient or practitioner
///
/// POST /api/auth/signup
pub async fn signup(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SignupRequest>,
) -> Result<(StatusCode, Json<LoginResponse>), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    errors.check("email", validate_email(&request.email));
    errors.check("password", validate_password(&request.password));
    errors.check("name", validate_name(&request.name));
    errors.check("phone", validate_phone(&request.phone));
    errors.finish()?;

    let profile = request
        .profile
        .unwrap_or_else(|| RoleProfile::default_for(Role::Patient));
    if profile.role() == Role::Admin {
        return Err(ApiError::forbidden(
            "Admin accounts cannot be created through signup",
        ));
    }

    let email = request.email.trim().to_lowercase();
    if User::get_by_email(&state.db, &email).await?.is_some() {
        return Err(ApiError::conflict(EMAIL_TAKEN));
    }

    let password_hash = hash_password_for_api(&request.password)?;
    let user = User::create(
        &state.db,
        &NewUser {
            email: &email,
            phone: request.phone.trim(),
            name: request.name.trim(),
            profile: &profile,
            password_hash: &password_hash,
        },
    )
    .await
    .map_err(|e| match &e {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            ApiError::conflict(EMAIL_TAKEN)
        }
        _ => e.into(),
    })?;

    info!(user_id = %user.id, role = %user.role(), "User signed up");

    let token = create_session(&state.db, &user.id, state.config.auth.session_ttl_days).await?;

    Ok((
        StatusCode::CREATED,
        Json(LoginResponse {
            token,
            user: UserResponse::from(user),
        }),
    ))
}

/// Login endpoint
///
/// POST /api/auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let user = User::get_by_email(&state.db, request.email.trim()).await?;

    let user = match user {
        Some(u) if verify_password(&request.password, &u.password_hash) => u,
        _ => {
            record_login("password", false);
            return Err(ApiError::unauthorized(INVALID_CREDENTIALS));
        }
    };

    let token = create_session(&state.db, &user.id, state.config.auth.session_ttl_days).await?;
    record_login("password", true);

    Ok(Json(LoginResponse {
        token,
        user: UserResponse::from(user),
    }))
}

/// End the current session
///
/// POST /api/auth/logout
pub async fn logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let token =
        extract_token(&headers).ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    sqlx::query("DELETE FROM sessions WHERE token_hash = ?")
        .bind(hash_token(&token))
        .execute(&state.db)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/auth/me
pub async fn me(user: User) -> Json<UserResponse> {
    Json(UserResponse::from(user))
}

/// Start a password reset. The reply is the same whether or not the email is
/// registered.
///
/// POST /api/auth/forgot-password
pub async fn forgot_password(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    if validate_email(&request.email).is_err() {
        return Ok(Json(MessageResponse::new(RESET_EMAIL_SENT)));
    }

    let Some(user) = User::get_by_email(&state.db, request.email.trim()).await? else {
        debug!("Password reset requested for unknown email");
        return Ok(Json(MessageResponse::new(RESET_EMAIL_SENT)));
    };

    let ttl_minutes = state.config.auth.reset_token_ttl_minutes;
    let token = generate_token();
    let expires_at = expires_in(chrono::Duration::minutes(ttl_minutes))?;

    sqlx::query(
        "INSERT INTO password_resets (id, user_id, token_hash, expires_at, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(uuid::Uuid::new_v4().to_string())
    .bind(&user.id)
    .bind(hash_token(&token))
    .bind(&expires_at)
    .bind(now_timestamp())
    .execute(&state.db)
    .await?;

    let reset_url = format!(
        "{}/reset-password?token={}",
        state.config.server.public_url.trim_end_matches('/'),
        token
    );

    if let Err(e) = state
        .mailer
        .send_password_reset_email(&user.email, &user.name, &reset_url, ttl_minutes)
        .await
    {
        warn!(user_id = %user.id, "Failed to send password reset email: {}", e);
    }

    info!(user_id = %user.id, "Password reset requested");
    Ok(Json(MessageResponse::new(RESET_EMAIL_SENT)))
}

/// Complete a password reset with a single-use token
///
/// POST /api/auth/reset-password
pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    if let Err(e) = validate_password(&request.new_password) {
        return Err(ApiError::validation_field("new_password", e));
    }

    let now = now_timestamp();
    let reset: Option<PasswordReset> = sqlx::query_as(
        "SELECT * FROM password_resets WHERE token_hash = ? AND used_at IS NULL AND expires_at > ?",
    )
    .bind(hash_token(&request.token))
    .bind(&now)
    .fetch_optional(&state.db)
    .await?;

    let reset = reset.ok_or_else(|| ApiError::bad_request("Invalid or expired reset token"))?;
    let password_hash = hash_password_for_api(&request.new_password)?;

    let mut tx = state.db.begin().await?;

    let claimed = sqlx::query("UPDATE password_resets SET used_at = ? WHERE id = ? AND used_at IS NULL")
        .bind(&now)
        .bind(&reset.id)
        .execute(&mut *tx)
        .await?;
    if claimed.rows_affected() == 0 {
        return Err(ApiError::bad_request("Invalid or expired reset token"));
    }

    sqlx::query("UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?")
        .bind(&password_hash)
        .bind(&now)
        .bind(&reset.user_id)
        .execute(&mut *tx)
        .await?;

    // Existing sign-ins end with the old password
    sqlx::query("DELETE FROM sessions WHERE user_id = ?")
        .bind(&reset.user_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    info!(user_id = %reset.user_id, "Password reset completed");
    Ok(Json(MessageResponse::new("Password has been reset.")))
}

/// Issue a phone sign-in code
///
/// POST /api/auth/otp/request
pub async fn request_otp(
    State(state): State<Arc<AppState>>,
    Json(request): Json<OtpRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let phone = request.phone.trim();
    if phone.is_empty() {
        return Err(ApiError::validation_field("phone", "Phone is required"));
    }
    if let Err(e) = validate_phone(phone) {
        return Err(ApiError::validation_field("phone", e));
    }

    let reply = MessageResponse::new("If the number is registered, a code has been sent.");

    let Some(user) = User::get_by_phone(&state.db, phone).await? else {
        return Ok(Json(reply));
    };

    let code = generate_otp_code();
    let expires_at = expires_in(chrono::Duration::minutes(state.config.auth.otp_ttl_minutes))?;

    sqlx::query(
        "INSERT INTO phone_otps (id, user_id, phone, code_hash, expires_at, created_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(uuid::Uuid::new_v4().to_string())
    .bind(&user.id)
    .bind(phone)
    .bind(hash_token(&code))
    .bind(&expires_at)
    .bind(now_timestamp())
    .execute(&state.db)
    .await?;

    // No SMS gateway: the code is only visible in debug logs
    debug!(user_id = %user.id, code = %code, "Phone sign-in code issued");

    Ok(Json(reply))
}

/// Exchange a phone sign-in code for a session
///
/// POST /api/auth/otp/verify
pub async fn verify_otp(
    State(state): State<Arc<AppState>>,
    Json(request): Json<OtpVerifyRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    if let Err(e) = validate_otp_code(&request.code) {
        return Err(ApiError::validation_field("code", e));
    }

    let phone = request.phone.trim();
    let now = now_timestamp();

    let otp: Option<PhoneOtp> = sqlx::query_as(
        r#"
        SELECT * FROM phone_otps
        WHERE phone = ? AND used_at IS NULL AND expires_at > ? AND failed_attempts < ?
        ORDER BY created_at DESC, rowid DESC
        LIMIT 1
        "#,
    )
    .bind(phone)
    .bind(&now)
    .bind(MAX_OTP_ATTEMPTS)
    .fetch_optional(&state.db)
    .await?;

    let Some(otp) = otp else {
        record_login("otp", false);
        return Err(ApiError::unauthorized(INVALID_CODE));
    };

    let provided = hash_token(&request.code);
    if !bool::from(provided.as_bytes().ct_eq(otp.code_hash.as_bytes())) {
        sqlx::query("UPDATE phone_otps SET failed_attempts = failed_attempts + 1 WHERE id = ?")
            .bind(&otp.id)
            .execute(&state.db)
            .await?;
        if otp.failed_attempts + 1 >= MAX_OTP_ATTEMPTS {
            warn!(user_id = %otp.user_id, "Phone sign-in code locked after failed attempts");
        }
        record_login("otp", false);
        return Err(ApiError::unauthorized(INVALID_CODE));
    }

    let claimed = sqlx::query(
        "UPDATE phone_otps SET used_at = ? WHERE id = ? AND used_at IS NULL AND failed_attempts < ?",
    )
    .bind(&now)
    .bind(&otp.id)
    .bind(MAX_OTP_ATTEMPTS)
    .execute(&state.db)
    .await?;
    if claimed.rows_affected() == 0 {
        record_login("otp", false);
        return Err(ApiError::unauthorized(INVALID_CODE));
    }

    let user = User::get_by_id(&state.db, &otp.user_id)
        .await?
        .ok_or_else(|| ApiError::unauthorized(INVALID_CODE))?;

    let token = create_session(&state.db, &user.id, state.config.auth.session_ttl_days).await?;
    record_login("otp", true);

    Ok(Json(LoginResponse {
        token,
        user: UserResponse::from(user),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::PatientProfile;

    async fn insert_patient(pool: &sqlx::SqlitePool, email: &str) -> User {
        let profile = RoleProfile::Patient(PatientProfile::default());
        User::create(
            pool,
            &NewUser {
                email,
                phone: "+91-9876543210",
                name: "Rahul Sharma",
                profile: &profile,
                password_hash: &hash_password("demo1234").unwrap(),
            },
        )
        .await
        .unwrap()
    }

    #[test]
    fn test_password_hash_roundtrip() {
        let hash = hash_password("demo1234").unwrap();
        assert!(verify_password("demo1234", &hash));
        assert!(!verify_password("demo12345", &hash));
        // Accounts created without a password
        assert!(!verify_password("", ""));
    }

    #[test]
    fn test_token_hash_is_stable_hex() {
        let token = generate_token();
        assert_eq!(token.len(), 64);
        assert_eq!(hash_token(&token), hash_token(&token));
        assert_ne!(hash_token(&token), token);
    }

    #[test]
    fn test_otp_code_format() {
        for _ in 0..50 {
            let code = generate_otp_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_extract_token() {
        let mut headers = HeaderMap::new();
        assert!(extract_token(&headers).is_none());

        headers.insert("Authorization", "Basic abc".parse().unwrap());
        assert!(extract_token(&headers).is_none());

        headers.insert("Authorization", "Bearer abc123".parse().unwrap());
        assert_eq!(extract_token(&headers).as_deref(), Some("abc123"));
    }

    #[tokio::test]
    async fn test_session_lookup() {
        let pool = crate::db::init_in_memory().await.unwrap();
        let user = insert_patient(&pool, "rahul@clinic.test").await;

        let token = create_session(&pool, &user.id, 7).await.unwrap();
        let found = get_current_user(&pool, &token).await.unwrap();
        assert_eq!(found.id, user.id);

        assert!(get_current_user(&pool, "bogus").await.is_err());
    }

    #[tokio::test]
    async fn test_expired_session_is_rejected() {
        let pool = crate::db::init_in_memory().await.unwrap();
        let user = insert_patient(&pool, "rahul@clinic.test").await;

        let token = create_session(&pool, &user.id, -1).await.unwrap();
        let err = get_current_user(&pool, &token).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_require_role() {
        let pool = crate::db::init_in_memory().await.unwrap();
        let user = insert_patient(&pool, "rahul@clinic.test").await;

        assert!(require_role(&user, &[Role::Patient]).is_ok());
        let err = require_role(&user, &[Role::Doctor, Role::Admin]).unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
    }
}
