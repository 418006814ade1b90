//! Account administration and self-service profile updates.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use tracing::info;

use crate::db::{
    CreateUserRequest, ListUsersQuery, NewUser, Role, UpdateProfileRequest, User, UserResponse,
};
use crate::AppState;

use super::auth::{hash_password, require_role};
use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{validate_email, validate_name, validate_password, validate_phone};

/// List accounts, filtered by role and name/email substring
///
/// GET /api/users
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    user: User,
    Query(query): Query<ListUsersQuery>,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    require_role(&user, &[Role::Admin])?;

    let users = User::list(&state.db, query.role, query.search.as_deref()).await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

/// Create an account of any role. Without a password the account can only
/// be used after a password reset.
///
/// POST /api/users
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    user: User,
    Json(req): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    require_role(&user, &[Role::Admin])?;

    let mut errors = ValidationErrorBuilder::new();
    errors.check("email", validate_email(&req.email));
    errors.check("name", validate_name(&req.name));
    errors.check("phone", validate_phone(&req.phone));
    if let Some(password) = &req.password {
        errors.check("password", validate_password(password));
    }
    errors.finish()?;

    let email = req.email.trim().to_lowercase();
    if User::get_by_email(&state.db, &email).await?.is_some() {
        return Err(ApiError::conflict("This email address is already registered."));
    }

    let password_hash = match &req.password {
        Some(password) => hash_password(password)
            .map_err(|e| ApiError::internal(format!("Failed to hash password: {}", e)))?,
        None => String::new(),
    };

    let created = User::create(
        &state.db,
        &NewUser {
            email: &email,
            phone: req.phone.trim(),
            name: req.name.trim(),
            profile: &req.profile,
            password_hash: &password_hash,
        },
    )
    .await?;

    info!(
        user_id = %created.id,
        role = %created.role(),
        created_by = %user.id,
        "User created by admin"
    );

    Ok((StatusCode::CREATED, Json(UserResponse::from(created))))
}

/// GET /api/users/:id
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
) -> Result<Json<UserResponse>, ApiError> {
    if user.id != id && user.role() != Role::Admin {
        return Err(ApiError::forbidden("You can only view your own account"));
    }

    let found = User::get_by_id(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(UserResponse::from(found)))
}

/// Update the caller's name, phone and role profile
///
/// PUT /api/profile
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    user: User,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    if let Some(name) = &req.name {
        errors.check("name", validate_name(name));
    }
    if let Some(phone) = &req.phone {
        errors.check("phone", validate_phone(phone));
    }
    if let Some(profile) = &req.profile {
        if profile.role() != user.role() {
            errors.add(
                "profile",
                format!("Profile must be a {} profile", user.role()),
            );
        }
    }
    errors.finish()?;

    let name = req.name.as_deref().map(str::trim).unwrap_or(user.name.as_str());
    let phone = req.phone.as_deref().map(str::trim).unwrap_or(user.phone.as_str());
    let profile = req.profile.unwrap_or_else(|| user.profile());

    let updated = User::update_details(&state.db, &user.id, name, phone, &profile).await?;
    Ok(Json(UserResponse::from(updated)))
}
