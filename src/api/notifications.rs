//! Notification feed endpoints. Every call is scoped to the signed-in user.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::db::{NotificationResponse, UnreadCountResponse, User};
use crate::notifications;
use crate::AppState;

use super::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct ListNotificationsQuery {
    pub limit: Option<i64>,
}

/// GET /api/notifications
pub async fn list_notifications(
    State(state): State<Arc<AppState>>,
    user: User,
    Query(query): Query<ListNotificationsQuery>,
) -> Result<Json<Vec<NotificationResponse>>, ApiError> {
    if matches!(query.limit, Some(limit) if limit < 1) {
        return Err(ApiError::validation_field("limit", "limit must be positive"));
    }

    let feed = notifications::list_for_user(&state.db, &user.id, query.limit).await?;
    Ok(Json(feed.into_iter().map(NotificationResponse::from).collect()))
}

/// GET /api/notifications/unread-count
pub async fn unread_count(
    State(state): State<Arc<AppState>>,
    user: User,
) -> Result<Json<UnreadCountResponse>, ApiError> {
    let unread = notifications::unread_count(&state.db, &user.id).await?;
    Ok(Json(UnreadCountResponse { unread }))
}

/// Mark one notification read. Unknown ids succeed without effect.
///
/// PUT /api/notifications/:id/read
pub async fn mark_read(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    notifications::mark_read(&state.db, &user.id, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/notifications/read-all
pub async fn mark_all_read(
    State(state): State<Arc<AppState>>,
    user: User,
) -> Result<StatusCode, ApiError> {
    notifications::mark_all_read(&state.db, &user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}
