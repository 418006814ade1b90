//! In-app notification models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Notification kinds shown in the feed
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Reminder,
    Booking,
    System,
    Feedback,
    Appointment,
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Reminder => write!(f, "reminder"),
            Self::Booking => write!(f, "booking"),
            Self::System => write!(f, "system"),
            Self::Feedback => write!(f, "feedback"),
            Self::Appointment => write!(f, "appointment"),
        }
    }
}

impl std::str::FromStr for NotificationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "reminder" => Ok(Self::Reminder),
            "booking" => Ok(Self::Booking),
            "system" => Ok(Self::System),
            "feedback" => Ok(Self::Feedback),
            "appointment" => Ok(Self::Appointment),
            _ => Err(format!("Unknown notification kind: {}", s)),
        }
    }
}

/// Notification stored in database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub message: String,
    pub kind: String,
    pub is_read: i32,
    pub created_at: String,
}

impl Notification {
    pub fn get_kind(&self) -> NotificationKind {
        self.kind.parse().unwrap_or(NotificationKind::System)
    }

    pub fn is_read(&self) -> bool {
        self.is_read != 0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationResponse {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
    pub is_read: bool,
    pub created_at: String,
}

impl From<Notification> for NotificationResponse {
    fn from(notification: Notification) -> Self {
        let kind = notification.get_kind();
        let is_read = notification.is_read();
        Self {
            id: notification.id,
            user_id: notification.user_id,
            title: notification.title,
            message: notification.message,
            kind,
            is_read,
            created_at: notification.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UnreadCountResponse {
    pub unread: i64,
}
