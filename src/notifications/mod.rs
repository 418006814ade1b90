//! In-app notification feed.
//!
//! Messages are appended when bookings happen and read back per user,
//! newest first. The only mutation after insert is flipping the read flag.

pub mod email;

use sqlx::SqliteExecutor;

use crate::db::{now_timestamp, Notification, NotificationKind};
use crate::DbPool;

pub use email::SystemEmailService;

/// Append a notification for a user. Accepts a pool or an open transaction.
pub async fn append<'e, E>(
    executor: E,
    user_id: &str,
    title: &str,
    message: &str,
    kind: NotificationKind,
) -> Result<Notification, sqlx::Error>
where
    E: SqliteExecutor<'e>,
{
    let notification = Notification {
        id: uuid::Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        title: title.to_string(),
        message: message.to_string(),
        kind: kind.to_string(),
        is_read: 0,
        created_at: now_timestamp(),
    };

    sqlx::query(
        r#"
        INSERT INTO notifications (id, user_id, title, message, kind, is_read, created_at)
        VALUES (?, ?, ?, ?, ?, 0, ?)
        "#,
    )
    .bind(&notification.id)
    .bind(&notification.user_id)
    .bind(&notification.title)
    .bind(&notification.message)
    .bind(&notification.kind)
    .bind(&notification.created_at)
    .execute(executor)
    .await?;

    tracing::debug!(
        user_id = %user_id,
        kind = %kind,
        "Notification appended"
    );

    Ok(notification)
}

/// Mark one of the user's notifications as read. Unknown ids are ignored.
pub async fn mark_read(db: &DbPool, user_id: &str, notification_id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE notifications SET is_read = 1 WHERE id = ? AND user_id = ?")
        .bind(notification_id)
        .bind(user_id)
        .execute(db)
        .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn mark_all_read(db: &DbPool, user_id: &str) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("UPDATE notifications SET is_read = 1 WHERE user_id = ? AND is_read = 0")
        .bind(user_id)
        .execute(db)
        .await?;

    Ok(result.rows_affected())
}

/// Newest first. Insertion order breaks ties within the same second.
pub async fn list_for_user(
    db: &DbPool,
    user_id: &str,
    limit: Option<i64>,
) -> Result<Vec<Notification>, sqlx::Error> {
    sqlx::query_as(
        r#"
        SELECT * FROM notifications
        WHERE user_id = ?
        ORDER BY created_at DESC, rowid DESC
        LIMIT ?
        "#,
    )
    .bind(user_id)
    .bind(limit.unwrap_or(-1))
    .fetch_all(db)
    .await
}

pub async fn unread_count(db: &DbPool, user_id: &str) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE user_id = ? AND is_read = 0")
        .bind(user_id)
        .fetch_one(db)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_append_and_list_newest_first() {
        let db = crate::db::init_in_memory().await.unwrap();

        append(&db, "p1", "First", "one", NotificationKind::Booking)
            .await
            .unwrap();
        let second = append(&db, "p1", "Second", "two", NotificationKind::Reminder)
            .await
            .unwrap();
        append(&db, "d1", "Other", "three", NotificationKind::System)
            .await
            .unwrap();

        assert!(!second.is_read());

        let feed = list_for_user(&db, "p1", None).await.unwrap();
        assert_eq!(feed.len(), 2);
        assert_eq!(feed[0].title, "Second");
        assert_eq!(feed[1].title, "First");

        let limited = list_for_user(&db, "p1", Some(1)).await.unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn test_mark_read_flips_flag() {
        let db = crate::db::init_in_memory().await.unwrap();
        let n = append(&db, "p1", "Hello", "msg", NotificationKind::System)
            .await
            .unwrap();

        assert_eq!(unread_count(&db, "p1").await.unwrap(), 1);
        assert!(mark_read(&db, "p1", &n.id).await.unwrap());
        assert_eq!(unread_count(&db, "p1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_mark_read_unknown_id_is_noop() {
        let db = crate::db::init_in_memory().await.unwrap();
        let n = append(&db, "p1", "Hello", "msg", NotificationKind::System)
            .await
            .unwrap();

        assert!(!mark_read(&db, "p1", "does-not-exist").await.unwrap());
        // Another user's notification is left alone
        assert!(!mark_read(&db, "d1", &n.id).await.unwrap());
        assert_eq!(unread_count(&db, "p1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_mark_all_read() {
        let db = crate::db::init_in_memory().await.unwrap();
        for i in 0..3 {
            append(&db, "p1", &format!("n{}", i), "msg", NotificationKind::Reminder)
                .await
                .unwrap();
        }

        assert_eq!(mark_all_read(&db, "p1").await.unwrap(), 3);
        assert_eq!(mark_all_read(&db, "p1").await.unwrap(), 0);
        assert_eq!(unread_count(&db, "p1").await.unwrap(), 0);
    }
}
