//! Notification repository contract and SQLite implementation.

use crate::model::notification::{Notification, NotificationKind};
use crate::model::RecordId;
use crate::repo::codec::{bool_col, bool_to_int, enum_col, json_col, time_col, time_to_db, to_json, uuid_col};
use crate::repo::{RepoError, RepoResult};
use rusqlite::{params, Connection, Row};

const NOTIFICATION_SELECT_SQL: &str = "SELECT
    id,
    title,
    message,
    schedule_time,
    schedule_days,
    kind,
    is_active
FROM notifications";

pub trait NotificationRepository {
    /// Ordered by schedule time.
    fn list_notifications(&self) -> RepoResult<Vec<Notification>>;
    fn get_notification(&self, id: RecordId) -> RepoResult<Option<Notification>>;
    fn create_notification(&self, notification: &Notification) -> RepoResult<RecordId>;
    fn update_notification(&self, notification: &Notification) -> RepoResult<()>;
    fn delete_notification(&self, id: RecordId) -> RepoResult<()>;
    fn set_active(&self, id: RecordId, is_active: bool) -> RepoResult<()>;
}

impl<T: NotificationRepository + ?Sized> NotificationRepository for &T {
    fn list_notifications(&self) -> RepoResult<Vec<Notification>> {
        (**self).list_notifications()
    }

    fn get_notification(&self, id: RecordId) -> RepoResult<Option<Notification>> {
        (**self).get_notification(id)
    }

    fn create_notification(&self, notification: &Notification) -> RepoResult<RecordId> {
        (**self).create_notification(notification)
    }

    fn update_notification(&self, notification: &Notification) -> RepoResult<()> {
        (**self).update_notification(notification)
    }

    fn delete_notification(&self, id: RecordId) -> RepoResult<()> {
        (**self).delete_notification(id)
    }

    fn set_active(&self, id: RecordId, is_active: bool) -> RepoResult<()> {
        (**self).set_active(id, is_active)
    }
}

pub struct SqliteNotificationRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteNotificationRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn query(&self, sql: &str, params: impl rusqlite::Params) -> RepoResult<Vec<Notification>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params)?;
        let mut notifications = Vec::new();
        while let Some(row) = rows.next()? {
            notifications.push(parse_notification_row(row)?);
        }
        Ok(notifications)
    }
}

impl NotificationRepository for SqliteNotificationRepository<'_> {
    fn list_notifications(&self) -> RepoResult<Vec<Notification>> {
        self.query(
            &format!("{NOTIFICATION_SELECT_SQL} ORDER BY schedule_time ASC, created_at ASC;"),
            [],
        )
    }

    fn get_notification(&self, id: RecordId) -> RepoResult<Option<Notification>> {
        let mut found = self.query(
            &format!("{NOTIFICATION_SELECT_SQL} WHERE id = ?1;"),
            [id.to_string()],
        )?;
        Ok(found.pop())
    }

    fn create_notification(&self, notification: &Notification) -> RepoResult<RecordId> {
        notification.validate()?;
        self.conn.execute(
            "INSERT INTO notifications (
                id,
                title,
                message,
                schedule_time,
                schedule_days,
                kind,
                is_active
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                notification.id.to_string(),
                notification.title.as_str(),
                notification.message.as_str(),
                time_to_db(notification.schedule_time),
                to_json(&notification.schedule_days)?,
                notification.kind.as_str(),
                bool_to_int(notification.is_active),
            ],
        )?;
        Ok(notification.id)
    }

    fn update_notification(&self, notification: &Notification) -> RepoResult<()> {
        notification.validate()?;
        let changed = self.conn.execute(
            "UPDATE notifications
             SET
                title = ?1,
                message = ?2,
                schedule_time = ?3,
                schedule_days = ?4,
                kind = ?5,
                is_active = ?6
             WHERE id = ?7;",
            params![
                notification.title.as_str(),
                notification.message.as_str(),
                time_to_db(notification.schedule_time),
                to_json(&notification.schedule_days)?,
                notification.kind.as_str(),
                bool_to_int(notification.is_active),
                notification.id.to_string(),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("notification", notification.id));
        }
        Ok(())
    }

    fn delete_notification(&self, id: RecordId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM notifications WHERE id = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::not_found("notification", id));
        }
        Ok(())
    }

    fn set_active(&self, id: RecordId, is_active: bool) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE notifications SET is_active = ?1 WHERE id = ?2;",
            params![bool_to_int(is_active), id.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("notification", id));
        }
        Ok(())
    }
}

fn parse_notification_row(row: &Row<'_>) -> RepoResult<Notification> {
    const TABLE: &str = "notifications";
    Ok(Notification {
        id: uuid_col(row, TABLE, "id")?,
        title: row.get("title")?,
        message: row.get("message")?,
        schedule_time: time_col(row, TABLE, "schedule_time")?,
        schedule_days: json_col(row, TABLE, "schedule_days")?,
        kind: enum_col(row, TABLE, "kind", NotificationKind::parse)?,
        is_active: bool_col(row, TABLE, "is_active")?,
    })
}

#[cfg(test)]
mod tests {
    use super::{NotificationRepository, SqliteNotificationRepository};
    use crate::db::open_db_in_memory;
    use crate::model::calendar::DayOfWeek;
    use crate::model::notification::{NotificationInput, NotificationKind};
    use crate::repo::RepoError;
    use chrono::NaiveTime;
    use uuid::Uuid;

    fn input(title: &str, hour: u32) -> NotificationInput {
        NotificationInput {
            title: title.to_string(),
            message: String::new(),
            schedule_time: NaiveTime::from_hms_opt(hour, 15, 0).unwrap(),
            schedule_days: vec![DayOfWeek::Saturday, DayOfWeek::Sunday],
            kind: NotificationKind::Motivation,
        }
    }

    #[test]
    fn list_is_ordered_by_schedule_time() {
        let conn = open_db_in_memory().unwrap();
        let repo = SqliteNotificationRepository::new(&conn);
        let late = input("Abendrunde", 20).into_notification().unwrap();
        let early = input("Morgenlauf", 6).into_notification().unwrap();
        repo.create_notification(&late).unwrap();
        repo.create_notification(&early).unwrap();

        let listed = repo.list_notifications().unwrap();
        assert_eq!(listed, vec![early, late]);
    }

    #[test]
    fn set_active_and_delete_report_missing_rows() {
        let conn = open_db_in_memory().unwrap();
        let repo = SqliteNotificationRepository::new(&conn);
        let notification = input("Yoga", 9).into_notification().unwrap();
        repo.create_notification(&notification).unwrap();

        repo.set_active(notification.id, false).unwrap();
        let loaded = repo.get_notification(notification.id).unwrap().unwrap();
        assert!(!loaded.is_active);

        let error = repo.set_active(Uuid::new_v4(), true).unwrap_err();
        assert!(matches!(error, RepoError::NotFound { .. }));

        repo.delete_notification(notification.id).unwrap();
        assert!(repo.get_notification(notification.id).unwrap().is_none());
    }
}
