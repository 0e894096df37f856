//! Reminder use-cases. Delivery is the shell's job; the core only stores
//! schedules and answers which ones are due.

use crate::model::notification::{Notification, NotificationInput, NotificationPatch};
use crate::model::RecordId;
use crate::repo::NotificationRepository;
use crate::service::{ServiceError, ServiceResult};
use chrono::NaiveDateTime;

pub struct NotificationService<R: NotificationRepository> {
    repo: R,
}

impl<R: NotificationRepository> NotificationService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn list(&self) -> ServiceResult<Vec<Notification>> {
        Ok(self.repo.list_notifications()?)
    }

    /// New notifications start active.
    pub fn create(&self, input: NotificationInput) -> ServiceResult<Notification> {
        let notification = input.into_notification()?;
        let id = self.repo.create_notification(&notification)?;
        self.reload(id, "created notification not found in read-back")
    }

    pub fn update(&self, id: RecordId, patch: NotificationPatch) -> ServiceResult<Notification> {
        let mut notification = self
            .repo
            .get_notification(id)?
            .ok_or_else(|| ServiceError::not_found("notification", id))?;
        patch.apply_to(&mut notification);
        self.repo.update_notification(&notification)?;
        self.reload(id, "updated notification not found in read-back")
    }

    pub fn delete(&self, id: RecordId) -> ServiceResult<()> {
        Ok(self.repo.delete_notification(id)?)
    }

    /// Flips `is_active` and returns the new state.
    pub fn toggle(&self, id: RecordId) -> ServiceResult<bool> {
        let notification = self
            .repo
            .get_notification(id)?
            .ok_or_else(|| ServiceError::not_found("notification", id))?;
        let is_active = !notification.is_active;
        self.repo.set_active(id, is_active)?;
        Ok(is_active)
    }

    /// Active notifications scheduled for the minute of `now`.
    pub fn due_at(&self, now: NaiveDateTime) -> ServiceResult<Vec<Notification>> {
        Ok(self
            .repo
            .list_notifications()?
            .into_iter()
            .filter(|notification| notification.is_due(now))
            .collect())
    }

    fn reload(&self, id: RecordId, missing: &'static str) -> ServiceResult<Notification> {
        self.repo
            .get_notification(id)?
            .ok_or(ServiceError::InconsistentState(missing))
    }
}
