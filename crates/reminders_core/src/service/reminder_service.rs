//! Reminder use-case service.
//!
//! # Responsibility
//! - Validate drafts and patches before any store is touched.
//! - Provide the list/create/update/delete/on-change boundary for callers.
//! - Re-fetch the list whenever any backend reports a change.
//!
//! # Invariants
//! - `list` never errors; backend failure degrades to an empty list.
//! - Update/delete of a missing reminder is a no-op, not an error.
//! - Change callbacks receive a fresh list read through the same
//!   remote-then-local policy as `list`.

use crate::config::AppConfig;
use crate::db::DbError;
use crate::grouping::{group_by_day, GroupedReminders};
use crate::model::reminder::{Reminder, ReminderDraft, ReminderPatch, ReminderValidationError};
use crate::notify::ChangeStream;
use crate::store::fallback::FallbackStore;
use crate::store::local::LocalStore;
use crate::store::remote::{PollerHandle, RemoteStore};
use crate::store::{ReminderStore, StoreError};
use chrono::{DateTime, TimeZone};
use log::{debug, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Failure surfaced to callers of mutating operations.
#[derive(Debug)]
pub enum ServiceError {
    Validation(ReminderValidationError),
    /// Every backend failed; carries the last failure.
    Store(StoreError),
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "could not save reminder: {err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Store(err) => Some(err),
        }
    }
}

impl From<ReminderValidationError> for ServiceError {
    fn from(value: ReminderValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<StoreError> for ServiceError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Validation(err) => Self::Validation(err),
            other => Self::Store(other),
        }
    }
}

/// Handle for a change listener started by [`ReminderService::on_change`].
///
/// The listener stops on `unsubscribe` or when the handle is dropped.
pub struct Subscription {
    task: JoinHandle<()>,
}

impl Subscription {
    pub fn unsubscribe(self) {}

    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// CRUD boundary over a (usually fallback) reminder store.
pub struct ReminderService {
    store: Arc<dyn ReminderStore>,
    _poller: Option<PollerHandle>,
}

impl ReminderService {
    pub fn new(store: Arc<dyn ReminderStore>) -> Self {
        Self {
            store,
            _poller: None,
        }
    }

    /// Builds the remote-then-local composition described by `config`.
    ///
    /// Starting the remote poller needs a running Tokio runtime.
    pub fn from_config(config: &AppConfig) -> Result<Self, DbError> {
        let local = LocalStore::open(&config.local.db_path)?;
        let remote = RemoteStore::new(&config.remote);

        let poller = match config.remote.poll_interval_secs {
            Some(secs) if secs > 0 && remote.is_configured() => {
                info!("event=service_init module=service status=ok remote_poll_secs={secs}");
                Some(remote.spawn_poller(Duration::from_secs(secs)))
            }
            _ => None,
        };

        Ok(Self {
            store: Arc::new(FallbackStore::remote_then_local(remote, local)),
            _poller: poller,
        })
    }

    pub fn store(&self) -> &Arc<dyn ReminderStore> {
        &self.store
    }

    /// Lists reminders from the first backend that answers.
    pub async fn list(&self) -> Vec<Reminder> {
        list_or_empty(self.store.as_ref()).await
    }

    pub async fn list_grouped<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> GroupedReminders {
        group_by_day(self.list().await, now)
    }

    /// Validates and persists a new reminder.
    pub async fn create(&self, draft: &ReminderDraft) -> Result<Reminder, ServiceError> {
        let record = draft.validate()?;
        let created = self.store.create(&record).await?;
        debug!("event=reminder_create module=service status=ok id={}", created.id);
        Ok(created)
    }

    /// Editor save: creates when `id` is `None`, otherwise replaces the
    /// editable fields of the existing reminder.
    pub async fn save(
        &self,
        id: Option<&str>,
        draft: &ReminderDraft,
    ) -> Result<Option<Reminder>, ServiceError> {
        match id {
            None => self.create(draft).await.map(Some),
            Some(id) => {
                let record = draft.validate()?;
                self.update(id, &ReminderPatch::from_draft(&record)).await
            }
        }
    }

    /// Applies a partial update. Returns `Ok(None)` when no backend has `id`.
    pub async fn update(
        &self,
        id: &str,
        patch: &ReminderPatch,
    ) -> Result<Option<Reminder>, ServiceError> {
        patch.validate()?;
        match self.store.update(id, patch).await {
            Ok(updated) => Ok(Some(updated)),
            Err(StoreError::NotFound(_)) => {
                debug!("event=reminder_update module=service status=noop id={id}");
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }

    pub async fn set_completed(
        &self,
        id: &str,
        completed: bool,
    ) -> Result<Option<Reminder>, ServiceError> {
        self.update(id, &ReminderPatch::completed(completed)).await
    }

    pub async fn toggle_completed(
        &self,
        reminder: &Reminder,
    ) -> Result<Option<Reminder>, ServiceError> {
        self.set_completed(&reminder.id, !reminder.completed).await
    }

    /// Deletes a reminder. Deleting a missing id succeeds.
    pub async fn delete(&self, id: &str) -> Result<(), ServiceError> {
        match self.store.delete(id).await {
            Ok(()) | Err(StoreError::NotFound(_)) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Raw change feed of every backend.
    pub fn subscribe(&self) -> ChangeStream {
        self.store.subscribe()
    }

    /// Calls `callback` with a re-fetched list after every change from any
    /// backend.
    ///
    /// The feed is attached before this returns, so no later change is
    /// missed. Must be called inside a Tokio runtime.
    pub fn on_change<F>(&self, mut callback: F) -> Subscription
    where
        F: FnMut(Vec<Reminder>) + Send + 'static,
    {
        let mut changes = self.store.subscribe();
        let store = Arc::clone(&self.store);
        let task = tokio::spawn(async move {
            while let Some(event) = changes.next().await {
                debug!(
                    "event=reminder_refetch module=service status=start source={} kind={:?}",
                    event.source, event.kind
                );
                callback(list_or_empty(store.as_ref()).await);
            }
            debug!("event=reminder_refetch module=service status=closed");
        });
        Subscription { task }
    }
}

async fn list_or_empty(store: &dyn ReminderStore) -> Vec<Reminder> {
    match store.list().await {
        Ok(items) => items,
        Err(err) => {
            warn!(
                "event=reminder_list module=service status=degraded error_code={} error={err}",
                err.code()
            );
            Vec::new()
        }
    }
}
