//! Local durable reminder store.
//!
//! # Responsibility
//! - Persist reminders as one named JSON collection in SQLite.
//! - Notify in-process observers after every mutation.
//!
//! # Invariants
//! - Insertion order is preserved; the store imposes no other ordering.
//! - Reads never fail: storage or decode errors degrade to an empty list.
//! - `delete` is idempotent and notifies even when the id was absent.
//! - Every clone of a `LocalStore` shares one connection and one notifier.

use crate::db::{open_db, open_db_in_memory, DbResult};
use crate::model::reminder::{NewReminder, Reminder, ReminderPatch};
use crate::notify::{ChangeKind, ChangeNotifier, ChangeStream, StoreSource};
use crate::store::{ReminderStore, StoreError, StoreResult};
use async_trait::async_trait;
use log::{debug, warn};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

/// Collection name used for reminders in the key-value table.
pub const LOCAL_COLLECTION: &str = "local_reminders";

const LOCAL_ID_PREFIX: &str = "local-";

/// SQLite-backed reminder collection.
#[derive(Clone)]
pub struct LocalStore {
    inner: Arc<LocalInner>,
}

struct LocalInner {
    conn: Mutex<Connection>,
    collection: String,
    notifier: ChangeNotifier,
}

impl LocalStore {
    /// Opens a file-backed store, creating and migrating the database.
    pub fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        Ok(Self::from_connection(open_db(path)?))
    }

    pub fn open_in_memory() -> DbResult<Self> {
        Ok(Self::from_connection(open_db_in_memory()?))
    }

    /// Wraps an already migrated connection.
    pub fn from_connection(conn: Connection) -> Self {
        Self::with_collection(conn, LOCAL_COLLECTION)
    }

    pub fn with_collection(conn: Connection, collection: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(LocalInner {
                conn: Mutex::new(conn),
                collection: collection.into(),
                notifier: ChangeNotifier::new(StoreSource::Local),
            }),
        }
    }

    pub fn collection(&self) -> &str {
        &self.inner.collection
    }

    /// Returns every stored reminder, or an empty list on storage failure.
    pub fn get_all(&self) -> Vec<Reminder> {
        let loaded = self.lock().and_then(|conn| self.read_items(&conn));
        match loaded {
            Ok(items) => items,
            Err(err) => {
                warn!(
                    "event=local_read module=store.local status=degraded collection={} error={err}",
                    self.inner.collection
                );
                Vec::new()
            }
        }
    }

    /// Appends a record under a freshly generated id.
    pub fn insert(&self, record: &NewReminder) -> StoreResult<Reminder> {
        let stored = Reminder::from_new(format!("{LOCAL_ID_PREFIX}{}", Uuid::new_v4()), record);
        stored.validate()?;
        {
            let conn = self.lock()?;
            let mut items = self.read_or_empty(&conn);
            items.push(stored.clone());
            self.write_items(&conn, &items)?;
        }
        debug!(
            "event=local_insert module=store.local status=ok id={}",
            stored.id
        );
        self.inner
            .notifier
            .notify(ChangeKind::Inserted, Some(&stored.id));
        Ok(stored)
    }

    /// Merges `patch` into the record with `id`.
    ///
    /// Returns `Ok(None)` when no such record exists.
    pub fn update(&self, id: &str, patch: &ReminderPatch) -> StoreResult<Option<Reminder>> {
        let updated = {
            let conn = self.lock()?;
            let mut items = self.read_or_empty(&conn);
            let Some(item) = items.iter_mut().find(|item| item.id == id) else {
                return Ok(None);
            };
            let mut candidate = item.clone();
            candidate.apply(patch);
            candidate.validate()?;
            *item = candidate.clone();
            self.write_items(&conn, &items)?;
            candidate
        };
        debug!("event=local_update module=store.local status=ok id={id}");
        self.inner.notifier.notify(ChangeKind::Updated, Some(id));
        Ok(Some(updated))
    }

    /// Removes the record with `id` if present.
    pub fn delete(&self, id: &str) -> StoreResult<()> {
        {
            let conn = self.lock()?;
            let mut items = self.read_or_empty(&conn);
            let before = items.len();
            items.retain(|item| item.id != id);
            self.write_items(&conn, &items)?;
            debug!(
                "event=local_delete module=store.local status=ok id={id} removed={}",
                before - items.len()
            );
        }
        self.inner.notifier.notify(ChangeKind::Deleted, Some(id));
        Ok(())
    }

    pub fn subscribe(&self) -> ChangeStream {
        self.inner.notifier.subscribe()
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.inner
            .conn
            .lock()
            .map_err(|_| StoreError::Storage("local connection lock poisoned".to_string()))
    }

    fn read_items(&self, conn: &Connection) -> StoreResult<Vec<Reminder>> {
        let payload: Option<String> = conn
            .query_row(
                "SELECT payload FROM collections WHERE name = ?1;",
                [self.inner.collection.as_str()],
                |row| row.get(0),
            )
            .optional()?;

        match payload {
            None => Ok(Vec::new()),
            Some(raw) if raw.trim().is_empty() => Ok(Vec::new()),
            Some(raw) => serde_json::from_str(&raw).map_err(|err| {
                StoreError::Storage(format!(
                    "collection `{}` is not a reminder list: {err}",
                    self.inner.collection
                ))
            }),
        }
    }

    fn read_or_empty(&self, conn: &Connection) -> Vec<Reminder> {
        self.read_items(conn).unwrap_or_else(|err| {
            warn!(
                "event=local_read module=store.local status=degraded collection={} error={err}",
                self.inner.collection
            );
            Vec::new()
        })
    }

    fn write_items(&self, conn: &Connection, items: &[Reminder]) -> StoreResult<()> {
        let payload = serde_json::to_string(items)
            .map_err(|err| StoreError::Storage(format!("failed to encode reminders: {err}")))?;

        conn.execute(
            "INSERT INTO collections (name, payload, updated_at)
             VALUES (?1, ?2, strftime('%s', 'now') * 1000)
             ON CONFLICT(name) DO UPDATE SET
                payload = excluded.payload,
                updated_at = excluded.updated_at;",
            params![self.inner.collection.as_str(), payload],
        )
        .map_err(|err| {
            warn!(
                "event=local_write module=store.local status=error collection={} error={err}",
                self.inner.collection
            );
            StoreError::Storage(err.to_string())
        })?;
        Ok(())
    }
}

#[async_trait]
impl ReminderStore for LocalStore {
    fn source(&self) -> StoreSource {
        StoreSource::Local
    }

    async fn list(&self) -> StoreResult<Vec<Reminder>> {
        Ok(self.get_all())
    }

    async fn create(&self, record: &NewReminder) -> StoreResult<Reminder> {
        self.insert(record)
    }

    async fn update(&self, id: &str, patch: &ReminderPatch) -> StoreResult<Reminder> {
        LocalStore::update(self, id, patch)?.ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn delete(&self, id: &str) -> StoreResult<()> {
        LocalStore::delete(self, id)
    }

    fn subscribe(&self) -> ChangeStream {
        LocalStore::subscribe(self)
    }
}
