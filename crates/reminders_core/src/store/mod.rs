//! Reminder store contracts and implementations.
//!
//! # Responsibility
//! - Define the single `ReminderStore` capability every backend implements.
//! - Classify backend failures so the fallback layer can decide what to do.
//!
//! # Invariants
//! - Validation failures are raised before any backend I/O.
//! - Backends signal failures; only the local store degrades reads itself.
//!
//! # See also
//! - `fallback` for the remote-preferred, local-fallback composition.

use crate::db::DbError;
use crate::model::reminder::{
    NewReminder, Reminder, ReminderId, ReminderPatch, ReminderValidationError,
};
use crate::notify::{ChangeStream, StoreSource};
use async_trait::async_trait;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod fallback;
pub mod local;
pub mod remote;

pub type StoreResult<T> = Result<T, StoreError>;

/// Failure taxonomy shared by all stores.
#[derive(Debug)]
pub enum StoreError {
    /// Backend is not configured. Expected; triggers immediate fallback.
    Configuration(String),
    /// Network or service failure.
    Transient(String),
    /// Backend answered with a non-success status that retrying won't fix.
    Rejected { status: u16, message: String },
    /// Input failed validation; no store was touched.
    Validation(ReminderValidationError),
    /// Update/delete target does not exist in this store.
    NotFound(ReminderId),
    /// Local persistence failure.
    Storage(String),
    Db(DbError),
    /// Backend returned data that does not decode into a reminder.
    InvalidData(String),
    /// Backend accepted a write but its answer was unusable. The record may
    /// already exist there, so no other store may take the write.
    Unconfirmed(String),
}

impl StoreError {
    /// Whether the fallback layer should try the next store.
    ///
    /// Every backend failure qualifies except bad input and writes the
    /// backend may already have committed.
    pub fn allows_fallback(&self) -> bool {
        !matches!(self, Self::Validation(_) | Self::Unconfirmed(_))
    }

    /// Whether repeating the same call could succeed later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::Transient(_) => "transient",
            Self::Rejected { .. } => "rejected",
            Self::Validation(_) => "validation",
            Self::NotFound(_) => "not_found",
            Self::Storage(_) => "storage",
            Self::Db(_) => "db",
            Self::InvalidData(_) => "invalid_data",
            Self::Unconfirmed(_) => "unconfirmed",
        }
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Configuration(message) => write!(f, "store not configured: {message}"),
            Self::Transient(message) => write!(f, "store unavailable: {message}"),
            Self::Rejected { status, message } => {
                write!(f, "store rejected request with status {status}: {message}")
            }
            Self::Validation(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "reminder not found: {id}"),
            Self::Storage(message) => write!(f, "local storage failure: {message}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid reminder data: {message}"),
            Self::Unconfirmed(message) => {
                write!(f, "write accepted but not confirmed: {message}")
            }
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ReminderValidationError> for StoreError {
    fn from(value: ReminderValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// CRUD + change feed capability implemented by every reminder backend.
#[async_trait]
pub trait ReminderStore: Send + Sync {
    /// Backend label used for logging and change events.
    fn source(&self) -> StoreSource;

    async fn list(&self) -> StoreResult<Vec<Reminder>>;

    /// Persists a validated record and returns it with a store-assigned id.
    async fn create(&self, record: &NewReminder) -> StoreResult<Reminder>;

    /// Merges `patch` into the record. Missing ids yield `StoreError::NotFound`.
    async fn update(&self, id: &str, patch: &ReminderPatch) -> StoreResult<Reminder>;

    /// Removes the record. Stores may report a missing id as
    /// `StoreError::NotFound` or treat it as already deleted.
    async fn delete(&self, id: &str) -> StoreResult<()>;

    /// Subscribes to mutations performed through this backend.
    fn subscribe(&self) -> ChangeStream;
}
