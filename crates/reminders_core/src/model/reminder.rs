//! Reminder domain model.
//!
//! # Responsibility
//! - Define the canonical record persisted by every store.
//! - Provide draft/patch input types and their validation.
//!
//! # Invariants
//! - `id` is assigned by the store that created the record and never changes.
//! - `title` is non-blank and `due_at` is present for every valid record.
//! - `owner` and `created_at` are remote-only pass-through fields.

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Store-assigned reminder identifier.
///
/// Local ids are generated UUIDs; remote ids are whatever the table returns
/// (numbers are normalized to their decimal string form).
pub type ReminderId = String;

const EDITOR_MINUTE_FORMAT: &str = "%Y-%m-%dT%H:%M";
const EDITOR_SECOND_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Validation failures raised before any store write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReminderValidationError {
    MissingTitle,
    MissingDueAt,
    InvalidDueAt(String),
}

impl Display for ReminderValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingTitle => write!(f, "title is required"),
            Self::MissingDueAt => write!(f, "due date is required"),
            Self::InvalidDueAt(value) => write!(f, "invalid due date `{value}`"),
        }
    }
}

impl Error for ReminderValidationError {}

/// Canonical reminder record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reminder {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: ReminderId,
    pub title: String,
    pub due_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub completed: bool,
    /// Remote-only. Accepts the table's `user_id` column name as well.
    #[serde(default, alias = "user_id", skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    /// Remote-only creation timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Reminder {
    /// Builds a stored record from a validated payload and a store-assigned id.
    pub fn from_new(id: impl Into<ReminderId>, record: &NewReminder) -> Self {
        Self {
            id: id.into(),
            title: record.title.clone(),
            due_at: record.due_at,
            note: record.note.clone(),
            completed: record.completed,
            owner: None,
            created_at: None,
        }
    }

    /// Merges a partial update into this record. `id` is never touched.
    pub fn apply(&mut self, patch: &ReminderPatch) {
        if let Some(title) = &patch.title {
            self.title = title.clone();
        }
        if let Some(due_at) = patch.due_at {
            self.due_at = due_at;
        }
        if let Some(note) = &patch.note {
            self.note = note.clone();
        }
        if let Some(completed) = patch.completed {
            self.completed = completed;
        }
    }

    /// Checks persisted state against record invariants.
    pub fn validate(&self) -> Result<(), ReminderValidationError> {
        if self.title.trim().is_empty() {
            return Err(ReminderValidationError::MissingTitle);
        }
        Ok(())
    }
}

/// Unvalidated user input for a new reminder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReminderDraft {
    pub title: String,
    pub due_at: Option<DateTime<Utc>>,
    pub note: Option<String>,
}

impl ReminderDraft {
    pub fn new(title: impl Into<String>, due_at: DateTime<Utc>) -> Self {
        Self {
            title: title.into(),
            due_at: Some(due_at),
            note: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// Builds a draft from raw editor fields.
    ///
    /// A blank `due_at` leaves the field unset so that validation reports
    /// it as missing; an unparseable one is rejected immediately.
    pub fn from_input(
        title: impl Into<String>,
        due_at: &str,
        note: Option<&str>,
    ) -> Result<Self, ReminderValidationError> {
        let due_at = if due_at.trim().is_empty() {
            None
        } else {
            Some(parse_due_at(due_at)?)
        };
        Ok(Self {
            title: title.into(),
            due_at,
            note: note.map(str::to_string),
        })
    }

    /// Validates required fields and produces a persistable payload.
    ///
    /// Blank notes are dropped; the title is trimmed.
    pub fn validate(&self) -> Result<NewReminder, ReminderValidationError> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(ReminderValidationError::MissingTitle);
        }
        let due_at = self.due_at.ok_or(ReminderValidationError::MissingDueAt)?;
        Ok(NewReminder {
            title: title.to_string(),
            due_at,
            note: self
                .note
                .as_deref()
                .filter(|note| !note.trim().is_empty())
                .map(str::to_string),
            completed: false,
        })
    }
}

/// Validated reminder payload without an id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewReminder {
    pub title: String,
    pub due_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub completed: bool,
}

/// Partial update. `None` fields are left untouched.
///
/// `note: Some(None)` clears the note.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReminderPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
}

impl ReminderPatch {
    /// Patch that only flips completion state.
    pub fn completed(completed: bool) -> Self {
        Self {
            completed: Some(completed),
            ..Self::default()
        }
    }

    /// Patch replacing the editable fields of a reminder.
    pub fn from_draft(draft: &NewReminder) -> Self {
        Self {
            title: Some(draft.title.clone()),
            due_at: Some(draft.due_at),
            note: Some(draft.note.clone()),
            completed: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.due_at.is_none()
            && self.note.is_none()
            && self.completed.is_none()
    }

    /// Rejects patches that would blank out the title.
    pub fn validate(&self) -> Result<(), ReminderValidationError> {
        match &self.title {
            Some(title) if title.trim().is_empty() => Err(ReminderValidationError::MissingTitle),
            _ => Ok(()),
        }
    }
}

/// Parses a due timestamp.
///
/// Accepts RFC 3339 (`2024-01-02T00:00:00Z`) and the editor's offset-less
/// `YYYY-MM-DDTHH:MM[:SS]` form, which is read in the local time zone.
pub fn parse_due_at(value: &str) -> Result<DateTime<Utc>, ReminderValidationError> {
    let trimmed = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.with_timezone(&Utc));
    }

    let naive = NaiveDateTime::parse_from_str(trimmed, EDITOR_MINUTE_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(trimmed, EDITOR_SECOND_FORMAT))
        .map_err(|_| ReminderValidationError::InvalidDueAt(trimmed.to_string()))?;

    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
        .ok_or_else(|| ReminderValidationError::InvalidDueAt(trimmed.to_string()))
}

fn deserialize_id<'de, D>(deserializer: D) -> Result<ReminderId, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(i64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(value) => value,
        RawId::Number(value) => value.to_string(),
    })
}

fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(false))
}
