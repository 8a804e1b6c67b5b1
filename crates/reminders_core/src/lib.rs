//! Core reminder storage and reconciliation.
//! Stores reminders remotely when possible and locally otherwise, behind one
//! API with a unified change feed.

pub mod ai;
pub mod config;
pub mod db;
pub mod grouping;
pub mod logging;
pub mod model;
pub mod notify;
pub mod service;
pub mod store;

pub use ai::{AiClient, AiError, TextAction, TextTransformer};
pub use config::{AiConfig, AppConfig, ConfigError, LocalConfig, LogConfig, RemoteConfig};
pub use grouping::{group_by_day, GroupedReminders};
pub use logging::{default_log_level, init_logging, logging_status, LogTarget};
pub use model::reminder::{
    parse_due_at, NewReminder, Reminder, ReminderDraft, ReminderId, ReminderPatch,
    ReminderValidationError,
};
pub use notify::{ChangeEvent, ChangeKind, ChangeNotifier, ChangeStream, StoreSource};
pub use service::reminder_service::{ReminderService, ServiceError, Subscription};
pub use store::fallback::FallbackStore;
pub use store::local::LocalStore;
pub use store::remote::{PollerHandle, RemoteStore};
pub use store::{ReminderStore, StoreError, StoreResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
