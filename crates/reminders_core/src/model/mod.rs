//! Domain model for reminders.
//!
//! # Responsibility
//! - Define the canonical reminder record shared by local and remote stores.
//! - Validate user input before any store is touched.
//!
//! # Invariants
//! - Every persisted reminder has a store-assigned, immutable `id`.
//! - `title` and `due_at` are required for persistence.
//! - Deletion is a hard delete; there are no tombstones.

pub mod reminder;
