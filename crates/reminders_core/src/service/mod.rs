//! Use-case services.
//!
//! # Responsibility
//! - Expose the reminder CRUD boundary consumed by presentation code.
//! - Keep callers unaware of which backend served a call.

pub mod reminder_service;
