//! Tether Storage - SQLite persistence layer.
//!
//! This crate provides database storage functionality for the Tether
//! reminder engine. It handles:
//!
//! - Follow-up storage with scheduling bookkeeping timestamps
//! - Reminder settings as a JSON key-value blob
//! - Schema migrations across releases
//!
//! [`Database`] also implements the engine's `FollowUpStore` and
//! `SettingsStore` traits, so it plugs straight into a
//! `tether_core::ReminderScheduler`.
//!
//! # Example
//!
//! ```no_run
//! use tether_core::{FollowUp, FollowUpKind};
//! use tether_storage::Database;
//!
//! let db = Database::in_memory().unwrap();
//!
//! let followup = FollowUp::new("Send the invoice", FollowUpKind::DoIt);
//! db.save_followup(&followup).unwrap();
//!
//! let open = db.get_open_followups().unwrap();
//! assert_eq!(open.len(), 1);
//! ```

mod database;
pub mod error;
mod pool;
pub mod repository;
mod schema;

pub use database::Database;
pub use error::{Result, StorageError};
pub use pool::ConnectionPool;
pub use repository::{FollowUpsRepo, SettingsRepo};
