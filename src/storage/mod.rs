//! Experience storage.
//!
//! One row per user, holding the accumulated experience. The `SQLite`
//! backend is the production store; the in-memory backend backs tests and
//! dry runs.

// Allow significant_drop_tightening - dropping database connections slightly early
// provides no meaningful benefit.
#![allow(clippy::significant_drop_tightening)]

pub mod experience;
pub mod sqlite;
pub mod traits;

pub use experience::{InMemoryExperienceStore, SqliteExperienceStore};
pub use traits::ExperienceStore;
