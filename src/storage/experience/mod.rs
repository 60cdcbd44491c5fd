//! Experience store backends.

mod memory;
mod sqlite;

pub use memory::InMemoryExperienceStore;
pub use sqlite::SqliteExperienceStore;
