//! Experience store trait definition.

use crate::Result;
use crate::models::{ExperienceUpdate, UserExperience};

/// Durable mapping from user identity to accumulated experience.
///
/// Implementations must keep exactly one record per user: [`upsert`] and
/// [`add_experience`] never create duplicates, even when called
/// concurrently for the same user.
///
/// [`upsert`]: ExperienceStore::upsert
/// [`add_experience`]: ExperienceStore::add_experience
pub trait ExperienceStore: Send + Sync {
    /// Creates the backing table if it does not exist. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be created.
    fn ensure_schema(&self) -> Result<()>;

    /// Gets a user's experience.
    ///
    /// Returns `None` for unseen users; callers treat that as zero.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn get(&self, user: &str) -> Result<Option<u64>>;

    /// Sets a user's experience, inserting the record if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    fn upsert(&self, user: &str, experience: u64) -> Result<()>;

    /// Atomically adds `delta` to a user's experience.
    ///
    /// The fractional part of the new total is dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or written. The stored
    /// value is unchanged in that case.
    fn add_experience(&self, user: &str, delta: f64) -> Result<ExperienceUpdate>;

    /// Lists all users, highest experience first.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn list(&self) -> Result<Vec<UserExperience>>;
}
