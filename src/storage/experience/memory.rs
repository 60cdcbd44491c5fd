//! In-memory experience store for testing.

use crate::models::{ExperienceUpdate, UserExperience};
use crate::storage::ExperienceStore;
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory experience store.
///
/// Data is not persisted between runs.
#[derive(Debug, Default)]
pub struct InMemoryExperienceStore {
    users: RwLock<HashMap<String, u64>>,
}

impl InMemoryExperienceStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of users stored.
    #[must_use]
    pub fn user_count(&self) -> usize {
        self.users.read().map(|u| u.len()).unwrap_or(0)
    }
}

fn poisoned(operation: &str) -> Error {
    Error::store(operation, "lock poisoned")
}

impl ExperienceStore for InMemoryExperienceStore {
    fn ensure_schema(&self) -> Result<()> {
        Ok(())
    }

    fn get(&self, user: &str) -> Result<Option<u64>> {
        let users = self.users.read().map_err(|_| poisoned("get"))?;
        Ok(users.get(user).copied())
    }

    fn upsert(&self, user: &str, experience: u64) -> Result<()> {
        let mut users = self.users.write().map_err(|_| poisoned("upsert"))?;
        users.insert(user.to_string(), experience);
        Ok(())
    }

    fn add_experience(&self, user: &str, delta: f64) -> Result<ExperienceUpdate> {
        let mut users = self.users.write().map_err(|_| poisoned("add_experience"))?;
        let entry = users.entry(user.to_string()).or_insert(0);
        let update = ExperienceUpdate::apply(*entry, delta);
        *entry = update.current;
        Ok(update)
    }

    fn list(&self) -> Result<Vec<UserExperience>> {
        let users = self.users.read().map_err(|_| poisoned("list"))?;
        let mut rows: Vec<UserExperience> = users
            .iter()
            .map(|(user, &experience)| UserExperience {
                user: user.clone(),
                experience,
            })
            .collect();
        rows.sort_by(|a, b| b.experience.cmp(&a.experience).then_with(|| a.user.cmp(&b.user)));
        Ok(rows)
    }
}
