//! Level resolution and level-up detection.

use crate::catalog::LevelCatalog;
use crate::models::{ExperienceUpdate, LevelDefinition};
use crate::storage::ExperienceStore;
use crate::{Result, SYSTEM_USER};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Mutex, PoisonError};
use tracing::debug;

/// Outcome of resolving a user's level.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    /// 0-based index into the catalog.
    pub index: usize,
    /// The level at `index`.
    pub level: LevelDefinition,
    /// True if this update moved the user into a new tier.
    pub leveled_up: bool,
    /// Experience now stored for the user.
    pub experience: u64,
}

impl Resolution {
    /// Builds the resolution for the level at `index`.
    #[must_use]
    pub fn at(catalog: &LevelCatalog, index: usize, leveled_up: bool, experience: u64) -> Self {
        Self {
            index,
            level: catalog.levels()[index].clone(),
            leveled_up,
            experience,
        }
    }
}

/// Maps experience totals to levels.
///
/// Holds the random source for the random progression model.
#[derive(Debug)]
pub struct LevelResolver {
    rng: Mutex<StdRng>,
}

impl Default for LevelResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl LevelResolver {
    /// Creates a resolver seeded from the OS.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Creates a resolver with a fixed seed.
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Resolves `user`'s level after `update`.
    ///
    /// A level-up happens when `update.current` reaches a higher tier than
    /// `update.previous`. With the random model the user is then moved to a
    /// uniformly chosen tier and their stored experience is rewritten to
    /// `threshold(tier) - exp_for_level`, just below that tier's requirement.
    /// The random model also re-rolls every time the top threshold is
    /// reached, including from the last tier itself.
    ///
    /// Returns `None` for the system sender, without touching the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the random model's rewrite cannot be stored.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn resolve(
        &self,
        catalog: &LevelCatalog,
        user: &str,
        update: ExperienceUpdate,
        store: &dyn ExperienceStore,
    ) -> Result<Option<Resolution>> {
        if user == SYSTEM_USER {
            return Ok(None);
        }

        let previous_index = catalog.index_for(update.previous);
        let current_index = catalog.index_for(update.current);
        let random = catalog.model().is_random();

        // The random model re-rolls whenever the top threshold is reached,
        // so the last tier (or a one-level ladder) is never a dead end.
        let leveled_up =
            current_index > previous_index || (random && catalog.reaches_top(update.current));

        if !leveled_up {
            return Ok(Some(Resolution::at(catalog, current_index, false, update.current)));
        }

        if !random {
            debug!(user = %user, from = previous_index, to = current_index, "Level up");
            return Ok(Some(Resolution::at(catalog, current_index, true, update.current)));
        }

        let index = self.random_index(catalog.len());
        let threshold = catalog.levels()[index].threshold;
        let rewritten = (threshold - catalog.exp_for_level()).max(0.0).floor() as u64;
        store.upsert(user, rewritten)?;

        debug!(
            user = %user,
            from = previous_index,
            to = index,
            experience = rewritten,
            "Random level up"
        );
        Ok(Some(Resolution::at(catalog, index, true, rewritten)))
    }

    fn random_index(&self, len: usize) -> usize {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        rng.gen_range(0..len)
    }
}
