//! Decay-weighted experience awards.

use crate::config::LevelsConfig;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// Computes per-message experience with a cooldown.
///
/// A message sent `t` seconds after the previous one from the same user is
/// worth `exp_for_message * min(t / decrease_window, 1)`. The first message
/// seen from a user is worth the full amount.
///
/// Timestamps are kept in memory only and are owned by this instance.
#[derive(Debug)]
pub struct ExperienceAccumulator {
    exp_for_message: f64,
    decrease_window: f64,
    last_seen: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl ExperienceAccumulator {
    /// Creates an accumulator.
    ///
    /// A `decrease_window` of zero disables decay.
    #[must_use]
    pub fn new(exp_for_message: f64, decrease_window: f64) -> Self {
        Self {
            exp_for_message,
            decrease_window,
            last_seen: Mutex::new(HashMap::new()),
        }
    }

    /// Creates an accumulator from the leveling config.
    #[must_use]
    pub fn from_config(config: &LevelsConfig) -> Self {
        Self::new(config.exp_for_message, config.decrease_window)
    }

    /// Returns the experience `user` earns for a message at `now`.
    ///
    /// Always records `now` as the user's latest message, so a burst of
    /// messages earns less and less.
    pub fn award(&self, user: &str, now: DateTime<Utc>) -> f64 {
        let previous = {
            let mut last_seen = self.last_seen.lock().unwrap_or_else(PoisonError::into_inner);
            last_seen.insert(user.to_string(), now)
        };

        let Some(previous) = previous else {
            return self.exp_for_message;
        };

        self.exp_for_message * self.multiplier(now, previous)
    }

    /// Number of users with a recorded timestamp.
    #[must_use]
    pub fn tracked_users(&self) -> usize {
        self.last_seen
            .lock()
            .map(|m| m.len())
            .unwrap_or_else(|poisoned| poisoned.into_inner().len())
    }

    #[allow(clippy::cast_precision_loss)]
    fn multiplier(&self, now: DateTime<Utc>, previous: DateTime<Utc>) -> f64 {
        if self.decrease_window <= 0.0 {
            return 1.0;
        }
        // A clock stepping backwards counts as no time elapsed
        let elapsed = (now - previous).num_milliseconds().max(0) as f64 / 1000.0;
        (elapsed / self.decrease_window).min(1.0)
    }
}
