//! Persistent experience records.

use serde::{Deserialize, Serialize};

/// Stored experience of one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserExperience {
    /// User identity.
    pub user: String,
    /// Accumulated experience.
    pub experience: u64,
}

/// Outcome of an atomic experience increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExperienceUpdate {
    /// Experience before the increment (0 for unseen users).
    pub previous: u64,
    /// Experience after the increment.
    pub current: u64,
}

impl ExperienceUpdate {
    /// Applies a fractional delta to a stored total.
    ///
    /// Partial points are floored, never stored.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn apply(previous: u64, delta: f64) -> Self {
        let current = (previous as f64 + delta.max(0.0)).floor().max(0.0) as u64;
        Self { previous, current }
    }
}
