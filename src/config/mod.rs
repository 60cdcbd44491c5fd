//! Configuration management.
//!
//! The leveling settings live under `[levels]` in a TOML file; logging
//! settings under `[logging]`. Missing keys fall back to the defaults below.
//!
//! ```toml
//! [levels]
//! message = "{0} has leveled up, now he is {1}"
//! db = "conf/levels.db"
//! experience = "geometrical"
//! exp_for_level = 200
//! exp_for_message = 1
//! decrease_window = 60
//!
//! [logging]
//! format = "json"
//! filter = "chatlevels=debug"
//! ```

use crate::models::ProgressionModel;
use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default notification template. `{0}` is the user, `{1}` the level name.
pub const DEFAULT_MESSAGE: &str = "{0} has leveled up, now he is {1}";

/// Main configuration for the leveling engine.
#[derive(Debug, Clone)]
pub struct LevelsConfig {
    /// Notification template with `{0}` (user) and `{1}` (level name) slots.
    pub message: String,
    /// Store path. The random model appends `.random`.
    pub db: PathBuf,
    /// Progression model.
    pub experience: ProgressionModel,
    /// Base unit of the threshold formulas.
    pub exp_for_level: f64,
    /// Experience awarded per message before decay.
    pub exp_for_message: f64,
    /// Decay window in seconds.
    pub decrease_window: f64,
    /// Logging settings.
    pub logging: LoggingSettings,
}

/// Logging section in config file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingSettings {
    /// `pretty` or `json`.
    pub format: Option<String>,
    /// `tracing_subscriber::EnvFilter` directive.
    pub filter: Option<String>,
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    /// Leveling settings.
    pub levels: Option<ConfigFileLevels>,
    /// Logging settings.
    pub logging: Option<LoggingSettings>,
}

/// Levels section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileLevels {
    /// Notification template.
    pub message: Option<String>,
    /// Store path.
    pub db: Option<String>,
    /// Progression model name.
    pub experience: Option<String>,
    /// Base unit of the threshold formulas.
    pub exp_for_level: Option<f64>,
    /// Experience per message.
    pub exp_for_message: Option<f64>,
    /// Decay window in seconds.
    pub decrease_window: Option<f64>,
}

impl Default for LevelsConfig {
    fn default() -> Self {
        Self {
            message: DEFAULT_MESSAGE.to_string(),
            db: PathBuf::from("conf").join("levels.db"),
            experience: ProgressionModel::Geometrical,
            exp_for_level: 200.0,
            exp_for_message: 1.0,
            decrease_window: 60.0,
            logging: LoggingSettings::default(),
        }
    }
}

impl LevelsConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::InvalidInput(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&contents)
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid TOML or holds invalid values.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let file: ConfigFile =
            toml::from_str(contents).map_err(|e| Error::InvalidInput(e.to_string()))?;
        Self::from_config_file(file)
    }

    /// Loads configuration from the default location.
    ///
    /// Looks for `chatlevels/levels.toml` in the platform config directory.
    /// Returns defaults if no readable file is found.
    #[must_use]
    pub fn load_default() -> Self {
        Self::default_path()
            .filter(|path| path.exists())
            .and_then(|path| match Self::load_from_file(&path) {
                Ok(config) => Some(config),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable config");
                    None
                },
            })
            .unwrap_or_default()
    }

    /// Returns the default config file location.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        directories::BaseDirs::new()
            .map(|d| d.config_dir().join("chatlevels").join("levels.toml"))
    }

    /// Converts a `ConfigFile` to `LevelsConfig`.
    fn from_config_file(file: ConfigFile) -> Result<Self> {
        let mut config = Self::default();

        if let Some(levels) = file.levels {
            if let Some(message) = levels.message {
                config.message = message;
            }
            if let Some(db) = levels.db {
                config.db = PathBuf::from(db);
            }
            if let Some(experience) = levels.experience {
                config.experience = experience.parse()?;
            }
            if let Some(v) = levels.exp_for_level {
                config.exp_for_level = v;
            }
            if let Some(v) = levels.exp_for_message {
                config.exp_for_message = v;
            }
            if let Some(v) = levels.decrease_window {
                config.decrease_window = v;
            }
        }
        if let Some(logging) = file.logging {
            config.logging = logging;
        }

        config.validate()?;
        Ok(config)
    }

    /// Checks that numeric settings are usable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] naming the offending key.
    pub fn validate(&self) -> Result<()> {
        if !self.exp_for_level.is_finite() || self.exp_for_level <= 0.0 {
            return Err(Error::InvalidInput(format!(
                "exp_for_level must be positive, got {}",
                self.exp_for_level
            )));
        }
        if !self.exp_for_message.is_finite() || self.exp_for_message < 0.0 {
            return Err(Error::InvalidInput(format!(
                "exp_for_message must not be negative, got {}",
                self.exp_for_message
            )));
        }
        if !self.decrease_window.is_finite() || self.decrease_window < 0.0 {
            return Err(Error::InvalidInput(format!(
                "decrease_window must not be negative, got {}",
                self.decrease_window
            )));
        }
        Ok(())
    }

    /// Store location for the configured model.
    ///
    /// The random model gets its own file so switching models never reuses
    /// another model's totals.
    #[must_use]
    pub fn store_path(&self) -> PathBuf {
        match self.experience.store_suffix() {
            Some(suffix) => {
                let mut path = self.db.clone().into_os_string();
                path.push(suffix);
                PathBuf::from(path)
            },
            None => self.db.clone(),
        }
    }

    /// Sets the progression model.
    #[must_use]
    pub const fn with_experience(mut self, model: ProgressionModel) -> Self {
        self.experience = model;
        self
    }

    /// Sets the store path.
    #[must_use]
    pub fn with_db(mut self, path: impl Into<PathBuf>) -> Self {
        self.db = path.into();
        self
    }

    /// Sets the per-message award and the decay window.
    #[must_use]
    pub const fn with_award(mut self, exp_for_message: f64, decrease_window: f64) -> Self {
        self.exp_for_message = exp_for_message;
        self.decrease_window = decrease_window;
        self
    }
}
