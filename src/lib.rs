//! # Chatlevels
//!
//! Experience and leveling engine for chat message pipelines.
//!
//! Every chat message adds experience to its author. When the author crosses
//! a threshold from the level catalog, a system notification is pushed onto
//! the outgoing queue and the message is annotated with the new level.
//!
//! ## Components
//!
//! - [`catalog`]: parses `levels.xml` into ranked levels and per-user special levels
//! - [`storage`]: durable per-user experience (`SQLite`, in-memory for tests)
//! - [`services`]: decay-weighted accumulator and level resolver
//! - [`hooks`]: the pipeline stage that ties everything together
//!
//! ## Example
//!
//! ```rust,ignore
//! use chatlevels::config::LevelsConfig;
//! use chatlevels::hooks::{HostContext, LevelsHook, PipelineStage};
//!
//! let host = HostContext::new().with_webchat("/path/to/style");
//! let hook = LevelsHook::load(&LevelsConfig::default(), &host)?;
//! let annotated = hook.process(message, &queue);
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

use std::path::PathBuf;
use thiserror::Error as ThisError;

pub mod catalog;
pub mod config;
pub mod hooks;
pub mod models;
pub mod observability;
pub mod services;
pub mod storage;

pub use catalog::LevelCatalog;
pub use config::LevelsConfig;
pub use hooks::{HostContext, LevelsHook, MessageQueue, PipelineStage};
pub use models::{ChatMessage, LevelDefinition, ProgressionModel, SpecialLevel};
pub use services::{ExperienceAccumulator, LevelResolver, Resolution};
pub use storage::{ExperienceStore, InMemoryExperienceStore, SqliteExperienceStore};

/// Identity used by system notifications. Never scored.
pub const SYSTEM_USER: &str = "System";

/// Error type for leveling operations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When | Fatal |
/// |---------|-------------|-------|
/// | `CatalogMissing` | `levels.xml` does not exist at load time | yes |
/// | `MalformedCatalogEntry` | XML is unparsable or a level lacks a name | yes |
/// | `Store` | `SQLite` I/O or schema failures | no, per message |
/// | `MissingDependency` | The host did not load a required module | yes |
/// | `InvalidInput` | Config values out of range, unknown progression model | yes |
#[derive(Debug, ThisError)]
pub enum Error {
    /// The level catalog could not be located.
    #[error("level catalog not found: {}", path.display())]
    CatalogMissing {
        /// Where the catalog was expected.
        path: PathBuf,
    },

    /// A catalog entry could not be turned into a level.
    #[error("malformed catalog entry: {0}")]
    MalformedCatalogEntry(String),

    /// An experience store operation failed.
    ///
    /// Treated as transient: the hook logs it and skips scoring for the
    /// affected message.
    #[error("store operation '{operation}' failed: {cause}")]
    Store {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// A sibling module required at load time is absent.
    #[error("missing dependency: {0}")]
    MissingDependency(String),

    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// Builds a [`Error::Store`] from an operation name and any displayable cause.
    pub fn store(operation: &str, cause: impl std::fmt::Display) -> Self {
        Self::Store {
            operation: operation.to_string(),
            cause: cause.to_string(),
        }
    }

    /// Returns true for errors that only affect a single scoring event.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Store { .. })
    }
}

/// Result type alias for leveling operations.
pub type Result<T> = std::result::Result<T, Error>;
