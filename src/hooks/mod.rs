//! Pipeline stages.
//!
//! A chat host runs every incoming message through a chain of stages. Each
//! stage receives the message, may annotate it, may push new messages onto
//! the outgoing queue, and hands the message back. Stages never drop
//! messages and never fail past their boundary once loaded.
//!
//! | Stage | Config | Requires |
//! |-------|--------|----------|
//! | [`LevelsHook`] | [`LevelsConfig`](crate::config::LevelsConfig) | `webchat` module with a style location |

mod levels;

pub use levels::{LevelsHook, WEBCHAT_MODULE, format_notification};

use crate::models::ChatMessage;
use crate::{Error, Result};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

/// Trait for pipeline stages.
pub trait PipelineStage: Send + Sync {
    /// Stage configuration.
    type Config;

    /// Stage name as registered with the host.
    fn name(&self) -> &'static str;

    /// Builds the stage.
    ///
    /// # Errors
    ///
    /// Returns an error if the stage cannot start. The host treats this as
    /// "module failed to load".
    fn load(config: &Self::Config, host: &HostContext) -> Result<Self>
    where
        Self: Sized;

    /// Processes one message and returns it, possibly annotated.
    fn process(&self, message: ChatMessage, queue: &dyn MessageQueue) -> ChatMessage;
}

/// Outgoing message queue.
pub trait MessageQueue: Send + Sync {
    /// Pushes a message for delivery.
    fn push(&self, message: ChatMessage);
}

impl MessageQueue for Mutex<Vec<ChatMessage>> {
    fn push(&self, message: ChatMessage) {
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message);
    }
}

impl MessageQueue for tokio::sync::mpsc::UnboundedSender<ChatMessage> {
    fn push(&self, message: ChatMessage) {
        if self.send(message).is_err() {
            tracing::warn!("Outgoing queue closed, dropping notification");
        }
    }
}

/// What the host knows about one loaded module.
#[derive(Debug, Clone, Default)]
pub struct ModuleInfo {
    /// Asset directory of the module's active chat style, if it has one.
    pub style_location: Option<PathBuf>,
}

/// Host information handed to stages at load time.
#[derive(Debug, Clone, Default)]
pub struct HostContext {
    loaded_modules: HashMap<String, ModuleInfo>,
}

impl HostContext {
    /// Creates a context with no loaded modules.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a loaded module.
    #[must_use]
    pub fn with_module(mut self, name: impl Into<String>, info: ModuleInfo) -> Self {
        self.loaded_modules.insert(name.into(), info);
        self
    }

    /// Registers the web chat module with its style directory.
    #[must_use]
    pub fn with_webchat(self, style_location: impl Into<PathBuf>) -> Self {
        self.with_module(
            WEBCHAT_MODULE,
            ModuleInfo {
                style_location: Some(style_location.into()),
            },
        )
    }

    /// Returns a loaded module, if present.
    #[must_use]
    pub fn module(&self, name: &str) -> Option<&ModuleInfo> {
        self.loaded_modules.get(name)
    }

    /// Returns a loaded module or fails with [`Error::MissingDependency`].
    ///
    /// # Errors
    ///
    /// Returns an error if `name` is not loaded.
    pub fn require(&self, name: &str) -> Result<&ModuleInfo> {
        self.module(name).ok_or_else(|| {
            Error::MissingDependency(format!("module '{name}' is not loaded"))
        })
    }
}
