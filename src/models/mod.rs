//! Data models for the leveling engine.

mod experience;
mod level;
mod message;

pub use experience::{ExperienceUpdate, UserExperience};
pub use level::{LevelDefinition, ProgressionModel, SpecialLevel};
pub use message::ChatMessage;
