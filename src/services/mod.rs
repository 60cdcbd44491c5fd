//! Scoring services.
//!
//! The accumulator turns a message into an experience delta; the resolver
//! turns an updated total into a level and detects level-ups.

mod accumulator;
mod resolver;

pub use accumulator::ExperienceAccumulator;
pub use resolver::{LevelResolver, Resolution};
