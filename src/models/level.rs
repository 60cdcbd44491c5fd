//! Level definitions and progression models.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Exponent applied to the rank in the geometrical model.
const GEOMETRICAL_EXPONENT: f64 = 1.8;

/// How level thresholds grow with rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressionModel {
    /// Linear growth: `exp_for_level * n`.
    Static,
    /// Exponent-scaled growth: `floor(exp_for_level * n^1.8 / 2)`.
    #[default]
    Geometrical,
    /// Linear thresholds, but a level-up lands on a random tier.
    Random,
}

impl ProgressionModel {
    /// Returns all progression models.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Static, Self::Geometrical, Self::Random]
    }

    /// Returns the model as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Static => "static",
            Self::Geometrical => "geometrical",
            Self::Random => "random",
        }
    }

    /// Parses a model from a string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "static" => Some(Self::Static),
            "geometrical" | "geometric" => Some(Self::Geometrical),
            "random" => Some(Self::Random),
            _ => None,
        }
    }

    /// Returns true for the random re-tiering model.
    #[must_use]
    pub const fn is_random(&self) -> bool {
        matches!(self, Self::Random)
    }

    /// Suffix appended to the store path so models never share state.
    #[must_use]
    pub const fn store_suffix(&self) -> Option<&'static str> {
        match self {
            Self::Random => Some(".random"),
            Self::Static | Self::Geometrical => None,
        }
    }

    /// Experience required for the level at 1-based `rank`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn threshold(&self, exp_for_level: f64, rank: usize) -> f64 {
        let n = rank as f64;
        match self {
            Self::Geometrical => (exp_for_level * n.powf(GEOMETRICAL_EXPONENT) / 2.0).floor(),
            Self::Static | Self::Random => exp_for_level * n,
        }
    }
}

impl fmt::Display for ProgressionModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProgressionModel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s).ok_or_else(|| {
            Error::InvalidInput(format!(
                "unknown progression model '{s}' (expected static, geometrical or random)"
            ))
        })
    }
}

/// A ranked level from the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelDefinition {
    /// 1-based position in the catalog.
    pub rank: usize,
    /// Display name.
    pub name: String,
    /// Minimum experience for this level.
    #[serde(rename = "exp")]
    pub threshold: f64,
    /// Extra catalog attributes, carried through verbatim.
    #[serde(flatten)]
    pub attributes: BTreeMap<String, String>,
}

impl LevelDefinition {
    /// Creates a level with no extra attributes.
    #[must_use]
    pub fn new(rank: usize, name: impl Into<String>, threshold: f64) -> Self {
        Self {
            rank,
            name: name.into(),
            threshold,
            attributes: BTreeMap::new(),
        }
    }

    /// Adds an extra attribute.
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// Per-user override tier. Not part of the threshold ladder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecialLevel {
    /// User identity this level belongs to.
    pub nick: String,
    /// Optional display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Extra catalog attributes, carried through verbatim.
    #[serde(flatten)]
    pub attributes: BTreeMap<String, String>,
}

impl SpecialLevel {
    /// Creates a special level for `nick`.
    #[must_use]
    pub fn new(nick: impl Into<String>) -> Self {
        Self {
            nick: nick.into(),
            name: None,
            attributes: BTreeMap::new(),
        }
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(1, 100.0 ; "rank one")]
    #[test_case(2, 348.0 ; "rank two")]
    #[test_case(3, 722.0 ; "rank three")]
    #[test_case(4, 1212.0 ; "rank four")]
    fn test_geometrical_threshold(rank: usize, expected: f64) {
        let threshold = ProgressionModel::Geometrical.threshold(200.0, rank);
        assert!((threshold - expected).abs() < f64::EPSILON);
    }

    #[test_case(ProgressionModel::Static ; "static")]
    #[test_case(ProgressionModel::Random ; "random")]
    fn test_linear_threshold(model: ProgressionModel) {
        assert!((model.threshold(200.0, 1) - 200.0).abs() < f64::EPSILON);
        assert!((model.threshold(200.0, 5) - 1000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_parse_roundtrip() {
        for model in ProgressionModel::all() {
            assert_eq!(ProgressionModel::parse(model.as_str()), Some(*model));
        }
        assert_eq!(
            ProgressionModel::parse(" Geometrical "),
            Some(ProgressionModel::Geometrical)
        );
        assert!(ProgressionModel::parse("exponential").is_none());
    }

    #[test]
    fn test_from_str_rejects_unknown() {
        let result: Result<ProgressionModel> = "linear".parse();
        assert!(matches!(result, Err(Error::InvalidInput(msg)) if msg.contains("linear")));
    }

    #[test]
    fn test_store_suffix_only_for_random() {
        assert_eq!(ProgressionModel::Random.store_suffix(), Some(".random"));
        assert_eq!(ProgressionModel::Static.store_suffix(), None);
        assert_eq!(ProgressionModel::Geometrical.store_suffix(), None);
    }

    #[test]
    fn test_level_serializes_flat() {
        let level = LevelDefinition::new(1, "Novice", 100.0).with_attribute("color", "#fff");
        let json = serde_json::to_value(&level).unwrap();
        assert_eq!(json["name"], "Novice");
        assert_eq!(json["exp"], 100.0);
        assert_eq!(json["color"], "#fff");
        assert_eq!(json["rank"], 1);
    }
}
