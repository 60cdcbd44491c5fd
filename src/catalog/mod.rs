//! Level catalog.
//!
//! Parses the `levels.xml` file shipped with a chat style into an ordered
//! threshold ladder plus a table of per-user special levels.
//!
//! # Format
//!
//! ```xml
//! <levels>
//!   <level name="Novice" color="#aaa"/>
//!   <level name="Regular"/>
//!   <level nick="streamer" name="Boss" icon="crown.png"/>
//! </levels>
//! ```
//!
//! Every child element of the root is an entry. Entries carrying a `nick`
//! attribute become [`SpecialLevel`]s; the rest are ranked in document order
//! and get a threshold computed from the progression model. Element names
//! are not significant.

use crate::models::{LevelDefinition, ProgressionModel, SpecialLevel};
use crate::{Error, Result};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// File name of the catalog inside a chat style directory.
pub const CATALOG_FILE_NAME: &str = "levels.xml";

const NICK_ATTRIBUTE: &str = "nick";
const NAME_ATTRIBUTE: &str = "name";
/// Reserved: the computed threshold is exposed under this key.
const EXP_ATTRIBUTE: &str = "exp";

/// Immutable catalog of levels. Shared read-only after load.
#[derive(Debug, Clone)]
pub struct LevelCatalog {
    levels: Vec<LevelDefinition>,
    specials: HashMap<String, SpecialLevel>,
    model: ProgressionModel,
    exp_for_level: f64,
}

impl LevelCatalog {
    /// Returns the catalog path inside a chat style directory.
    #[must_use]
    pub fn path_in(style_location: &Path) -> PathBuf {
        style_location.join(CATALOG_FILE_NAME)
    }

    /// Loads the catalog from disk.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CatalogMissing`] if `path` does not exist and
    /// [`Error::MalformedCatalogEntry`] if it cannot be parsed into at least
    /// one ranked level.
    pub fn load(path: &Path, model: ProgressionModel, exp_for_level: f64) -> Result<Self> {
        if !path.exists() {
            return Err(Error::CatalogMissing {
                path: path.to_path_buf(),
            });
        }

        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::MalformedCatalogEntry(format!("{}: {e}", path.display()))
        })?;

        let catalog = Self::from_xml_str(&contents, model, exp_for_level)?;
        info!(
            path = %path.display(),
            levels = catalog.levels.len(),
            special_levels = catalog.specials.len(),
            model = %model,
            "Loaded level catalog"
        );
        Ok(catalog)
    }

    /// Parses a catalog from XML text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedCatalogEntry`] on XML errors, nameless
    /// ranked entries, or a catalog without ranked entries.
    pub fn from_xml_str(xml: &str, model: ProgressionModel, exp_for_level: f64) -> Result<Self> {
        if !exp_for_level.is_finite() || exp_for_level <= 0.0 {
            return Err(Error::InvalidInput(format!(
                "exp_for_level must be positive, got {exp_for_level}"
            )));
        }

        let doc = roxmltree::Document::parse(xml)
            .map_err(|e| Error::MalformedCatalogEntry(e.to_string()))?;

        let mut levels = Vec::new();
        let mut specials = HashMap::new();

        for entry in doc.root_element().children().filter(roxmltree::Node::is_element) {
            let mut attributes: BTreeMap<String, String> = entry
                .attributes()
                .map(|a| (a.name().to_string(), a.value().to_string()))
                .collect();
            let name = attributes.remove(NAME_ATTRIBUTE);

            if let Some(nick) = attributes.remove(NICK_ATTRIBUTE) {
                debug!(nick = %nick, "Special level entry");
                specials.insert(
                    nick.clone(),
                    SpecialLevel {
                        nick,
                        name,
                        attributes,
                    },
                );
                continue;
            }

            attributes.remove(EXP_ATTRIBUTE);
            let rank = levels.len() + 1;
            let name = name.ok_or_else(|| {
                Error::MalformedCatalogEntry(format!(
                    "level #{rank} (<{}>) has no '{NAME_ATTRIBUTE}' attribute",
                    entry.tag_name().name()
                ))
            })?;

            levels.push(LevelDefinition {
                rank,
                name,
                threshold: model.threshold(exp_for_level, rank),
                attributes,
            });
        }

        if levels.is_empty() {
            return Err(Error::MalformedCatalogEntry(
                "catalog defines no ranked levels".to_string(),
            ));
        }

        Ok(Self {
            levels,
            specials,
            model,
            exp_for_level,
        })
    }

    /// Ranked levels, ascending.
    #[must_use]
    pub fn levels(&self) -> &[LevelDefinition] {
        &self.levels
    }

    /// Number of ranked levels. Always at least one.
    #[must_use]
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    /// Always false for a loaded catalog.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Returns the level at a 0-based index.
    #[must_use]
    pub fn level(&self, index: usize) -> Option<&LevelDefinition> {
        self.levels.get(index)
    }

    /// All special levels, keyed by user identity.
    #[must_use]
    pub const fn specials(&self) -> &HashMap<String, SpecialLevel> {
        &self.specials
    }

    /// Returns the special level for `user`, if any.
    #[must_use]
    pub fn special_for(&self, user: &str) -> Option<&SpecialLevel> {
        self.specials.get(user)
    }

    /// Progression model the thresholds were computed with.
    #[must_use]
    pub const fn model(&self) -> ProgressionModel {
        self.model
    }

    /// Base unit of the threshold formulas.
    #[must_use]
    pub const fn exp_for_level(&self) -> f64 {
        self.exp_for_level
    }

    /// Maps an experience total to a 0-based level index.
    ///
    /// The index is the number of thresholds at or below `experience`,
    /// clamped to the last level. A user below the first threshold sits at
    /// index 0.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn index_for(&self, experience: u64) -> usize {
        let experience = experience as f64;
        let reached = self
            .levels
            .iter()
            .take_while(|level| level.threshold <= experience)
            .count();
        reached.min(self.levels.len() - 1)
    }

    /// True once `experience` is at or past the last level's threshold.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn reaches_top(&self, experience: u64) -> bool {
        self.levels
            .last()
            .is_some_and(|top| top.threshold <= experience as f64)
    }
}
