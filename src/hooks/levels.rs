//! Leveling stage.

use super::{HostContext, MessageQueue, PipelineStage};
use crate::catalog::LevelCatalog;
use crate::config::LevelsConfig;
use crate::models::ChatMessage;
use crate::services::{ExperienceAccumulator, LevelResolver, Resolution};
use crate::storage::{ExperienceStore, SqliteExperienceStore};
use crate::{Error, Result, SYSTEM_USER};
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, error, info, instrument, warn};

/// Module that supplies the chat style directory holding `levels.xml`.
pub const WEBCHAT_MODULE: &str = "webchat";

/// Attempts per store write before a message is left unscored.
const STORE_ATTEMPTS: usize = 2;

/// Awards experience for chat messages and announces level-ups.
pub struct LevelsHook {
    catalog: LevelCatalog,
    store: Arc<dyn ExperienceStore>,
    accumulator: ExperienceAccumulator,
    resolver: LevelResolver,
    template: String,
    /// Serializes read-add-resolve so concurrent events for one user never
    /// interleave with a random-model rewrite.
    scoring: Mutex<()>,
}

impl LevelsHook {
    /// Assembles the stage from already-loaded parts.
    #[must_use]
    pub fn from_parts(
        config: &LevelsConfig,
        catalog: LevelCatalog,
        store: Arc<dyn ExperienceStore>,
    ) -> Self {
        Self {
            catalog,
            store,
            accumulator: ExperienceAccumulator::from_config(config),
            resolver: LevelResolver::new(),
            template: config.message.clone(),
            scoring: Mutex::new(()),
        }
    }

    /// Replaces the resolver (e.g. with a seeded one).
    #[must_use]
    pub fn with_resolver(mut self, resolver: LevelResolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// The loaded catalog.
    #[must_use]
    pub const fn catalog(&self) -> &LevelCatalog {
        &self.catalog
    }

    /// The experience store.
    #[must_use]
    pub fn store(&self) -> &dyn ExperienceStore {
        self.store.as_ref()
    }

    /// Processes a message as if it arrived at `now`.
    #[instrument(skip_all, fields(user = message.user.as_deref().unwrap_or_default()))]
    pub fn process_at(
        &self,
        mut message: ChatMessage,
        queue: &dyn MessageQueue,
        now: DateTime<Utc>,
    ) -> ChatMessage {
        if message.is_command() || message.is_system() {
            return message;
        }
        let Some(user) = message.user.clone() else {
            debug!("Message has no user, passing through");
            return message;
        };

        if let Some(special) = self.catalog.special_for(&user) {
            message.s_levels.push(special.clone());
        }

        match self.score(&user, now) {
            Ok(Some(resolution)) => {
                metrics::counter!("levels_messages_scored_total").increment(1);
                if resolution.leveled_up {
                    metrics::counter!("levels_level_ups_total").increment(1);
                    info!(level = %resolution.level.name, index = resolution.index, "Level up");
                    queue.push(ChatMessage::system(format_notification(
                        &self.template,
                        &user,
                        &resolution.level.name,
                    )));
                }
                message.levels = Some(resolution.level);
            },
            Ok(None) => {},
            Err(e) => {
                metrics::counter!("levels_store_errors_total").increment(1);
                warn!(error = %e, "Skipping level update for message");
            },
        }

        message
    }

    /// Awards experience to `user` and resolves their level.
    ///
    /// Returns `None` for the system sender, without touching any state.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Store`] if the store failed on every attempt.
    pub fn score(&self, user: &str, now: DateTime<Utc>) -> Result<Option<Resolution>> {
        if user == SYSTEM_USER {
            return Ok(None);
        }

        let _guard = self.scoring.lock().unwrap_or_else(PoisonError::into_inner);
        let delta = self.accumulator.award(user, now);
        let update = retry_transient(|| self.store.add_experience(user, delta))?;
        debug!(delta, previous = update.previous, current = update.current, "Experience added");

        self.resolver
            .resolve(&self.catalog, user, update, self.store.as_ref())
    }
}

impl PipelineStage for LevelsHook {
    type Config = LevelsConfig;

    fn name(&self) -> &'static str {
        "levels"
    }

    fn load(config: &LevelsConfig, host: &HostContext) -> Result<Self> {
        config.validate()?;

        let webchat = host.require(WEBCHAT_MODULE).inspect_err(|e| {
            error!(error = %e, "Unable to find webchat module that is needed for level module");
        })?;
        let style_location = webchat.style_location.as_deref().ok_or_else(|| {
            Error::MissingDependency(format!("module '{WEBCHAT_MODULE}' has no style location"))
        })?;

        let catalog_path = LevelCatalog::path_in(style_location);
        let catalog = LevelCatalog::load(&catalog_path, config.experience, config.exp_for_level)
            .inspect_err(|e| error!(error = %e, "Level catalog unavailable"))?;

        let store = SqliteExperienceStore::new(config.store_path())?;
        info!(
            store = %store.db_path().display(),
            model = %config.experience,
            "Levels module loaded"
        );

        Ok(Self::from_parts(config, catalog, Arc::new(store)))
    }

    fn process(&self, message: ChatMessage, queue: &dyn MessageQueue) -> ChatMessage {
        self.process_at(message, queue, Utc::now())
    }
}

/// Retries transient store failures.
///
/// A failed store transaction rolls back, so repeating it cannot double count.
fn retry_transient<T>(mut op: impl FnMut() -> Result<T>) -> Result<T> {
    let mut attempt = 1;
    loop {
        match op() {
            Err(e) if e.is_transient() && attempt < STORE_ATTEMPTS => {
                debug!(error = %e, attempt, "Retrying store operation");
                attempt += 1;
            },
            result => return result,
        }
    }
}

/// Fills the `{0}` (user) and `{1}` (level name) slots of a template.
///
/// Substituted values are not re-scanned, so a user named `{1}` stays `{1}`.
/// Unknown slots are kept verbatim.
#[must_use]
pub fn format_notification(template: &str, user: &str, level_name: &str) -> String {
    let mut out = String::with_capacity(template.len() + user.len() + level_name.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        let slot = if tail.starts_with("{0}") {
            Some(user)
        } else if tail.starts_with("{1}") {
            Some(level_name)
        } else {
            None
        };
        match slot {
            Some(value) => {
                out.push_str(value);
                rest = &tail[3..];
            },
            None => {
                out.push('{');
                rest = &tail[1..];
            },
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProgressionModel;
    use crate::storage::InMemoryExperienceStore;

    const LADDER: &str = r#"<levels>
        <level name="Rookie"/><level name="Regular"/><level name="Elder"/>
        <level nick="mod" name="Moderator"/>
    </levels>"#;

    fn hook(model: ProgressionModel) -> (LevelsHook, Arc<InMemoryExperienceStore>) {
        let config = LevelsConfig::default()
            .with_experience(model)
            .with_award(1.0, 60.0);
        let catalog = LevelCatalog::from_xml_str(LADDER, model, 2.0).unwrap();
        let store = Arc::new(InMemoryExperienceStore::new());
        let hook = LevelsHook::from_parts(&config, catalog, store.clone())
            .with_resolver(LevelResolver::seeded(7));
        (hook, store)
    }

    fn at(seconds: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_700_000_000 + seconds, 0).unwrap()
    }

    #[test]
    fn test_format_notification() {
        assert_eq!(
            format_notification("{0} has leveled up, now he is {1}", "alice", "Elder"),
            "alice has leveled up, now he is Elder"
        );
        assert_eq!(format_notification("{1}!", "{0}", "Top"), "Top!");
        assert_eq!(format_notification("{0} {2} {", "{1}", "x"), "{1} {2} {");
    }

    #[test]
    fn test_annotates_and_announces() {
        let (hook, store) = hook(ProgressionModel::Static);
        let queue = Mutex::new(Vec::new());

        let msg = hook.process_at(ChatMessage::new("alice", "hi"), &queue, at(0));
        assert_eq!(msg.levels.as_ref().map(|l| l.name.as_str()), Some("Rookie"));
        assert!(queue.lock().unwrap().is_empty());

        // Threshold for "Regular" is 2 with base 2
        let msg = hook.process_at(ChatMessage::new("alice", "again"), &queue, at(120));
        assert_eq!(msg.levels.as_ref().map(|l| l.name.as_str()), Some("Regular"));
        assert_eq!(store.get("alice").unwrap(), Some(2));

        let notes = queue.lock().unwrap();
        assert_eq!(notes.len(), 1);
        assert!(notes[0].is_system());
        assert_eq!(
            notes[0].text.as_deref(),
            Some("alice has leveled up, now he is Regular")
        );
    }

    #[test]
    fn test_command_and_system_pass_through() {
        let (hook, store) = hook(ProgressionModel::Static);
        let queue = Mutex::new(Vec::new());

        let cmd = ChatMessage::new("alice", "!level").with_command("level");
        assert_eq!(hook.process_at(cmd.clone(), &queue, at(0)), cmd);

        let sys = ChatMessage::system("restarting");
        assert_eq!(hook.process_at(sys.clone(), &queue, at(0)), sys);

        let mut flagged = ChatMessage::new("mod", "hello");
        flagged.system_msg = true;
        assert_eq!(hook.process_at(flagged.clone(), &queue, at(0)), flagged);

        assert_eq!(store.user_count(), 0);
        assert!(queue.lock().unwrap().is_empty());
    }

    #[test]
    fn test_special_level_stacks() {
        let (hook, _) = hook(ProgressionModel::Static);
        let queue = Mutex::new(Vec::new());

        let mut msg = ChatMessage::new("mod", "hello");
        msg.s_levels.push(crate::models::SpecialLevel::new("mod").with_name("Other"));

        let out = hook.process_at(msg, &queue, at(0));
        assert_eq!(out.s_levels.len(), 2);
        assert_eq!(out.s_levels[1].name.as_deref(), Some("Moderator"));
        assert!(out.levels.is_some());
    }

    #[test]
    fn test_system_sender_not_scored() {
        let (hook, store) = hook(ProgressionModel::Static);
        assert!(hook.score(SYSTEM_USER, at(0)).unwrap().is_none());
        assert_eq!(store.user_count(), 0);
    }

    #[test]
    fn test_message_without_user_passes_through() {
        let (hook, store) = hook(ProgressionModel::Static);
        let queue = Mutex::new(Vec::new());
        let msg = ChatMessage {
            text: Some("orphan".to_string()),
            ..ChatMessage::default()
        };
        assert_eq!(hook.process_at(msg.clone(), &queue, at(0)), msg);
        assert_eq!(store.user_count(), 0);
    }

    #[test]
    fn test_load_requires_webchat() {
        let result = LevelsHook::load(&LevelsConfig::default(), &HostContext::new());
        assert!(matches!(result, Err(Error::MissingDependency(_))));
    }

    #[test]
    fn test_load_without_catalog_fails() {
        let dir = tempfile::tempdir().unwrap();
        let config = LevelsConfig::default().with_db(dir.path().join("levels.db"));
        let host = HostContext::new().with_webchat(dir.path());

        let result = LevelsHook::load(&config, &host);
        assert!(matches!(result, Err(Error::CatalogMissing { .. })));
        // No store is created when the catalog is missing
        assert!(!dir.path().join("levels.db").exists());
    }

    #[test]
    fn test_load_opens_model_specific_store() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(LevelCatalog::path_in(dir.path()), LADDER).unwrap();
        let config = LevelsConfig::default()
            .with_db(dir.path().join("levels.db"))
            .with_experience(ProgressionModel::Random);
        let host = HostContext::new().with_webchat(dir.path());

        let hook = LevelsHook::load(&config, &host).unwrap();
        assert_eq!(hook.name(), "levels");
        assert_eq!(hook.catalog().len(), 3);
        assert!(dir.path().join("levels.db.random").exists());
    }
}
