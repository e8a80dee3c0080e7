use super::{NewInteraction, StoreData};
use crate::{Error, Result};
use chrono::{DateTime, Local};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use std::fs;
use std::io::{ErrorKind as IoErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// JSON file backing the interaction log.
#[derive(Debug, Clone)]
pub struct InteractionStore {
    path: PathBuf,
}

impl InteractionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Strict load. `Ok(None)` when the file does not exist yet.
    pub fn try_load(&self) -> Result<Option<StoreData>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == IoErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let value: serde_json::Value = serde_json::from_str(&raw)
            .map_err(|e| Error::CorruptStore(format!("not valid JSON: {}", e)))?;

        let has_shape = value
            .as_object()
            .is_some_and(|obj| obj.contains_key("users") && obj.contains_key("history"));
        if !has_shape {
            return Err(Error::CorruptStore(
                "expected an object with 'users' and 'history'".to_string(),
            ));
        }

        serde_json::from_value(value)
            .map(Some)
            .map_err(|e| Error::CorruptStore(e.to_string()))
    }

    /// Fail-open load: any problem yields an empty log.
    pub fn load(&self) -> StoreData {
        match self.try_load() {
            Ok(Some(data)) => data,
            Ok(None) => {
                debug!(path = %self.path.display(), "No interaction log yet, starting empty");
                StoreData::default()
            }
            Err(Error::CorruptStore(reason)) => {
                warn!(
                    path = %self.path.display(),
                    "Interaction log is corrupt ({}). Re-initializing.",
                    reason
                );
                StoreData::default()
            }
            Err(e) => {
                warn!(path = %self.path.display(), "Error reading interaction log: {}", e);
                StoreData::default()
            }
        }
    }

    /// Write the whole log. The file is replaced atomically via a sibling
    /// temp file.
    pub fn save(&self, data: &StoreData) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let mut buf = Vec::new();
        let mut serializer =
            serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
        data.serialize(&mut serializer)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(&buf)?;
        tmp.flush()?;
        tmp.persist(&self.path).map_err(|e| Error::Io(e.error))?;

        debug!(path = %self.path.display(), bytes = buf.len(), "Saved interaction log");
        Ok(())
    }

    /// Load, append one interaction, save.
    pub fn record(&self, interaction: &NewInteraction) -> Result<()> {
        self.record_at(interaction, Local::now())
    }

    pub fn record_at(&self, interaction: &NewInteraction, now: DateTime<Local>) -> Result<()> {
        let mut data = self.load();
        data.add_interaction(interaction, now);
        self.save(&data)?;

        info!(
            analysis = %interaction.analysis_type,
            users = data.users.len(),
            entries = data.history.len(),
            "Recorded interaction"
        );
        Ok(())
    }

    /// Prune `data` in place and persist it only if something was dropped.
    pub fn prune(&self, data: &mut StoreData, days_threshold: i64) -> Result<bool> {
        self.prune_at(data, days_threshold, Local::now())
    }

    pub fn prune_at(
        &self,
        data: &mut StoreData,
        days_threshold: i64,
        now: DateTime<Local>,
    ) -> Result<bool> {
        let before = data.history.len();
        let pruned = data.prune_history(now, days_threshold);

        if pruned {
            self.save(data)?;
            info!(
                removed = before - data.history.len(),
                days_threshold, "Pruned old interaction history"
            );
        } else {
            debug!(days_threshold, "No history entries old enough to prune");
        }
        Ok(pruned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::{HistoryItem, UserEntry, UserRecord};
    use crate::models::UserIdentity;
    use chrono::Duration;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> InteractionStore {
        InteractionStore::new(dir.path().join("app_data.json"))
    }

    fn interaction(email: &str) -> NewInteraction {
        NewInteraction {
            user: UserIdentity::new(Some("Riley".to_string()), Some(email.to_string())),
            analysis_type: "critique".to_string(),
            job_description: None,
            response: "Solid resume".to_string(),
        }
    }

    #[test]
    fn test_missing_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        assert!(store.try_load().unwrap().is_none());
        assert_eq!(store.load(), StoreData::default());
    }

    #[test]
    fn test_invalid_json_loads_empty() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        fs::write(store.path(), "not json{").unwrap();

        assert!(matches!(store.try_load(), Err(Error::CorruptStore(_))));
        assert_eq!(store.load(), StoreData::default());
    }

    #[test]
    fn test_wrong_shape_loads_empty() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        fs::write(store.path(), r#"{"foo": 1}"#).unwrap();

        assert!(matches!(store.try_load(), Err(Error::CorruptStore(_))));
        assert_eq!(store.load(), StoreData::default());

        fs::write(store.path(), "[1, 2, 3]").unwrap();
        assert_eq!(store.load(), StoreData::default());
    }

    #[test]
    fn test_save_then_load_preserves_contents() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let mut data = StoreData::default();
        data.add_interaction(&interaction("a@x.io"), Local::now());

        store.save(&data).unwrap();

        assert_eq!(store.load(), data);
    }

    #[test]
    fn test_save_uses_four_space_indent() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        store.save(&StoreData::default()).unwrap();

        let raw = fs::read_to_string(store.path()).unwrap();
        assert_eq!(raw, "{\n    \"users\": [],\n    \"history\": []\n}");
    }

    #[test]
    fn test_save_creates_missing_parent_directory() {
        let dir = TempDir::new().unwrap();
        let store = InteractionStore::new(dir.path().join("nested/deeper/log.json"));

        store.save(&StoreData::default()).unwrap();

        assert!(store.path().exists());
    }

    #[test]
    fn test_record_with_known_email_keeps_user_count() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store
            .save(&StoreData {
                users: vec![UserRecord {
                    name: Some("Riley".to_string()),
                    email: Some("riley@x.io".to_string()),
                }
                .into()],
                history: vec![],
            })
            .unwrap();

        store.record(&interaction("riley@x.io")).unwrap();

        let data = store.load();
        assert_eq!(data.users.len(), 1);
        assert_eq!(data.history.len(), 1);
    }

    #[test]
    fn test_record_into_corrupt_file_starts_fresh() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        fs::write(store.path(), "garbage").unwrap();

        store.record(&interaction("new@x.io")).unwrap();

        let data = store.load();
        assert_eq!(data.users.len(), 1);
        assert_eq!(data.history.len(), 1);
    }

    #[test]
    fn test_prune_persists_only_when_something_removed() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let now = Local::now();

        let mut data = StoreData::default();
        data.add_interaction(&interaction("a@x.io"), now - Duration::days(101));
        data.add_interaction(&interaction("a@x.io"), now - Duration::days(1));

        assert!(store.prune_at(&mut data, 100, now).unwrap());
        assert_eq!(data.history.len(), 1);
        assert_eq!(store.load().history.len(), 1);

        // Nothing left to prune: the file must not be rewritten.
        fs::write(store.path(), "sentinel").unwrap();
        assert!(!store.prune_at(&mut data, 100, now).unwrap());
        assert_eq!(fs::read_to_string(store.path()).unwrap(), "sentinel");
    }

    #[test]
    fn test_record_keeps_user_rows_and_history_with_odd_field_types() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let later = (Local::now() + Duration::days(30)).to_rfc3339();
        fs::write(
            store.path(),
            serde_json::to_string(&serde_json::json!({
                "users": [{ "name": "A", "email": 5 }],
                "history": [
                    { "timestamp": later, "analysis_type": "critique" },
                    { "timestamp": later, "analysis_type": null, "name": "A" }
                ]
            }))
            .unwrap(),
        )
        .unwrap();

        store.record(&interaction("new@x.io")).unwrap();

        let data = store.load();
        assert_eq!(data.users.len(), 2);
        assert_eq!(data.users[0], UserEntry::Other(serde_json::json!({ "name": "A", "email": 5 })));
        assert_eq!(data.history.len(), 3);
        assert!(matches!(data.history[1], HistoryItem::Loose(_)));
    }

    #[test]
    fn test_unknown_entries_survive_a_round_trip_until_pruned() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        fs::write(
            store.path(),
            r#"{"users": [], "history": ["odd", {"analysis_type": "grammar"}]}"#,
        )
        .unwrap();

        let mut data = store.load();
        assert_eq!(data.history.len(), 2);
        assert!(matches!(data.history[0], HistoryItem::Malformed(_)));

        store.prune(&mut data, 100).unwrap();
        assert_eq!(data.history.len(), 1);
    }
}
