//! Interaction log
//!
//! A flat JSON file with two collections: `users`, deduplicated by email, and
//! `history`, one excerpted entry per analysis in insertion order. Loading
//! never fails outward: a missing, unparsable or oddly shaped file yields an
//! empty log. Writes are serialized through [`HistoryWriter`].

pub mod store;
pub mod writer;

pub use store::InteractionStore;
pub use writer::{HistoryHandle, HistoryWriter};

use crate::models::UserIdentity;
use chrono::{DateTime, Local, NaiveDateTime, SecondsFormat};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

pub const JOB_DESCRIPTION_EXCERPT_CHARS: usize = 200;
pub const RESPONSE_EXCERPT_CHARS: usize = 500;
const ELLIPSIS: &str = "...";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreData {
    pub users: Vec<UserEntry>,
    pub history: Vec<HistoryItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// A user row as found on disk. Rows whose fields have unexpected types are
/// kept verbatim as `Other`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserEntry {
    Known(UserRecord),
    Other(serde_json::Value),
}

impl UserEntry {
    pub fn email(&self) -> Option<&str> {
        match self {
            Self::Known(user) => user.email.as_deref(),
            Self::Other(value) => value.get("email").and_then(|e| e.as_str()),
        }
    }
}

impl From<UserRecord> for UserEntry {
    fn from(user: UserRecord) -> Self {
        Self::Known(user)
    }
}

/// A history slot as found on disk.
///
/// Objects that match the record layout are `Record`. Other objects are kept
/// verbatim as `Loose` and still age out by their `timestamp`. Only non-object
/// values are `Malformed`, and the next prune drops them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HistoryItem {
    Record(InteractionRecord),
    Loose(serde_json::Map<String, serde_json::Value>),
    Malformed(serde_json::Value),
}

impl HistoryItem {
    pub fn timestamp(&self) -> Option<&str> {
        match self {
            Self::Record(record) => record.timestamp.as_deref(),
            Self::Loose(fields) => fields.get("timestamp").and_then(|t| t.as_str()),
            Self::Malformed(_) => None,
        }
    }

    pub fn analysis_type(&self) -> Option<&str> {
        match self {
            Self::Record(record) => Some(record.analysis_type.as_str()),
            Self::Loose(fields) => fields.get("analysis_type").and_then(|t| t.as_str()),
            Self::Malformed(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub analysis_type: String,
    #[serde(default)]
    pub job_description_excerpt: Option<String>,
    #[serde(default)]
    pub ai_response_excerpt: Option<String>,
}

/// One analysis to append to the log.
#[derive(Debug, Clone)]
pub struct NewInteraction {
    pub user: UserIdentity,
    pub analysis_type: String,
    pub job_description: Option<String>,
    pub response: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogSummary {
    pub unique_users: usize,
    pub total_interactions: usize,
    pub by_analysis: BTreeMap<String, usize>,
}

/// First `max_chars` characters of `text`, with `...` appended when cut.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}{}", &text[..cut], ELLIPSIS),
        None => text.to_string(),
    }
}

/// Parse RFC 3339 timestamps, and the naive local form older logs contain.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Local>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Local));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .and_then(|naive| naive.and_local_timezone(Local).earliest())
}

impl StoreData {
    pub fn has_user(&self, email: &str) -> bool {
        self.users.iter().any(|u| u.email() == Some(email))
    }

    /// Append one history entry, registering the user on first sight.
    pub fn add_interaction(&mut self, interaction: &NewInteraction, now: DateTime<Local>) {
        let user = &interaction.user;

        if let Some(email) = user.email.as_deref() {
            if !self.has_user(email) {
                self.users.push(
                    UserRecord {
                        name: user.name.clone(),
                        email: Some(email.to_string()),
                    }
                    .into(),
                );
            }
        }

        self.history.push(HistoryItem::Record(InteractionRecord {
            timestamp: Some(now.to_rfc3339_opts(SecondsFormat::Micros, false)),
            name: user.name.clone(),
            email: user.email.clone(),
            analysis_type: interaction.analysis_type.clone(),
            job_description_excerpt: interaction
                .job_description
                .as_deref()
                .map(|jd| excerpt(jd, JOB_DESCRIPTION_EXCERPT_CHARS)),
            ai_response_excerpt: Some(excerpt(&interaction.response, RESPONSE_EXCERPT_CHARS)),
        }));
    }

    /// Drop history older than `days_threshold` whole days, plus entries that
    /// are not JSON objects. Returns whether anything was removed.
    pub fn prune_history(&mut self, now: DateTime<Local>, days_threshold: i64) -> bool {
        let mut pruned = false;

        self.history.retain(|item| {
            if let HistoryItem::Malformed(value) = item {
                warn!("Dropping malformed history entry (not a record): {}", value);
                pruned = true;
                return false;
            }
            let Some(raw) = item.timestamp() else {
                warn!("Keeping history entry with missing timestamp");
                return true;
            };
            match parse_timestamp(raw) {
                Some(at) if (now - at).num_days() > days_threshold => {
                    pruned = true;
                    false
                }
                Some(_) => true,
                None => {
                    warn!("Keeping history entry with unparsable timestamp: {}", raw);
                    true
                }
            }
        });

        pruned
    }

    pub fn summary(&self) -> LogSummary {
        let mut by_analysis = BTreeMap::new();
        for analysis in self.history.iter().filter_map(HistoryItem::analysis_type) {
            *by_analysis.entry(analysis.to_string()).or_insert(0) += 1;
        }

        LogSummary {
            unique_users: self.users.len(),
            total_interactions: self.history.len(),
            by_analysis,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use pretty_assertions::assert_eq;

    fn interaction(email: Option<&str>, analysis: &str) -> NewInteraction {
        NewInteraction {
            user: UserIdentity::new(Some("Sam".to_string()), email.map(str::to_string)),
            analysis_type: analysis.to_string(),
            job_description: Some("Backend engineer".to_string()),
            response: "Looks good".to_string(),
        }
    }

    fn record_at(timestamp: Option<String>) -> HistoryItem {
        HistoryItem::Record(InteractionRecord {
            timestamp,
            name: None,
            email: None,
            analysis_type: "critique".to_string(),
            job_description_excerpt: None,
            ai_response_excerpt: None,
        })
    }

    #[test]
    fn test_excerpt_truncates_to_limit_plus_ellipsis() {
        let long = "x".repeat(1000);
        let cut = excerpt(&long, JOB_DESCRIPTION_EXCERPT_CHARS);
        assert_eq!(cut.chars().count(), 203);
        assert!(cut.ends_with("..."));
        assert_eq!(excerpt("short", 200), "short");
        assert_eq!(excerpt(&"y".repeat(200), 200), "y".repeat(200));
    }

    #[test]
    fn test_excerpt_counts_characters_not_bytes() {
        let text = "é".repeat(600);
        let cut = excerpt(&text, RESPONSE_EXCERPT_CHARS);
        assert_eq!(cut.chars().count(), 503);
    }

    #[test]
    fn test_known_email_adds_history_but_not_user() {
        let mut data = StoreData::default();
        let now = Local::now();

        data.add_interaction(&interaction(Some("sam@example.com"), "critique"), now);
        data.add_interaction(&interaction(Some("sam@example.com"), "grammar"), now);

        assert_eq!(data.users.len(), 1);
        assert_eq!(data.history.len(), 2);
    }

    #[test]
    fn test_anonymous_interaction_registers_no_user() {
        let mut data = StoreData::default();
        data.add_interaction(&interaction(None, "branding"), Local::now());

        assert!(data.users.is_empty());
        assert_eq!(data.history.len(), 1);
    }

    #[test]
    fn test_interaction_excerpts_long_fields() {
        let mut data = StoreData::default();
        let mut long = interaction(Some("a@b.c"), "optimize");
        long.job_description = Some("j".repeat(1000));
        long.response = "r".repeat(1000);

        data.add_interaction(&long, Local::now());

        let HistoryItem::Record(record) = &data.history[0] else {
            panic!("expected a record");
        };
        assert_eq!(record.job_description_excerpt.as_ref().unwrap().len(), 203);
        assert_eq!(record.ai_response_excerpt.as_ref().unwrap().len(), 503);
        assert!(parse_timestamp(record.timestamp.as_ref().unwrap()).is_some());
    }

    #[test]
    fn test_prune_drops_only_entries_past_threshold() {
        let now = Local::now();
        let old = (now - Duration::days(101)).to_rfc3339();
        let fresh = (now - Duration::days(1)).to_rfc3339();
        let mut data = StoreData {
            users: vec![],
            history: vec![record_at(Some(old)), record_at(Some(fresh.clone()))],
        };

        assert!(data.prune_history(now, 100));
        assert_eq!(data.history, vec![record_at(Some(fresh))]);
    }

    #[test]
    fn test_prune_reports_nothing_when_all_recent() {
        let now = Local::now();
        let mut data = StoreData {
            users: vec![],
            history: vec![
                record_at(Some((now - Duration::days(100)).to_rfc3339())),
                record_at(Some(now.to_rfc3339())),
            ],
        };

        assert!(!data.prune_history(now, 100));
        assert_eq!(data.history.len(), 2);
    }

    #[test]
    fn test_prune_keeps_missing_and_unparsable_timestamps() {
        let now = Local::now();
        let mut data = StoreData {
            users: vec![],
            history: vec![record_at(None), record_at(Some("last tuesday".to_string()))],
        };

        assert!(!data.prune_history(now, 100));
        assert_eq!(data.history.len(), 2);
    }

    #[test]
    fn test_prune_drops_malformed_entries() {
        let now = Local::now();
        let mut data = StoreData {
            users: vec![],
            history: vec![
                HistoryItem::Malformed(serde_json::json!("not a record")),
                record_at(Some(now.to_rfc3339())),
            ],
        };

        assert!(data.prune_history(now, 100));
        assert_eq!(data.history.len(), 1);
    }

    #[test]
    fn test_naive_timestamps_from_older_logs_parse() {
        assert!(parse_timestamp("2024-03-01T09:15:30.123456").is_some());
        assert!(parse_timestamp("2024-03-01T09:15:30").is_some());
        assert!(parse_timestamp("2024-03-01").is_none());
    }

    #[test]
    fn test_history_items_deserialize_leniently() {
        let data: StoreData = serde_json::from_value(serde_json::json!({
            "users": [{ "name": "A", "email": "a@x.io" }],
            "history": [
                { "timestamp": "2024-03-01T09:15:30", "analysis_type": "grammar" },
                42,
                { "timestamp": 7 },
                "oops"
            ]
        }))
        .unwrap();

        assert!(matches!(data.history[0], HistoryItem::Record(_)));
        assert!(matches!(data.history[1], HistoryItem::Malformed(_)));
        assert!(matches!(data.history[2], HistoryItem::Loose(_)));
        assert!(matches!(data.history[3], HistoryItem::Malformed(_)));
    }

    #[test]
    fn test_user_rows_with_odd_types_are_kept() {
        let mut data: StoreData = serde_json::from_value(serde_json::json!({
            "users": [{ "name": "A", "email": 5 }, { "name": null, "email": "b@x.io" }],
            "history": []
        }))
        .unwrap();

        assert!(matches!(data.users[0], UserEntry::Other(_)));
        assert!(data.has_user("b@x.io"));

        data.add_interaction(&interaction(Some("b@x.io"), "critique"), Local::now());
        assert_eq!(data.users.len(), 2);
    }

    #[test]
    fn test_prune_keeps_recent_object_with_null_field() {
        let now = Local::now();
        let mut data: StoreData = serde_json::from_value(serde_json::json!({
            "users": [],
            "history": [
                { "timestamp": now.to_rfc3339(), "analysis_type": null, "name": "A" },
                { "timestamp": (now - Duration::days(150)).to_rfc3339(), "analysis_type": null }
            ]
        }))
        .unwrap();

        assert!(matches!(data.history[0], HistoryItem::Loose(_)));
        assert!(data.prune_history(now, 100));
        assert_eq!(data.history.len(), 1);
        assert_eq!(
            data.history[0],
            HistoryItem::Loose(
                serde_json::json!({ "timestamp": now.to_rfc3339(), "analysis_type": null, "name": "A" })
                    .as_object()
                    .unwrap()
                    .clone()
            )
        );
    }

    #[test]
    fn test_empty_job_description_is_stored_as_empty_excerpt() {
        let mut data = StoreData::default();
        let mut blank = interaction(None, "critique");
        blank.job_description = Some(String::new());

        data.add_interaction(&blank, Local::now());

        let HistoryItem::Record(record) = &data.history[0] else {
            panic!("expected a record");
        };
        assert_eq!(record.job_description_excerpt.as_deref(), Some(""));
    }

    #[test]
    fn test_summary_counts_by_analysis() {
        let mut data = StoreData::default();
        let now = Local::now();
        data.add_interaction(&interaction(Some("a@x.io"), "critique"), now);
        data.add_interaction(&interaction(Some("b@x.io"), "critique"), now);
        data.add_interaction(&interaction(None, "grammar"), now);
        data.history.push(HistoryItem::Loose(
            serde_json::json!({ "analysis_type": "grammar" })
                .as_object()
                .unwrap()
                .clone(),
        ));

        let summary = data.summary();
        assert_eq!(summary.unique_users, 2);
        assert_eq!(summary.total_interactions, 4);
        assert_eq!(summary.by_analysis.get("critique"), Some(&2));
        assert_eq!(summary.by_analysis.get("grammar"), Some(&2));
    }
}
