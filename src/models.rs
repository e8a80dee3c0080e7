//! Data models and configuration
//!
//! Defines the multimodal content handed to the model, the caller identity
//! recorded in the interaction log, and the environment-sourced configuration.

use crate::{Error, Result};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_DB_FILE: &str = "app_data.json";
pub const DEFAULT_RETENTION_DAYS: i64 = 100;

/// One unit of multimodal input sent to the model.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentPart {
    Text(String),
    Image { mime_type: String, data: Vec<u8> },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Build an image part, sniffing the MIME type from the payload.
    pub fn image(data: Vec<u8>) -> Self {
        let mime_type = crate::ai::mime::detect_image_mime(&data).to_string();
        Self::Image { mime_type, data }
    }

    pub fn jpeg(data: Vec<u8>) -> Self {
        Self::Image {
            mime_type: "image/jpeg".to_string(),
            data,
        }
    }
}

/// Who asked for an analysis. Both fields are optional in the log.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserIdentity {
    pub name: Option<String>,
    pub email: Option<String>,
}

impl UserIdentity {
    pub fn new(name: Option<String>, email: Option<String>) -> Self {
        Self {
            name: name.filter(|n| !n.trim().is_empty()),
            email: email.filter(|e| !e.trim().is_empty()),
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }
}

// Configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub google_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_base_url: String,
    pub request_timeout: Duration,
    pub max_attempts: u32,
    pub poppler_path: Option<PathBuf>,
    pub wkhtmltopdf_path: Option<PathBuf>,
    pub db_file: PathBuf,
    pub admin_pass: Option<String>,
    pub history_retention_days: i64,
}

impl Config {
    /// The Gemini key. Only commands that call the model need it.
    pub fn api_key(&self) -> Result<&str> {
        self.google_api_key
            .as_deref()
            .ok_or_else(|| Error::Config("GOOGLE_API_KEY not set".to_string()))
    }

    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Ok(Self {
            google_api_key: get("GOOGLE_API_KEY"),
            gemini_model: get("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            gemini_base_url: get("GEMINI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            request_timeout: Duration::from_secs(parse_number(
                "GEMINI_TIMEOUT_SECS",
                get("GEMINI_TIMEOUT_SECS"),
                60,
            )?),
            max_attempts: parse_number("GEMINI_MAX_ATTEMPTS", get("GEMINI_MAX_ATTEMPTS"), 5)?,
            poppler_path: get("POPPLER_PATH").map(PathBuf::from),
            wkhtmltopdf_path: get("WKHTMLTOPDF_PATH").map(PathBuf::from),
            db_file: get("DB_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_FILE)),
            admin_pass: get("ADMIN_PASS"),
            history_retention_days: parse_number(
                "HISTORY_RETENTION_DAYS",
                get("HISTORY_RETENTION_DAYS"),
                DEFAULT_RETENTION_DAYS,
            )?,
        })
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: Option<String>, default: T) -> Result<T> {
    match raw {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("{} must be a number, got '{}'", key, value))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_config_defaults() {
        let config = Config::from_lookup(lookup_from(&[("GOOGLE_API_KEY", "k")])).unwrap();

        assert_eq!(config.api_key().unwrap(), "k");
        assert_eq!(config.gemini_model, DEFAULT_MODEL);
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.request_timeout, Duration::from_secs(60));
        assert_eq!(config.db_file, PathBuf::from("app_data.json"));
        assert_eq!(config.history_retention_days, 100);
        assert!(config.poppler_path.is_none());
        assert!(config.wkhtmltopdf_path.is_none());
        assert!(config.admin_pass.is_none());
    }

    #[test]
    fn test_config_loads_without_api_key() {
        let config = Config::from_lookup(lookup_from(&[("DB_FILE", "log.json")])).unwrap();

        assert!(config.google_api_key.is_none());
        assert_eq!(config.db_file, PathBuf::from("log.json"));
        let err = config.api_key().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("GOOGLE_API_KEY"));
    }

    #[test]
    fn test_config_blank_api_key_is_unset() {
        let config = Config::from_lookup(lookup_from(&[("GOOGLE_API_KEY", "  ")])).unwrap();
        assert!(matches!(config.api_key(), Err(Error::Config(_))));
    }

    #[test]
    fn test_config_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("GOOGLE_API_KEY", "k"),
            ("GEMINI_MODEL", "gemini-2.0-flash"),
            ("GEMINI_MAX_ATTEMPTS", "3"),
            ("WKHTMLTOPDF_PATH", "/usr/local/bin/wkhtmltopdf"),
            ("DB_FILE", "/var/lib/resumeflow/data.json"),
            ("HISTORY_RETENTION_DAYS", "30"),
        ]))
        .unwrap();

        assert_eq!(config.gemini_model, "gemini-2.0-flash");
        assert_eq!(config.max_attempts, 3);
        assert_eq!(
            config.wkhtmltopdf_path,
            Some(PathBuf::from("/usr/local/bin/wkhtmltopdf"))
        );
        assert_eq!(config.history_retention_days, 30);
    }

    #[test]
    fn test_config_rejects_non_numeric_attempts() {
        let err = Config::from_lookup(lookup_from(&[
            ("GOOGLE_API_KEY", "k"),
            ("GEMINI_MAX_ATTEMPTS", "lots"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("GEMINI_MAX_ATTEMPTS"));
    }

    #[test]
    fn test_user_identity_drops_blank_fields() {
        let user = UserIdentity::new(Some("Ada".to_string()), Some(" ".to_string()));
        assert_eq!(user.name.as_deref(), Some("Ada"));
        assert!(user.email.is_none());
    }

    #[test]
    fn test_content_part_image_sniffs_mime() {
        match ContentPart::image(vec![0xFF, 0xD8, 0xFF, 0xE0]) {
            ContentPart::Image { mime_type, .. } => assert_eq!(mime_type, "image/jpeg"),
            other => panic!("unexpected part: {:?}", other),
        }
    }
}
