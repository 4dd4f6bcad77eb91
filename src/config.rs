use crate::i18n::LanguageCode;
use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct Config {
    // Storage
    pub database_path: String,

    // HTTP surface
    pub port: u16,
    pub api_key: Option<String>,

    // Notifications
    pub notify_webhook_url: Option<String>,

    // Scheduled sync jobs
    pub schedule_times: Vec<String>,
    pub sync_pairs: Vec<(LanguageCode, LanguageCode)>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            // Storage
            database_path: std::env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "data/entities.db".to_string()),

            // HTTP surface
            port: std::env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8080),
            api_key: std::env::var("API_KEY").ok().filter(|v| !v.is_empty()),

            // Notifications
            notify_webhook_url: std::env::var("NOTIFY_WEBHOOK_URL")
                .ok()
                .filter(|v| !v.is_empty()),

            // Scheduled sync jobs
            schedule_times: std::env::var("SCHEDULE_TIMES")
                .ok()
                .map(|v| parse_list(&v))
                .unwrap_or_default(),
            sync_pairs: std::env::var("SYNC_LANGUAGE_PAIRS")
                .ok()
                .map(|v| parse_sync_pairs(&v))
                .transpose()
                .context("Invalid SYNC_LANGUAGE_PAIRS")?
                .unwrap_or_default(),
        })
    }
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Parse `"en:fr,en:de"` into language pairs.
fn parse_sync_pairs(value: &str) -> Result<Vec<(LanguageCode, LanguageCode)>> {
    parse_list(value)
        .into_iter()
        .map(|pair| {
            let (from, to) = pair
                .split_once(':')
                .with_context(|| format!("Expected from:to, got '{pair}'"))?;
            if from.is_empty() || to.is_empty() {
                anyhow::bail!("Expected from:to, got '{pair}'");
            }
            Ok((LanguageCode::new(from), LanguageCode::new(to)))
        })
        .collect()
}
