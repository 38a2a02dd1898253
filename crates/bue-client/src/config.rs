use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

pub struct Config {
    pub db_path: PathBuf,
    pub database_url: Option<String>,
    pub storage_bucket: Option<String>,
    pub auth_token: Option<String>,
    pub uid: Option<String>,
    pub http_timeout: Duration,
    pub offline: bool,
}

impl Config {
    /// Reads `BUE_*` variables. Call after `dotenvy::dotenv()`.
    pub fn from_env() -> Result<Self> {
        let db_path = std::env::var("BUE_DB_PATH").unwrap_or_else(|_| "bue_events.db".into());
        let http_timeout: u64 = std::env::var("BUE_HTTP_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .context("BUE_HTTP_TIMEOUT_SECS must be a whole number of seconds")?;
        let offline = std::env::var("BUE_OFFLINE")
            .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Ok(Self {
            db_path: PathBuf::from(db_path),
            database_url: non_empty("BUE_DATABASE_URL"),
            storage_bucket: non_empty("BUE_STORAGE_BUCKET"),
            auth_token: non_empty("BUE_AUTH_TOKEN"),
            uid: non_empty("BUE_UID"),
            http_timeout: Duration::from_secs(http_timeout),
            offline,
        })
    }

    /// Both backend coordinates, or an error naming what is missing.
    pub fn backend(&self) -> Result<(&str, &str)> {
        let url = self
            .database_url
            .as_deref()
            .context("BUE_DATABASE_URL is not set")?;
        let bucket = self
            .storage_bucket
            .as_deref()
            .context("BUE_STORAGE_BUCKET is not set")?;
        Ok((url, bucket))
    }
}

fn non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
