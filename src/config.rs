//! Runtime settings.
//!
//! Each value comes from the first source that has it: an explicit
//! override (CLI flag), the environment, the persisted `app_config` table,
//! then the built-in default.

use crate::error::{Error, Result};
use crate::ingest::{DEFAULT_API_URL, DEFAULT_PAGE_SIZE};
use crate::storage::Database;

pub const ENV_API_KEY: &str = "LINEAR_API_KEY";
pub const ENV_API_URL: &str = "LINEARFLOW_API_URL";
pub const ENV_PAGE_SIZE: &str = "LINEARFLOW_PAGE_SIZE";

/// `app_config` keys that feed [`Settings`].
pub const CONFIG_KEYS: &[&str] = &["api_url", "page_size", "default_team"];

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub api_key: Option<String>,
    pub api_url: String,
    pub page_size: u32,
    pub cache_enabled: bool,
    pub default_team: Option<String>,
}

/// Values given explicitly on the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub api_key: Option<String>,
    pub api_url: Option<String>,
    pub page_size: Option<u32>,
    pub cache_enabled: Option<bool>,
    pub default_team: Option<String>,
}

impl Settings {
    /// Resolve against the process environment.
    pub async fn load(db: &Database, overrides: &Overrides) -> Result<Self> {
        Self::resolve(db, overrides, |name| std::env::var(name).ok()).await
    }

    pub async fn resolve(
        db: &Database,
        overrides: &Overrides,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let env = |name: &str| env(name).filter(|v| !v.trim().is_empty());

        let api_url = match overrides.api_url.clone().or_else(|| env(ENV_API_URL)) {
            Some(url) => url,
            None => db
                .config_get("api_url")
                .await?
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
        };

        let page_size = match overrides.page_size {
            Some(n) => n,
            None => match env(ENV_PAGE_SIZE) {
                Some(raw) => parse_page_size(ENV_PAGE_SIZE, &raw)?,
                None => match db.config_get("page_size").await? {
                    Some(raw) => parse_page_size("page_size", &raw)?,
                    None => DEFAULT_PAGE_SIZE,
                },
            },
        };

        let default_team = match overrides.default_team.clone() {
            Some(team) => Some(team),
            None => db.config_get("default_team").await?,
        };

        Ok(Self {
            api_key: overrides.api_key.clone().or_else(|| env(ENV_API_KEY)),
            api_url,
            page_size,
            cache_enabled: overrides.cache_enabled.unwrap_or(true),
            default_team,
        })
    }

    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| Error::Config(format!("{ENV_API_KEY} is not set")))
    }
}

/// Reject values `config set` would persist but [`Settings::resolve`]
/// could not read back.
pub fn validate_entry(key: &str, value: &str) -> Result<()> {
    if key == "page_size" {
        parse_page_size(key, value)?;
    }
    Ok(())
}

fn parse_page_size(source: &str, raw: &str) -> Result<u32> {
    match raw.trim().parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(Error::Config(format!(
            "{source} must be a positive integer, got '{raw}'"
        ))),
    }
}
