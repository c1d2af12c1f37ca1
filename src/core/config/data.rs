use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::controller::ControllerOptions;
use crate::core::session::HistoryLayout;
use crate::utils::url::normalize_base_url;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5000";
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const BASE_URL_ENV_VAR: &str = "TOK_BASE_URL";

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct Config {
    /// Root URL of the chat backend
    pub base_url: Option<String>,
    /// Start new chats with retrieval over uploaded documents enabled
    pub use_query_engine: Option<bool>,
    /// Row 0 of a stored session is a `{ title, date }` header, not an exchange
    pub history_header_row: Option<bool>,
    pub connect_timeout_secs: Option<u64>,
}

/// Keys accepted by `tok set` / `tok unset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    BaseUrl,
    UseQueryEngine,
    HistoryHeaderRow,
    ConnectTimeoutSecs,
}

impl ConfigKey {
    pub const ALL: [ConfigKey; 4] = [
        ConfigKey::BaseUrl,
        ConfigKey::UseQueryEngine,
        ConfigKey::HistoryHeaderRow,
        ConfigKey::ConnectTimeoutSecs,
    ];

    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL.into_iter().find(|key| key.as_str() == normalized)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ConfigKey::BaseUrl => "base-url",
            ConfigKey::UseQueryEngine => "use-query-engine",
            ConfigKey::HistoryHeaderRow => "history-header-row",
            ConfigKey::ConnectTimeoutSecs => "connect-timeout-secs",
        }
    }
}

/// Why a `tok set` value was refused.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum InvalidValue {
    #[error("expected on/off, true/false or yes/no, got '{0}'")]
    Bool(String),
    #[error("expected a whole number of seconds, got '{0}'")]
    Seconds(String),
    #[error("base URL must start with http:// or https://, got '{0}'")]
    Url(String),
}

fn parse_bool(raw: &str) -> Result<bool, InvalidValue> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "on" | "true" | "yes" | "1" => Ok(true),
        "off" | "false" | "no" | "0" => Ok(false),
        _ => Err(InvalidValue::Bool(raw.to_string())),
    }
}

/// Get a user-friendly display string for a path, using `~` for the home
/// directory on Unix-like systems.
pub fn path_display<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();

    #[cfg(unix)]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let home_path = PathBuf::from(home);
            if let Ok(relative) = path.strip_prefix(&home_path) {
                return format!("~/{}", relative.display());
            }
        }
    }

    path.display().to_string()
}

impl Config {
    pub fn set(&mut self, key: ConfigKey, raw: &str) -> Result<(), InvalidValue> {
        match key {
            ConfigKey::BaseUrl => {
                let url = raw.trim();
                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    return Err(InvalidValue::Url(raw.to_string()));
                }
                self.base_url = Some(normalize_base_url(url));
            }
            ConfigKey::UseQueryEngine => self.use_query_engine = Some(parse_bool(raw)?),
            ConfigKey::HistoryHeaderRow => self.history_header_row = Some(parse_bool(raw)?),
            ConfigKey::ConnectTimeoutSecs => {
                let secs = raw
                    .trim()
                    .parse::<u64>()
                    .map_err(|_| InvalidValue::Seconds(raw.to_string()))?;
                self.connect_timeout_secs = Some(secs);
            }
        }
        Ok(())
    }

    pub fn unset(&mut self, key: ConfigKey) {
        match key {
            ConfigKey::BaseUrl => self.base_url = None,
            ConfigKey::UseQueryEngine => self.use_query_engine = None,
            ConfigKey::HistoryHeaderRow => self.history_header_row = None,
            ConfigKey::ConnectTimeoutSecs => self.connect_timeout_secs = None,
        }
    }

    /// Backend URL, by precedence: command-line flag, `TOK_BASE_URL`, this
    /// file, built-in default.
    pub fn resolve_base_url(&self, flag: Option<&str>, env: Option<&str>) -> String {
        let chosen = [flag, env, self.base_url.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|url| !url.is_empty())
            .unwrap_or(DEFAULT_BASE_URL);
        normalize_base_url(chosen)
    }

    pub fn base_url_from_env(&self, flag: Option<&str>) -> String {
        let env = std::env::var(BASE_URL_ENV_VAR).ok();
        self.resolve_base_url(flag, env.as_deref())
    }

    pub fn use_query_engine(&self) -> bool {
        self.use_query_engine.unwrap_or(false)
    }

    pub fn history_layout(&self) -> HistoryLayout {
        HistoryLayout::from_header_flag(self.history_header_row.unwrap_or(true))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(
            self.connect_timeout_secs
                .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS),
        )
    }

    pub fn controller_options(&self) -> ControllerOptions {
        ControllerOptions {
            history_layout: self.history_layout(),
        }
    }
}
