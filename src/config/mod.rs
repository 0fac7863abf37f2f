use std::env;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(&'static str),
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
    #[error("failed to load env file: {0}")]
    EnvFile(#[from] dotenv::Error),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub football_api_key: Option<String>,
    pub bookmaker_id: u32,
    pub max_fixtures: usize,
    pub telegram_bot_token: Option<String>,
    pub telegram_channel_id: Option<String>,
    pub default_chat_id: Option<String>,
    pub owner_id: Option<i64>,
    pub allowed_ids: Vec<i64>,
    pub competitions_path: PathBuf,
    pub cache_dir: PathBuf,
    pub forebet_enabled: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            football_api_key: None,
            bookmaker_id: 6,
            max_fixtures: 120,
            telegram_bot_token: None,
            telegram_channel_id: None,
            default_chat_id: None,
            owner_id: None,
            allowed_ids: Vec::new(),
            competitions_path: PathBuf::from("shared/competitions.json"),
            cache_dir: PathBuf::from(".oddsbot_cache"),
            forebet_enabled: true,
        }
    }
}

impl Settings {
    /// Load `.env` (or the given file) and read settings from the process environment.
    pub fn load(env_file: Option<&std::path::Path>) -> Result<Self, ConfigError> {
        match env_file {
            Some(path) => dotenv::from_path(path)?,
            None => {
                dotenv::dotenv().ok();
            }
        }
        Self::from_env()
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|value| value.trim().to_string()).filter(|value| !value.is_empty());
        let defaults = Self::default();

        let owner_id = get("TELEGRAM_OWNER_ID")
            .map(|value| parse_value("TELEGRAM_OWNER_ID", &value))
            .transpose()?;

        let mut allowed_ids = Vec::new();
        if let Some(raw) = get("TELEGRAM_ALLOWED_IDS") {
            for part in raw.split(',').map(str::trim).filter(|part| !part.is_empty()) {
                allowed_ids.push(parse_value("TELEGRAM_ALLOWED_IDS", part)?);
            }
        }
        if let Some(owner) = owner_id {
            if !allowed_ids.contains(&owner) {
                allowed_ids.push(owner);
            }
        }

        let forebet_enabled = match get("FOREBET_ENABLED").as_deref() {
            None => defaults.forebet_enabled,
            Some(value) => parse_flag("FOREBET_ENABLED", value)?,
        };

        Ok(Self {
            football_api_key: get("FOOTBALL_API_KEY"),
            bookmaker_id: get("FOOTBALL_API_BOOKMAKER")
                .map(|value| parse_value("FOOTBALL_API_BOOKMAKER", &value))
                .transpose()?
                .unwrap_or(defaults.bookmaker_id),
            max_fixtures: get("FOOTBALL_MAX_FIXTURES")
                .map(|value| parse_value("FOOTBALL_MAX_FIXTURES", &value))
                .transpose()?
                .unwrap_or(defaults.max_fixtures),
            telegram_bot_token: get("TELEGRAM_BOT_TOKEN"),
            telegram_channel_id: get("TELEGRAM_CHANNEL_ID"),
            default_chat_id: get("TELEGRAM_DEFAULT_CHAT_ID"),
            owner_id,
            allowed_ids,
            competitions_path: get("COMPETITIONS_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.competitions_path),
            cache_dir: get("CACHE_DIR").map(PathBuf::from).unwrap_or(defaults.cache_dir),
            forebet_enabled,
        })
    }

    pub fn require_football_key(&self) -> Result<&str, ConfigError> {
        self.football_api_key
            .as_deref()
            .ok_or(ConfigError::Missing("FOOTBALL_API_KEY"))
    }

    pub fn require_telegram_token(&self) -> Result<&str, ConfigError> {
        self.telegram_bot_token
            .as_deref()
            .ok_or(ConfigError::Missing("TELEGRAM_BOT_TOKEN"))
    }
}

fn parse_value<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::Invalid {
        key,
        value: value.to_string(),
    })
}

fn parse_flag(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings_from(pairs: &[(&str, &str)]) -> Result<Settings, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        Settings::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let settings = settings_from(&[]).unwrap();
        assert_eq!(settings.bookmaker_id, 6);
        assert_eq!(settings.max_fixtures, 120);
        assert!(settings.forebet_enabled);
        assert_eq!(settings.competitions_path, PathBuf::from("shared/competitions.json"));
        assert!(matches!(
            settings.require_football_key(),
            Err(ConfigError::Missing("FOOTBALL_API_KEY"))
        ));
    }

    #[test]
    fn test_allow_list_includes_owner() {
        let settings = settings_from(&[
            ("FOOTBALL_API_KEY", "secret"),
            ("TELEGRAM_OWNER_ID", "42"),
            ("TELEGRAM_ALLOWED_IDS", "7, 9,,42"),
            ("FOREBET_ENABLED", "off"),
        ])
        .unwrap();
        assert_eq!(settings.require_football_key().unwrap(), "secret");
        assert_eq!(settings.allowed_ids, vec![7, 9, 42]);
        assert!(!settings.forebet_enabled);
    }

    #[test]
    fn test_invalid_numbers_are_rejected() {
        let err = settings_from(&[("FOOTBALL_MAX_FIXTURES", "lots")]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                key: "FOOTBALL_MAX_FIXTURES",
                ..
            }
        ));
        assert!(settings_from(&[("TELEGRAM_ALLOWED_IDS", "1,abc")]).is_err());
    }
}
