use std::{path::PathBuf, str::FromStr, time::Duration};

use crate::error::{config::ConfigError, AppError};

const DEFAULT_PANEL_SYNC_CRON: &str = "0 * * * * *";
const DEFAULT_EXPIRATION_CRON: &str = "30 */5 * * * *";
const DEFAULT_TEAMSPEAK_CRON: &str = "*/30 * * * * *";
const DEFAULT_RPC_TIMEOUT_SECS: u64 = 10;
const DEFAULT_BOT_LOG_DIR: &str = "logs/bots";

/// Address and token of the rank-system panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankPanelConfig {
    pub host: String,
    pub token: String,
}

/// TeamSpeak WebQuery endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebQueryConfig {
    pub url: String,
    pub api_key: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,

    /// `None` disables the rank-system family.
    pub rank_panel: Option<RankPanelConfig>,

    pub panel_sync_cron: String,
    pub expiration_cron: String,
    pub teamspeak_cron: String,

    /// `None` disables the TeamSpeak job.
    pub teamspeak_webquery: Option<WebQueryConfig>,

    /// Timeout of one panel or WebQuery call.
    pub rpc_timeout: Duration,
    pub bot_log_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        Ok(Self::from_lookup(|name| std::env::var(name).ok())?)
    }

    /// Builds the configuration from any variable source.
    ///
    /// Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let database_url =
            var("DATABASE_URL").ok_or_else(|| ConfigError::MissingEnvVar("DATABASE_URL".to_string()))?;

        let rank_panel = pair(&var, "RANK_PANEL_HOST", "RANK_PANEL_TOKEN")?
            .map(|(host, token)| RankPanelConfig { host, token });
        let teamspeak_webquery = pair(&var, "TEAMSPEAK_WEBQUERY_URL", "TEAMSPEAK_WEBQUERY_KEY")?
            .map(|(url, api_key)| WebQueryConfig { url, api_key });

        let rpc_timeout_secs: u64 =
            parse_or(&var, "PANEL_RPC_TIMEOUT_SECS", DEFAULT_RPC_TIMEOUT_SECS)?;
        if rpc_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                name: "PANEL_RPC_TIMEOUT_SECS".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(Self {
            database_url,
            rank_panel,
            panel_sync_cron: var("PANEL_SYNC_CRON")
                .unwrap_or_else(|| DEFAULT_PANEL_SYNC_CRON.to_string()),
            expiration_cron: var("EXPIRATION_CRON")
                .unwrap_or_else(|| DEFAULT_EXPIRATION_CRON.to_string()),
            teamspeak_cron: var("TEAMSPEAK_CRON")
                .unwrap_or_else(|| DEFAULT_TEAMSPEAK_CRON.to_string()),
            teamspeak_webquery,
            rpc_timeout: Duration::from_secs(rpc_timeout_secs),
            bot_log_dir: var("BOT_LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_BOT_LOG_DIR)),
        })
    }
}

/// Two variables that must be set together.
fn pair<F>(var: &F, first: &str, second: &str) -> Result<Option<(String, String)>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match (var(first), var(second)) {
        (Some(a), Some(b)) => Ok(Some((a, b))),
        (None, None) => Ok(None),
        (Some(_), None) => Err(ConfigError::IncompletePair {
            set: first.to_string(),
            missing: second.to_string(),
        }),
        (None, Some(_)) => Err(ConfigError::IncompletePair {
            set: second.to_string(),
            missing: first.to_string(),
        }),
    }
}

fn parse_or<F, T>(var: &F, name: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match var(name) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            name: name.to_string(),
            reason: e.to_string(),
            value,
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn applies_defaults() {
        let config = load(&[("DATABASE_URL", "sqlite::memory:")]).unwrap();

        assert_eq!(config.rank_panel, None);
        assert_eq!(config.teamspeak_webquery, None);
        assert_eq!(config.panel_sync_cron, DEFAULT_PANEL_SYNC_CRON);
        assert_eq!(config.expiration_cron, DEFAULT_EXPIRATION_CRON);
        assert_eq!(config.teamspeak_cron, DEFAULT_TEAMSPEAK_CRON);
        assert_eq!(config.rpc_timeout, Duration::from_secs(10));
        assert_eq!(config.bot_log_dir, PathBuf::from("logs/bots"));
    }

    #[test]
    fn requires_database_url() {
        let err = load(&[("DATABASE_URL", "  ")]).unwrap_err();

        assert!(matches!(err, ConfigError::MissingEnvVar(name) if name == "DATABASE_URL"));
    }

    #[test]
    fn reads_optional_pairs() {
        let config = load(&[
            ("DATABASE_URL", "sqlite::memory:"),
            ("RANK_PANEL_HOST", "wss://rank.example.net"),
            ("RANK_PANEL_TOKEN", "secret"),
            ("TEAMSPEAK_WEBQUERY_URL", "http://127.0.0.1:10080"),
            ("TEAMSPEAK_WEBQUERY_KEY", "key"),
            ("PANEL_RPC_TIMEOUT_SECS", "3"),
        ])
        .unwrap();

        assert_eq!(
            config.rank_panel,
            Some(RankPanelConfig {
                host: "wss://rank.example.net".to_string(),
                token: "secret".to_string(),
            })
        );
        assert_eq!(config.teamspeak_webquery.unwrap().api_key, "key");
        assert_eq!(config.rpc_timeout, Duration::from_secs(3));
    }

    #[test]
    fn rejects_half_pairs() {
        let err = load(&[
            ("DATABASE_URL", "sqlite::memory:"),
            ("TEAMSPEAK_WEBQUERY_KEY", "key"),
        ])
        .unwrap_err();

        assert!(matches!(
            err,
            ConfigError::IncompletePair { set, missing }
                if set == "TEAMSPEAK_WEBQUERY_KEY" && missing == "TEAMSPEAK_WEBQUERY_URL"
        ));
    }

    #[test]
    fn rejects_bad_timeouts() {
        for value in ["soon", "0", "-4"] {
            let err = load(&[
                ("DATABASE_URL", "sqlite::memory:"),
                ("PANEL_RPC_TIMEOUT_SECS", value),
            ])
            .unwrap_err();

            assert!(matches!(err, ConfigError::InvalidValue { .. }), "{}", value);
        }
    }
}
