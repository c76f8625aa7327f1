//! Service configuration, read from the environment at startup

use crate::db::DEFAULT_HISTORY_LIMIT;
use crate::llm::LlmConfig;
use crate::marketplace::MarketplaceConfig;
use crate::notify::NotifierConfig;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 5001;
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(3600);
pub const DEFAULT_CLASSIFIER_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub port: u16,
    /// How long an idle dialogue survives
    pub session_ttl: Duration,
    /// Entries kept per user in the conversation log
    pub history_limit: usize,
    /// Upper bound on one classifier call, enforced by the runtime
    pub classifier_timeout: Duration,
    pub llm: LlmConfig,
    pub marketplace: MarketplaceConfig,
    pub notifier: NotifierConfig,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let db_path = get("BOT_DB_PATH").map_or_else(
            || {
                let home = get("HOME").unwrap_or_else(|| "/tmp".to_string());
                PathBuf::from(home).join(".marketplace-bot").join("bot.db")
            },
            PathBuf::from,
        );
        let secs = |key: &str, default: Duration| {
            get(key)
                .and_then(|s| s.parse().ok())
                .map_or(default, Duration::from_secs)
        };

        Self {
            db_path,
            port: get("BOT_PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_PORT),
            session_ttl: secs("SESSION_TTL_SECS", DEFAULT_SESSION_TTL),
            history_limit: get("HISTORY_LIMIT")
                .and_then(|n| n.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(DEFAULT_HISTORY_LIMIT),
            classifier_timeout: secs("CLASSIFIER_TIMEOUT_SECS", DEFAULT_CLASSIFIER_TIMEOUT),
            llm: LlmConfig::from_lookup(&get),
            marketplace: MarketplaceConfig::from_lookup(&get),
            notifier: NotifierConfig::from_lookup(&get),
        }
    }
}
