use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level configuration, persisted as TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Raises the log level to DEBUG and enables per-attempt fallback traces.
    pub debug: bool,

    pub discord: DiscordConfig,
    pub platforms: PlatformsConfig,
    pub fallback: FallbackTuning,

    /// Where this config was loaded from. Not persisted.
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Directory holding the settings database. Not persisted.
    #[serde(skip)]
    pub data_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            debug: false,
            discord: DiscordConfig::default(),
            platforms: PlatformsConfig::default(),
            fallback: FallbackTuning::default(),
            config_path: PathBuf::new(),
            data_dir: PathBuf::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscordConfig {
    /// Bot token. Usually supplied via `DISCORD_BOT_TOKEN` or
    /// `DISCORD_BOT_TOKEN_FILE` rather than written here.
    pub bot_token: String,

    /// Application id for slash-command registration. Commands are skipped
    /// when unset.
    pub application_id: Option<String>,

    /// Register commands guild-scoped (instant propagation) instead of
    /// globally.
    pub guild_id: Option<String>,
}

/// Replacement-domain lists per platform, comma-separated in trial order.
/// `None` (or an empty list) disables the platform entirely.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformsConfig {
    pub twitter: Option<String>,
    pub youtube: Option<String>,
    pub instagram: Option<String>,
    pub tiktok: Option<String>,
    pub reddit: Option<String>,
    pub pixiv: Option<String>,
    pub bsky: Option<String>,
}

impl Default for PlatformsConfig {
    fn default() -> Self {
        Self {
            twitter: Some("fxtwitter.com,vxtwitter.com".into()),
            youtube: Some("youtu.be".into()),
            instagram: Some("ddinstagram.com,kkinstagram.com".into()),
            tiktok: Some("vxtiktok.com,tnktok.com".into()),
            reddit: Some("rxddit.com,vxreddit.com".into()),
            pixiv: Some("phixiv.net".into()),
            bsky: Some("fxbsky.app".into()),
        }
    }
}

/// Retry budget and observation delays for the fallback verification loop.
/// The delays give the chat platform time to attach a link preview before the
/// reply is re-checked; they are defaults, not contracts, and tests drive the
/// machine with zero-length waits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackTuning {
    pub max_retries: u32,
    pub first_wait_ms: u64,
    pub second_wait_ms: u64,
}

impl Default for FallbackTuning {
    fn default() -> Self {
        Self {
            max_retries: 3,
            first_wait_ms: 8_000,
            second_wait_ms: 5_000,
        }
    }
}

impl FallbackTuning {
    #[must_use]
    pub fn first_wait(&self) -> Duration {
        Duration::from_millis(self.first_wait_ms)
    }

    #[must_use]
    pub fn second_wait(&self) -> Duration {
        Duration::from_millis(self.second_wait_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_enable_every_platform() {
        let platforms = PlatformsConfig::default();
        assert!(platforms.twitter.is_some());
        assert!(platforms.youtube.is_some());
        assert!(platforms.instagram.is_some());
        assert!(platforms.tiktok.is_some());
        assert!(platforms.reddit.is_some());
        assert!(platforms.pixiv.is_some());
        assert!(platforms.bsky.is_some());
    }

    #[test]
    fn fallback_defaults_match_documented_values() {
        let tuning = FallbackTuning::default();
        assert_eq!(tuning.max_retries, 3);
        assert_eq!(tuning.first_wait(), Duration::from_secs(8));
        assert_eq!(tuning.second_wait(), Duration::from_secs(5));
    }

    #[test]
    fn config_round_trips_through_toml() {
        let config = Config::default();
        let serialized = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(parsed.fallback, config.fallback);
        assert_eq!(parsed.platforms.twitter, config.platforms.twitter);
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let parsed: Config = toml::from_str(
            "[fallback]\nmax_retries = 5\n\n[platforms]\ntwitter = \"fixupx.com\"\n",
        )
        .unwrap();
        assert_eq!(parsed.fallback.max_retries, 5);
        assert_eq!(parsed.fallback.first_wait_ms, 8_000);
        assert_eq!(parsed.platforms.twitter.as_deref(), Some("fixupx.com"));
        // Unlisted platforms fall back to their default domains.
        assert!(parsed.platforms.pixiv.is_some());
    }
}
