//! Configuration file parser for ~/.config/feedboard/config.toml.
//!
//! The config file is optional: a missing file yields `Config::default()`.
//! Unknown keys are accepted by serde, though we log a warning when the file
//! contains potential typos.
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::feed::{AggregateOptions, FeedSource, OrderingMode, ProxyTransport, DEFAULT_PROXY};
use crate::util::validate_url;

/// Feeds shown when the config file names none.
pub const DEFAULT_FEEDS: &[&str] = &[
    "https://ing.dk/rss/traffik",
    "https://www.dr.dk/nyheder/service/feeds/allenyheder",
    "https://nrkbeta.no/feed/",
    "https://feeds.arstechnica.com/arstechnica/index/",
    "http://feeds.howtogeek.com/HowToGeek",
    "http://feeds.ign.com/ign/games-all",
    "http://9to5mac.com/feed/",
    "http://news.ycombinator.com/rss",
];

const KNOWN_KEYS: &[&str] = &[
    "feeds",
    "max_items_per_feed",
    "mode",
    "snippet_chars",
    "proxy",
    "timeout_secs",
    "max_retries",
    "refresh_interval_minutes",
];

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// SEC-014: Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
/// The value is passed explicitly into each refresh cycle; nothing reads it
/// from global state.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Feed URLs in display order.
    pub feeds: Vec<String>,

    /// Items kept per feed after newest-first sorting.
    pub max_items_per_feed: usize,

    /// `grouped` (one section per feed) or `merged` (one timeline).
    pub mode: OrderingMode,

    /// Snippet length in characters.
    pub snippet_chars: usize,

    /// URL-prefix proxy. Empty string fetches feeds directly.
    pub proxy: String,

    /// Per-request timeout in seconds.
    pub timeout_secs: u64,

    /// Retries for 429 and 5xx responses.
    pub max_retries: u32,

    /// Refresh interval in minutes. 0 = refresh once and exit.
    pub refresh_interval_minutes: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            feeds: DEFAULT_FEEDS.iter().map(|s| s.to_string()).collect(),
            max_items_per_feed: 5,
            mode: OrderingMode::Grouped,
            snippet_chars: crate::feed::DEFAULT_SNIPPET_CHARS,
            proxy: DEFAULT_PROXY.to_string(),
            timeout_secs: 30,
            max_retries: 3,
            refresh_interval_minutes: 0,
        }
    }
}

impl Config {
    /// SEC-014: Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // SEC-014: Check file size before reading.
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        Self::from_toml(&content)
    }

    /// Parses config text. Blank text yields the defaults.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            tracing::debug!("Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(content)?;
        tracing::info!(
            feeds = config.feeds.len(),
            mode = ?config.mode,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Configured feeds that pass URL validation, in file order.
    ///
    /// Invalid entries are skipped with a warning rather than failing the
    /// whole configuration.
    pub fn sources(&self) -> Vec<FeedSource> {
        self.feeds
            .iter()
            .filter_map(|raw| match validate_url(raw.trim()) {
                Ok(_) => Some(FeedSource::new(raw.trim())),
                Err(e) => {
                    tracing::warn!(feed = %raw, error = %e, "Skipping invalid feed URL");
                    None
                }
            })
            .collect()
    }

    pub fn aggregate_options(&self) -> AggregateOptions {
        AggregateOptions {
            mode: self.mode,
            max_items_per_feed: self.max_items_per_feed,
            snippet_chars: self.snippet_chars,
        }
    }

    /// HTTP transport configured from the proxy, timeout and retry settings.
    pub fn transport(&self, client: reqwest::Client) -> ProxyTransport {
        ProxyTransport::new(client)
            .with_proxy(Some(self.proxy.clone()))
            .with_timeout(Duration::from_secs(self.timeout_secs))
            .with_retries(self.max_retries, Duration::from_secs(1))
    }

    /// `None` when the refresh loop is disabled.
    pub fn refresh_interval(&self) -> Option<Duration> {
        (self.refresh_interval_minutes > 0)
            .then(|| Duration::from_secs(self.refresh_interval_minutes.saturating_mul(60)))
    }
}

// ============================================================================
// Tests
// ============================================================================
