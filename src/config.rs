use std::env;
use std::time::Duration;

use anyhow::Result;

use crate::pipeline::reconcile::DEFAULT_CONCURRENCY;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_BIND: &str = "0.0.0.0";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 60;

/// Central configuration loaded from environment variables.
///
/// All secrets come from env vars (never hardcoded). The .env file
/// is loaded automatically at startup via dotenvy.
#[derive(Debug, Clone)]
pub struct Config {
    pub access_token: String,
    /// Instance base URL, e.g. `https://botsin.space`.
    pub api_url: String,
    /// Streaming server base URL, when it differs from the API host.
    pub streaming_url: Option<String>,
    /// Path segment of the reconciliation endpoint. Empty disables it.
    pub bot_endpoint: String,
    pub port: u16,
    pub bind: String,
    /// Cap on concurrent follow/unfollow calls during reconciliation.
    pub concurrency: usize,
    /// Per-request timeout for REST calls.
    pub http_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self> {
        Ok(Self::from_lookup(|key| env::var(key).ok()))
    }

    /// Build a config from any key lookup. Unparseable numbers fall back to
    /// their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        Self {
            access_token: non_empty("MASTODON_ACCESS_TOKEN").unwrap_or_default(),
            api_url: non_empty("MASTODON_API_URL").unwrap_or_default(),
            streaming_url: non_empty("MASTODON_STREAMING_URL"),
            bot_endpoint: non_empty("BOT_ENDPOINT")
                .map(|e| e.trim_matches('/').to_string())
                .unwrap_or_default(),
            port: non_empty("PORT")
                .and_then(|v| v.parse::<u16>().ok())
                .unwrap_or(DEFAULT_PORT),
            bind: non_empty("ALTBOT_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string()),
            concurrency: non_empty("ALTBOT_CONCURRENCY")
                .and_then(|v| v.parse::<usize>().ok())
                .filter(|n| *n > 0)
                .unwrap_or(DEFAULT_CONCURRENCY),
            http_timeout: Duration::from_secs(
                non_empty("ALTBOT_HTTP_TIMEOUT_SECS")
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS),
            ),
        }
    }

    /// Check that the Mastodon credentials are configured.
    /// Call this before any operation that talks to the instance.
    pub fn require_mastodon(&self) -> Result<()> {
        if self.access_token.is_empty() || self.api_url.is_empty() {
            anyhow::bail!(
                "MASTODON_ACCESS_TOKEN and MASTODON_API_URL must both be set.\n\
                 Add them to your .env file or the environment."
            );
        }
        Ok(())
    }
}
