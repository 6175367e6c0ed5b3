//! Upstream client configuration.

use std::time::Duration;

use pixshelf_core::defaults;

/// Configuration for [`crate::PixivClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamConfig {
    /// Scheme and host of the upstream platform, without trailing path.
    pub base_url: String,
    /// Optional forward proxy every request is routed through.
    pub proxy_url: Option<String>,
    /// Per-request timeout in seconds.
    pub timeout_seconds: u64,
    pub user_agent: String,
    pub referer: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::UPSTREAM_BASE_URL.to_string(),
            proxy_url: None,
            timeout_seconds: defaults::UPSTREAM_TIMEOUT_SECS,
            user_agent: defaults::UPSTREAM_USER_AGENT.to_string(),
            referer: defaults::UPSTREAM_REFERER.to_string(),
        }
    }
}

impl UpstreamConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `UPSTREAM_BASE_URL` | `https://www.pixiv.net` |
    /// | `UPSTREAM_PROXY_URL` | unset (direct connection) |
    /// | `UPSTREAM_TIMEOUT_SECS` | 30 |
    /// | `UPSTREAM_USER_AGENT` | desktop Chrome UA |
    /// | `UPSTREAM_REFERER` | `https://www.pixiv.net/` |
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: std::env::var("UPSTREAM_BASE_URL").unwrap_or(defaults.base_url),
            proxy_url: std::env::var("UPSTREAM_PROXY_URL")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            timeout_seconds: std::env::var("UPSTREAM_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|s| *s > 0)
                .unwrap_or(defaults.timeout_seconds),
            user_agent: std::env::var("UPSTREAM_USER_AGENT").unwrap_or(defaults.user_agent),
            referer: std::env::var("UPSTREAM_REFERER").unwrap_or(defaults.referer),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_proxy(mut self, proxy_url: impl Into<String>) -> Self {
        self.proxy_url = Some(proxy_url.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_seconds = timeout.as_secs().max(1);
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = referer.into();
        self
    }

    fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// Artwork endpoint for one pid.
    pub fn artwork_url(&self, pid: i64) -> String {
        format!("{}/ajax/illust/{}", self.base(), pid)
    }

    /// Public page of one artwork, used as the referer of artwork-scoped calls.
    pub fn artwork_page_url(&self, pid: i64) -> String {
        format!("{}/artworks/{}", self.base(), pid)
    }

    pub fn recommend_url(&self, pid: i64) -> String {
        format!("{}/ajax/illust/{}/recommend/init", self.base(), pid)
    }

    pub fn following_url(&self, user_id: &str) -> String {
        format!("{}/ajax/user/{}/following", self.base(), user_id)
    }

    pub fn following_page_url(&self, user_id: &str) -> String {
        format!("{}/users/{}/following", self.base(), user_id)
    }

    pub fn follow_latest_url(&self) -> String {
        format!("{}/ajax/follow_latest/illust", self.base())
    }

    pub fn follow_latest_page_url(&self) -> String {
        format!("{}/bookmark_new_illust.php", self.base())
    }
}
