//! Account-scoped feed requests: following lists, the latest works of
//! followed accounts, and recommendations seeded from one artwork.
//!
//! Each query normalizes its own paging input the way the listing endpoints
//! expect it; out-of-range values fall back to the defaults instead of
//! failing.

use pixshelf_core::defaults;
use pixshelf_core::{Error, Result};

fn non_empty_or(value: String, fallback: &str) -> String {
    if value.trim().is_empty() {
        fallback.to_string()
    } else {
        value
    }
}

/// User ids are interpolated into request paths, so only digits pass.
fn require_user_id(user_id: &str) -> Result<()> {
    if user_id.is_empty() || !user_id.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::InvalidInput(format!(
            "user id must be numeric, got '{}'",
            user_id
        )));
    }
    Ok(())
}

/// One page of the accounts a user follows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FollowingQuery {
    pub user_id: String,
    pub offset: u32,
    pub limit: u32,
}

impl FollowingQuery {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            offset: 0,
            limit: defaults::FOLLOWING_PAGE_LIMIT,
        }
    }

    pub fn with_offset(mut self, offset: u32) -> Self {
        self.offset = offset;
        self
    }

    /// Set the page size. Zero falls back to the default.
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = if limit == 0 {
            defaults::FOLLOWING_PAGE_LIMIT
        } else {
            limit
        };
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        require_user_id(&self.user_id)
    }

    pub(crate) fn params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("offset", self.offset.to_string()),
            ("limit", self.limit.to_string()),
            ("rest", "show".to_string()),
            ("tag", String::new()),
            ("acceptingRequests", "0".to_string()),
            ("lang", defaults::FEED_LANG.to_string()),
        ]
    }
}

/// One page of the newest works from accounts the user follows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FollowLatestQuery {
    pub user_id: String,
    pub page: u32,
    pub mode: String,
    pub lang: String,
}

impl FollowLatestQuery {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            page: 1,
            mode: defaults::FOLLOW_LATEST_MODE.to_string(),
            lang: defaults::FEED_LANG.to_string(),
        }
    }

    /// Set the 1-based page. Zero falls back to the first page.
    pub fn with_page(mut self, page: u32) -> Self {
        self.page = page.max(1);
        self
    }

    pub fn with_mode(mut self, mode: impl Into<String>) -> Self {
        self.mode = non_empty_or(mode.into(), defaults::FOLLOW_LATEST_MODE);
        self
    }

    pub fn with_lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = non_empty_or(lang.into(), defaults::FEED_LANG);
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        require_user_id(&self.user_id)
    }

    pub(crate) fn params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("p", self.page.to_string()),
            ("mode", self.mode.clone()),
            ("lang", self.lang.clone()),
        ]
    }
}

/// Works recommended alongside one artwork.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecommendQuery {
    pub pid: i64,
    pub limit: u32,
    pub lang: String,
    /// Sent as `x-user-id` when present.
    pub user_id: Option<String>,
}

impl RecommendQuery {
    pub fn new(pid: i64) -> Self {
        Self {
            pid,
            limit: defaults::RECOMMEND_LIMIT,
            lang: defaults::FEED_LANG.to_string(),
            user_id: None,
        }
    }

    /// Set the number of works. Zero falls back to the default.
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = if limit == 0 {
            defaults::RECOMMEND_LIMIT
        } else {
            limit
        };
        self
    }

    pub fn with_lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = non_empty_or(lang.into(), defaults::FEED_LANG);
        self
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        let user_id = user_id.into();
        self.user_id = (!user_id.trim().is_empty()).then_some(user_id);
        self
    }

    pub(crate) fn params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("limit", self.limit.to_string()),
            ("lang", self.lang.clone()),
        ]
    }
}
