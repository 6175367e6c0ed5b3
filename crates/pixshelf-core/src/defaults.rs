//! Centralized default constants for pixshelf.
//!
//! All crates reference these constants instead of defining their own magic
//! numbers. Organized by domain area.

// =============================================================================
// PAGINATION
// =============================================================================

/// Default page number for image listings (1-based).
pub const PAGE: i64 = 1;

/// Default page size for image listings.
pub const PAGE_SIZE: i64 = 20;

// =============================================================================
// UPSTREAM
// =============================================================================

/// Base URL of the upstream artwork platform.
pub const UPSTREAM_BASE_URL: &str = "https://www.pixiv.net";

/// Per-request timeout for upstream calls.
pub const UPSTREAM_TIMEOUT_SECS: u64 = 30;

/// Browser-identifying user agent sent with every upstream request.
pub const UPSTREAM_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/125.0.0.0 Safari/537.36";

/// Referer sent with every upstream request.
pub const UPSTREAM_REFERER: &str = "https://www.pixiv.net/";

/// Configuration key under which the upstream credential is persisted.
pub const CREDENTIAL_CONFIG_KEY: &str = "upstream_credential";

/// Accounts returned per page of a following list.
pub const FOLLOWING_PAGE_LIMIT: u32 = 24;

/// Works returned by the recommendation seed call.
pub const RECOMMEND_LIMIT: u32 = 18;

/// Feed filter for followed accounts' latest works (`all` or `r18`).
pub const FOLLOW_LATEST_MODE: &str = "all";

/// Display language requested from feed endpoints.
pub const FEED_LANG: &str = "zh";

// =============================================================================
// REFRESH
// =============================================================================

/// Default number of concurrent refresh workers.
pub const REFRESH_CONCURRENCY: usize = 1;

/// Lower bound of the per-pid jitter delay.
pub const REFRESH_JITTER_MIN_MS: u64 = 200;

/// Upper bound of the per-pid jitter delay.
pub const REFRESH_JITTER_MAX_MS: u64 = 1_000;

/// Number of individual errors kept in a refresh summary.
pub const REFRESH_MAX_REPORTED_ERRORS: usize = 10;

// =============================================================================
// DATABASE
// =============================================================================

/// Default maximum number of pooled connections.
pub const DB_MAX_CONNECTIONS: u32 = 10;

/// Default connection acquire timeout.
pub const DB_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default idle connection timeout.
pub const DB_IDLE_TIMEOUT_SECS: u64 = 600;
