//! Image search request and response types.
//!
//! `ImageQuery` carries untrusted caller input. Accessors resolve it to safe
//! values: unknown sort columns fall back to `pid`, unknown directions to
//! descending, and non-positive page numbers or sizes to their defaults.
//! Nothing here ever fails.

use serde::{Deserialize, Serialize};

use crate::defaults;
use crate::models::Image;

/// Column an image listing may be sorted by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortColumn {
    Id,
    #[default]
    Pid,
    Name,
    BookmarkCount,
}

impl SortColumn {
    /// Resolve a caller-supplied column name, falling back to `Pid`.
    pub fn from_param(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("id") => Self::Id,
            Some("pid") => Self::Pid,
            Some("name") => Self::Name,
            Some("bookmark_count") => Self::BookmarkCount,
            _ => Self::Pid,
        }
    }
}

/// Sort direction of an image listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    /// Resolve a caller-supplied direction, falling back to `Desc`.
    pub fn from_param(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_uppercase()).as_deref() {
            Some("ASC") => Self::Asc,
            _ => Self::Desc,
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Filtered, sorted, paginated image search.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageQuery {
    /// Images must carry every one of these tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Exact author display name. Empty means no filter.
    pub author: Option<String>,
    /// Inclusive lower bound on bookmark count.
    pub bookmark_min: Option<i64>,
    /// Inclusive upper bound on bookmark count.
    pub bookmark_max: Option<i64>,
    pub is_bookmarked: Option<bool>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

impl ImageQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn with_bookmark_range(mut self, min: Option<i64>, max: Option<i64>) -> Self {
        self.bookmark_min = min;
        self.bookmark_max = max;
        self
    }

    pub fn with_bookmarked(mut self, bookmarked: bool) -> Self {
        self.is_bookmarked = Some(bookmarked);
        self
    }

    pub fn with_sort(mut self, sort_by: impl Into<String>, sort_order: impl Into<String>) -> Self {
        self.sort_by = Some(sort_by.into());
        self.sort_order = Some(sort_order.into());
        self
    }

    pub fn with_page(mut self, page: i64, page_size: i64) -> Self {
        self.page = Some(page);
        self.page_size = Some(page_size);
        self
    }

    /// Requested tags with blanks removed and duplicates collapsed,
    /// preserving first-seen order.
    pub fn requested_tags(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        self.tags
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .filter(|t| seen.insert(t.to_string()))
            .map(String::from)
            .collect()
    }

    /// Author filter, or `None` when absent or blank.
    pub fn author_filter(&self) -> Option<&str> {
        self.author.as_deref().filter(|a| !a.is_empty())
    }

    pub fn sort_column(&self) -> SortColumn {
        SortColumn::from_param(self.sort_by.as_deref())
    }

    pub fn sort_direction(&self) -> SortDirection {
        SortDirection::from_param(self.sort_order.as_deref())
    }

    /// 1-based page number.
    pub fn page(&self) -> i64 {
        self.page.filter(|p| *p >= 1).unwrap_or(defaults::PAGE)
    }

    pub fn page_size(&self) -> i64 {
        self.page_size
            .filter(|s| *s >= 1)
            .unwrap_or(defaults::PAGE_SIZE)
    }

    /// Row offset of the first row on the requested page.
    pub fn offset(&self) -> i64 {
        (self.page() - 1).saturating_mul(self.page_size())
    }
}

/// One page of image search results plus the total match count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImagePage {
    pub images: Vec<Image>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
}

impl ImagePage {
    pub fn total_pages(&self) -> i64 {
        if self.total == 0 {
            0
        } else {
            (self.total + self.page_size - 1) / self.page_size
        }
    }
}
