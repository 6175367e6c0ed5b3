//! Catalog entity types.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// AUTHOR
// =============================================================================

/// Owner of one or more images.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: i64,
    pub name: String,
    /// External stable user id. Empty only for legacy rows.
    pub uid: String,
}

/// Input for resolving an author by uid (falling back to name).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAuthor {
    pub uid: String,
    pub name: String,
}

/// Author with the number of images they own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorImageCount {
    pub id: i64,
    pub name: String,
    pub uid: String,
    pub image_count: i64,
}

// =============================================================================
// TAG
// =============================================================================

/// Globally shared tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: i64,
    pub name: String,
    pub translated_name: Option<String>,
}

/// Tag with the number of images linked to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagImageCount {
    pub id: i64,
    pub name: String,
    pub translated_name: Option<String>,
    pub image_count: i64,
}

// =============================================================================
// IMAGE
// =============================================================================

/// Optional asset URLs by resolution tier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageUrls {
    pub original: Option<String>,
    pub mini: Option<String>,
    pub thumb: Option<String>,
    pub small: Option<String>,
    pub regular: Option<String>,
}

impl ImageUrls {
    /// Whether the primary (original resolution) asset is known.
    pub fn has_primary(&self) -> bool {
        self.original.as_deref().is_some_and(|u| !u.is_empty())
    }
}

/// Outcome of the most recent sync attempt for an image.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Last ingestion succeeded.
    #[default]
    Synced,
    /// Last ingestion failed with a retryable or unknown error.
    Failed,
    /// Upstream reported the artwork as gone.
    NotFound,
    /// Upstream returned the artwork without usable content.
    Withdrawn,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Synced => "synced",
            Self::Failed => "failed",
            Self::NotFound => "not_found",
            Self::Withdrawn => "withdrawn",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "synced" => Ok(Self::Synced),
            "failed" => Ok(Self::Failed),
            "not_found" => Ok(Self::NotFound),
            "withdrawn" => Ok(Self::Withdrawn),
            other => Err(format!("unknown sync status: {}", other)),
        }
    }
}

/// Stored image row joined with its author.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
    pub id: i64,
    pub pid: i64,
    pub author: Author,
    pub name: String,
    pub bookmark_count: i64,
    pub is_bookmarked: bool,
    pub local: bool,
    pub urls: ImageUrls,
    pub page_count: i32,
    pub sync_status: SyncStatus,
    pub updated_at: DateTime<Utc>,
}

/// Ordered sub-asset of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub id: i64,
    pub image_pid: i64,
    pub ordinal: i32,
}

/// Image with its tags and pages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageDetail {
    pub image: Image,
    pub tags: Vec<Tag>,
    pub pages: Vec<Page>,
}

/// Column values written when creating or updating an image.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageWrite {
    pub pid: i64,
    pub author_id: i64,
    pub name: String,
    pub bookmark_count: i64,
    pub is_bookmarked: bool,
    pub urls: ImageUrls,
    pub page_count: i32,
    pub synced_at: DateTime<Utc>,
}

/// Rows removed by an orphan sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PruneReport {
    pub authors_removed: u64,
    pub tags_removed: u64,
}

// =============================================================================
// NORMALIZED UPSTREAM RECORD
// =============================================================================

/// Typed artwork record produced by normalizing an upstream payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArtworkRecord {
    pub pid: i64,
    pub title: String,
    pub author_uid: String,
    pub author_name: String,
    /// Canonical tag names, in upstream order, without duplicates.
    pub tags: Vec<String>,
    /// English translations keyed by canonical tag name.
    pub tag_translations: BTreeMap<String, String>,
    pub bookmark_count: i64,
    pub is_bookmarked: bool,
    pub urls: ImageUrls,
    pub page_count: i32,
}

/// Raw upstream content document for one artwork.
#[derive(Debug, Clone, PartialEq)]
pub struct RawArtwork {
    pub pid: i64,
    /// The content object found under the upstream envelope's `body` field.
    pub body: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_status_round_trip() {
        for status in [
            SyncStatus::Synced,
            SyncStatus::Failed,
            SyncStatus::NotFound,
            SyncStatus::Withdrawn,
        ] {
            assert_eq!(status.as_str().parse::<SyncStatus>(), Ok(status));
        }
        assert!("bogus".parse::<SyncStatus>().is_err());
    }

    #[test]
    fn test_sync_status_serde_matches_db_strings() {
        let json = serde_json::to_string(&SyncStatus::NotFound).unwrap();
        assert_eq!(json, "\"not_found\"");
    }

    #[test]
    fn test_has_primary_requires_non_empty_original() {
        let mut urls = ImageUrls::default();
        assert!(!urls.has_primary());

        urls.original = Some(String::new());
        assert!(!urls.has_primary());

        urls.original = Some("https://i.example/img.png".to_string());
        assert!(urls.has_primary());
    }
}
