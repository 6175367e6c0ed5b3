//! # pixshelf-upstream
//!
//! Client for the upstream artwork platform and the normalizer that turns
//! its loosely-typed documents into [`pixshelf_core::ArtworkRecord`]s. The
//! client also reads account feeds: following lists, the latest works of
//! followed accounts, and per-artwork recommendations.

pub mod client;
pub mod config;
pub mod credential;
pub mod error;
pub mod feeds;
pub mod normalize;

pub use client::{parse_envelope, PixivClient};
pub use config::UpstreamConfig;
pub use credential::StaticCredential;
pub use error::{to_pixshelf_error, UpstreamErrorCode};
pub use feeds::{FollowLatestQuery, FollowingQuery, RecommendQuery};
pub use normalize::normalize;
