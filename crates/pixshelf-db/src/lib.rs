//! # pixshelf-db
//!
//! PostgreSQL storage for the pixshelf artwork catalog.
//!
//! This crate provides:
//! - Connection pool management
//! - Author, tag, image, and page repositories
//! - The [`CatalogStore`] implementation used by ingestion and refresh
//! - Filtered, paginated image search
//! - Credential and refresh job persistence
//!
//! ## Example
//!
//! ```rust,ignore
//! use pixshelf_db::{Database, ImageQuery};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/pixshelf").await?;
//!     db.migrate().await?;
//!
//!     let page = db
//!         .search
//!         .search_images(&ImageQuery::new().with_tags(["landscape"]))
//!         .await?;
//!     println!("{} matching images", page.total);
//!     Ok(())
//! }
//! ```
pub mod authors;
pub mod credentials;
pub mod image_filter;
pub mod images;
pub mod pool;
pub mod refresh_jobs;
pub mod search;
pub mod tags;
pub mod upsert;

// Test fixtures for integration tests
// Note: Always compiled so integration tests (in tests/) can use DEFAULT_TEST_DATABASE_URL
pub mod test_fixtures;

use async_trait::async_trait;
use tracing::info;

// Re-export core types
pub use pixshelf_core::*;

pub use authors::PgAuthorRepository;
pub use credentials::PgCredentialStore;
pub use image_filter::{FilterClause, ImageFilterQueryBuilder, QueryParam};
pub use images::PgImageRepository;
pub use pool::{create_pool, create_pool_with_config, PoolConfig};
pub use refresh_jobs::PgRefreshJobRepository;
pub use search::PgImageSearch;
pub use tags::PgTagRepository;
pub use upsert::{upsert_by_unique_key, UniqueEntity};

/// Combined database context owning the pool and every repository.
#[derive(Clone)]
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    pub authors: PgAuthorRepository,
    pub tags: PgTagRepository,
    /// Images with their tag links and pages.
    pub images: PgImageRepository,
    pub search: PgImageSearch,
    /// Upstream session credential.
    pub credentials: PgCredentialStore,
    /// Refresh run history.
    pub refresh_jobs: PgRefreshJobRepository,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            authors: PgAuthorRepository::new(pool.clone()),
            tags: PgTagRepository::new(pool.clone()),
            images: PgImageRepository::new(pool.clone()),
            search: PgImageSearch::new(pool.clone()),
            credentials: PgCredentialStore::new(pool.clone()),
            refresh_jobs: PgRefreshJobRepository::new(pool.clone()),
            pool,
        }
    }

    /// Create a new Database instance by connecting to the given URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    /// Create with custom pool configuration.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }

    /// An image with its author, tags, and pages.
    pub async fn get_image(&self, pid: i64) -> Result<ImageDetail> {
        let image = self
            .images
            .get(pid)
            .await?
            .ok_or_else(|| Error::NotFound(format!("image pid {}", pid)))?;
        let tags = self.tags.for_image(pid).await?;
        let pages = self.images.list_pages(pid).await?;
        Ok(ImageDetail { image, tags, pages })
    }

    /// Delete an image; its tag links and pages go with it.
    pub async fn delete_image(&self, pid: i64) -> Result<bool> {
        self.images.delete(pid).await
    }

    /// Flag whether an image's assets are cached locally. Re-syncs never
    /// change this flag.
    pub async fn set_local(&self, pid: i64, local: bool) -> Result<bool> {
        self.images.set_local(pid, local).await
    }

    pub async fn list_pages(&self, pid: i64) -> Result<Vec<Page>> {
        self.images.list_pages(pid).await
    }

    pub async fn tags_for_image(&self, pid: i64) -> Result<Vec<Tag>> {
        self.tags.for_image(pid).await
    }

    pub async fn list_tags(&self, page: i64, page_size: i64) -> Result<Vec<Tag>> {
        self.tags.list(page, page_size).await
    }

    pub async fn tag_image_counts(&self) -> Result<Vec<TagImageCount>> {
        self.tags.image_counts().await
    }

    pub async fn author_image_counts(&self) -> Result<Vec<AuthorImageCount>> {
        self.authors.image_counts().await
    }

    /// Remove authors without images and tags without links.
    pub async fn prune_orphans(&self) -> Result<PruneReport> {
        let report = PruneReport {
            authors_removed: self.authors.prune_orphans().await?,
            tags_removed: self.tags.prune_orphans().await?,
        };
        info!(
            subsystem = "db",
            component = "catalog",
            op = "prune_orphans",
            authors_removed = report.authors_removed,
            tags_removed = report.tags_removed,
            "Orphaned catalog rows removed"
        );
        Ok(report)
    }
}

#[async_trait]
impl CatalogStore for Database {
    async fn upsert_author(&self, author: &NewAuthor) -> Result<i64> {
        self.authors.upsert(author).await
    }

    async fn upsert_tag(&self, name: &str, translation: Option<&str>) -> Result<i64> {
        self.tags.upsert(name, translation).await
    }

    async fn image_exists(&self, pid: i64) -> Result<bool> {
        self.images.exists(pid).await
    }

    async fn create_image(&self, image: &ImageWrite) -> Result<i64> {
        self.images.create(image).await
    }

    async fn update_image(&self, image: &ImageWrite) -> Result<()> {
        self.images.update(image).await
    }

    async fn delete_image_tags(&self, pid: i64) -> Result<u64> {
        self.images.delete_tags(pid).await
    }

    async fn insert_image_tag(&self, pid: i64, tag_id: i64) -> Result<()> {
        self.images.insert_tag(pid, tag_id).await
    }

    async fn insert_page(&self, pid: i64, ordinal: i32) -> Result<bool> {
        self.images.insert_page(pid, ordinal).await
    }

    async fn list_all_pids(&self) -> Result<Vec<i64>> {
        self.images.list_all_pids().await
    }

    async fn list_pids_by_bookmark_range(&self, min: i64, max: i64) -> Result<Vec<i64>> {
        self.images.list_pids_by_bookmark_range(min, max).await
    }

    async fn list_pids_by_sync_status_not(&self, status: SyncStatus) -> Result<Vec<i64>> {
        self.images.list_pids_by_sync_status_not(status).await
    }

    async fn mark_sync_status(&self, pid: i64, status: SyncStatus) -> Result<bool> {
        self.images.mark_sync_status(pid, status).await
    }
}
