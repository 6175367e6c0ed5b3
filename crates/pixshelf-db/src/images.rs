//! Image repository: image rows, tag links, and pages.

use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};

use pixshelf_core::{Author, Error, Image, ImageUrls, ImageWrite, Page, Result, SyncStatus};

/// Columns selected for an image joined with its author as `a`.
pub(crate) const IMAGE_COLUMNS: &str = "i.id, i.pid, i.name, i.bookmark_count, \
    i.is_bookmarked, i.local, i.url_original, i.url_mini, i.url_thumb, i.url_small, \
    i.url_regular, i.page_count, i.sync_status, i.updated_at, \
    a.id AS author_id, a.name AS author_name, a.uid AS author_uid";

/// Map a row selected with [`IMAGE_COLUMNS`].
pub(crate) fn image_from_row(row: &PgRow) -> Result<Image> {
    let sync_status: String = row.get("sync_status");
    Ok(Image {
        id: row.get("id"),
        pid: row.get("pid"),
        author: Author {
            id: row.get("author_id"),
            name: row.get("author_name"),
            uid: row.get("author_uid"),
        },
        name: row.get("name"),
        bookmark_count: row.get("bookmark_count"),
        is_bookmarked: row.get("is_bookmarked"),
        local: row.get("local"),
        urls: ImageUrls {
            original: row.get("url_original"),
            mini: row.get("url_mini"),
            thumb: row.get("url_thumb"),
            small: row.get("url_small"),
            regular: row.get("url_regular"),
        },
        page_count: row.get("page_count"),
        sync_status: sync_status.parse().map_err(Error::Internal)?,
        updated_at: row.get("updated_at"),
    })
}

/// PostgreSQL image repository.
#[derive(Clone)]
pub struct PgImageRepository {
    pool: Pool<Postgres>,
}

impl PgImageRepository {
    /// Create a new PgImageRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn exists(&self, pid: i64) -> Result<bool> {
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM image WHERE pid = $1)")
            .bind(pid)
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)
    }

    /// Insert a new, synced image row. Returns the image id.
    pub async fn create(&self, image: &ImageWrite) -> Result<i64> {
        sqlx::query_scalar(
            r#"
            INSERT INTO image (
                pid, author_id, name, bookmark_count, is_bookmarked,
                url_original, url_mini, url_thumb, url_small, url_regular,
                page_count, sync_status, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, 'synced', $12)
            RETURNING id
            "#,
        )
        .bind(image.pid)
        .bind(image.author_id)
        .bind(&image.name)
        .bind(image.bookmark_count)
        .bind(image.is_bookmarked)
        .bind(&image.urls.original)
        .bind(&image.urls.mini)
        .bind(&image.urls.thumb)
        .bind(&image.urls.small)
        .bind(&image.urls.regular)
        .bind(image.page_count)
        .bind(image.synced_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                Error::Conflict(format!("image pid {} already exists", image.pid))
            }
            other => Error::Database(other),
        })
    }

    /// Overwrite every mutable field of an existing image and mark it synced.
    /// The locally-cached flag is left alone.
    pub async fn update(&self, image: &ImageWrite) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE image SET
                author_id = $2,
                name = $3,
                bookmark_count = $4,
                is_bookmarked = $5,
                url_original = $6,
                url_mini = $7,
                url_thumb = $8,
                url_small = $9,
                url_regular = $10,
                page_count = $11,
                sync_status = 'synced',
                updated_at = $12
            WHERE pid = $1
            "#,
        )
        .bind(image.pid)
        .bind(image.author_id)
        .bind(&image.name)
        .bind(image.bookmark_count)
        .bind(image.is_bookmarked)
        .bind(&image.urls.original)
        .bind(&image.urls.mini)
        .bind(&image.urls.thumb)
        .bind(&image.urls.small)
        .bind(&image.urls.regular)
        .bind(image.page_count)
        .bind(image.synced_at)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("image pid {}", image.pid)));
        }
        Ok(())
    }

    pub async fn get(&self, pid: i64) -> Result<Option<Image>> {
        let sql = format!(
            "SELECT {} FROM image i JOIN author a ON a.id = i.author_id WHERE i.pid = $1",
            IMAGE_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(pid)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
        row.as_ref().map(image_from_row).transpose()
    }

    /// Delete an image; its tag links and pages cascade. Returns false when
    /// no image existed.
    pub async fn delete(&self, pid: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM image WHERE pid = $1")
            .bind(pid)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn set_local(&self, pid: i64, local: bool) -> Result<bool> {
        let result = sqlx::query("UPDATE image SET local = $2 WHERE pid = $1")
            .bind(pid)
            .bind(local)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn mark_sync_status(&self, pid: i64, status: SyncStatus) -> Result<bool> {
        let result = sqlx::query("UPDATE image SET sync_status = $2 WHERE pid = $1")
            .bind(pid)
            .bind(status.as_str())
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(result.rows_affected() > 0)
    }

    // -------------------------------------------------------------------------
    // Tag links
    // -------------------------------------------------------------------------

    pub async fn delete_tags(&self, pid: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM image_tag WHERE image_pid = $1")
            .bind(pid)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(result.rows_affected())
    }

    pub async fn insert_tag(&self, pid: i64, tag_id: i64) -> Result<()> {
        sqlx::query(
            "INSERT INTO image_tag (image_pid, tag_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(pid)
        .bind(tag_id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Pages
    // -------------------------------------------------------------------------

    /// Record a page. Returns false when the pair already existed.
    pub async fn insert_page(&self, pid: i64, ordinal: i32) -> Result<bool> {
        let result = sqlx::query(
            "INSERT INTO page (image_pid, ordinal) VALUES ($1, $2) \
             ON CONFLICT (image_pid, ordinal) DO NOTHING",
        )
        .bind(pid)
        .bind(ordinal)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn list_pages(&self, pid: i64) -> Result<Vec<Page>> {
        let rows = sqlx::query(
            "SELECT id, image_pid, ordinal FROM page WHERE image_pid = $1 ORDER BY ordinal",
        )
        .bind(pid)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows
            .into_iter()
            .map(|row| Page {
                id: row.get("id"),
                image_pid: row.get("image_pid"),
                ordinal: row.get("ordinal"),
            })
            .collect())
    }

    // -------------------------------------------------------------------------
    // Working sets
    // -------------------------------------------------------------------------

    pub async fn list_all_pids(&self) -> Result<Vec<i64>> {
        sqlx::query_scalar("SELECT pid FROM image ORDER BY pid")
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)
    }

    pub async fn list_pids_by_bookmark_range(&self, min: i64, max: i64) -> Result<Vec<i64>> {
        sqlx::query_scalar(
            "SELECT pid FROM image WHERE bookmark_count BETWEEN $1 AND $2 ORDER BY pid",
        )
        .bind(min)
        .bind(max)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)
    }

    pub async fn list_pids_by_sync_status_not(&self, status: SyncStatus) -> Result<Vec<i64>> {
        sqlx::query_scalar("SELECT pid FROM image WHERE sync_status <> $1 ORDER BY pid")
            .bind(status.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)
    }
}
