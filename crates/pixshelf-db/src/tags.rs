//! Tag repository implementation.

use sqlx::{Pool, Postgres, Row};

use pixshelf_core::{defaults, Error, Result, Tag, TagImageCount};

use crate::upsert::{upsert_by_unique_key, OnConflict, UniqueEntity, UpsertColumn};

/// Tag reference as it arrives from a normalized record.
struct TagRef<'a> {
    name: &'a str,
    translation: Option<&'a str>,
}

impl UniqueEntity for TagRef<'_> {
    const TABLE: &'static str = "tag";
    const KEY_COLUMN: &'static str = "name";

    fn key(&self) -> &str {
        self.name
    }

    fn columns(&self) -> Vec<UpsertColumn> {
        vec![UpsertColumn {
            name: "translated_name",
            value: self.translation.filter(|t| !t.is_empty()).map(String::from),
            on_conflict: OnConflict::FillIfEmpty,
        }]
    }
}

fn tag_from_row(row: &sqlx::postgres::PgRow) -> Tag {
    Tag {
        id: row.get("id"),
        name: row.get("name"),
        translated_name: row.get("translated_name"),
    }
}

/// PostgreSQL tag repository.
#[derive(Clone)]
pub struct PgTagRepository {
    pool: Pool<Postgres>,
}

impl PgTagRepository {
    /// Create a new PgTagRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Resolve a tag by canonical name, creating it on first reference.
    /// Names are stored trimmed, matching how searches resolve tag filters.
    /// A translation only fills an empty `translated_name`.
    pub async fn upsert(&self, name: &str, translation: Option<&str>) -> Result<i64> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidInput("Tag name cannot be empty".to_string()));
        }
        upsert_by_unique_key(&self.pool, &TagRef { name, translation }).await
    }

    pub async fn get_by_name(&self, name: &str) -> Result<Option<Tag>> {
        let row = sqlx::query("SELECT id, name, translated_name FROM tag WHERE name = $1")
            .bind(name.trim())
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(row.as_ref().map(tag_from_row))
    }

    /// One page of tags ordered by id. Non-positive page or size fall back to
    /// the listing defaults.
    pub async fn list(&self, page: i64, page_size: i64) -> Result<Vec<Tag>> {
        let page = if page >= 1 { page } else { defaults::PAGE };
        let page_size = if page_size >= 1 {
            page_size
        } else {
            defaults::PAGE_SIZE
        };

        let rows = sqlx::query(
            "SELECT id, name, translated_name FROM tag ORDER BY id LIMIT $1 OFFSET $2",
        )
        .bind(page_size)
        .bind((page - 1).saturating_mul(page_size))
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.iter().map(tag_from_row).collect())
    }

    /// Tags linked to one image, by name.
    pub async fn for_image(&self, pid: i64) -> Result<Vec<Tag>> {
        let rows = sqlx::query(
            r#"
            SELECT t.id, t.name, t.translated_name
            FROM tag t
            JOIN image_tag it ON it.tag_id = t.id
            WHERE it.image_pid = $1
            ORDER BY t.name
            "#,
        )
        .bind(pid)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.iter().map(tag_from_row).collect())
    }

    /// Every tag with the number of images carrying it, most used first.
    pub async fn image_counts(&self) -> Result<Vec<TagImageCount>> {
        let rows = sqlx::query(
            r#"
            SELECT t.id, t.name, t.translated_name, COUNT(it.image_pid) AS image_count
            FROM tag t
            LEFT JOIN image_tag it ON it.tag_id = t.id
            GROUP BY t.id
            ORDER BY image_count DESC, t.name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows
            .into_iter()
            .map(|row| TagImageCount {
                id: row.get("id"),
                name: row.get("name"),
                translated_name: row.get("translated_name"),
                image_count: row.get("image_count"),
            })
            .collect())
    }

    /// Delete tags no image links to. Returns the number removed.
    pub async fn prune_orphans(&self) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM tag t WHERE NOT EXISTS (SELECT 1 FROM image_tag it WHERE it.tag_id = t.id)",
        )
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(result.rows_affected())
    }
}
