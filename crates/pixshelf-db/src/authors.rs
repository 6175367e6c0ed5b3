//! Author repository implementation.

use sqlx::{Pool, Postgres, Row};
use tracing::debug;

use pixshelf_core::{Author, AuthorImageCount, Error, NewAuthor, Result};

use crate::upsert::{upsert_by_unique_key, OnConflict, UniqueEntity, UpsertColumn};

impl UniqueEntity for NewAuthor {
    const TABLE: &'static str = "author";
    const KEY_COLUMN: &'static str = "uid";
    const KEY_PREDICATE: Option<&'static str> = Some("uid <> ''");

    fn key(&self) -> &str {
        &self.uid
    }

    fn columns(&self) -> Vec<UpsertColumn> {
        // Display names change upstream; the latest one wins.
        vec![UpsertColumn {
            name: "name",
            value: Some(self.name.clone()),
            on_conflict: OnConflict::Overwrite,
        }]
    }
}

/// PostgreSQL author repository.
#[derive(Clone)]
pub struct PgAuthorRepository {
    pool: Pool<Postgres>,
}

impl PgAuthorRepository {
    /// Create a new PgAuthorRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Resolve an author by uid, or by name for uid-less legacy authors,
    /// creating it on first reference. Returns the author id.
    pub async fn upsert(&self, author: &NewAuthor) -> Result<i64> {
        if !author.uid.is_empty() {
            return upsert_by_unique_key(&self.pool, author).await;
        }

        debug!(
            subsystem = "db",
            component = "authors",
            op = "upsert_by_name",
            author_name = %author.name,
            "Author has no uid, resolving by name"
        );

        let existing: Option<i64> =
            sqlx::query_scalar("SELECT id FROM author WHERE uid = '' AND name = $1")
                .bind(&author.name)
                .fetch_optional(&self.pool)
                .await
                .map_err(Error::Database)?;
        if let Some(id) = existing {
            return Ok(id);
        }

        sqlx::query_scalar("INSERT INTO author (name, uid) VALUES ($1, '') RETURNING id")
            .bind(&author.name)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db) if db.is_unique_violation() => Error::Conflict(
                    format!("author '{}' was created concurrently", author.name),
                ),
                other => Error::Database(other),
            })
    }

    pub async fn get(&self, id: i64) -> Result<Option<Author>> {
        let row = sqlx::query("SELECT id, name, uid FROM author WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(row.map(|row| Author {
            id: row.get("id"),
            name: row.get("name"),
            uid: row.get("uid"),
        }))
    }

    /// Every author with the number of images they own, busiest first.
    pub async fn image_counts(&self) -> Result<Vec<AuthorImageCount>> {
        let rows = sqlx::query(
            r#"
            SELECT a.id, a.name, a.uid, COUNT(i.id) AS image_count
            FROM author a
            LEFT JOIN image i ON i.author_id = a.id
            GROUP BY a.id
            ORDER BY image_count DESC, a.name, a.id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows
            .into_iter()
            .map(|row| AuthorImageCount {
                id: row.get("id"),
                name: row.get("name"),
                uid: row.get("uid"),
                image_count: row.get("image_count"),
            })
            .collect())
    }

    /// Delete authors that own no images. Returns the number removed.
    pub async fn prune_orphans(&self) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM author a WHERE NOT EXISTS (SELECT 1 FROM image i WHERE i.author_id = a.id)",
        )
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(result.rows_affected())
    }
}
