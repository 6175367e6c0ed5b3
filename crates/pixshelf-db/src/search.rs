//! Filtered, paginated image search.

use std::time::Instant;

use sqlx::{Pool, Postgres, Row};
use tracing::debug;

use pixshelf_core::{Error, ImagePage, ImageQuery, Result};

use crate::image_filter::{bind_params, ImageFilterQueryBuilder};
use crate::images::{image_from_row, IMAGE_COLUMNS};

/// PostgreSQL image search.
#[derive(Clone)]
pub struct PgImageSearch {
    pool: Pool<Postgres>,
}

impl PgImageSearch {
    /// Create a new PgImageSearch with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Number of images matching the query's filters, ignoring pagination.
    pub async fn count_images(&self, query: &ImageQuery) -> Result<i64> {
        let clause = ImageFilterQueryBuilder::new(query).build();
        let sql = format!(
            "SELECT COUNT(*) AS count FROM (SELECT i.id {}) matched",
            clause.from_where()
        );

        let row = bind_params(sqlx::query(&sql), &clause.params)
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(row.get("count"))
    }

    /// One page of matching images plus the total match count.
    ///
    /// A page past the last one yields an empty list with the true total.
    pub async fn search_images(&self, query: &ImageQuery) -> Result<ImagePage> {
        let start = Instant::now();
        let builder = ImageFilterQueryBuilder::new(query);
        let clause = builder.build();
        let page = query.page();
        let page_size = query.page_size();

        let total = self.count_images(query).await?;

        let limit_param = clause.next_param_index();
        let offset_param = limit_param + 1;
        let sql = format!(
            "SELECT {} {} ORDER BY {} LIMIT ${} OFFSET ${}",
            IMAGE_COLUMNS,
            clause.from_where(),
            builder.order_clause(),
            limit_param,
            offset_param
        );

        let rows = bind_params(sqlx::query(&sql), &clause.params)
            .bind(page_size)
            .bind(query.offset())
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        let images = rows
            .iter()
            .map(image_from_row)
            .collect::<Result<Vec<_>>>()?;

        debug!(
            subsystem = "db",
            component = "search",
            op = "search_images",
            page,
            page_size,
            total,
            result_count = images.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Image search complete"
        );

        Ok(ImagePage {
            images,
            total,
            page,
            page_size,
        })
    }
}
