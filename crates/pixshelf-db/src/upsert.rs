//! Generic get-or-create by unique key.
//!
//! Authors and tags are both "look up by a natural key, create on first
//! reference" entities. Both go through a single
//! `INSERT ... ON CONFLICT (key) DO UPDATE ... RETURNING id` statement so
//! concurrent callers converge on one row instead of racing a
//! select-then-insert.

use sqlx::{Pool, Postgres};

use pixshelf_core::{Error, Result};

/// How a non-key column is treated when the row already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnConflict {
    /// Replace the stored value with the incoming one.
    Overwrite,
    /// Keep the stored value unless it is NULL or empty.
    FillIfEmpty,
}

/// Non-key column written by an upsert.
#[derive(Debug, Clone)]
pub struct UpsertColumn {
    pub name: &'static str,
    pub value: Option<String>,
    pub on_conflict: OnConflict,
}

/// An entity resolved by a unique text key.
pub trait UniqueEntity {
    const TABLE: &'static str;
    const KEY_COLUMN: &'static str;
    /// Predicate of the partial unique index backing the key, if the index
    /// is partial.
    const KEY_PREDICATE: Option<&'static str> = None;

    fn key(&self) -> &str;

    fn columns(&self) -> Vec<UpsertColumn>;
}

/// Build the upsert statement for an entity with the given non-key columns.
///
/// `$1` is the key and `$2..` are the columns in order.
pub fn build_upsert_sql<E: UniqueEntity>(columns: &[UpsertColumn]) -> String {
    let mut insert_cols = vec![E::KEY_COLUMN.to_string()];
    let mut placeholders = vec!["$1".to_string()];
    // Touch the key so RETURNING yields the existing row on conflict.
    let mut assignments = vec![format!("{key} = EXCLUDED.{key}", key = E::KEY_COLUMN)];

    for (i, col) in columns.iter().enumerate() {
        insert_cols.push(col.name.to_string());
        placeholders.push(format!("${}", i + 2));
        assignments.push(match col.on_conflict {
            OnConflict::Overwrite => format!("{c} = EXCLUDED.{c}", c = col.name),
            OnConflict::FillIfEmpty => format!(
                "{c} = COALESCE(NULLIF({t}.{c}, ''), EXCLUDED.{c})",
                c = col.name,
                t = E::TABLE
            ),
        });
    }

    let target = match E::KEY_PREDICATE {
        Some(predicate) => format!("({}) WHERE {}", E::KEY_COLUMN, predicate),
        None => format!("({})", E::KEY_COLUMN),
    };

    format!(
        "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT {} DO UPDATE SET {} RETURNING id",
        E::TABLE,
        insert_cols.join(", "),
        placeholders.join(", "),
        target,
        assignments.join(", ")
    )
}

/// Resolve `entity` to its row id, creating the row on first reference.
pub async fn upsert_by_unique_key<E: UniqueEntity>(pool: &Pool<Postgres>, entity: &E) -> Result<i64> {
    let columns = entity.columns();
    let sql = build_upsert_sql::<E>(&columns);

    let mut query = sqlx::query_scalar::<_, i64>(&sql).bind(entity.key());
    for col in &columns {
        query = query.bind(col.value.as_deref());
    }

    query.fetch_one(pool).await.map_err(Error::Database)
}
