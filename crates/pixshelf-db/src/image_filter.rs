//! Filter query builder for image search.
//!
//! One [`FilterClause`] is built per request and shared by the listing and
//! the count query, so both always see the same set of rows. Every caller
//! value is a bound parameter; the only text spliced into SQL comes from
//! fixed fragments and the sort allow-list.

use sqlx::postgres::PgArguments;
use sqlx::query::Query;
use sqlx::Postgres;

use pixshelf_core::{ImageQuery, SortColumn};

/// Type-safe parameter binding for SQL queries.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryParam {
    /// 64-bit integer parameter.
    BigInt(i64),
    /// Boolean parameter.
    Bool(bool),
    /// Text parameter.
    Text(String),
    /// Array of text values (for `= ANY(...)`).
    TextArray(Vec<String>),
}

/// Bind parameters in the order they appear in the SQL.
pub(crate) fn bind_params<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    params: &'q [QueryParam],
) -> Query<'q, Postgres, PgArguments> {
    for param in params {
        query = match param {
            QueryParam::BigInt(v) => query.bind(v),
            QueryParam::Bool(b) => query.bind(b),
            QueryParam::Text(s) => query.bind(s),
            QueryParam::TextArray(arr) => query.bind(arr),
        };
    }
    query
}

/// SQL fragments selecting the images that match a query, relative to
/// `image i JOIN author a ON a.id = i.author_id`.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterClause {
    /// Extra joins (empty when no tag filter is present).
    pub joins: String,
    /// WHERE body, never empty.
    pub where_clause: String,
    /// GROUP BY ... HAVING ... (empty when no tag filter is present).
    pub group_clause: String,
    pub params: Vec<QueryParam>,
}

impl FilterClause {
    /// `FROM ... WHERE ... [GROUP BY ... HAVING ...]` shared by both queries.
    pub fn from_where(&self) -> String {
        let mut sql = String::from("FROM image i JOIN author a ON a.id = i.author_id");
        if !self.joins.is_empty() {
            sql.push(' ');
            sql.push_str(&self.joins);
        }
        sql.push_str(" WHERE ");
        sql.push_str(&self.where_clause);
        if !self.group_clause.is_empty() {
            sql.push(' ');
            sql.push_str(&self.group_clause);
        }
        sql
    }

    /// Index of the next placeholder after the filter's own parameters.
    pub fn next_param_index(&self) -> usize {
        self.params.len() + 1
    }
}

/// Builds a [`FilterClause`] and ORDER BY clause from an [`ImageQuery`].
pub struct ImageFilterQueryBuilder<'a> {
    query: &'a ImageQuery,
}

impl<'a> ImageFilterQueryBuilder<'a> {
    pub fn new(query: &'a ImageQuery) -> Self {
        Self { query }
    }

    pub fn build(&self) -> FilterClause {
        let mut clauses =
            vec!["i.url_original IS NOT NULL AND i.url_original <> ''".to_string()];
        let mut params = Vec::new();
        let mut joins = String::new();
        let mut group_clause = String::new();

        if let Some(author) = self.query.author_filter() {
            params.push(QueryParam::Text(author.to_string()));
            clauses.push(format!("a.name = ${}", params.len()));
        }

        if let Some(min) = self.query.bookmark_min {
            params.push(QueryParam::BigInt(min));
            clauses.push(format!("i.bookmark_count >= ${}", params.len()));
        }

        if let Some(max) = self.query.bookmark_max {
            params.push(QueryParam::BigInt(max));
            clauses.push(format!("i.bookmark_count <= ${}", params.len()));
        }

        if let Some(bookmarked) = self.query.is_bookmarked {
            params.push(QueryParam::Bool(bookmarked));
            clauses.push(format!("i.is_bookmarked = ${}", params.len()));
        }

        let tags = self.query.requested_tags();
        if !tags.is_empty() {
            let tag_count = tags.len() as i64;
            joins.push_str(
                "JOIN image_tag it ON it.image_pid = i.pid JOIN tag t ON t.id = it.tag_id",
            );
            params.push(QueryParam::TextArray(tags));
            clauses.push(format!("t.name = ANY(${}::text[])", params.len()));
            params.push(QueryParam::BigInt(tag_count));
            group_clause = format!(
                "GROUP BY i.id, a.id HAVING COUNT(DISTINCT t.id) = ${}",
                params.len()
            );
        }

        FilterClause {
            joins,
            where_clause: clauses.join(" AND "),
            group_clause,
            params,
        }
    }

    /// ORDER BY body from the sort allow-list, with `i.id` as tie-breaker.
    pub fn order_clause(&self) -> String {
        let column = match self.query.sort_column() {
            SortColumn::Id => "i.id",
            SortColumn::Pid => "i.pid",
            SortColumn::Name => "i.name",
            SortColumn::BookmarkCount => "i.bookmark_count",
        };
        let direction = self.query.sort_direction().as_sql();
        if column == "i.id" {
            format!("i.id {}", direction)
        } else {
            format!("{} {}, i.id {}", column, direction, direction)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_query_only_requires_primary_url() {
        let q = ImageQuery::new();
        let clause = ImageFilterQueryBuilder::new(&q).build();
        assert_eq!(
            clause.where_clause,
            "i.url_original IS NOT NULL AND i.url_original <> ''"
        );
        assert!(clause.joins.is_empty());
        assert!(clause.group_clause.is_empty());
        assert!(clause.params.is_empty());
        assert_eq!(clause.next_param_index(), 1);
    }

    #[test]
    fn test_tag_filter_requires_every_tag() {
        let q = ImageQuery::new().with_tags(["a", "b", "a"]);
        let clause = ImageFilterQueryBuilder::new(&q).build();

        assert!(clause.joins.contains("JOIN image_tag it"));
        assert!(clause.where_clause.contains("t.name = ANY($1::text[])"));
        assert_eq!(
            clause.group_clause,
            "GROUP BY i.id, a.id HAVING COUNT(DISTINCT t.id) = $2"
        );
        assert_eq!(
            clause.params,
            vec![
                QueryParam::TextArray(vec!["a".into(), "b".into()]),
                QueryParam::BigInt(2),
            ]
        );
    }

    #[test]
    fn test_scalar_filters_are_bound_in_order() {
        let q = ImageQuery::new()
            .with_author("artist")
            .with_bookmark_range(Some(5), Some(10))
            .with_bookmarked(true);
        let clause = ImageFilterQueryBuilder::new(&q).build();

        assert!(clause.where_clause.contains("a.name = $1"));
        assert!(clause.where_clause.contains("i.bookmark_count >= $2"));
        assert!(clause.where_clause.contains("i.bookmark_count <= $3"));
        assert!(clause.where_clause.contains("i.is_bookmarked = $4"));
        assert_eq!(
            clause.params,
            vec![
                QueryParam::Text("artist".into()),
                QueryParam::BigInt(5),
                QueryParam::BigInt(10),
                QueryParam::Bool(true),
            ]
        );
        assert_eq!(clause.next_param_index(), 5);
    }

    #[test]
    fn test_untrusted_values_never_reach_sql_text() {
        let hostile = "x'; DROP TABLE image; --";
        let q = ImageQuery::new()
            .with_author(hostile)
            .with_tags([hostile])
            .with_sort(hostile, hostile);
        let builder = ImageFilterQueryBuilder::new(&q);
        let clause = builder.build();

        assert!(!clause.from_where().contains("DROP"));
        assert_eq!(builder.order_clause(), "i.pid DESC, i.id DESC");
    }

    #[test]
    fn test_empty_author_adds_no_predicate() {
        let q = ImageQuery::new().with_author("");
        let clause = ImageFilterQueryBuilder::new(&q).build();
        assert!(!clause.where_clause.contains("a.name"));
        assert!(clause.params.is_empty());
    }

    #[test]
    fn test_blank_tags_add_no_join() {
        let q = ImageQuery::new().with_tags(["", "  "]);
        let clause = ImageFilterQueryBuilder::new(&q).build();
        assert!(clause.joins.is_empty());
    }

    #[test]
    fn test_order_clause_allow_list() {
        let q = ImageQuery::new().with_sort("bookmark_count", "asc");
        assert_eq!(
            ImageFilterQueryBuilder::new(&q).order_clause(),
            "i.bookmark_count ASC, i.id ASC"
        );

        let q = ImageQuery::new().with_sort("id", "ASC");
        assert_eq!(ImageFilterQueryBuilder::new(&q).order_clause(), "i.id ASC");
    }

    #[test]
    fn test_from_where_includes_group_after_where() {
        let q = ImageQuery::new().with_tags(["a"]).with_author("z");
        let sql = ImageFilterQueryBuilder::new(&q).build().from_where();
        let where_at = sql.find(" WHERE ").unwrap();
        let group_at = sql.find("GROUP BY").unwrap();
        assert!(where_at < group_at);
        assert!(sql.starts_with("FROM image i JOIN author a ON a.id = i.author_id JOIN image_tag"));
    }
}
