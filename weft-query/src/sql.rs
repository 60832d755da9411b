//! SQL generation utilities.
//!
//! [`SelectQuery`] is the builder entities write into: projected columns
//! labelled `"<alias>:<field>"`, joins, a WHERE filter, ordering and
//! pagination. [`SelectQuery::build`] renders it for one [`DatabaseType`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::QueryError;
use crate::filter::Filter;
use crate::pagination::Pagination;
use crate::types::SortOrder;
use crate::value::Value;

/// Escape a string for use in SQL (for identifiers, not values).
pub fn escape_identifier(name: &str) -> String {
    let escaped = name.replace('"', "\"\"");
    format!("\"{}\"", escaped)
}

/// Check if an identifier needs quoting.
pub fn needs_quoting(name: &str) -> bool {
    let reserved = [
        "user", "order", "group", "select", "from", "where", "table", "index", "key", "primary",
        "foreign", "check", "default", "null", "not", "and", "or", "in", "is", "like", "between",
        "case", "when", "then", "else", "end", "as", "on", "join", "left", "right", "inner",
        "outer", "cross", "limit", "offset", "union", "all", "distinct", "having",
    ];

    if reserved.contains(&name.to_lowercase().as_str()) {
        return true;
    }

    !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Quote an identifier if needed.
pub fn quote_identifier(name: &str) -> String {
    if needs_quoting(name) {
        escape_identifier(name)
    } else {
        name.to_string()
    }
}

/// Target database dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DatabaseType {
    /// PostgreSQL uses $1, $2, etc.
    #[default]
    #[serde(rename = "postgres", alias = "postgresql")]
    PostgreSQL,
    /// MySQL uses ?, ?, etc.
    #[serde(rename = "mysql")]
    MySQL,
    /// SQLite uses ?, ?, etc.
    #[serde(rename = "sqlite")]
    SQLite,
}

impl DatabaseType {
    /// Get the parameter placeholder for this database type (1-based index).
    pub fn placeholder(&self, index: usize) -> String {
        match self {
            Self::PostgreSQL => format!("${}", index),
            Self::MySQL | Self::SQLite => "?".to_string(),
        }
    }

    /// Quote a column label. Labels contain `:` and always need quoting.
    pub fn quote_label(&self, label: &str) -> String {
        match self {
            Self::MySQL => format!("`{}`", label.replace('`', "``")),
            Self::PostgreSQL | Self::SQLite => escape_identifier(label),
        }
    }
}

impl FromStr for DatabaseType {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(Self::PostgreSQL),
            "mysql" | "mariadb" => Ok(Self::MySQL),
            "sqlite" => Ok(Self::SQLite),
            _ => Err(QueryError::invalid_configuration("database", s)),
        }
    }
}

impl fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::PostgreSQL => "postgres",
            Self::MySQL => "mysql",
            Self::SQLite => "sqlite",
        })
    }
}

/// Join flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinType {
    /// `INNER JOIN`
    #[default]
    Inner,
    /// `LEFT JOIN`
    Left,
}

impl JoinType {
    /// SQL keyword for this join.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Inner => "INNER JOIN",
            Self::Left => "LEFT JOIN",
        }
    }
}

impl FromStr for JoinType {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "inner" => Ok(Self::Inner),
            "left" => Ok(Self::Left),
            _ => Err(QueryError::invalid_configuration("join_type", s)),
        }
    }
}

/// One JOIN clause: `<kind> <table> AS <alias> ON <alias>.<col> = <expr> AND ...`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Join {
    /// Join flavour.
    pub kind: JoinType,
    /// Joined table (already quoted if needed).
    pub table: String,
    /// Alias of the joined table.
    pub alias: String,
    /// Equality bindings `(joined column expression, other side expression)`.
    pub on: Vec<(String, String)>,
}

/// A selected column and its result label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectColumn {
    /// Column expression, e.g. `BOOK2.title`.
    pub expr: String,
    /// Result label, e.g. `BOOK2:title`.
    pub label: String,
}

/// A SELECT statement under construction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectQuery {
    from: Option<(String, String)>,
    columns: Vec<SelectColumn>,
    joins: Vec<Join>,
    filter: Filter,
    order_by: Vec<(String, SortOrder)>,
    pagination: Pagination,
}

impl SelectQuery {
    /// Start a query selecting from `table` under `alias`.
    pub fn from(table: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            from: Some((table.into(), alias.into())),
            ..Self::default()
        }
    }

    /// Add a labelled column. A label that is already selected is skipped.
    pub fn column(&mut self, expr: impl Into<String>, label: impl Into<String>) -> &mut Self {
        let label = label.into();
        if !self.columns.iter().any(|c| c.label == label) {
            self.columns.push(SelectColumn {
                expr: expr.into(),
                label,
            });
        }
        self
    }

    /// Add a join clause.
    pub fn join(&mut self, join: Join) -> &mut Self {
        self.joins.push(join);
        self
    }

    /// AND a condition into the WHERE clause.
    pub fn filter(&mut self, filter: Filter) -> &mut Self {
        self.filter = std::mem::take(&mut self.filter).and_then(filter);
        self
    }

    /// Append an ORDER BY term.
    pub fn order_by(&mut self, expr: impl Into<String>, order: SortOrder) -> &mut Self {
        self.order_by.push((expr.into(), order));
        self
    }

    /// Set LIMIT/OFFSET.
    pub fn paginate(&mut self, pagination: Pagination) -> &mut Self {
        self.pagination = pagination;
        self
    }

    /// Selected columns in order.
    pub fn columns(&self) -> &[SelectColumn] {
        &self.columns
    }

    /// Join clauses in order.
    pub fn joins(&self) -> &[Join] {
        &self.joins
    }

    /// Render the statement for a dialect.
    pub fn build(&self, db: DatabaseType) -> CompiledQuery {
        let mut sql = String::with_capacity(128 + self.columns.len() * 32);
        let mut params = Vec::new();

        sql.push_str("SELECT ");
        if self.columns.is_empty() {
            sql.push('*');
        }
        for (i, column) in self.columns.iter().enumerate() {
            if i > 0 {
                sql.push_str(", ");
            }
            sql.push_str(&column.expr);
            sql.push_str(" AS ");
            sql.push_str(&db.quote_label(&column.label));
        }

        if let Some((table, alias)) = &self.from {
            sql.push_str(" FROM ");
            sql.push_str(table);
            sql.push_str(" AS ");
            sql.push_str(alias);
        }

        for join in &self.joins {
            sql.push(' ');
            sql.push_str(join.kind.as_sql());
            sql.push(' ');
            sql.push_str(&join.table);
            sql.push_str(" AS ");
            sql.push_str(&join.alias);
            sql.push_str(" ON ");
            for (i, (left, right)) in join.on.iter().enumerate() {
                if i > 0 {
                    sql.push_str(" AND ");
                }
                sql.push_str(left);
                sql.push_str(" = ");
                sql.push_str(right);
            }
        }

        if !self.filter.is_none() {
            sql.push_str(" WHERE ");
            self.filter.write_sql(db, &mut sql, &mut params);
        }

        if !self.order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            for (i, (expr, order)) in self.order_by.iter().enumerate() {
                if i > 0 {
                    sql.push_str(", ");
                }
                sql.push_str(expr);
                sql.push(' ');
                sql.push_str(order.as_sql());
            }
        }

        if !self.pagination.is_empty() {
            sql.push(' ');
            self.pagination.write_sql(db, &mut sql);
        }

        CompiledQuery {
            sql,
            params,
            columns: self.columns.iter().map(|c| c.label.clone()).collect(),
        }
    }
}

/// A rendered statement handed to the executor.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    /// SQL text with placeholders.
    pub sql: String,
    /// Bound parameters in placeholder order.
    pub params: Vec<Value>,
    /// Result labels (`"<alias>:<field>"`) in select order.
    pub columns: Vec<String>,
}

impl fmt::Display for CompiledQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_quote_identifier() {
        assert_eq!(quote_identifier("book"), "book");
        assert_eq!(quote_identifier("user"), "\"user\"");
        assert_eq!(quote_identifier("my table"), "\"my table\"");
        assert_eq!(escape_identifier("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_database_type_parsing() {
        assert_eq!("Postgres".parse::<DatabaseType>().unwrap(), DatabaseType::PostgreSQL);
        assert_eq!("sqlite".parse::<DatabaseType>().unwrap(), DatabaseType::SQLite);
        let err = "oracle".parse::<DatabaseType>().unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::InvalidConfiguration);
    }

    #[test]
    fn test_placeholders_and_labels() {
        assert_eq!(DatabaseType::PostgreSQL.placeholder(3), "$3");
        assert_eq!(DatabaseType::MySQL.placeholder(3), "?");
        assert_eq!(DatabaseType::PostgreSQL.quote_label("BOOK2:id"), "\"BOOK2:id\"");
        assert_eq!(DatabaseType::MySQL.quote_label("BOOK2:id"), "`BOOK2:id`");
    }

    #[test]
    fn test_build_full_select() {
        let mut query = SelectQuery::from("author", "AUTHOR1");
        query
            .column("AUTHOR1.id", "AUTHOR1:id")
            .column("BOOK2.id", "BOOK2:id")
            .column("BOOK2.id", "BOOK2:id")
            .join(Join {
                kind: JoinType::Left,
                table: "book".into(),
                alias: "BOOK2".into(),
                on: vec![("BOOK2.author_id".into(), "AUTHOR1.id".into())],
            })
            .filter(Filter::Equals("AUTHOR1.id".into(), Value::Int(1)))
            .order_by("BOOK2.id", SortOrder::Asc)
            .paginate(Pagination::new().limit(10));

        let compiled = query.build(DatabaseType::PostgreSQL);
        assert_eq!(
            compiled.sql,
            "SELECT AUTHOR1.id AS \"AUTHOR1:id\", BOOK2.id AS \"BOOK2:id\" \
             FROM author AS AUTHOR1 \
             LEFT JOIN book AS BOOK2 ON BOOK2.author_id = AUTHOR1.id \
             WHERE AUTHOR1.id = $1 ORDER BY BOOK2.id ASC LIMIT 10"
        );
        assert_eq!(compiled.params, vec![Value::Int(1)]);
        assert_eq!(compiled.columns, vec!["AUTHOR1:id", "BOOK2:id"]);
    }

    #[test]
    fn test_multi_column_join_condition() {
        let mut query = SelectQuery::from("a", "A1");
        query.join(Join {
            kind: JoinType::Inner,
            table: "b".into(),
            alias: "B2".into(),
            on: vec![
                ("B2.x".into(), "A1.x".into()),
                ("B2.y".into(), "A1.y".into()),
            ],
        });
        let sql = query.build(DatabaseType::SQLite).sql;
        assert_eq!(sql, "SELECT * FROM a AS A1 INNER JOIN b AS B2 ON B2.x = A1.x AND B2.y = A1.y");
    }
}
