//! Filter predicates for building WHERE clauses.
//!
//! A [`Predicate`] is what a caller attaches to a command: an unqualified
//! field, an [`Operator`] and a value. During compilation it is turned into a
//! [`Filter`] whose column is the alias-qualified SQL expression supplied by the
//! entity.
//!
//! ```rust
//! use weft_query::filter::{Filter, Operator, Predicate};
//! use weft_query::sql::DatabaseType;
//!
//! let pred = Predicate::new("title", ">=".parse::<Operator>().unwrap(), "M");
//! let filter = pred.to_filter("BOOK2.title");
//! let (sql, params) = filter.to_sql(DatabaseType::PostgreSQL);
//! assert_eq!(sql, "BOOK2.title >= $1");
//! assert_eq!(params.len(), 1);
//! ```

use smol_str::SmolStr;
use std::fmt;
use std::str::FromStr;

use crate::error::QueryError;
use crate::sql::DatabaseType;
use crate::value::Value;

/// Comparison operators accepted by `where` modifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// `=`
    Eq,
    /// `!=` / `<>`
    NotEq,
    /// `<`
    Lt,
    /// `<=`
    Lte,
    /// `>`
    Gt,
    /// `>=`
    Gte,
    /// `LIKE`
    Like,
    /// `NOT LIKE`
    NotLike,
    /// `IN (...)`
    In,
    /// `NOT IN (...)`
    NotIn,
    /// `IS NULL` (value ignored)
    IsNull,
    /// `IS NOT NULL` (value ignored)
    IsNotNull,
}

impl Operator {
    /// Get the SQL spelling of this operator.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Like => "LIKE",
            Self::NotLike => "NOT LIKE",
            Self::In => "IN",
            Self::NotIn => "NOT IN",
            Self::IsNull => "IS NULL",
            Self::IsNotNull => "IS NOT NULL",
        }
    }
}

impl FromStr for Operator {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.split_whitespace().collect::<Vec<_>>().join(" ").to_uppercase();
        match normalized.as_str() {
            "=" | "==" => Ok(Self::Eq),
            "!=" | "<>" => Ok(Self::NotEq),
            "<" => Ok(Self::Lt),
            "<=" => Ok(Self::Lte),
            ">" => Ok(Self::Gt),
            ">=" => Ok(Self::Gte),
            "LIKE" => Ok(Self::Like),
            "NOT LIKE" => Ok(Self::NotLike),
            "IN" => Ok(Self::In),
            "NOT IN" => Ok(Self::NotIn),
            "IS NULL" => Ok(Self::IsNull),
            "IS NOT NULL" => Ok(Self::IsNotNull),
            _ => Err(QueryError::invalid_operator(s)),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// An unqualified `field operator value` condition attached to a command.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    /// Field name on the command's entity.
    pub field: SmolStr,
    /// The comparison.
    pub operator: Operator,
    /// Right-hand side.
    pub value: Value,
}

impl Predicate {
    /// Create a new predicate.
    pub fn new(field: impl Into<SmolStr>, operator: Operator, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }

    /// Bind this predicate to a concrete column expression.
    pub fn to_filter(&self, column: impl Into<String>) -> Filter {
        let column = column.into();
        let value = self.value.clone();
        match self.operator {
            Operator::Eq => Filter::Equals(column, value),
            Operator::NotEq => Filter::NotEquals(column, value),
            Operator::Lt => Filter::Lt(column, value),
            Operator::Lte => Filter::Lte(column, value),
            Operator::Gt => Filter::Gt(column, value),
            Operator::Gte => Filter::Gte(column, value),
            Operator::Like => Filter::Like(column, value),
            Operator::NotLike => Filter::NotLike(column, value),
            Operator::In => Filter::In(column, into_list(value)),
            Operator::NotIn => Filter::NotIn(column, into_list(value)),
            Operator::IsNull => Filter::IsNull(column),
            Operator::IsNotNull => Filter::IsNotNull(column),
        }
    }
}

fn into_list(value: Value) -> Vec<Value> {
    match value {
        Value::List(values) => values,
        other => vec![other],
    }
}

/// A WHERE condition over qualified column expressions.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Filter {
    /// No filter (always true).
    #[default]
    None,

    /// Equals comparison.
    Equals(String, Value),
    /// Not equals comparison.
    NotEquals(String, Value),

    /// Less than comparison.
    Lt(String, Value),
    /// Less than or equal comparison.
    Lte(String, Value),
    /// Greater than comparison.
    Gt(String, Value),
    /// Greater than or equal comparison.
    Gte(String, Value),

    /// Pattern match.
    Like(String, Value),
    /// Negated pattern match.
    NotLike(String, Value),

    /// In a list of values.
    In(String, Vec<Value>),
    /// Not in a list of values.
    NotIn(String, Vec<Value>),

    /// Is null check.
    IsNull(String),
    /// Is not null check.
    IsNotNull(String),

    /// Logical AND of multiple filters.
    And(Vec<Filter>),
    /// Logical OR of multiple filters.
    Or(Vec<Filter>),
    /// Logical NOT of a filter.
    Not(Box<Filter>),
}

impl Filter {
    /// Check if this filter is empty.
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Create an AND filter, dropping empty members.
    pub fn and(filters: impl IntoIterator<Item = Filter>) -> Self {
        let mut filters: Vec<_> = filters.into_iter().filter(|f| !f.is_none()).collect();
        match filters.len() {
            0 => Self::None,
            1 => filters.remove(0),
            _ => Self::And(filters),
        }
    }

    /// Create an OR filter, dropping empty members.
    pub fn or(filters: impl IntoIterator<Item = Filter>) -> Self {
        let mut filters: Vec<_> = filters.into_iter().filter(|f| !f.is_none()).collect();
        match filters.len() {
            0 => Self::None,
            1 => filters.remove(0),
            _ => Self::Or(filters),
        }
    }

    /// Create a NOT filter.
    pub fn not(filter: Filter) -> Self {
        if filter.is_none() {
            return Self::None;
        }
        Self::Not(Box::new(filter))
    }

    /// Combine with another filter using AND.
    pub fn and_then(self, other: Filter) -> Self {
        if self.is_none() {
            return other;
        }
        if other.is_none() {
            return self;
        }
        match self {
            Self::And(mut filters) => {
                filters.push(other);
                Self::And(filters)
            }
            _ => Self::And(vec![self, other]),
        }
    }

    /// Generate SQL for this filter with parameter placeholders numbered from 1.
    pub fn to_sql(&self, db: DatabaseType) -> (String, Vec<Value>) {
        let mut sql = String::new();
        let mut params = Vec::new();
        self.write_sql(db, &mut sql, &mut params);
        (sql, params)
    }

    /// Write SQL into `buffer`, appending bound values to `params`.
    ///
    /// Placeholders continue numbering after the values already in `params`.
    pub fn write_sql(&self, db: DatabaseType, buffer: &mut String, params: &mut Vec<Value>) {
        match self {
            Self::None => buffer.push_str("TRUE"),

            Self::Equals(col, val) if val.is_null() => {
                buffer.push_str(col);
                buffer.push_str(" IS NULL");
            }
            Self::NotEquals(col, val) if val.is_null() => {
                buffer.push_str(col);
                buffer.push_str(" IS NOT NULL");
            }
            Self::Equals(col, val) => write_comparison(db, buffer, params, col, "=", val),
            Self::NotEquals(col, val) => write_comparison(db, buffer, params, col, "!=", val),
            Self::Lt(col, val) => write_comparison(db, buffer, params, col, "<", val),
            Self::Lte(col, val) => write_comparison(db, buffer, params, col, "<=", val),
            Self::Gt(col, val) => write_comparison(db, buffer, params, col, ">", val),
            Self::Gte(col, val) => write_comparison(db, buffer, params, col, ">=", val),
            Self::Like(col, val) => write_comparison(db, buffer, params, col, "LIKE", val),
            Self::NotLike(col, val) => write_comparison(db, buffer, params, col, "NOT LIKE", val),

            Self::In(_, values) if values.is_empty() => buffer.push_str("FALSE"),
            Self::NotIn(_, values) if values.is_empty() => buffer.push_str("TRUE"),
            Self::In(col, values) => write_list(db, buffer, params, col, "IN", values),
            Self::NotIn(col, values) => write_list(db, buffer, params, col, "NOT IN", values),

            Self::IsNull(col) => {
                buffer.push_str(col);
                buffer.push_str(" IS NULL");
            }
            Self::IsNotNull(col) => {
                buffer.push_str(col);
                buffer.push_str(" IS NOT NULL");
            }

            Self::And(filters) if filters.is_empty() => buffer.push_str("TRUE"),
            Self::Or(filters) if filters.is_empty() => buffer.push_str("FALSE"),
            Self::And(filters) => write_group(db, buffer, params, filters, " AND "),
            Self::Or(filters) => write_group(db, buffer, params, filters, " OR "),
            Self::Not(filter) => {
                buffer.push_str("NOT (");
                filter.write_sql(db, buffer, params);
                buffer.push(')');
            }
        }
    }
}

fn write_comparison(
    db: DatabaseType,
    buffer: &mut String,
    params: &mut Vec<Value>,
    column: &str,
    op: &str,
    value: &Value,
) {
    params.push(value.clone());
    buffer.push_str(column);
    buffer.push(' ');
    buffer.push_str(op);
    buffer.push(' ');
    buffer.push_str(&db.placeholder(params.len()));
}

fn write_list(
    db: DatabaseType,
    buffer: &mut String,
    params: &mut Vec<Value>,
    column: &str,
    op: &str,
    values: &[Value],
) {
    buffer.push_str(column);
    buffer.push(' ');
    buffer.push_str(op);
    buffer.push_str(" (");
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            buffer.push_str(", ");
        }
        params.push(value.clone());
        buffer.push_str(&db.placeholder(params.len()));
    }
    buffer.push(')');
}

fn write_group(
    db: DatabaseType,
    buffer: &mut String,
    params: &mut Vec<Value>,
    filters: &[Filter],
    joiner: &str,
) {
    buffer.push('(');
    for (i, filter) in filters.iter().enumerate() {
        if i > 0 {
            buffer.push_str(joiner);
        }
        filter.write_sql(db, buffer, params);
    }
    buffer.push(')');
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_parsing() {
        assert_eq!("=".parse::<Operator>().unwrap(), Operator::Eq);
        assert_eq!("<>".parse::<Operator>().unwrap(), Operator::NotEq);
        assert_eq!("not   like".parse::<Operator>().unwrap(), Operator::NotLike);
        assert_eq!("is not null".parse::<Operator>().unwrap(), Operator::IsNotNull);

        let err = "~=".parse::<Operator>().unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_predicate_equals() {
        let filter = Predicate::new("email", Operator::Eq, "a@example.com").to_filter("AUTHOR1.email");
        let (sql, params) = filter.to_sql(DatabaseType::PostgreSQL);
        assert_eq!(sql, "AUTHOR1.email = $1");
        assert_eq!(params, vec![Value::from("a@example.com")]);
    }

    #[test]
    fn test_equals_null_becomes_is_null() {
        let filter = Predicate::new("deleted_at", Operator::Eq, Value::Null).to_filter("BOOK2.deleted_at");
        let (sql, params) = filter.to_sql(DatabaseType::PostgreSQL);
        assert_eq!(sql, "BOOK2.deleted_at IS NULL");
        assert!(params.is_empty());
    }

    #[test]
    fn test_in_accepts_scalar_and_list() {
        let list = Predicate::new("id", Operator::In, vec![1i64, 2, 3]).to_filter("BOOK2.id");
        let (sql, params) = list.to_sql(DatabaseType::PostgreSQL);
        assert_eq!(sql, "BOOK2.id IN ($1, $2, $3)");
        assert_eq!(params.len(), 3);

        let scalar = Predicate::new("id", Operator::In, 7i64).to_filter("BOOK2.id");
        let (sql, _) = scalar.to_sql(DatabaseType::SQLite);
        assert_eq!(sql, "BOOK2.id IN (?)");
    }

    #[test]
    fn test_empty_in_is_false() {
        let (sql, params) = Filter::In("x".into(), vec![]).to_sql(DatabaseType::PostgreSQL);
        assert_eq!(sql, "FALSE");
        assert!(params.is_empty());
    }

    #[test]
    fn test_nested_groups_number_params_in_order() {
        let filter = Filter::and([
            Filter::Equals("a".into(), Value::Int(1)),
            Filter::or([
                Filter::Gt("b".into(), Value::Int(2)),
                Filter::Lt("c".into(), Value::Int(3)),
            ]),
            Filter::not(Filter::Like("d".into(), "x%".into())),
        ]);
        let (sql, params) = filter.to_sql(DatabaseType::PostgreSQL);
        assert_eq!(sql, "(a = $1 AND (b > $2 OR c < $3) AND NOT (d LIKE $4))");
        assert_eq!(params.len(), 4);
    }

    #[test]
    fn test_and_then_flattens() {
        let filter = Filter::None
            .and_then(Filter::IsNull("a".into()))
            .and_then(Filter::IsNull("b".into()))
            .and_then(Filter::IsNull("c".into()));
        match filter {
            Filter::And(parts) => assert_eq!(parts.len(), 3),
            other => panic!("expected AND, got {:?}", other),
        }
    }

    #[test]
    fn test_write_sql_continues_numbering() {
        let mut params = vec![Value::Int(1)];
        let mut sql = String::new();
        Filter::Equals("x".into(), Value::Int(2)).write_sql(DatabaseType::PostgreSQL, &mut sql, &mut params);
        assert_eq!(sql, "x = $2");
    }
}
