//! Modifier types attached to commands: ordering and field projection.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::fmt;
use std::str::FromStr;

use crate::entity::Entity;
use crate::error::{QueryError, QueryResult};

/// Sort order for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Ascending order.
    #[default]
    Asc,
    /// Descending order.
    Desc,
}

impl SortOrder {
    /// Get the SQL keyword for this sort order.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl FromStr for SortOrder {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "ASC" => Ok(Self::Asc),
            "DESC" => Ok(Self::Desc),
            _ => Err(QueryError::invalid_order_by(s)),
        }
    }
}

/// Order by specification for a single field of a command's entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderByField {
    /// The field name (not the column; the entity maps it).
    pub field: SmolStr,
    /// The sort order.
    pub order: SortOrder,
}

impl OrderByField {
    /// Create a new order by field.
    pub fn new(field: impl Into<SmolStr>, order: SortOrder) -> Self {
        Self {
            field: field.into(),
            order,
        }
    }

    /// Create an ascending order.
    pub fn asc(field: impl Into<SmolStr>) -> Self {
        Self::new(field, SortOrder::Asc)
    }

    /// Create a descending order.
    pub fn desc(field: impl Into<SmolStr>) -> Self {
        Self::new(field, SortOrder::Desc)
    }

    /// Parse a textual clause of the form `field [ASC|DESC]`.
    ///
    /// ```rust
    /// use weft_query::types::{OrderByField, SortOrder};
    ///
    /// let clause = OrderByField::parse("title desc").unwrap();
    /// assert_eq!(clause, OrderByField::new("title", SortOrder::Desc));
    /// assert!(OrderByField::parse("title sideways").is_err());
    /// ```
    pub fn parse(clause: &str) -> QueryResult<Self> {
        let mut parts = clause.split_whitespace();
        let field = parts
            .next()
            .filter(|f| is_identifier(f))
            .ok_or_else(|| QueryError::invalid_order_by(clause))?;
        let order = match parts.next() {
            Some(dir) => dir
                .parse()
                .map_err(|_| QueryError::invalid_order_by(clause))?,
            None => SortOrder::Asc,
        };
        if parts.next().is_some() {
            return Err(QueryError::invalid_order_by(clause));
        }
        Ok(Self::new(field, order))
    }

    /// Parse a comma-separated list of clauses, e.g. `"year DESC, title"`.
    pub fn parse_list(clause: &str) -> QueryResult<Vec<Self>> {
        clause.split(',').map(Self::parse).collect()
    }
}

impl fmt::Display for OrderByField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.field, self.order)
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Field projection of a command.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Projection {
    /// All fields of the entity.
    #[default]
    All,
    /// Only the listed fields (primary key added implicitly).
    Only(Vec<SmolStr>),
    /// Every field except the listed ones (primary key never excluded).
    Except(Vec<SmolStr>),
}

impl Projection {
    /// Check if this selects all fields.
    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }

    /// Resolve the projection against an entity, in the entity's field order.
    ///
    /// Primary-key fields are always part of the result. Naming a field the
    /// entity does not have is an error.
    pub fn resolve(&self, entity: &Entity) -> QueryResult<Vec<SmolStr>> {
        let listed = match self {
            Self::All => return Ok(entity.fields_all().map(|f| f.name.clone()).collect()),
            Self::Only(fields) | Self::Except(fields) => fields,
        };
        for name in listed {
            if entity.field(name).is_none() {
                return Err(QueryError::unknown_field(entity.name(), name.as_str()));
            }
        }

        let include = |name: &SmolStr| {
            let is_pk = entity.primary_key().contains(name);
            let listed = listed.contains(name);
            match self {
                Self::Only(_) => is_pk || listed,
                _ => is_pk || !listed,
            }
        };
        Ok(entity
            .fields_all()
            .map(|f| &f.name)
            .filter(|name| include(*name))
            .cloned()
            .collect())
    }
}
