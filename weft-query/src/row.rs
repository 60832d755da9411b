//! Result rows as returned by the executor.
//!
//! Cells are keyed by their result label `"<alias>:<field>"`. During hydration
//! each row also gains one synthesized `"<alias>:__object"` slot per alias,
//! holding the object materialized from that alias's cells (or nothing when
//! the alias's primary key is null, e.g. an outer-join miss).
//!
//! ```rust
//! use weft_query::row::Row;
//! use weft_query::value::Value;
//!
//! let row: Row = [("BOOK2:id", Value::Int(10)), ("BOOK2:title", "Dune".into())]
//!     .into_iter()
//!     .collect();
//! assert_eq!(row.value("BOOK2", "id"), Some(&Value::Int(10)));
//! assert_eq!(row.cells("BOOK2").count(), 2);
//! ```

use indexmap::IndexMap;
use smol_str::SmolStr;
use std::collections::HashMap;

use crate::error::{QueryError, QueryResult};
use crate::record::ObjectId;
use crate::value::Value;

/// Name of the synthesized per-alias object slot.
pub const OBJECT_COLUMN: &str = "__object";

/// Build the result label for a field of an alias.
pub fn label(alias: &str, field: &str) -> String {
    let mut label = String::with_capacity(alias.len() + field.len() + 1);
    label.push_str(alias);
    label.push(':');
    label.push_str(field);
    label
}

/// One result row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    values: IndexMap<String, Value>,
    objects: HashMap<SmolStr, Option<ObjectId>>,
}

impl Row {
    /// Create an empty row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a cell under its full label.
    pub fn insert(&mut self, label: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.values.insert(label.into(), value.into());
        self
    }

    /// Get a cell by full label.
    pub fn get(&self, label: &str) -> Option<&Value> {
        self.values.get(label)
    }

    /// Get a cell by alias and field.
    pub fn value(&self, alias: &str, field: &str) -> Option<&Value> {
        self.values.get(&label(alias, field))
    }

    /// Get a cell by alias and field, failing when the column is absent.
    pub fn require(&self, alias: &str, field: &str) -> QueryResult<&Value> {
        let label = label(alias, field);
        self.values
            .get(&label)
            .ok_or_else(|| QueryError::missing_column(label))
    }

    /// Iterate `(field, value)` cells belonging to one alias.
    pub fn cells<'a>(&'a self, alias: &'a str) -> impl Iterator<Item = (&'a str, &'a Value)> + 'a {
        self.values.iter().filter_map(move |(label, value)| {
            label
                .strip_prefix(alias)
                .and_then(|rest| rest.strip_prefix(':'))
                .map(|field| (field, value))
        })
    }

    /// Number of cells.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the row has no cells.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Fill the object slot of an alias.
    pub fn set_object(&mut self, alias: impl Into<SmolStr>, object: Option<ObjectId>) {
        self.objects.insert(alias.into(), object);
    }

    /// Read the object slot of an alias.
    ///
    /// `Ok(None)` means the alias was hydrated and had no object in this row;
    /// an alias that was never hydrated is an error.
    pub fn object(&self, alias: &str) -> QueryResult<Option<ObjectId>> {
        self.objects
            .get(alias)
            .copied()
            .ok_or_else(|| QueryError::missing_object(label(alias, OBJECT_COLUMN)))
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            objects: HashMap::new(),
        }
    }
}
