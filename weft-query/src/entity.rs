//! Entity metadata.
//!
//! An [`Entity`] describes one mapped table: its fields and their columns,
//! primary key and declared foreign keys. Besides answering metadata
//! questions it knows how to write itself into a [`SelectQuery`] (columns,
//! ordering, joins) and how to materialize its cells out of result rows.
//!
//! ```rust
//! use weft_query::entity::Entity;
//!
//! let book = Entity::builder("BOOK")
//!     .field("id")
//!     .field("title")
//!     .column("author_id", "written_by")
//!     .primary_key(["id"])
//!     .foreign_key("AUTHOR", [("author_id", "id")])
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(book.table(), "book");
//! assert_eq!(book.field_expr("BOOK2", "author_id").unwrap(), "BOOK2.written_by");
//! ```

use indexmap::{IndexMap, IndexSet};
use smol_str::SmolStr;

use crate::error::{QueryError, QueryResult};
use crate::record::{ObjectId, ObjectStore, PrimaryKey};
use crate::row::{self, Row};
use crate::sql::{Join, JoinType, SelectQuery, quote_identifier};
use crate::types::SortOrder;

/// One mapped field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// Property name on objects.
    pub name: SmolStr,
    /// Database column.
    pub column: SmolStr,
}

/// Immutable entity descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    name: SmolStr,
    table: String,
    fields: IndexMap<SmolStr, Field>,
    primary_key: Vec<SmolStr>,
    foreign_keys: IndexMap<SmolStr, IndexMap<SmolStr, SmolStr>>,
}

impl Entity {
    /// Start building an entity.
    pub fn builder(name: impl Into<SmolStr>) -> EntityBuilder {
        EntityBuilder::new(name)
    }

    /// Entity name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Table name.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// All fields in declaration order.
    pub fn fields_all(&self) -> impl Iterator<Item = &Field> {
        self.fields.values()
    }

    /// Look up a field.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    /// Primary-key field names.
    pub fn primary_key(&self) -> &[SmolStr] {
        &self.primary_key
    }

    /// Declared foreign key to another entity: `{local field: referenced field}`.
    pub fn foreign_key_to(&self, referenced: &str) -> Option<&IndexMap<SmolStr, SmolStr>> {
        self.foreign_keys.get(referenced)
    }

    fn require_field(&self, name: &str) -> QueryResult<&Field> {
        self.field(name)
            .ok_or_else(|| QueryError::unknown_field(self.name.as_str(), name))
    }

    /// Column expression of a field under an alias, e.g. `BOOK2.title`.
    pub fn field_expr(&self, alias: &str, field: &str) -> QueryResult<String> {
        let field = self.require_field(field)?;
        Ok(format!("{}.{}", alias, quote_identifier(&field.column)))
    }

    /// Add the given fields as labelled columns of `alias`.
    pub fn query_select(
        &self,
        query: &mut SelectQuery,
        alias: &str,
        fields: &[SmolStr],
    ) -> QueryResult<()> {
        for field in fields {
            let expr = self.field_expr(alias, field)?;
            query.column(expr, row::label(alias, field));
        }
        Ok(())
    }

    /// Add an ORDER BY term for a field of `alias`.
    pub fn query_order_by(
        &self,
        query: &mut SelectQuery,
        alias: &str,
        field: &str,
        order: SortOrder,
    ) -> QueryResult<()> {
        let expr = self.field_expr(alias, field)?;
        query.order_by(expr, order);
        Ok(())
    }

    /// Join this entity under `alias`, binding each of its fields to an
    /// expression on the already joined side.
    pub fn query_join(
        &self,
        query: &mut SelectQuery,
        alias: &str,
        bindings: &[(SmolStr, String)],
        join_type: JoinType,
    ) -> QueryResult<()> {
        if bindings.is_empty() {
            return Err(QueryError::invalid_mapping(
                self.name.as_str(),
                alias,
                "join without bindings",
            ));
        }
        let on = bindings
            .iter()
            .map(|(field, source)| Ok((self.field_expr(alias, field)?, source.clone())))
            .collect::<QueryResult<Vec<_>>>()?;
        query.join(Join {
            kind: join_type,
            table: quote_identifier(&self.table),
            alias: alias.to_string(),
            on,
        });
        Ok(())
    }

    /// Read the primary key of `alias` from a row.
    pub fn row_key(&self, row: &Row, alias: &str) -> QueryResult<PrimaryKey> {
        self.primary_key
            .iter()
            .map(|pk| row.require(alias, pk).cloned())
            .collect::<QueryResult<Vec<_>>>()
            .map(PrimaryKey)
    }

    /// Materialize the cells of `alias` from every row.
    ///
    /// Each row's object slot for `alias` is filled. Rows whose key is entirely
    /// null carry no object. The returned sequence follows row order with
    /// duplicates removed.
    pub fn object_load(
        &self,
        rows: &mut [Row],
        alias: &str,
        store: &mut ObjectStore,
    ) -> QueryResult<Vec<ObjectId>> {
        let mut loaded = IndexSet::new();
        for row in rows.iter_mut() {
            let key = self.row_key(row, alias)?;
            if key.is_null() {
                row.set_object(alias, None);
                continue;
            }
            let values: Vec<_> = row
                .cells(alias)
                .filter(|(field, _)| self.fields.contains_key(*field))
                .map(|(field, value)| (SmolStr::new(field), value.clone()))
                .collect();
            let id = store.load(&self.name, key, values);
            row.set_object(alias, Some(id));
            loaded.insert(id);
        }
        Ok(loaded.into_iter().collect())
    }
}

/// Builder for [`Entity`].
#[derive(Debug, Clone)]
pub struct EntityBuilder {
    name: SmolStr,
    table: Option<String>,
    fields: IndexMap<SmolStr, Field>,
    primary_key: Vec<SmolStr>,
    foreign_keys: IndexMap<SmolStr, IndexMap<SmolStr, SmolStr>>,
}

impl EntityBuilder {
    fn new(name: impl Into<SmolStr>) -> Self {
        Self {
            name: name.into(),
            table: None,
            fields: IndexMap::new(),
            primary_key: Vec::new(),
            foreign_keys: IndexMap::new(),
        }
    }

    /// Set the table name (default: lowercased entity name).
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Add a field stored in a column of the same name.
    pub fn field(self, name: impl Into<SmolStr>) -> Self {
        let name = name.into();
        self.column(name.clone(), name)
    }

    /// Add a field stored in a differently named column.
    pub fn column(mut self, name: impl Into<SmolStr>, column: impl Into<SmolStr>) -> Self {
        let name = name.into();
        self.fields.insert(
            name.clone(),
            Field {
                name,
                column: column.into(),
            },
        );
        self
    }

    /// Set the primary-key fields (default: `id`).
    pub fn primary_key<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<SmolStr>,
    {
        self.primary_key = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Declare a foreign key to `referenced` as `(local field, referenced field)` pairs.
    pub fn foreign_key<I, A, B>(mut self, referenced: impl Into<SmolStr>, pairs: I) -> Self
    where
        I: IntoIterator<Item = (A, B)>,
        A: Into<SmolStr>,
        B: Into<SmolStr>,
    {
        self.foreign_keys.insert(
            referenced.into(),
            pairs.into_iter().map(|(a, b)| (a.into(), b.into())).collect(),
        );
        self
    }

    /// Validate and build.
    pub fn build(self) -> QueryResult<Entity> {
        let primary_key = if self.primary_key.is_empty() {
            vec![SmolStr::new("id")]
        } else {
            self.primary_key
        };
        for pk in &primary_key {
            if !self.fields.contains_key(pk) {
                return Err(QueryError::unknown_field(self.name.as_str(), pk.as_str())
                    .with_context("declare primary key"));
            }
        }
        for local in self.foreign_keys.values().flat_map(IndexMap::keys) {
            if !self.fields.contains_key(local) {
                return Err(QueryError::unknown_field(self.name.as_str(), local.as_str())
                    .with_context("declare foreign key"));
            }
        }
        Ok(Entity {
            table: self.table.unwrap_or_else(|| self.name.to_lowercase()),
            name: self.name,
            fields: self.fields,
            primary_key,
            foreign_keys: self.foreign_keys,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::record::Properties;
    use crate::value::Value;
    use pretty_assertions::assert_eq;

    fn book() -> Entity {
        Entity::builder("BOOK")
            .field("id")
            .field("title")
            .field("author_id")
            .build()
            .unwrap()
    }

    fn book_row(id: Option<i64>, title: &str) -> Row {
        [
            ("BOOK2:id", Value::from(id)),
            ("BOOK2:title", Value::from(title)),
            ("AUTHOR1:id", Value::Int(1)),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_builder_defaults() {
        let book = book();
        assert_eq!(book.table(), "book");
        assert_eq!(book.primary_key(), &["id"]);
        assert!(book.foreign_key_to("AUTHOR").is_none());
    }

    #[test]
    fn test_builder_rejects_unknown_key_fields() {
        let err = Entity::builder("X").field("a").primary_key(["b"]).build().unwrap_err();
        assert_eq!(err.code, ErrorCode::UnknownField);

        let err = Entity::builder("X")
            .field("id")
            .foreign_key("Y", [("y_id", "id")])
            .build()
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::UnknownField);
    }

    #[test]
    fn test_reserved_table_is_quoted() {
        let user = Entity::builder("USER").field("id").field("order").build().unwrap();
        assert_eq!(user.field_expr("USER1", "order").unwrap(), "USER1.\"order\"");

        let mut query = SelectQuery::from("x", "X1");
        user.query_join(
            &mut query,
            "USER2",
            &[("id".into(), "X1.user_id".into())],
            JoinType::Left,
        )
        .unwrap();
        assert_eq!(query.joins()[0].table, "\"user\"");
    }

    #[test]
    fn test_query_select_labels() {
        let mut query = SelectQuery::from("book", "BOOK2");
        book()
            .query_select(&mut query, "BOOK2", &["id".into(), "title".into()])
            .unwrap();
        let labels: Vec<_> = query.columns().iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, vec!["BOOK2:id", "BOOK2:title"]);
    }

    #[test]
    fn test_object_load_dedups_in_row_order() {
        let mut rows = vec![
            book_row(Some(20), "Emma"),
            book_row(Some(10), "Dune"),
            book_row(Some(20), "Emma"),
        ];
        let mut store = ObjectStore::new();
        let ids = book().object_load(&mut rows, "BOOK2", &mut store).unwrap();

        assert_eq!(ids.len(), 2);
        assert_eq!(store[ids[0]].get("title"), Some(&Value::from("Emma")));
        assert_eq!(store[ids[1]].get("title"), Some(&Value::from("Dune")));
        assert_eq!(rows[0].object("BOOK2").unwrap(), rows[2].object("BOOK2").unwrap());
    }

    #[test]
    fn test_object_load_null_key_is_absent() {
        let mut rows = vec![book_row(None, "")];
        let mut store = ObjectStore::new();
        let ids = book().object_load(&mut rows, "BOOK2", &mut store).unwrap();
        assert!(ids.is_empty());
        assert!(store.is_empty());
        assert_eq!(rows[0].object("BOOK2").unwrap(), None);
    }

    #[test]
    fn test_object_load_missing_key_column() {
        let mut rows: Vec<Row> = vec![[("BOOK2:title", Value::from("x"))].into_iter().collect()];
        let err = book()
            .object_load(&mut rows, "BOOK2", &mut ObjectStore::new())
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::MissingColumn);
    }
}
