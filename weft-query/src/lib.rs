//! # weft-query
//!
//! Relationship-aware query engine for the Weft ORM.
//!
//! A caller asks for a root entity plus a tree of related entities; the engine
//! decides how many SQL statements that tree needs, compiles them with the
//! joins each relationship implies, runs them through a [`QueryExecutor`] and
//! rebuilds a linked object graph from the flat rows.
//!
//! - [`session`] - the fluent [`Query`] builder (`create`, `with`, modifiers, `execute`)
//! - [`command`] - the load-request tree built by a session
//! - [`plan`] - chain partitioning, query compilation and the execution cascade
//! - [`relations`] - convention-based relationship resolution, joins and linking
//! - [`entity`] / [`schema`] - entity metadata and the registry holding it
//! - [`record`] / [`row`] - rows in, deduplicated objects out
//!
//! ## Relationship naming
//!
//! The last character of a relationship name picks its shape:
//!
//! ```rust
//! use weft_query::relations::RelationType;
//!
//! assert_eq!(RelationType::from_name("TAGZ"), RelationType::ManyToMany);
//! assert_eq!(RelationType::from_name("BOOKS"), RelationType::OneToMany);
//! assert_eq!(RelationType::from_name("AUTHOR1"), RelationType::ManyToOne);
//! assert_eq!(RelationType::from_name("PROFILE"), RelationType::OneToOne);
//! ```
//!
//! ## Partitioning
//!
//! "Many" children get their own statement, restricted to the keys of their
//! source set; "one" children are joined into their parent's statement.
//! Pagination always isolates the command it is set on:
//!
//! ```rust
//! use std::sync::Arc;
//! use weft_query::prelude::*;
//!
//! let schema = Arc::new(
//!     Schema::builder()
//!         .entity(Entity::builder("AUTHOR").field("id").build().unwrap())
//!         .entity(Entity::builder("BOOK").field("id").field("author_id").build().unwrap())
//!         .build(),
//! );
//!
//! let (mut query, authors) = Query::create(schema, "AUTHOR").unwrap();
//! query.with(&authors, "BOOKS").unwrap();
//! query.slave();
//! assert_eq!(query.plan().unwrap().statement_count(), 1);
//!
//! query.limit(5);
//! assert_eq!(query.plan().unwrap().statement_count(), 2);
//! ```

pub mod command;
pub mod config;
pub mod entity;
pub mod error;
pub mod executor;
pub mod filter;
mod hydrate;
pub mod logging;
pub mod pagination;
pub mod plan;
pub mod record;
pub mod relations;
pub mod row;
pub mod schema;
pub mod session;
pub mod sql;
pub mod types;
pub mod value;

#[cfg(test)]
mod fixtures;

pub use command::{ChainPolicy, Command, CommandId, CommandTree, Modifiers, SetRef};
pub use config::{EngineConfig, LinkConflictPolicy};
pub use entity::{Entity, EntityBuilder, Field};
pub use error::{ErrorCode, ErrorContext, QueryError, QueryResult, Suggestion};
pub use executor::{BoxFuture, QueryExecutor};
pub use filter::{Filter, Operator, Predicate};
pub use pagination::Pagination;
pub use plan::{Chain, Plan, find_chain, is_relative_root};
pub use record::{ObjectId, ObjectStore, PrimaryKey, Properties, Record, Related, RelationshipBacked};
pub use relations::{
    Cardinality, JoinMapping, LinkStats, RawMapping, RelationDef, RelationType, Relationship,
};
pub use row::Row;
pub use schema::{Schema, SchemaBuilder};
pub use session::{Query, QueryOutput, ResultSet};
pub use sql::{CompiledQuery, DatabaseType, JoinType, SelectQuery};
pub use types::{OrderByField, Projection, SortOrder};
pub use value::Value;

// Re-export logging utilities
pub use logging::{init as init_logging, is_debug_enabled};
#[cfg(feature = "tracing-subscriber")]
pub use logging::{init_debug, init_with_level};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::command::{ChainPolicy, SetRef};
    pub use crate::config::EngineConfig;
    pub use crate::entity::Entity;
    pub use crate::error::{QueryError, QueryResult};
    pub use crate::executor::QueryExecutor;
    pub use crate::filter::Operator;
    pub use crate::record::{Properties, Record, RelationshipBacked};
    pub use crate::relations::{RelationDef, RelationType};
    pub use crate::schema::Schema;
    pub use crate::session::{Query, QueryOutput};
    pub use crate::types::SortOrder;
    pub use crate::value::Value;
}
