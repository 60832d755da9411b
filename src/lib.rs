//! # Weft
//!
//! An ORM query engine that loads object graphs, not rows.
//!
//! Weft provides:
//! - Relationships derived from naming conventions (`BOOKS`, `AUTHOR1`, `TAGZ`)
//!   or registered explicitly
//! - A fluent query session that turns a load tree into as few joined SQL
//!   statements as pagination allows
//! - Hydration into a session-wide identity map with bidirectional links
//! - A pluggable async executor, so any driver can run the statements
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use weft::prelude::*;
//!
//! let schema = Arc::new(
//!     Schema::builder()
//!         .entity(Entity::builder("AUTHOR").field("id").field("name").build()?)
//!         .entity(Entity::builder("BOOK").field("id").field("title").field("author_id").build()?)
//!         .build(),
//! );
//!
//! let (mut query, authors) = Query::create(schema, "AUTHOR")?;
//! query.r#where("id", Operator::Eq, 1);
//! let books = query.with(&authors, "BOOKS")?;
//! query.order_by("title", SortOrder::Asc);
//!
//! let output = query.execute(&my_executor).await?;
//! for book in output.records(&books) {
//!     println!("{} {:?}", book, book.get("title"));
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

/// The query engine.
pub mod query {
    pub use weft_query::*;
}

/// Prelude module for convenient imports.
pub mod prelude {
    pub use weft_query::prelude::*;
}

// Re-export key types at the crate root
pub use query::{EngineConfig, Query, QueryError, QueryOutput, QueryResult, Schema};
