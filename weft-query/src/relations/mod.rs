//! Relationship resolution, join compilation and object linking.
//!
//! A relationship is a named, directed edge between two entities. Names
//! follow a convention on their last character:
//!
//! | Suffix | Kind | Example |
//! |---|---|---|
//! | `Z` | many-to-many through a pivot entity | `BOOK.TAGZ` via `BOOK2TAG` |
//! | `S` | one-to-many, foreign key on the target | `AUTHOR.BOOKS` |
//! | `1` | many-to-one, foreign key on the source | `BOOK.AUTHOR1` |
//! | other | one-to-one, foreign key on the target | `AUTHOR.PROFILE` |
//!
//! ```rust
//! use weft_query::entity::Entity;
//! use weft_query::schema::Schema;
//!
//! let schema = Schema::builder()
//!     .entity(Entity::builder("AUTHOR").field("id").field("name").build().unwrap())
//!     .entity(Entity::builder("BOOK").field("id").field("author_id").build().unwrap())
//!     .build();
//!
//! let books = schema.relationship("AUTHOR", "BOOKS").unwrap();
//! assert_eq!(books.property(), "books");
//! assert_eq!(books.reverse_name(), "AUTHOR1");
//! ```

mod registry;
mod relationship;
mod spec;

pub use registry::RelationshipRegistry;
pub use relationship::{LinkStats, Relationship};
pub use spec::{Cardinality, JoinMapping, RawMapping, RelationDef, RelationType};
