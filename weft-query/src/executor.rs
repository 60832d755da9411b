//! The seam to the database driver.
//!
//! The engine never talks to a database itself. A session hands every
//! compiled statement to a [`QueryExecutor`], which answers with rows keyed
//! by the statement's column labels. Errors returned by the executor reach the
//! caller untouched.
//!
//! ```rust
//! use weft_query::executor::{BoxFuture, QueryExecutor};
//! use weft_query::error::QueryResult;
//! use weft_query::row::Row;
//! use weft_query::sql::CompiledQuery;
//!
//! struct Empty;
//!
//! impl QueryExecutor for Empty {
//!     fn fetch<'a>(&'a self, _query: &'a CompiledQuery) -> BoxFuture<'a, QueryResult<Vec<Row>>> {
//!         Box::pin(async { Ok(Vec::new()) })
//!     }
//! }
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::QueryResult;
use crate::row::Row;
use crate::sql::CompiledQuery;

/// A boxed future for async executor operations.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Runs compiled statements.
pub trait QueryExecutor: Send + Sync {
    /// Run a SELECT and return its rows in database order.
    fn fetch<'a>(&'a self, query: &'a CompiledQuery) -> BoxFuture<'a, QueryResult<Vec<Row>>>;
}

impl<T: QueryExecutor + ?Sized> QueryExecutor for Arc<T> {
    fn fetch<'a>(&'a self, query: &'a CompiledQuery) -> BoxFuture<'a, QueryResult<Vec<Row>>> {
        (**self).fetch(query)
    }
}

impl<T: QueryExecutor + ?Sized> QueryExecutor for &T {
    fn fetch<'a>(&'a self, query: &'a CompiledQuery) -> BoxFuture<'a, QueryResult<Vec<Row>>> {
        (**self).fetch(query)
    }
}
