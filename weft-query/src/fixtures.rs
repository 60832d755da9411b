//! Shared test schema and a scripted executor.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

use crate::entity::Entity;
use crate::error::{QueryError, QueryResult};
use crate::executor::{BoxFuture, QueryExecutor};
use crate::row::Row;
use crate::schema::Schema;
use crate::sql::CompiledQuery;
use crate::value::Value;

/// AUTHOR, BOOK, TAG (through BOOK2TAG), PROFILE and EDITOR.
pub(crate) fn library() -> Arc<Schema> {
    let entity = |e: QueryResult<Entity>| e.expect("fixture entity");
    Arc::new(
        Schema::builder()
            .entity(entity(Entity::builder("AUTHOR").field("id").field("name").build()))
            .entity(entity(
                Entity::builder("BOOK")
                    .field("id")
                    .field("title")
                    .field("year")
                    .field("author_id")
                    .field("edited_by")
                    .foreign_key("EDITOR", [("edited_by", "id")])
                    .build(),
            ))
            .entity(entity(Entity::builder("TAG").field("id").field("label").build()))
            .entity(entity(
                Entity::builder("BOOK2TAG")
                    .field("book_id")
                    .field("tag_id")
                    .primary_key(["book_id", "tag_id"])
                    .build(),
            ))
            .entity(entity(
                Entity::builder("PROFILE")
                    .field("id")
                    .field("author_id")
                    .field("bio")
                    .build(),
            ))
            .entity(entity(Entity::builder("EDITOR").field("id").field("name").build()))
            .build(),
    )
}

/// Build a row from `(label, value)` cells.
pub(crate) fn row<'a>(cells: impl IntoIterator<Item = (&'a str, Value)>) -> Row {
    cells.into_iter().collect()
}

/// Answers statements with queued responses and records what it was sent.
#[derive(Default)]
pub(crate) struct ScriptedExecutor {
    responses: Mutex<VecDeque<QueryResult<Vec<Row>>>>,
    seen: Mutex<Vec<CompiledQuery>>,
}

impl ScriptedExecutor {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn respond(self, rows: Vec<Row>) -> Self {
        self.responses.lock().push_back(Ok(rows));
        self
    }

    pub(crate) fn fail(self, error: QueryError) -> Self {
        self.responses.lock().push_back(Err(error));
        self
    }

    pub(crate) fn queries(&self) -> Vec<CompiledQuery> {
        self.seen.lock().clone()
    }
}

impl QueryExecutor for ScriptedExecutor {
    fn fetch<'a>(&'a self, query: &'a CompiledQuery) -> BoxFuture<'a, QueryResult<Vec<Row>>> {
        self.seen.lock().push(query.clone());
        let response = self
            .responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()));
        Box::pin(async move { response })
    }
}
