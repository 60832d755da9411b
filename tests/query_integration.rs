//! Integration tests for query sessions.
//!
//! These tests drive the public facade end to end: building a load tree,
//! checking the statements it compiles to, and inspecting the object graph
//! hydrated from scripted rows.

use pretty_assertions::assert_eq;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use weft::prelude::*;
use weft::query::{BoxFuture, CompiledQuery, ErrorCode, LinkConflictPolicy, Row};

/// Executor answering each statement with the next queued row set.
#[derive(Default)]
struct Script {
    responses: Mutex<VecDeque<Vec<Row>>>,
    seen: Mutex<Vec<CompiledQuery>>,
}

impl Script {
    fn new<I>(responses: I) -> Self
    where
        I: IntoIterator<Item = Vec<Row>>,
    {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
            seen: Mutex::default(),
        }
    }

    fn sql(&self) -> Vec<String> {
        self.seen.lock().unwrap().iter().map(|q| q.sql.clone()).collect()
    }
}

impl QueryExecutor for Script {
    fn fetch<'a>(&'a self, query: &'a CompiledQuery) -> BoxFuture<'a, QueryResult<Vec<Row>>> {
        self.seen.lock().unwrap().push(query.clone());
        let rows = self.responses.lock().unwrap().pop_front().unwrap_or_default();
        Box::pin(async move { Ok(rows) })
    }
}

fn row<const N: usize>(cells: [(&str, Value); N]) -> Row {
    cells.into_iter().collect()
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("weft_query=trace")
        .with_test_writer()
        .try_init();
}

fn library() -> Arc<Schema> {
    Arc::new(
        Schema::builder()
            .entity(Entity::builder("AUTHOR").field("id").field("name").build().unwrap())
            .entity(
                Entity::builder("BOOK")
                    .field("id")
                    .field("title")
                    .field("author_id")
                    .build()
                    .unwrap(),
            )
            .entity(Entity::builder("TAG").field("id").field("label").build().unwrap())
            .entity(
                Entity::builder("BOOK2TAG")
                    .field("book_id")
                    .field("tag_id")
                    .primary_key(["book_id", "tag_id"])
                    .build()
                    .unwrap(),
            )
            .build(),
    )
}

fn labels(output: &QueryOutput, set: &SetRef) -> Vec<String> {
    output.records(set).iter().map(|r| r.to_string()).collect()
}

/// Author 1 with two books, loaded in a single joined statement
#[tokio::test]
async fn test_author_with_books_single_statement() {
    init_tracing();
    let (mut query, authors) = Query::create(library(), "AUTHOR").unwrap();
    query.r#where("id", Operator::Eq, 1);
    let books = query.with(&authors, "BOOKS").unwrap();
    query.slave().order_by("id", SortOrder::Asc);

    let script = Script::new([vec![
        row([("AUTHOR1:id", 1.into()), ("AUTHOR1:name", "Le Guin".into()), ("BOOK2:id", 10.into())]),
        row([("AUTHOR1:id", 1.into()), ("AUTHOR1:name", "Le Guin".into()), ("BOOK2:id", 20.into())]),
    ]]);
    let output = query.execute(&script).await.unwrap();

    assert_eq!(script.sql().len(), 1);
    assert_eq!(labels(&output, &authors), vec!["AUTHOR#1"]);
    assert_eq!(labels(&output, &books), vec!["BOOK#10", "BOOK#20"]);

    let author = output.records(&authors)[0];
    let linked: Vec<_> = author
        .many("books")
        .into_iter()
        .filter_map(|id| output.record(id))
        .map(|r| r.to_string())
        .collect();
    assert_eq!(linked, vec!["BOOK#10", "BOOK#20"]);

    // Each book points back at its author.
    let author_id = output.set(&authors).unwrap().objects[0];
    for book in output.records(&books) {
        assert_eq!(book.one("author"), Some(author_id));
    }
}

/// A limited "many" child becomes a second statement restricted to the root keys
#[tokio::test]
async fn test_limited_child_runs_second_statement() {
    let (mut query, authors) = Query::create(library(), "AUTHOR").unwrap();
    let books = query.with(&authors, "BOOKS").unwrap();
    query.limit(5);

    let script = Script::new([
        vec![row([("AUTHOR1:id", 1.into())]), row([("AUTHOR1:id", 2.into())])],
        vec![
            row([("AUTHOR1:id", 1.into()), ("BOOK2:id", 10.into())]),
            row([("AUTHOR1:id", 2.into()), ("BOOK2:id", 20.into())]),
        ],
    ]);
    let output = query.execute(&script).await.unwrap();

    let sql = script.sql();
    assert_eq!(sql.len(), 2);
    assert!(!sql[0].contains("JOIN"), "{}", sql[0]);
    assert!(sql[1].contains("INNER JOIN book AS BOOK2"), "{}", sql[1]);
    assert!(sql[1].contains("WHERE AUTHOR1.id IN ($1, $2)"), "{}", sql[1]);
    assert!(sql[1].ends_with("LIMIT 5"), "{}", sql[1]);

    assert_eq!(labels(&output, &books), vec!["BOOK#10", "BOOK#20"]);
    let book_ids = &output.set(&books).unwrap().objects;
    for (author, book) in output.records(&authors).iter().zip(book_ids) {
        assert_eq!(author.many("books"), vec![*book]);
    }
}

/// Duplicate pivot rows still link a tag only once
#[tokio::test]
async fn test_many_to_many_through_pivot() {
    let (mut query, books) = Query::create(library(), "BOOK").unwrap();
    let tags = query.with(&books, "TAGZ").unwrap();
    query.slave();

    let script = Script::new([vec![
        row([("BOOK1:id", 10.into()), ("TAG2:id", 7.into()), ("TAG2:label", "fantasy".into())]),
        row([("BOOK1:id", 10.into()), ("TAG2:id", 7.into()), ("TAG2:label", "fantasy".into())]),
    ]]);
    let output = query.execute(&script).await.unwrap();

    let sql = &script.sql()[0];
    assert!(sql.contains("LEFT JOIN book2tag AS BOOK1__TAG2__BOOK2TAG"), "{sql}");
    assert_eq!(labels(&output, &tags), vec!["TAG#7"]);
    assert_eq!(output.records(&books)[0].many("tags").len(), 1);
}

/// The same row reached through two paths hydrates to one object
#[tokio::test]
async fn test_identity_spans_statements() {
    let (mut query, authors) = Query::create(library(), "AUTHOR").unwrap();
    let books = query.with(&authors, "BOOKS").unwrap();
    let again = query.with(&books, "AUTHOR1").unwrap();

    let script = Script::new([
        vec![row([("AUTHOR1:id", 1.into()), ("AUTHOR1:name", "Le Guin".into())])],
        vec![row([
            ("AUTHOR1:id", 1.into()),
            ("BOOK2:id", 10.into()),
            ("AUTHOR3:id", 1.into()),
            ("AUTHOR3:name", "Le Guin".into()),
        ])],
    ]);
    let output = query.execute(&script).await.unwrap();

    assert_eq!(output.set(&authors).unwrap().objects, output.set(&again).unwrap().objects);
    assert_eq!(output.store().len(), 2);
}

/// Sessions never accept each other's sets
#[test]
fn test_sets_are_session_scoped() {
    let schema = library();
    let (_, mine) = Query::create(Arc::clone(&schema), "AUTHOR").unwrap();
    let (mut other, _) = Query::create(schema, "AUTHOR").unwrap();

    let err = other.with(&mine, "BOOKS").unwrap_err();
    assert_eq!(err.code, ErrorCode::ForeignSet);
}

/// Strict link checking turns an inconsistent "one" link into an error
#[tokio::test]
async fn test_conflicting_links_under_strict_config() {
    let config = EngineConfig::default().link_conflicts(LinkConflictPolicy::Error);
    let (mut query, books) = Query::create_with_config(library(), "BOOK", config).unwrap();
    query.with(&books, "AUTHOR1").unwrap();

    let script = Script::new([vec![
        row([("BOOK1:id", 10.into()), ("AUTHOR2:id", 1.into())]),
        row([("BOOK1:id", 10.into()), ("AUTHOR2:id", 2.into())]),
    ]]);
    let err = query.execute(&script).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::ConflictingLink);
    assert!(err.is_hydration());
}

/// Explain output follows the chain partition
#[test]
fn test_plan_display() {
    let (mut query, authors) = Query::create(library(), "AUTHOR").unwrap();
    let books = query.with(&authors, "BOOKS").unwrap();
    query.with(&books, "TAGZ").unwrap();
    query.slave();

    let explain = query.plan().unwrap().to_string();
    let chains: Vec<_> = explain
        .lines()
        .filter(|l| l.trim_start().starts_with("chain "))
        .map(str::trim)
        .collect();
    assert_eq!(chains, vec!["chain AUTHOR1 (AUTHOR)", "chain BOOK2 (keys of AUTHOR1)"]);
    assert!(explain.contains("TAG3 <- BOOK2.TAGZ [many, slave]"), "{explain}");
}
