//! Integration tests for schema metadata and relationship resolution.

use pretty_assertions::assert_eq;
use std::sync::Arc;

use weft::prelude::*;
use weft::query::{Cardinality, DatabaseType, ErrorCode, JoinType, RawMapping};

fn schema() -> Schema {
    Schema::builder()
        .entity(Entity::builder("USER").table("users").field("id").field("email").build().unwrap())
        .entity(
            Entity::builder("POST")
                .table("posts")
                .field("id")
                .column("writer", "created_by")
                .foreign_key("USER", [("writer", "id")])
                .build()
                .unwrap(),
        )
        .entity(Entity::builder("GROUP").field("id").build().unwrap())
        .entity(
            Entity::builder("MEMBERSHIP")
                .field("member")
                .field("team")
                .primary_key(["member", "team"])
                .build()
                .unwrap(),
        )
        .relationship(
            "USER",
            RelationDef::new("TEAMS")
                .target("GROUP")
                .kind(RelationType::ManyToMany)
                .property("teams")
                .reverse("MEMBERS")
                .mapping(RawMapping::pivot(
                    "MEMBERSHIP",
                    [("id", "member")],
                    [("team", "id")],
                )),
        )
        .relationship(
            "GROUP",
            RelationDef::new("MEMBERS")
                .target("USER")
                .kind(RelationType::ManyToMany)
                .reverse("TEAMS")
                .mapping(RawMapping::pivot(
                    "MEMBERSHIP",
                    [("id", "team")],
                    [("member", "id")],
                )),
        )
        .build()
}

/// Declared foreign keys and custom columns drive the convention joins
#[test]
fn test_declared_foreign_key_with_custom_column() {
    let (mut query, users) = Query::create(Arc::new(schema()), "USER").unwrap();
    query.with(&users, "POSTS").unwrap();
    query.slave();

    let plan = query.plan().unwrap();
    let sql = plan.chains()[0].query().build(DatabaseType::PostgreSQL).sql;
    assert!(
        sql.contains("FROM users AS USER1 LEFT JOIN posts AS POST2 ON POST2.created_by = USER1.id"),
        "{sql}"
    );
}

/// Explicit definitions resolve their reverse through the same cache
#[test]
fn test_explicit_many_to_many_and_reverse() {
    let schema = schema();
    let teams = schema.relationship("USER", "TEAMS").unwrap();
    assert_eq!(teams.cardinality(), Cardinality::Many);
    assert_eq!(teams.pivot().map(|p| p.name()), Some("MEMBERSHIP"));

    let members = schema.reverse(&teams).unwrap();
    assert_eq!(members.name(), "MEMBERS");
    assert_eq!(members.property(), "members");
    assert!(Arc::ptr_eq(&members, &schema.relationship("GROUP", "MEMBERS").unwrap()));
}

/// Reserved table names are quoted in compiled statements
#[test]
fn test_reserved_table_is_quoted() {
    let (mut query, users) = Query::create(Arc::new(schema()), "USER").unwrap();
    query.with(&users, "TEAMS").unwrap();
    query.slave();

    let sql = query.plan().unwrap().chains()[0].query().build(DatabaseType::SQLite).sql;
    assert!(sql.contains("LEFT JOIN \"group\" AS GROUP2"), "{sql}");
}

/// Unknown names fail with configuration errors
#[test]
fn test_resolution_errors() {
    let schema = schema();
    let err = schema.relationship("USER", "COMMENTS").unwrap_err();
    assert_eq!(err.code, ErrorCode::UnknownRelationship);
    assert!(err.is_configuration());

    let err = schema.relationship("COMMENT", "USER1").unwrap_err();
    assert_eq!(err.code, ErrorCode::UnknownEntity);

    // POST has no group foreign key.
    let err = schema.relationship("GROUP", "POSTS").unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidMapping);
}

/// Engine settings come from environment-style lookups
#[test]
fn test_engine_config_lookup() {
    let config = EngineConfig::from_lookup(|key| match key {
        "WEFT_DATABASE" => Some("sqlite".into()),
        "WEFT_JOIN_TYPE" => Some("inner".into()),
        _ => None,
    })
    .unwrap();
    assert_eq!(config.database, DatabaseType::SQLite);
    assert_eq!(config.join_type, JoinType::Inner);

    let err = EngineConfig::from_lookup(|key| (key == "WEFT_DATABASE").then(|| "oracle".into()))
        .unwrap_err();
    assert!(err.is_configuration());
}
