//! Error types for planning, executing and hydrating load graphs.
//!
//! Every failure carries an [`ErrorCode`] so callers can branch on the kind of
//! problem without matching message text:
//!
//! - 1xxx: Configuration errors (unknown entity/field/relationship, bad policy, bad order-by)
//! - 2xxx: Referential errors (a set used outside of the session that created it)
//! - 3xxx: Execution errors reported by the query executor
//! - 4xxx: Hydration errors (rows that do not match the compiled query)
//! - 9xxx: Internal errors
//!
//! ```rust
//! use weft_query::{QueryError, ErrorCode};
//!
//! let err = QueryError::unknown_relationship("AUTHOR", "BOKS");
//! assert_eq!(err.code, ErrorCode::UnknownRelationship);
//! assert!(err.is_configuration());
//! assert_eq!(err.code.code(), "W1003");
//! ```

use std::fmt;
use thiserror::Error;

/// Result type for query operations.
pub type QueryResult<T> = Result<T, QueryError>;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Configuration errors (1xxx)
    /// Entity is not registered in the schema (W1001).
    UnknownEntity = 1001,
    /// Field is not declared on the entity (W1002).
    UnknownField = 1002,
    /// Relationship cannot be resolved (W1003).
    UnknownRelationship = 1003,
    /// Chain policy value is not one of auto/root/slave (W1004).
    InvalidChainPolicy = 1004,
    /// Order-by clause could not be parsed (W1005).
    InvalidOrderBy = 1005,
    /// Filter operator is not supported (W1006).
    InvalidOperator = 1006,
    /// Relationship mapping is inconsistent with the schema (W1007).
    InvalidMapping = 1007,
    /// Engine configuration value is invalid (W1008).
    InvalidConfiguration = 1008,

    // Referential errors (2xxx)
    /// Set belongs to a different query session (W2001).
    ForeignSet = 2001,

    // Execution errors (3xxx)
    /// General database error (W3001).
    DatabaseError = 3001,
    /// SQL syntax error (W3002).
    SqlSyntax = 3002,
    /// Database connection failed (W3003).
    ConnectionFailed = 3003,
    /// Query timeout (W3004).
    QueryTimeout = 3004,

    // Hydration errors (4xxx)
    /// Row is missing an expected column (W4001).
    MissingColumn = 4001,
    /// Row is missing a materialized object slot (W4002).
    MissingObject = 4002,
    /// A single-valued property was linked to two different objects (W4003).
    ConflictingLink = 4003,

    // Internal errors (9xxx)
    /// Internal error (W9001).
    Internal = 9001,
}

impl ErrorCode {
    /// Get the error code string (e.g., "W1001").
    pub fn code(&self) -> String {
        format!("W{}", *self as u16)
    }

    /// Get a short description of the error code.
    pub fn description(&self) -> &'static str {
        match self {
            Self::UnknownEntity => "Unknown entity",
            Self::UnknownField => "Unknown field",
            Self::UnknownRelationship => "Unknown relationship",
            Self::InvalidChainPolicy => "Invalid chain policy",
            Self::InvalidOrderBy => "Invalid order-by clause",
            Self::InvalidOperator => "Invalid filter operator",
            Self::InvalidMapping => "Invalid relationship mapping",
            Self::InvalidConfiguration => "Invalid configuration",
            Self::ForeignSet => "Set belongs to another session",
            Self::DatabaseError => "Database error",
            Self::SqlSyntax => "SQL syntax error",
            Self::ConnectionFailed => "Database connection failed",
            Self::QueryTimeout => "Query timeout",
            Self::MissingColumn => "Missing result column",
            Self::MissingObject => "Missing materialized object",
            Self::ConflictingLink => "Conflicting relationship link",
            Self::Internal => "Internal error",
        }
    }

    fn category(&self) -> u16 {
        *self as u16 / 1000
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Suggestion for fixing an error.
#[derive(Debug, Clone)]
pub struct Suggestion {
    /// The suggestion text.
    pub text: String,
    /// Optional code example.
    pub code: Option<String>,
}

impl Suggestion {
    /// Create a new suggestion.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            code: None,
        }
    }

    /// Add a code example.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

/// Additional context for an error.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// The operation that was being performed.
    pub operation: Option<String>,
    /// The entity involved.
    pub entity: Option<String>,
    /// The field, property or relationship involved.
    pub field: Option<String>,
    /// The SQL query (if available).
    pub sql: Option<String>,
    /// Suggestions for fixing the error.
    pub suggestions: Vec<Suggestion>,
    /// Help text.
    pub help: Option<String>,
}

/// Errors that can occur while building, planning or executing a load graph.
#[derive(Error, Debug)]
pub struct QueryError {
    /// The error code.
    pub code: ErrorCode,
    /// The error message.
    pub message: String,
    /// Additional context.
    pub context: ErrorContext,
    /// The source error (if any).
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.code(), self.message)
    }
}

impl QueryError {
    /// Create a new error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: ErrorContext::default(),
            source: None,
        }
    }

    /// Add context about the operation.
    pub fn with_context(mut self, operation: impl Into<String>) -> Self {
        self.context.operation = Some(operation.into());
        self
    }

    /// Add a suggestion for fixing the error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.context.suggestions.push(Suggestion::new(suggestion));
        self
    }

    /// Add a code suggestion.
    pub fn with_code_suggestion(mut self, text: impl Into<String>, code: impl Into<String>) -> Self {
        self.context
            .suggestions
            .push(Suggestion::new(text).with_code(code));
        self
    }

    /// Add help text.
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.context.help = Some(help.into());
        self
    }

    /// Set the entity.
    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.context.entity = Some(entity.into());
        self
    }

    /// Set the field.
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.context.field = Some(field.into());
        self
    }

    /// Set the SQL query.
    pub fn with_sql(mut self, sql: impl Into<String>) -> Self {
        self.context.sql = Some(sql.into());
        self
    }

    /// Set the source error.
    pub fn with_source<E: std::error::Error + Send + Sync + 'static>(mut self, source: E) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    // ============== Configuration Errors ==============

    /// Create an unknown entity error.
    pub fn unknown_entity(entity: impl Into<String>) -> Self {
        let entity = entity.into();
        Self::new(
            ErrorCode::UnknownEntity,
            format!("Entity '{}' is not registered in the schema", entity),
        )
        .with_entity(&entity)
        .with_suggestion("Register the entity with SchemaBuilder::entity() before building the schema")
    }

    /// Create an unknown field error.
    pub fn unknown_field(entity: impl Into<String>, field: impl Into<String>) -> Self {
        let entity = entity.into();
        let field = field.into();
        Self::new(
            ErrorCode::UnknownField,
            format!("Entity '{}' has no field '{}'", entity, field),
        )
        .with_entity(&entity)
        .with_field(&field)
    }

    /// Create an unknown relationship error.
    pub fn unknown_relationship(entity: impl Into<String>, name: impl Into<String>) -> Self {
        let entity = entity.into();
        let name = name.into();
        Self::new(
            ErrorCode::UnknownRelationship,
            format!("Relationship '{}' cannot be resolved on entity '{}'", name, entity),
        )
        .with_entity(&entity)
        .with_field(&name)
        .with_suggestion("Register the relationship explicitly with SchemaBuilder::relationship()")
        .with_code_suggestion(
            "Or follow the naming convention: the suffix selects the cardinality",
            "BOOKS -> one-to-many, AUTHOR1 -> many-to-one, TAGZ -> many-to-many",
        )
    }

    /// Create an invalid chain policy error.
    pub fn invalid_chain_policy(value: impl Into<String>) -> Self {
        let value = value.into();
        Self::new(
            ErrorCode::InvalidChainPolicy,
            format!("Invalid chain policy '{}'", value),
        )
        .with_suggestion("Use one of: auto, root, slave")
    }

    /// Create an invalid order-by error.
    pub fn invalid_order_by(clause: impl Into<String>) -> Self {
        let clause = clause.into();
        Self::new(
            ErrorCode::InvalidOrderBy,
            format!("Malformed order-by clause '{}'", clause),
        )
        .with_code_suggestion("Use a field name optionally followed by a direction", "title DESC")
    }

    /// Create an invalid operator error.
    pub fn invalid_operator(operator: impl Into<String>) -> Self {
        let operator = operator.into();
        Self::new(
            ErrorCode::InvalidOperator,
            format!("Unsupported filter operator '{}'", operator),
        )
        .with_suggestion("Supported operators: =, !=, <, <=, >, >=, LIKE, NOT LIKE, IN, NOT IN, IS NULL, IS NOT NULL")
    }

    /// Create an invalid mapping error.
    pub fn invalid_mapping(
        entity: impl Into<String>,
        relationship: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let entity = entity.into();
        let relationship = relationship.into();
        let message = message.into();
        Self::new(
            ErrorCode::InvalidMapping,
            format!("Invalid mapping for {}.{}: {}", entity, relationship, message),
        )
        .with_entity(&entity)
        .with_field(&relationship)
    }

    /// Create an invalid configuration error.
    pub fn invalid_configuration(key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        let value = value.into();
        Self::new(
            ErrorCode::InvalidConfiguration,
            format!("Invalid value '{}' for {}", value, key),
        )
        .with_field(&key)
    }

    // ============== Referential Errors ==============

    /// Create an error for a set that does not belong to the current session.
    pub fn foreign_set(alias: impl Into<String>) -> Self {
        let alias = alias.into();
        Self::new(
            ErrorCode::ForeignSet,
            format!("Set '{}' does not belong to this query session", alias),
        )
        .with_field(&alias)
        .with_help("Sets can only be used as relationship sources within the session that created them")
    }

    // ============== Execution Errors ==============

    /// Create a general database error.
    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatabaseError, message.into())
    }

    /// Create an SQL syntax error.
    pub fn sql_syntax(message: impl Into<String>, sql: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(ErrorCode::SqlSyntax, format!("SQL syntax error: {}", message)).with_sql(sql)
    }

    /// Create a connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(ErrorCode::ConnectionFailed, format!("Connection error: {}", message))
    }

    /// Create a timeout error.
    pub fn timeout(duration_ms: u64) -> Self {
        Self::new(
            ErrorCode::QueryTimeout,
            format!("Query timed out after {}ms", duration_ms),
        )
    }

    // ============== Hydration Errors ==============

    /// Create a missing column error.
    pub fn missing_column(column: impl Into<String>) -> Self {
        let column = column.into();
        Self::new(
            ErrorCode::MissingColumn,
            format!("Result row has no column '{}'", column),
        )
        .with_field(&column)
        .with_help("The executor must return every column labelled in the compiled query")
    }

    /// Create a missing object error.
    pub fn missing_object(alias: impl Into<String>) -> Self {
        let alias = alias.into();
        Self::new(
            ErrorCode::MissingObject,
            format!("Result row has no materialized object for alias '{}'", alias),
        )
        .with_field(&alias)
    }

    /// Create a conflicting link error.
    pub fn conflicting_link(entity: impl Into<String>, property: impl Into<String>) -> Self {
        let entity = entity.into();
        let property = property.into();
        Self::new(
            ErrorCode::ConflictingLink,
            format!(
                "Property {}.{} was linked to two different objects in one result",
                entity, property
            ),
        )
        .with_entity(&entity)
        .with_field(&property)
        .with_suggestion("Check that the foreign key behind this relationship is unique")
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(ErrorCode::Internal, format!("Internal error: {}", message))
    }

    // ============== Error Checks ==============

    /// Check if this is a configuration error.
    pub fn is_configuration(&self) -> bool {
        self.code.category() == 1
    }

    /// Check if this is a referential error.
    pub fn is_referential(&self) -> bool {
        self.code.category() == 2
    }

    /// Check if this error came from query execution.
    pub fn is_execution(&self) -> bool {
        self.code.category() == 3
    }

    /// Check if this is a hydration error.
    pub fn is_hydration(&self) -> bool {
        self.code.category() == 4
    }

    /// Check if this is a timeout error.
    pub fn is_timeout(&self) -> bool {
        self.code == ErrorCode::QueryTimeout
    }

    // ============== Display Functions ==============

    /// Display the full error with all context and suggestions.
    pub fn display_full(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!("Error [{}]: {}\n", self.code.code(), self.message));

        if let Some(ref op) = self.context.operation {
            output.push_str(&format!("  → While: {}\n", op));
        }
        if let Some(ref entity) = self.context.entity {
            output.push_str(&format!("  → Entity: {}\n", entity));
        }
        if let Some(ref field) = self.context.field {
            output.push_str(&format!("  → Field: {}\n", field));
        }

        // SQL (truncated if too long)
        if let Some(ref sql) = self.context.sql {
            let sql_display = if sql.chars().count() > 200 {
                format!("{}...", sql.chars().take(200).collect::<String>())
            } else {
                sql.clone()
            };
            output.push_str(&format!("  → SQL: {}\n", sql_display));
        }

        if !self.context.suggestions.is_empty() {
            output.push_str("\nSuggestions:\n");
            for (i, suggestion) in self.context.suggestions.iter().enumerate() {
                output.push_str(&format!("  {}. {}\n", i + 1, suggestion.text));
                if let Some(ref code) = suggestion.code {
                    output.push_str(&format!(
                        "     ```\n     {}\n     ```\n",
                        code.replace('\n', "\n     ")
                    ));
                }
            }
        }

        if let Some(ref help) = self.context.help {
            output.push_str(&format!("\nHelp: {}\n", help));
        }

        output
    }
}

/// Extension trait for converting driver errors to QueryError.
pub trait IntoQueryError {
    /// Convert to a QueryError.
    fn into_query_error(self) -> QueryError;
}

impl<E: std::error::Error + Send + Sync + 'static> IntoQueryError for E {
    fn into_query_error(self) -> QueryError {
        QueryError::database(self.to_string()).with_source(self)
    }
}

/// Helper for creating errors with context.
#[macro_export]
macro_rules! query_error {
    ($code:expr, $msg:expr) => {
        $crate::error::QueryError::new($code, $msg)
    };
    ($code:expr, $msg:expr, $($key:ident = $value:expr),+ $(,)?) => {{
        let mut err = $crate::error::QueryError::new($code, $msg);
        $(
            err = err.$key($value);
        )+
        err
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_format() {
        assert_eq!(ErrorCode::UnknownEntity.code(), "W1001");
        assert_eq!(ErrorCode::ForeignSet.code(), "W2001");
        assert_eq!(ErrorCode::DatabaseError.code(), "W3001");
        assert_eq!(ErrorCode::MissingColumn.code(), "W4001");
    }

    #[test]
    fn test_error_categories() {
        assert!(QueryError::invalid_chain_policy("sometimes").is_configuration());
        assert!(QueryError::invalid_order_by("title sideways").is_configuration());
        assert!(QueryError::unknown_relationship("AUTHOR", "X").is_configuration());
        assert!(QueryError::foreign_set("BOOK2").is_referential());
        assert!(QueryError::database("boom").is_execution());
        assert!(QueryError::timeout(100).is_execution());
        assert!(QueryError::missing_column("BOOK2:id").is_hydration());
        assert!(QueryError::missing_object("BOOK2").is_hydration());
        assert!(!QueryError::internal("oops").is_configuration());
    }

    #[test]
    fn test_unknown_relationship_context() {
        let err = QueryError::unknown_relationship("AUTHOR", "BOKS");
        assert_eq!(err.context.entity.as_deref(), Some("AUTHOR"));
        assert_eq!(err.context.field.as_deref(), Some("BOKS"));
        assert!(err.message.contains("BOKS"));
        assert!(!err.context.suggestions.is_empty());
    }

    #[test]
    fn test_display() {
        let err = QueryError::foreign_set("BOOK2");
        assert_eq!(
            err.to_string(),
            "[W2001] Set 'BOOK2' does not belong to this query session"
        );
    }

    #[test]
    fn test_display_full() {
        let err = QueryError::unknown_field("BOOK", "isbn")
            .with_context("Compiling projection")
            .with_sql("SELECT BOOK2.isbn FROM book AS BOOK2");

        let output = err.display_full();
        assert!(output.contains("W1002"));
        assert!(output.contains("Entity: BOOK"));
        assert!(output.contains("Field: isbn"));
        assert!(output.contains("While: Compiling projection"));
        assert!(output.contains("SQL: SELECT"));
    }

    #[test]
    fn test_into_query_error_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "socket closed");
        let err = io.into_query_error();
        assert!(err.is_execution());
        assert!(err.source.is_some());
        assert!(err.message.contains("socket closed"));
    }

    #[test]
    fn test_error_macro() {
        let err = query_error!(
            ErrorCode::InvalidMapping,
            "pivot is missing",
            with_entity = "BOOK",
            with_field = "TAGZ",
        );
        assert_eq!(err.code, ErrorCode::InvalidMapping);
        assert_eq!(err.context.entity.as_deref(), Some("BOOK"));
        assert_eq!(err.context.field.as_deref(), Some("TAGZ"));
    }
}
