//! Engine configuration.
//!
//! ```rust
//! use weft_query::config::{EngineConfig, LinkConflictPolicy};
//! use weft_query::sql::{DatabaseType, JoinType};
//!
//! let config = EngineConfig::new()
//!     .database(DatabaseType::SQLite)
//!     .join_type(JoinType::Inner)
//!     .link_conflicts(LinkConflictPolicy::Error);
//! assert_eq!(config.database, DatabaseType::SQLite);
//! ```
//!
//! # Environment Variables
//!
//! - `WEFT_DATABASE=postgres|mysql|sqlite`
//! - `WEFT_JOIN_TYPE=left|inner`
//! - `WEFT_LINK_CONFLICTS=warn|error`

use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

use crate::error::{QueryError, QueryResult};
use crate::sql::{DatabaseType, JoinType};

/// What to do when a "one" property is linked to two different objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkConflictPolicy {
    /// Keep the last write and emit a warning.
    #[default]
    Warn,
    /// Fail hydration with `ConflictingLink`.
    Error,
}

impl FromStr for LinkConflictPolicy {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "warn" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            _ => Err(QueryError::invalid_configuration("link_conflicts", s)),
        }
    }
}

/// Settings shared by every session built against a schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// SQL dialect for placeholders and label quoting.
    pub database: DatabaseType,
    /// Join used for children fused into their parent's statement.
    pub join_type: JoinType,
    /// Policy for conflicting "one" links.
    pub link_conflicts: LinkConflictPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database: DatabaseType::PostgreSQL,
            join_type: JoinType::Left,
            link_conflicts: LinkConflictPolicy::Warn,
        }
    }
}

impl EngineConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the SQL dialect.
    pub fn database(mut self, database: DatabaseType) -> Self {
        self.database = database;
        self
    }

    /// Set the join type for fused children.
    pub fn join_type(mut self, join_type: JoinType) -> Self {
        self.join_type = join_type;
        self
    }

    /// Set the link conflict policy.
    pub fn link_conflicts(mut self, policy: LinkConflictPolicy) -> Self {
        self.link_conflicts = policy;
        self
    }

    /// Load from the process environment, starting from defaults.
    pub fn from_env() -> QueryResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load through an arbitrary key lookup. Unparseable values are errors.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> QueryResult<Self> {
        let mut config = Self::default();
        if let Some(value) = lookup("WEFT_DATABASE") {
            config.database = value
                .parse()
                .map_err(|_| QueryError::invalid_configuration("WEFT_DATABASE", &value))?;
        }
        if let Some(value) = lookup("WEFT_JOIN_TYPE") {
            config.join_type = value
                .parse()
                .map_err(|_| QueryError::invalid_configuration("WEFT_JOIN_TYPE", &value))?;
        }
        if let Some(value) = lookup("WEFT_LINK_CONFLICTS") {
            config.link_conflicts = value
                .parse()
                .map_err(|_| QueryError::invalid_configuration("WEFT_LINK_CONFLICTS", &value))?;
        }
        tracing::debug!(
            database = %config.database,
            join_type = ?config.join_type,
            link_conflicts = ?config.link_conflicts,
            "engine configuration loaded"
        );
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = EngineConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.join_type, JoinType::Left);
        assert_eq!(config.link_conflicts, LinkConflictPolicy::Warn);
    }

    #[test]
    fn test_env_overrides() {
        let config = EngineConfig::from_lookup(lookup(&[
            ("WEFT_DATABASE", "mysql"),
            ("WEFT_JOIN_TYPE", "INNER"),
            ("WEFT_LINK_CONFLICTS", "error"),
        ]))
        .unwrap();
        assert_eq!(
            config,
            EngineConfig::new()
                .database(DatabaseType::MySQL)
                .join_type(JoinType::Inner)
                .link_conflicts(LinkConflictPolicy::Error)
        );
    }

    #[test]
    fn test_bad_env_value() {
        let err = EngineConfig::from_lookup(lookup(&[("WEFT_JOIN_TYPE", "outer")])).unwrap_err();
        assert!(err.is_configuration());
        assert!(err.message.contains("WEFT_JOIN_TYPE"));
    }

    #[test]
    fn test_toml_partial() {
        let config: EngineConfig = toml::from_str(
            r#"
            database = "sqlite"
            link_conflicts = "error"
            "#,
        )
        .unwrap();
        assert_eq!(config.database, DatabaseType::SQLite);
        assert_eq!(config.join_type, JoinType::Left);
        assert_eq!(config.link_conflicts, LinkConflictPolicy::Error);
    }

    #[test]
    fn test_json_round_trip_names() {
        let json = serde_json::to_value(EngineConfig::default()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "database": "postgres",
                "join_type": "left",
                "link_conflicts": "warn"
            })
        );
    }
}
