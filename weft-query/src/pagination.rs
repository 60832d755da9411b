//! Limit/offset pagination.
//!
//! Only the command that starts a chain emits pagination; fused children never
//! do, which is why a paginated child always becomes the root of its own
//! statement.
//!
//! ```rust
//! use weft_query::pagination::Pagination;
//! use weft_query::sql::DatabaseType;
//!
//! let pagination = Pagination::new().offset(10).limit(20);
//! assert_eq!(pagination.to_sql(DatabaseType::PostgreSQL), "LIMIT 20 OFFSET 10");
//! assert!(Pagination::new().is_empty());
//! ```

use std::fmt::Write;

use crate::sql::DatabaseType;

/// Limit and offset of one command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pagination {
    /// Maximum number of rows.
    pub limit: Option<u64>,
    /// Number of rows to skip.
    pub offset: Option<u64>,
}

impl Pagination {
    /// Create a pagination with no limits.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the row limit.
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Set the row offset.
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Check if neither limit nor offset is set.
    pub fn is_empty(&self) -> bool {
        self.limit.is_none() && self.offset.is_none()
    }

    /// Generate the LIMIT/OFFSET clause.
    pub fn to_sql(&self, db: DatabaseType) -> String {
        let mut sql = String::with_capacity(32);
        self.write_sql(db, &mut sql);
        sql
    }

    /// Write the LIMIT/OFFSET clause directly to a buffer.
    ///
    /// MySQL and SQLite reject a bare OFFSET, so an offset without a limit is
    /// written with the dialect's "no limit" spelling.
    pub fn write_sql(&self, db: DatabaseType, buffer: &mut String) {
        match (self.limit, self.offset) {
            (Some(limit), Some(offset)) => {
                let _ = write!(buffer, "LIMIT {} OFFSET {}", limit, offset);
            }
            (Some(limit), None) => {
                let _ = write!(buffer, "LIMIT {}", limit);
            }
            (None, Some(offset)) => match db {
                DatabaseType::PostgreSQL => {
                    let _ = write!(buffer, "OFFSET {}", offset);
                }
                DatabaseType::SQLite => {
                    let _ = write!(buffer, "LIMIT -1 OFFSET {}", offset);
                }
                DatabaseType::MySQL => {
                    let _ = write!(buffer, "LIMIT {} OFFSET {}", u64::MAX, offset);
                }
            },
            (None, None) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty() {
        let p = Pagination::new();
        assert!(p.is_empty());
        assert_eq!(p.to_sql(DatabaseType::PostgreSQL), "");
    }

    #[test]
    fn test_limit_only() {
        let p = Pagination::new().limit(5);
        assert!(!p.is_empty());
        assert_eq!(p.to_sql(DatabaseType::SQLite), "LIMIT 5");
    }

    #[test]
    fn test_offset_without_limit_per_dialect() {
        let p = Pagination::new().offset(3);
        assert_eq!(p.to_sql(DatabaseType::PostgreSQL), "OFFSET 3");
        assert_eq!(p.to_sql(DatabaseType::SQLite), "LIMIT -1 OFFSET 3");
        assert_eq!(
            p.to_sql(DatabaseType::MySQL),
            "LIMIT 18446744073709551615 OFFSET 3"
        );
    }

    #[test]
    fn test_write_appends() {
        let mut buffer = String::from("SELECT 1 ");
        Pagination::new()
            .limit(2)
            .offset(4)
            .write_sql(DatabaseType::MySQL, &mut buffer);
        assert_eq!(buffer, "SELECT 1 LIMIT 2 OFFSET 4");
    }
}
