//! Database/table allow- and deny-list filtering
//!
//! - Names are compared lower-cased
//! - Allow-lists (`do_dbs`, `do_tables`) apply first when non-empty
//! - Deny-lists (`ignore_dbs`, `ignore_tables`) apply to what remains
//! - A pattern starting with `~` is a regular expression, anything else
//!   matches exactly

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FilterError {
    #[error("invalid filter pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid table name '{0}', expected <db>.<table>")]
    InvalidTableName(String),
}

/// A `db.table` pair as written in configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableName {
    pub schema: String,
    pub table: String,
}

impl TableName {
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
        }
    }

    /// Parses `db.table`; the split is on the first dot.
    pub fn parse(value: &str) -> Result<Self, FilterError> {
        match value.split_once('.') {
            Some((schema, table)) if !schema.is_empty() && !table.is_empty() => {
                Ok(Self::new(schema, table))
            }
            _ => Err(FilterError::InvalidTableName(value.to_string())),
        }
    }
}

#[derive(Debug)]
enum Pattern {
    Exact(String),
    Regex(Regex),
}

impl Pattern {
    fn compile(raw: &str) -> Result<Self, FilterError> {
        match raw.strip_prefix('~') {
            Some(expr) => Regex::new(expr)
                .map(Pattern::Regex)
                .map_err(|source| FilterError::InvalidPattern {
                    pattern: raw.to_string(),
                    source,
                }),
            None => Ok(Pattern::Exact(raw.to_lowercase())),
        }
    }

    fn matches(&self, name: &str) -> bool {
        match self {
            Pattern::Exact(s) => s == name,
            Pattern::Regex(re) => re.is_match(name),
        }
    }
}

#[derive(Debug)]
struct TablePattern {
    schema: Pattern,
    table: Pattern,
}

impl TablePattern {
    fn matches(&self, schema: &str, table: &str) -> bool {
        self.schema.matches(schema) && self.table.matches(table)
    }
}

/// Compiled event filter
#[derive(Debug, Default)]
pub struct TableFilter {
    ignore_dbs: Vec<Pattern>,
    ignore_tables: Vec<TablePattern>,
    do_dbs: Vec<Pattern>,
    do_tables: Vec<TablePattern>,
}

impl TableFilter {
    /// Compiles a filter; fails on an invalid regular expression.
    pub fn new(
        ignore_dbs: &[String],
        ignore_tables: &[TableName],
        do_dbs: &[String],
        do_tables: &[TableName],
    ) -> Result<Self, FilterError> {
        Ok(Self {
            ignore_dbs: compile_dbs(ignore_dbs)?,
            ignore_tables: compile_tables(ignore_tables)?,
            do_dbs: compile_dbs(do_dbs)?,
            do_tables: compile_tables(do_tables)?,
        })
    }

    /// Filter that keeps everything
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Returns true if events for `schema.table` must be dropped.
    pub fn skip_schema_and_table(&self, schema: &str, table: &str) -> bool {
        let schema = schema.to_lowercase();
        let table = table.to_lowercase();
        !self.allowed(&schema, &table) || self.denied(&schema, &table)
    }

    fn allowed(&self, schema: &str, table: &str) -> bool {
        if self.do_dbs.is_empty() && self.do_tables.is_empty() {
            return true;
        }
        self.do_tables.iter().any(|p| p.matches(schema, table))
            || self.do_dbs.iter().any(|p| p.matches(schema))
    }

    fn denied(&self, schema: &str, table: &str) -> bool {
        self.ignore_tables.iter().any(|p| p.matches(schema, table))
            || self.ignore_dbs.iter().any(|p| p.matches(schema))
    }
}

fn compile_dbs(dbs: &[String]) -> Result<Vec<Pattern>, FilterError> {
    dbs.iter().map(|db| Pattern::compile(db)).collect()
}

fn compile_tables(tables: &[TableName]) -> Result<Vec<TablePattern>, FilterError> {
    tables
        .iter()
        .map(|t| {
            Ok(TablePattern {
                schema: Pattern::compile(&t.schema)?,
                table: Pattern::compile(&t.table)?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &str) -> String {
        v.to_string()
    }

    #[test]
    fn test_allow_all() {
        let filter = TableFilter::allow_all();
        assert!(!filter.skip_schema_and_table("any", "thing"));
    }

    #[test]
    fn test_do_dbs_restricts() {
        let filter = TableFilter::new(&[], &[], &[s("shop")], &[]).unwrap();
        assert!(!filter.skip_schema_and_table("shop", "orders"));
        assert!(!filter.skip_schema_and_table("SHOP", "Orders"));
        assert!(filter.skip_schema_and_table("crm", "users"));
    }

    #[test]
    fn test_do_tables_or_do_dbs() {
        let filter = TableFilter::new(
            &[],
            &[],
            &[s("crm")],
            &[TableName::new("shop", "orders")],
        )
        .unwrap();
        assert!(!filter.skip_schema_and_table("shop", "orders"));
        assert!(filter.skip_schema_and_table("shop", "items"));
        assert!(!filter.skip_schema_and_table("crm", "users"));
    }

    #[test]
    fn test_deny_after_allow() {
        let filter = TableFilter::new(
            &[],
            &[TableName::new("shop", "audit")],
            &[s("shop")],
            &[],
        )
        .unwrap();
        assert!(!filter.skip_schema_and_table("shop", "orders"));
        assert!(filter.skip_schema_and_table("shop", "audit"));
    }

    #[test]
    fn test_ignore_dbs() {
        let filter = TableFilter::new(&[s("mysql")], &[], &[], &[]).unwrap();
        assert!(filter.skip_schema_and_table("mysql", "user"));
        assert!(!filter.skip_schema_and_table("shop", "orders"));
    }

    #[test]
    fn test_regex_patterns() {
        let filter = TableFilter::new(
            &[],
            &[TableName::new("~^shop$", "~^tmp_")],
            &[s("~^sh")],
            &[],
        )
        .unwrap();
        assert!(!filter.skip_schema_and_table("shop", "orders"));
        assert!(filter.skip_schema_and_table("shop", "tmp_orders"));
        assert!(filter.skip_schema_and_table("crm", "orders"));
    }

    #[test]
    fn test_invalid_regex_rejected() {
        let err = TableFilter::new(&[s("~(")], &[], &[], &[]).unwrap_err();
        assert!(matches!(err, FilterError::InvalidPattern { .. }));
    }

    #[test]
    fn test_table_name_parse() {
        assert_eq!(
            TableName::parse("shop.orders").unwrap(),
            TableName::new("shop", "orders")
        );
        assert!(TableName::parse("orders").is_err());
        assert!(TableName::parse(".orders").is_err());
    }
}
