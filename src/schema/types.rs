//! Catalog object definitions
//!
//! Names are stored lower-cased; lookups lower-case their input.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A table column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    /// Base type name, lower-cased (`int`, `varchar`, ...)
    pub data_type: String,
}

impl ColumnDef {
    pub fn new(name: &str, data_type: &str) -> Self {
        Self {
            name: name.to_lowercase(),
            data_type: data_type.to_lowercase(),
        }
    }
}

/// A secondary index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDef {
    pub name: String,
    pub columns: Vec<String>,
    #[serde(default)]
    pub unique: bool,
}

impl IndexDef {
    pub fn new(name: &str, columns: &[String], unique: bool) -> Self {
        Self {
            name: name.to_lowercase(),
            columns: columns.iter().map(|c| c.to_lowercase()).collect(),
            unique,
        }
    }
}

/// A table definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDef {
    pub name: String,
    pub columns: Vec<ColumnDef>,
    #[serde(default)]
    pub primary_key: Vec<String>,
    #[serde(default)]
    pub indexes: Vec<IndexDef>,
}

impl TableDef {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_lowercase(),
            columns: Vec::new(),
            primary_key: Vec::new(),
            indexes: Vec::new(),
        }
    }

    /// Builder used by tests and fixtures
    pub fn with_column(mut self, name: &str, data_type: &str) -> Self {
        self.upsert_column(ColumnDef::new(name, data_type));
        self
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        let name = name.to_lowercase();
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Adds a column, replacing one with the same name in place.
    pub fn upsert_column(&mut self, column: ColumnDef) {
        match self.columns.iter_mut().find(|c| c.name == column.name) {
            Some(existing) => *existing = column,
            None => self.columns.push(column),
        }
    }

    /// Replaces `old` with `column`, keeping its position.
    ///
    /// Falls back to an upsert when `old` is gone (already renamed).
    pub fn change_column(&mut self, old: &str, column: ColumnDef) {
        let old = old.to_lowercase();
        if !self.has_column(&old) {
            self.upsert_column(column);
            return;
        }

        if column.name != old {
            self.columns.retain(|c| c.name != column.name);
        }
        if let Some(slot) = self.columns.iter_mut().find(|c| c.name == old) {
            *slot = column.clone();
        }
        for key in self.primary_key.iter_mut() {
            if *key == old {
                *key = column.name.clone();
            }
        }
        for index in self.indexes.iter_mut() {
            for key in index.columns.iter_mut() {
                if *key == old {
                    *key = column.name.clone();
                }
            }
        }
    }

    /// Removes a column if present, along with index references to it.
    pub fn drop_column(&mut self, name: &str) {
        let name = name.to_lowercase();
        self.columns.retain(|c| c.name != name);
        self.primary_key.retain(|c| *c != name);
        for index in self.indexes.iter_mut() {
            index.columns.retain(|c| *c != name);
        }
        self.indexes.retain(|i| !i.columns.is_empty());
    }

    /// Adds an index, replacing one with the same name.
    pub fn upsert_index(&mut self, index: IndexDef) {
        self.indexes.retain(|i| i.name != index.name);
        self.indexes.push(index);
    }

    pub fn drop_index(&mut self, name: &str) {
        let name = name.to_lowercase();
        self.indexes.retain(|i| i.name != name);
    }
}

/// A database and its tables
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseDef {
    pub name: String,
    pub tables: BTreeMap<String, TableDef>,
}

impl DatabaseDef {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_lowercase(),
            tables: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_are_lowercased() {
        let table = TableDef::new("Orders").with_column("ID", "INT");
        assert_eq!(table.name, "orders");
        assert!(table.has_column("id"));
        assert!(table.has_column("Id"));
        assert_eq!(table.column("id").unwrap().data_type, "int");
    }

    #[test]
    fn test_upsert_column_replaces_in_place() {
        let mut table = TableDef::new("t")
            .with_column("a", "int")
            .with_column("b", "int");
        table.upsert_column(ColumnDef::new("a", "bigint"));

        let names: Vec<&str> = table.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(table.column("a").unwrap().data_type, "bigint");
    }

    #[test]
    fn test_change_column_renames_and_updates_keys() {
        let mut table = TableDef::new("t")
            .with_column("a", "int")
            .with_column("b", "int");
        table.primary_key = vec!["a".into()];
        table.upsert_index(IndexDef::new("idx_a", &["a".to_string()], false));

        table.change_column("a", ColumnDef::new("c", "bigint"));

        let names: Vec<&str> = table.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["c", "b"]);
        assert_eq!(table.primary_key, vec!["c"]);
        assert_eq!(table.indexes[0].columns, vec!["c"]);

        // Replaying the same change converges
        table.change_column("a", ColumnDef::new("c", "bigint"));
        let names: Vec<&str> = table.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["c", "b"]);
    }

    #[test]
    fn test_drop_column_cleans_indexes() {
        let mut table = TableDef::new("t")
            .with_column("a", "int")
            .with_column("b", "int");
        table.upsert_index(IndexDef::new("idx_b", &["b".to_string()], true));

        table.drop_column("b");
        table.drop_column("b");

        assert!(!table.has_column("b"));
        assert!(table.indexes.is_empty());
    }
}
