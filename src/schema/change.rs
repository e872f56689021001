//! Structured schema changes and history jobs

use serde::{Deserialize, Serialize};

use super::types::{ColumnDef, IndexDef, TableDef};

/// `[db.]name`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualifiedName {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db: Option<String>,
    pub name: String,
}

impl QualifiedName {
    pub fn new(db: Option<&str>, name: &str) -> Self {
        Self {
            db: db.map(|d| d.to_lowercase()),
            name: name.to_lowercase(),
        }
    }

    /// Unqualified name
    pub fn bare(name: &str) -> Self {
        Self::new(None, name)
    }
}

/// One catalog mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SchemaChange {
    CreateDatabase {
        name: String,
    },
    DropDatabase {
        name: String,
    },
    UseDatabase {
        name: String,
    },
    CreateTable {
        target: QualifiedName,
        table: TableDef,
    },
    CreateTableLike {
        target: QualifiedName,
        source: QualifiedName,
    },
    DropTable {
        target: QualifiedName,
    },
    TruncateTable {
        target: QualifiedName,
    },
    RenameTable {
        from: QualifiedName,
        to: QualifiedName,
    },
    /// `ADD COLUMN` and `MODIFY COLUMN`
    UpsertColumn {
        target: QualifiedName,
        column: ColumnDef,
    },
    /// `CHANGE COLUMN old new ...`
    ChangeColumn {
        target: QualifiedName,
        old: String,
        column: ColumnDef,
    },
    RenameColumn {
        target: QualifiedName,
        old: String,
        new: String,
    },
    DropColumn {
        target: QualifiedName,
        column: String,
    },
    CreateIndex {
        target: QualifiedName,
        index: IndexDef,
    },
    DropIndex {
        target: QualifiedName,
        name: String,
    },
    SetPrimaryKey {
        target: QualifiedName,
        columns: Vec<String>,
    },
}

impl SchemaChange {
    /// Table the change is addressed to, if any
    pub fn target(&self) -> Option<&QualifiedName> {
        match self {
            SchemaChange::CreateDatabase { .. }
            | SchemaChange::DropDatabase { .. }
            | SchemaChange::UseDatabase { .. } => None,
            SchemaChange::RenameTable { from, .. } => Some(from),
            SchemaChange::CreateTable { target, .. }
            | SchemaChange::CreateTableLike { target, .. }
            | SchemaChange::DropTable { target }
            | SchemaChange::TruncateTable { target }
            | SchemaChange::UpsertColumn { target, .. }
            | SchemaChange::ChangeColumn { target, .. }
            | SchemaChange::RenameColumn { target, .. }
            | SchemaChange::DropColumn { target, .. }
            | SchemaChange::CreateIndex { target, .. }
            | SchemaChange::DropIndex { target, .. }
            | SchemaChange::SetPrimaryKey { target, .. } => Some(target),
        }
    }
}

/// A finished schema-change job recorded by the metadata store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaJob {
    pub id: i64,
    /// Database the job ran in (default namespace for `query`)
    #[serde(default)]
    pub schema_name: String,
    /// Replay order key
    pub schema_version: i64,
    /// Commit timestamp at which the job became visible
    pub finished_ts: i64,
    /// Original statement text
    #[serde(default)]
    pub query: String,
    /// Structured form; when absent the catalog parses `query`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change: Option<Vec<SchemaChange>>,
}

impl SchemaJob {
    /// Job carrying only its statement text
    pub fn from_query(
        id: i64,
        schema_version: i64,
        finished_ts: i64,
        schema_name: &str,
        query: &str,
    ) -> Self {
        Self {
            id,
            schema_name: schema_name.to_string(),
            schema_version,
            finished_ts,
            query: query.to_string(),
            change: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_json_without_change() {
        let json = r#"{"id":3,"schema_version":7,"finished_ts":99,"query":"DROP TABLE t"}"#;
        let job: SchemaJob = serde_json::from_str(json).unwrap();
        assert_eq!(job.schema_version, 7);
        assert_eq!(job.schema_name, "");
        assert!(job.change.is_none());
    }

    #[test]
    fn test_job_json_with_structured_change() {
        let json = r#"{
            "id": 1,
            "schema_version": 2,
            "finished_ts": 10,
            "change": [{"type": "create_database", "name": "shop"}]
        }"#;
        let job: SchemaJob = serde_json::from_str(json).unwrap();
        assert_eq!(
            job.change,
            Some(vec![SchemaChange::CreateDatabase { name: "shop".into() }])
        );
    }

    #[test]
    fn test_change_target() {
        let change = SchemaChange::DropTable {
            target: QualifiedName::new(Some("Shop"), "Orders"),
        };
        let target = change.target().unwrap();
        assert_eq!(target.db.as_deref(), Some("shop"));
        assert_eq!(target.name, "orders");
    }
}
