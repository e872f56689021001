//! In-memory schema catalog
//!
//! Tracks databases, tables and columns as DDL is replayed. Replay is
//! convergent so the same history can be applied more than once:
//!
//! - `CREATE` replaces an existing table; `CREATE DATABASE` keeps an existing one
//! - `DROP` of a missing object is a no-op
//! - `ADD COLUMN` of an existing column replaces it
//! - a rename whose source is gone and whose target exists is a no-op
//! - history jobs at or below the applied schema version are skipped
//!
//! Each statement and each job applies atomically: on error the catalog
//! is left as it was before the call.

use std::collections::BTreeMap;

use super::change::{QualifiedName, SchemaChange, SchemaJob};
use super::ddl::parse_statement;
use super::errors::{SchemaError, SchemaResult};
use super::types::{ColumnDef, DatabaseDef, TableDef};

/// Target of schema history replay
///
/// Mocked in tests to observe exactly what the history handler submits.
pub trait SchemaApplier {
    /// Applies structured history jobs in the given order.
    fn apply_jobs(&mut self, jobs: &[SchemaJob]) -> SchemaResult<()>;

    /// Applies one statement; a non-empty `namespace` becomes the current database.
    fn apply_statement(&mut self, namespace: &str, sql: &str) -> SchemaResult<()>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaCatalog {
    databases: BTreeMap<String, DatabaseDef>,
    current_db: Option<String>,
    applied_version: Option<i64>,
}

impl SchemaCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn database(&self, name: &str) -> Option<&DatabaseDef> {
        self.databases.get(&name.to_lowercase())
    }

    pub fn database_names(&self) -> Vec<&str> {
        self.databases.keys().map(String::as_str).collect()
    }

    pub fn table(&self, db: &str, table: &str) -> Option<&TableDef> {
        self.database(db)?.tables.get(&table.to_lowercase())
    }

    pub fn current_database(&self) -> Option<&str> {
        self.current_db.as_deref()
    }

    /// Highest history job schema version applied so far
    pub fn applied_version(&self) -> Option<i64> {
        self.applied_version
    }

    /// Number of tables across all databases
    pub fn table_count(&self) -> usize {
        self.databases.values().map(|d| d.tables.len()).sum()
    }

    /// Checks that `db.table` exists and has every listed column.
    pub fn check_row(&self, db: &str, table: &str, columns: &[String]) -> SchemaResult<()> {
        let def = self
            .table(db, table)
            .ok_or_else(|| SchemaError::UnknownTable(db.to_lowercase(), table.to_lowercase()))?;
        for column in columns {
            if !def.has_column(column) {
                return Err(SchemaError::UnknownColumn {
                    db: db.to_lowercase(),
                    table: def.name.clone(),
                    column: column.to_lowercase(),
                });
            }
        }
        Ok(())
    }

    /// Applies parsed changes as one unit.
    pub fn apply_changes(&mut self, changes: &[SchemaChange]) -> SchemaResult<()> {
        let mut next = self.clone();
        for change in changes {
            next.apply_change(change)?;
        }
        *self = next;
        Ok(())
    }

    fn resolve_db(&self, name: &QualifiedName) -> SchemaResult<String> {
        match (&name.db, &self.current_db) {
            (Some(db), _) => Ok(db.clone()),
            (None, Some(current)) => Ok(current.clone()),
            (None, None) => Err(SchemaError::NoDatabaseSelected(name.name.clone())),
        }
    }

    fn database_mut(&mut self, db: &str) -> SchemaResult<&mut DatabaseDef> {
        self.databases
            .get_mut(db)
            .ok_or_else(|| SchemaError::UnknownDatabase(db.to_string()))
    }

    fn table_mut(&mut self, name: &QualifiedName) -> SchemaResult<&mut TableDef> {
        let db = self.resolve_db(name)?;
        self.database_mut(&db)?
            .tables
            .get_mut(&name.name)
            .ok_or_else(|| SchemaError::UnknownTable(db.clone(), name.name.clone()))
    }

    fn apply_change(&mut self, change: &SchemaChange) -> SchemaResult<()> {
        match change {
            SchemaChange::CreateDatabase { name } => {
                self.databases
                    .entry(name.clone())
                    .or_insert_with(|| DatabaseDef::new(name));
            }
            SchemaChange::DropDatabase { name } => {
                self.databases.remove(name);
                if self.current_db.as_deref() == Some(name.as_str()) {
                    self.current_db = None;
                }
            }
            SchemaChange::UseDatabase { name } => {
                if !self.databases.contains_key(name) {
                    return Err(SchemaError::UnknownDatabase(name.clone()));
                }
                self.current_db = Some(name.clone());
            }
            SchemaChange::CreateTable { target, table } => {
                let db = self.resolve_db(target)?;
                let mut table = table.clone();
                table.name = target.name.clone();
                self.database_mut(&db)?
                    .tables
                    .insert(target.name.clone(), table);
            }
            SchemaChange::CreateTableLike { target, source } => {
                let src_db = self.resolve_db(source)?;
                let mut table = self
                    .table(&src_db, &source.name)
                    .cloned()
                    .ok_or_else(|| SchemaError::UnknownTable(src_db, source.name.clone()))?;
                table.name = target.name.clone();
                let db = self.resolve_db(target)?;
                self.database_mut(&db)?
                    .tables
                    .insert(target.name.clone(), table);
            }
            SchemaChange::DropTable { target } => {
                let db = self.resolve_db(target)?;
                if let Some(database) = self.databases.get_mut(&db) {
                    database.tables.remove(&target.name);
                }
            }
            SchemaChange::TruncateTable { target } => {
                self.table_mut(target)?;
            }
            SchemaChange::RenameTable { from, to } => self.rename_table(from, to)?,
            SchemaChange::UpsertColumn { target, column } => {
                self.table_mut(target)?.upsert_column(column.clone());
            }
            SchemaChange::ChangeColumn {
                target,
                old,
                column,
            } => {
                self.table_mut(target)?.change_column(old, column.clone());
            }
            SchemaChange::RenameColumn { target, old, new } => {
                let db = self.resolve_db(target)?;
                let table = self.table_mut(target)?;
                match table.column(old).cloned() {
                    Some(existing) => {
                        table.change_column(old, ColumnDef::new(new, &existing.data_type))
                    }
                    None if table.has_column(new) => {}
                    None => {
                        return Err(SchemaError::UnknownColumn {
                            db,
                            table: table.name.clone(),
                            column: old.clone(),
                        })
                    }
                }
            }
            SchemaChange::DropColumn { target, column } => {
                self.table_mut(target)?.drop_column(column);
            }
            SchemaChange::CreateIndex { target, index } => {
                self.table_mut(target)?.upsert_index(index.clone());
            }
            SchemaChange::DropIndex { target, name } => {
                self.table_mut(target)?.drop_index(name);
            }
            SchemaChange::SetPrimaryKey { target, columns } => {
                self.table_mut(target)?.primary_key =
                    columns.iter().map(|c| c.to_lowercase()).collect();
            }
        }
        Ok(())
    }

    fn rename_table(&mut self, from: &QualifiedName, to: &QualifiedName) -> SchemaResult<()> {
        let from_db = self.resolve_db(from)?;
        let to_db = self.resolve_db(to)?;

        if !self.databases.contains_key(&to_db) {
            return Err(SchemaError::UnknownDatabase(to_db));
        }

        let taken = self
            .databases
            .get_mut(&from_db)
            .and_then(|d| d.tables.remove(&from.name));

        match taken {
            Some(mut table) => {
                table.name = to.name.clone();
                self.database_mut(&to_db)?
                    .tables
                    .insert(to.name.clone(), table);
                Ok(())
            }
            None if self.table(&to_db, &to.name).is_some() => Ok(()),
            None => Err(SchemaError::UnknownTable(from_db, from.name.clone())),
        }
    }
}

impl SchemaApplier for SchemaCatalog {
    fn apply_jobs(&mut self, jobs: &[SchemaJob]) -> SchemaResult<()> {
        for job in jobs {
            if matches!(self.applied_version, Some(v) if job.schema_version <= v) {
                continue;
            }

            let job_error = |e: SchemaError| SchemaError::Job {
                id: job.id,
                schema_version: job.schema_version,
                reason: e.to_string(),
            };

            let changes = match &job.change {
                Some(changes) => changes.clone(),
                None => parse_statement(&job.query).map_err(job_error)?,
            };

            let mut next = self.clone();
            if !job.schema_name.is_empty() {
                next.current_db = Some(job.schema_name.to_lowercase());
            }
            next.apply_changes(&changes).map_err(job_error)?;
            next.applied_version = Some(job.schema_version);
            *self = next;
        }
        Ok(())
    }

    fn apply_statement(&mut self, namespace: &str, sql: &str) -> SchemaResult<()> {
        let changes = parse_statement(sql)?;
        let mut next = self.clone();
        if !namespace.is_empty() {
            next.current_db = Some(namespace.to_lowercase());
        }
        next.apply_changes(&changes)?;
        *self = next;
        Ok(())
    }
}
