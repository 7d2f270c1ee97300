//! In-memory implementation of the modelsmith store contract.
//!
//! `MemoryStore` keeps tables as plain vectors of rows and implements the
//! unit-of-work semantics with an undo journal: mutations apply immediately
//! (so reads within the unit of work observe them), `commit` clears the
//! journal, and `rollback` replays it in reverse to restore the last
//! committed image. This is the development and test backend; a SQL backend
//! would implement the same [`Store`] trait in its own crate.

use std::collections::HashMap;

use modelsmith_core::{
    BackendError, ColumnValues, RowHandle, Store, StoreResult, TableDescriptor, Value,
};

#[derive(Debug)]
struct Table {
    descriptor: TableDescriptor,
    rows: Vec<(Value, ColumnValues)>,
}

impl Table {
    fn position(&self, pk: &Value) -> Option<usize> {
        self.rows.iter().position(|(key, _)| key == pk)
    }
}

/// What to undo, recorded per mutation since the last commit.
#[derive(Debug)]
enum UndoOp {
    Insert {
        table: String,
        primary_key: Value,
    },
    Update {
        table: String,
        primary_key: Value,
        prior: ColumnValues,
    },
    Delete {
        table: String,
        primary_key: Value,
        prior: ColumnValues,
    },
}

/// An in-memory row store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: HashMap<String, Table>,
    journal: Vec<UndoOp>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows currently visible in a table (committed or pending).
    #[must_use]
    pub fn row_count(&self, table: &str) -> usize {
        self.tables.get(table).map_or(0, |t| t.rows.len())
    }

    /// Whether any mutations are pending commit.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.journal.is_empty()
    }

    fn table_mut(&mut self, name: &str) -> StoreResult<&mut Table> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| BackendError::new(format!("no such table '{name}'")))
    }

    fn extract_pk(table: &TableDescriptor, values: &ColumnValues) -> StoreResult<Value> {
        match values.get(&table.primary_key) {
            Some(Value::Null) | None => Err(BackendError::new(format!(
                "row for '{}' is missing primary key column '{}'",
                table.table, table.primary_key
            ))),
            Some(pk) => Ok(pk.clone()),
        }
    }
}

impl Store for MemoryStore {
    fn ensure_table(&mut self, table: &TableDescriptor) -> StoreResult<()> {
        if let Some(existing) = self.tables.get(&table.table) {
            if existing.descriptor == *table {
                return Ok(());
            }
            return Err(BackendError::new(format!(
                "table '{}' already exists with a different shape",
                table.table
            )));
        }
        tracing::debug!(table = %table.table, columns = table.columns.len(), "creating table");
        self.tables.insert(
            table.table.clone(),
            Table {
                descriptor: table.clone(),
                rows: Vec::new(),
            },
        );
        Ok(())
    }

    fn create_row(
        &mut self,
        table: &TableDescriptor,
        values: ColumnValues,
    ) -> StoreResult<RowHandle> {
        let pk = Self::extract_pk(table, &values)?;
        let entry = self.table_mut(&table.table)?;
        if entry.position(&pk).is_some() {
            return Err(BackendError::new(format!(
                "duplicate primary key {pk} in table '{}'",
                table.table
            )));
        }
        tracing::debug!(table = %table.table, pk = %pk, "inserting row");
        entry.rows.push((pk.clone(), values));
        self.journal.push(UndoOp::Insert {
            table: table.table.clone(),
            primary_key: pk.clone(),
        });
        Ok(RowHandle {
            table: table.table.clone(),
            primary_key: pk,
        })
    }

    fn update_row(&mut self, handle: &RowHandle, values: ColumnValues) -> StoreResult<()> {
        let entry = self.table_mut(&handle.table)?;
        let Some(index) = entry.position(&handle.primary_key) else {
            return Err(BackendError::new(format!(
                "no row with primary key {} in table '{}'",
                handle.primary_key, handle.table
            )));
        };
        tracing::debug!(table = %handle.table, pk = %handle.primary_key, "updating row");
        let prior = std::mem::replace(&mut entry.rows[index].1, values);
        self.journal.push(UndoOp::Update {
            table: handle.table.clone(),
            primary_key: handle.primary_key.clone(),
            prior,
        });
        Ok(())
    }

    fn get_row(
        &mut self,
        table: &TableDescriptor,
        primary_key: &Value,
    ) -> StoreResult<Option<ColumnValues>> {
        let entry = self.table_mut(&table.table)?;
        Ok(entry
            .position(primary_key)
            .map(|index| entry.rows[index].1.clone()))
    }

    fn query_all_rows(&mut self, table: &TableDescriptor) -> StoreResult<Vec<ColumnValues>> {
        let entry = self.table_mut(&table.table)?;
        Ok(entry.rows.iter().map(|(_, row)| row.clone()).collect())
    }

    fn delete_row(&mut self, handle: &RowHandle) -> StoreResult<()> {
        let entry = self.table_mut(&handle.table)?;
        let Some(index) = entry.position(&handle.primary_key) else {
            return Err(BackendError::new(format!(
                "no row with primary key {} in table '{}'",
                handle.primary_key, handle.table
            )));
        };
        tracing::debug!(table = %handle.table, pk = %handle.primary_key, "deleting row");
        let (pk, prior) = entry.rows.remove(index);
        self.journal.push(UndoOp::Delete {
            table: handle.table.clone(),
            primary_key: pk,
            prior,
        });
        Ok(())
    }

    fn commit(&mut self) -> StoreResult<()> {
        tracing::debug!(mutations = self.journal.len(), "commit");
        self.journal.clear();
        Ok(())
    }

    fn rollback(&mut self) -> StoreResult<()> {
        tracing::debug!(mutations = self.journal.len(), "rollback");
        while let Some(op) = self.journal.pop() {
            match op {
                UndoOp::Insert { table, primary_key } => {
                    if let Some(entry) = self.tables.get_mut(&table) {
                        if let Some(index) = entry.position(&primary_key) {
                            entry.rows.remove(index);
                        }
                    }
                }
                UndoOp::Update {
                    table,
                    primary_key,
                    prior,
                } => {
                    if let Some(entry) = self.tables.get_mut(&table) {
                        if let Some(index) = entry.position(&primary_key) {
                            entry.rows[index].1 = prior;
                        }
                    }
                }
                UndoOp::Delete {
                    table,
                    primary_key,
                    prior,
                } => {
                    if let Some(entry) = self.tables.get_mut(&table) {
                        entry.rows.push((primary_key, prior));
                    }
                }
            }
        }
        Ok(())
    }
}
