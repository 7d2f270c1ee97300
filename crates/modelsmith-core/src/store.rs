//! The persistence collaborator contract.
//!
//! A [`Store`] is a session-scoped unit of work over flat rows addressed by
//! primary key. Everything SQL-shaped (dialects, connection strings, actual
//! persistence) lives behind this trait; the session layer only needs row
//! create/read/update/delete plus commit/rollback, and the guarantee that
//! realizing a table descriptor is idempotent.

use crate::error::BackendError;
use crate::row::ColumnValues;
use crate::types::ScalarType;
use crate::value::Value;

/// One column of a backing table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    /// Column name.
    pub name: String,
    /// Column type.
    pub scalar: ScalarType,
    /// Whether NULL is allowed.
    pub nullable: bool,
    /// Whether this is the primary key column.
    pub primary_key: bool,
}

impl ColumnDescriptor {
    /// Create a non-null, non-key column.
    pub fn new(name: impl Into<String>, scalar: ScalarType) -> Self {
        Self {
            name: name.into(),
            scalar,
            nullable: false,
            primary_key: false,
        }
    }

    /// Set the nullable flag.
    #[must_use]
    pub fn nullable(mut self, value: bool) -> Self {
        self.nullable = value;
        self
    }

    /// Set the primary key flag.
    #[must_use]
    pub fn primary_key(mut self, value: bool) -> Self {
        self.primary_key = value;
        self
    }
}

/// A backing table: name, columns in order, primary-key column name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDescriptor {
    /// Table name.
    pub table: String,
    /// Columns in declaration order.
    pub columns: Vec<ColumnDescriptor>,
    /// Name of the primary-key column.
    pub primary_key: String,
}

impl TableDescriptor {
    /// Look up a column by name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// Reference to one persisted row.
///
/// Handles are opaque to the session layer beyond equality; a store must
/// accept any handle it previously returned from [`Store::create_row`].
#[derive(Debug, Clone, PartialEq)]
pub struct RowHandle {
    /// Table the row lives in.
    pub table: String,
    /// Primary-key value of the row.
    pub primary_key: Value,
}

/// Result alias for store operations.
pub type StoreResult<T> = std::result::Result<T, BackendError>;

/// A session-scoped unit of work over flat rows.
///
/// Mutations become durable at [`Store::commit`]; [`Store::rollback`]
/// discards every mutation since the last commit. Reads observe
/// uncommitted mutations of the same unit of work.
pub trait Store {
    /// Realize the backing table for a descriptor. Idempotent: re-realizing
    /// an identical descriptor is a no-op.
    fn ensure_table(&mut self, table: &TableDescriptor) -> StoreResult<()>;

    /// Insert a new row and return its handle.
    fn create_row(&mut self, table: &TableDescriptor, values: ColumnValues)
    -> StoreResult<RowHandle>;

    /// Overwrite the column values of an existing row.
    fn update_row(&mut self, handle: &RowHandle, values: ColumnValues) -> StoreResult<()>;

    /// Read one row by primary key. `None` when absent.
    fn get_row(&mut self, table: &TableDescriptor, primary_key: &Value)
    -> StoreResult<Option<ColumnValues>>;

    /// Read every row of a table. Unbounded.
    fn query_all_rows(&mut self, table: &TableDescriptor) -> StoreResult<Vec<ColumnValues>>;

    /// Remove a row.
    fn delete_row(&mut self, handle: &RowHandle) -> StoreResult<()>;

    /// Make all pending mutations durable.
    fn commit(&mut self) -> StoreResult<()>;

    /// Discard all pending mutations.
    fn rollback(&mut self) -> StoreResult<()>;
}
