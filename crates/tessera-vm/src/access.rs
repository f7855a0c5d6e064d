//! Storage access seam used by the interpreter.

use std::collections::BTreeMap;
use tessera_common::{Comparator, Result, Row, RowId, Value};
use tessera_storage::StorageCoordinator;

/// Table operations the interpreter drives.
pub trait TableAccess {
    fn insert(&mut self, row: Row) -> Result<RowId>;

    fn locate(&self, column: usize, comparator: Comparator, value: &Value) -> Result<Vec<RowId>>;

    /// All live row-ids.
    fn locate_all(&self) -> Vec<RowId>;

    fn delete(&mut self, row_ids: &[RowId]) -> Result<()>;

    fn update(&mut self, new_values: &BTreeMap<usize, Value>, row_ids: &[RowId]) -> Result<()>;

    fn query(&self, row_ids: &[RowId]) -> Result<Vec<Row>>;
}

impl TableAccess for StorageCoordinator {
    #[inline]
    fn insert(&mut self, row: Row) -> Result<RowId> {
        StorageCoordinator::insert(self, row)
    }

    #[inline]
    fn locate(&self, column: usize, comparator: Comparator, value: &Value) -> Result<Vec<RowId>> {
        StorageCoordinator::locate(self, column, comparator, value)
    }

    #[inline]
    fn locate_all(&self) -> Vec<RowId> {
        StorageCoordinator::locate_all(self)
    }

    #[inline]
    fn delete(&mut self, row_ids: &[RowId]) -> Result<()> {
        StorageCoordinator::delete(self, row_ids)
    }

    #[inline]
    fn update(&mut self, new_values: &BTreeMap<usize, Value>, row_ids: &[RowId]) -> Result<()> {
        StorageCoordinator::update(self, new_values, row_ids)
    }

    #[inline]
    fn query(&self, row_ids: &[RowId]) -> Result<Vec<Row>> {
        StorageCoordinator::query(self, row_ids)
    }
}
