//! Storage coordinator: keeps the row store and per-column indexes in step.
//!
//! All constraint checks run before the first write, so a rejected insert,
//! delete or update leaves rows and indexes untouched.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use tessera_common::{
    Comparator, EngineConfig, Result, Row, RowId, TableDefinition, TesseraError, Value,
};
use tracing::{debug, info};

use crate::btree::{BPlusTreeIndex, IndexStructure, RangeOp};
use crate::pattern::like_regex;
use crate::rows::RowStore;

/// Owner of the table's rows, free-list and indexes.
#[derive(Debug)]
pub struct StorageCoordinator {
    definition: TableDefinition,
    rows: RowStore,
    /// Tombstoned slots, reused most recent first.
    free_slots: Vec<RowId>,
    /// One index per `is_key` column.
    indexes: BTreeMap<usize, BPlusTreeIndex>,
}

impl StorageCoordinator {
    /// Builds a coordinator with the default engine configuration.
    pub fn new(initial_rows: Vec<Row>, definition: TableDefinition) -> Result<Self> {
        Self::with_config(initial_rows, definition, &EngineConfig::default())
    }

    /// Builds a coordinator and loads `initial_rows` through `insert`, so
    /// seed data is subject to the same constraints as later inserts.
    pub fn with_config(
        initial_rows: Vec<Row>,
        definition: TableDefinition,
        config: &EngineConfig,
    ) -> Result<Self> {
        config.validate()?;

        let mut indexes = BTreeMap::new();
        for column in definition.key_columns() {
            indexes.insert(column, BPlusTreeIndex::new(config.btree_order)?);
        }

        let capacity = config.initial_capacity.max(initial_rows.len());
        let mut coordinator = Self {
            definition,
            rows: RowStore::with_capacity(capacity),
            free_slots: Vec::new(),
            indexes,
        };
        for row in initial_rows {
            coordinator.insert(row)?;
        }

        info!(
            rows = coordinator.rows.live_count(),
            indexes = coordinator.indexes.len(),
            order = config.btree_order,
            "built storage coordinator"
        );
        Ok(coordinator)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// The table definition.
    #[inline]
    pub fn definition(&self) -> &TableDefinition {
        &self.definition
    }

    /// Number of live rows.
    #[inline]
    pub fn len(&self) -> usize {
        self.rows.live_count()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.live_count() == 0
    }

    /// Read access to the index on `column`, if it has one.
    pub fn index(&self, column: usize) -> Option<&BPlusTreeIndex> {
        self.indexes.get(&column)
    }

    /// Read access to the row store.
    pub fn rows(&self) -> &RowStore {
        &self.rows
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Inserts `row` and returns its row-id.
    pub fn insert(&mut self, row: Row) -> Result<RowId> {
        if row.len() != self.definition.len() {
            return Err(TesseraError::RowArity {
                expected: self.definition.len(),
                actual: row.len(),
            });
        }
        for column in self.definition.unique_columns() {
            let value = &row[column];
            if !value.is_null() && !self.holders(column, value)?.is_empty() {
                return Err(self.not_unique(column, value));
            }
        }

        let slot = match self.free_slots.pop() {
            Some(slot) => slot,
            None => self.rows.len(),
        };
        self.rows.insert(slot, row)?;

        let row = self.rows.get(slot).ok_or(TesseraError::RowNotFound(slot))?;
        for (&column, index) in self.indexes.iter_mut() {
            index.insert(row[column].clone(), slot)?;
        }
        debug!(slot, "inserted row");
        Ok(slot)
    }

    /// Deletes the given rows. Every id must be live; repeats are ignored.
    pub fn delete(&mut self, row_ids: &[RowId]) -> Result<()> {
        let targets = self.live_targets(row_ids)?;

        for &id in &targets {
            let row = self.rows.delete(id)?;
            for (&column, index) in self.indexes.iter_mut() {
                index.delete(id, &row[column])?;
            }
            self.free_slots.push(id);
        }
        debug!(count = targets.len(), "deleted rows");
        Ok(())
    }

    /// Sets `new_values` (column index to value) on every row in `row_ids`.
    ///
    /// A unique column may only be set to a non-null value on a single row,
    /// and only if no other live row holds it.
    pub fn update(&mut self, new_values: &BTreeMap<usize, Value>, row_ids: &[RowId]) -> Result<()> {
        for &column in new_values.keys() {
            self.definition.column(column)?;
        }
        let targets = self.live_targets(row_ids)?;
        if targets.is_empty() || new_values.is_empty() {
            return Ok(());
        }

        for (&column, value) in new_values {
            if !self.definition.column(column)?.is_unique || value.is_null() {
                continue;
            }
            if targets.len() > 1 {
                return Err(self.not_unique(column, value));
            }
            let taken = self
                .holders(column, value)?
                .into_iter()
                .any(|holder| !targets.contains(&holder));
            if taken {
                return Err(self.not_unique(column, value));
            }
        }

        for &id in &targets {
            for (&column, value) in new_values {
                let row = self.rows.get(id).ok_or(TesseraError::RowNotFound(id))?;
                let old = row
                    .get(column)
                    .ok_or(TesseraError::ColumnNotFound(column))?;
                if let Some(index) = self.indexes.get_mut(&column) {
                    if old != value {
                        index.delete(id, old)?;
                        index.insert(value.clone(), id)?;
                    }
                }
                self.rows.update(id, column, value.clone())?;
            }
        }
        debug!(
            rows = targets.len(),
            columns = new_values.len(),
            "updated rows"
        );
        Ok(())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Row-ids of live rows whose `column` satisfies `cell <comparator> value`.
    ///
    /// The result has no duplicates and no particular order.
    pub fn locate(&self, column: usize, comparator: Comparator, value: &Value) -> Result<Vec<RowId>> {
        self.definition.column(column)?;

        if comparator == Comparator::Like {
            let pattern = like_regex(value)?;
            return Ok(self
                .rows
                .iter_live()
                .filter(|(_, row)| row[column].as_str().is_some_and(|s| pattern.is_match(s)))
                .map(|(slot, _)| slot)
                .collect());
        }

        if let Some(index) = self.indexes.get(&column) {
            return match RangeOp::from_comparator(comparator) {
                Some(op) => index.find(value, op),
                None => {
                    let equal: HashSet<RowId> = index.find(value, RangeOp::Eq)?.into_iter().collect();
                    Ok(self
                        .locate_all()
                        .into_iter()
                        .filter(|id| !equal.contains(id))
                        .collect())
                }
            };
        }

        Ok(self
            .rows
            .iter_live()
            .filter(|(_, row)| comparator.compare(&row[column], value) == Some(true))
            .map(|(slot, _)| slot)
            .collect())
    }

    /// All live row-ids, ascending.
    pub fn locate_all(&self) -> Vec<RowId> {
        self.rows.iter_live().map(|(slot, _)| slot).collect()
    }

    /// Full rows for `row_ids`, in the order given.
    pub fn query(&self, row_ids: &[RowId]) -> Result<Vec<Row>> {
        row_ids
            .iter()
            .map(|&id| self.rows.get(id).cloned().ok_or(TesseraError::RowNotFound(id)))
            .collect()
    }

    /// Read-only snapshot of the index on `column`.
    pub fn get_index_structure(&self, column: usize) -> Result<IndexStructure> {
        self.definition.column(column)?;
        self.indexes
            .get(&column)
            .ok_or(TesseraError::IndexNotFound(column))?
            .export()
    }

    /// Verifies that every index passes its structural checks and holds
    /// exactly the live `(value, row-id)` pairs, and that the free-list
    /// covers every tombstone.
    pub fn check_consistency(&self) -> Result<()> {
        let live = self.rows.live_count();
        for (&column, index) in &self.indexes {
            index.validate()?;
            if index.entry_count() != live {
                return Err(TesseraError::InternalInconsistency(format!(
                    "index on column {} holds {} entries for {} live rows",
                    column,
                    index.entry_count(),
                    live
                )));
            }
            for (slot, row) in self.rows.iter_live() {
                if !index.find(&row[column], RangeOp::Eq)?.contains(&slot) {
                    return Err(TesseraError::InternalInconsistency(format!(
                        "row {} is missing from the index on column {}",
                        slot, column
                    )));
                }
            }
        }

        let free: HashSet<RowId> = self.free_slots.iter().copied().collect();
        let tombstones = self.rows.len() - live;
        if free.len() != self.free_slots.len()
            || free.len() != tombstones
            || free.iter().any(|&slot| self.rows.is_live(slot))
        {
            return Err(TesseraError::InternalInconsistency(format!(
                "free-list has {} slots for {} tombstones",
                self.free_slots.len(),
                tombstones
            )));
        }
        Ok(())
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// Live rows currently holding `value` in `column`.
    fn holders(&self, column: usize, value: &Value) -> Result<Vec<RowId>> {
        match self.indexes.get(&column) {
            Some(index) => index.find(value, RangeOp::Eq),
            None => Ok(self
                .rows
                .iter_live()
                .filter(|(_, row)| row[column] == *value)
                .map(|(slot, _)| slot)
                .collect()),
        }
    }

    /// Deduplicates `row_ids`, failing on the first id that is not live.
    fn live_targets(&self, row_ids: &[RowId]) -> Result<BTreeSet<RowId>> {
        let mut targets = BTreeSet::new();
        for &id in row_ids {
            if !self.rows.is_live(id) {
                return Err(TesseraError::RowNotFound(id));
            }
            targets.insert(id);
        }
        Ok(targets)
    }

    fn not_unique(&self, column: usize, value: &Value) -> TesseraError {
        let name = self
            .definition
            .column(column)
            .map(|c| c.name.clone())
            .unwrap_or_else(|_| column.to_string());
        TesseraError::NotUnique {
            column: name,
            value: value.to_string(),
        }
    }
}
