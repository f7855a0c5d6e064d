//! Recording table double for interpreter unit tests.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use tessera_common::{Comparator, Result, Row, RowId, TesseraError, Value};

use crate::access::TableAccess;

/// Answers `locate` from a fixed table of results and records every call.
#[derive(Debug, Default)]
pub(crate) struct MockTable {
    pub(crate) locate_results: Vec<((usize, Comparator, Value), Vec<RowId>)>,
    pub(crate) content: Vec<Row>,
    /// Overrides the live set reported by `locate_all`.
    pub(crate) live: Option<Vec<RowId>>,
    pub(crate) calls: RefCell<Vec<&'static str>>,
}

impl MockTable {
    pub(crate) fn new(content: Vec<Row>) -> Self {
        Self {
            content,
            ..Default::default()
        }
    }

    pub(crate) fn with_result(
        mut self,
        column: usize,
        comparator: Comparator,
        value: impl Into<Value>,
        ids: &[RowId],
    ) -> Self {
        self.locate_results
            .push(((column, comparator, value.into()), ids.to_vec()));
        self
    }

    pub(crate) fn with_live(mut self, ids: &[RowId]) -> Self {
        self.live = Some(ids.to_vec());
        self
    }

    pub(crate) fn calls(&self) -> Vec<&'static str> {
        self.calls.borrow().clone()
    }

    fn record(&self, call: &'static str) {
        self.calls.borrow_mut().push(call);
    }
}

impl TableAccess for MockTable {
    fn insert(&mut self, row: Row) -> Result<RowId> {
        self.record("insert");
        self.content.push(row);
        Ok(self.content.len() - 1)
    }

    fn locate(&self, column: usize, comparator: Comparator, value: &Value) -> Result<Vec<RowId>> {
        self.record("locate");
        self.locate_results
            .iter()
            .find(|((c, cmp, v), _)| *c == column && *cmp == comparator && v == value)
            .map(|(_, ids)| ids.clone())
            .ok_or(TesseraError::ColumnNotFound(column))
    }

    /// Union of every canned locate result unless overridden.
    fn locate_all(&self) -> Vec<RowId> {
        self.record("locate_all");
        if let Some(live) = &self.live {
            return live.clone();
        }
        let all: BTreeSet<RowId> = self
            .locate_results
            .iter()
            .flat_map(|(_, ids)| ids.iter().copied())
            .collect();
        all.into_iter().collect()
    }

    fn delete(&mut self, _row_ids: &[RowId]) -> Result<()> {
        self.record("delete");
        Ok(())
    }

    fn update(&mut self, _new_values: &BTreeMap<usize, Value>, _row_ids: &[RowId]) -> Result<()> {
        self.record("update");
        Ok(())
    }

    fn query(&self, row_ids: &[RowId]) -> Result<Vec<Row>> {
        self.record("query");
        row_ids
            .iter()
            .map(|&id| self.content.get(id).cloned().ok_or(TesseraError::RowNotFound(id)))
            .collect()
    }
}
