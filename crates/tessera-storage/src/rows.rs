//! Positional row store with tombstoned slots.
//!
//! A slot is either a live row or a tombstone left by a delete. The store
//! does not track free slots itself; the coordinator owns the free-list and
//! hands recycled slots back through `insert`.

use tessera_common::{Result, Row, RowId, TesseraError, Value};

/// Slot sequence holding the table's rows.
#[derive(Debug, Clone, Default)]
pub struct RowStore {
    slots: Vec<Option<Row>>,
    live: usize,
}

impl RowStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store with room for `capacity` slots.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            live: 0,
        }
    }

    /// Writes `row` at `slot`.
    ///
    /// `slot == len()` appends; a smaller slot overwrites in place. Anything
    /// past the end would leave a hole and is rejected.
    pub fn insert(&mut self, slot: RowId, row: Row) -> Result<()> {
        match slot.cmp(&self.slots.len()) {
            std::cmp::Ordering::Equal => {
                self.slots.push(Some(row));
                self.live += 1;
            }
            std::cmp::Ordering::Less => {
                if self.slots[slot].replace(row).is_none() {
                    self.live += 1;
                }
            }
            std::cmp::Ordering::Greater => {
                return Err(TesseraError::InternalInconsistency(format!(
                    "slot {} is past the end of the row store ({} slots)",
                    slot,
                    self.slots.len()
                )));
            }
        }
        Ok(())
    }

    /// Tombstones `slot`, returning the row it held.
    pub fn delete(&mut self, slot: RowId) -> Result<Row> {
        let row = self
            .slots
            .get_mut(slot)
            .and_then(Option::take)
            .ok_or(TesseraError::RowNotFound(slot))?;
        self.live -= 1;
        Ok(row)
    }

    /// Replaces one cell of a live row.
    pub fn update(&mut self, slot: RowId, column: usize, value: Value) -> Result<()> {
        let row = self
            .slots
            .get_mut(slot)
            .and_then(Option::as_mut)
            .ok_or(TesseraError::RowNotFound(slot))?;
        let cell = row
            .get_mut(column)
            .ok_or(TesseraError::ColumnNotFound(column))?;
        *cell = value;
        Ok(())
    }

    /// Returns the live row at `slot`.
    #[inline]
    pub fn get(&self, slot: RowId) -> Option<&Row> {
        self.slots.get(slot).and_then(Option::as_ref)
    }

    #[inline]
    pub fn is_live(&self, slot: RowId) -> bool {
        self.get(slot).is_some()
    }

    /// The backing slot sequence, tombstones included.
    pub fn get_all(&self) -> &[Option<Row>] {
        &self.slots
    }

    /// Number of slots, live or tombstoned.
    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of live rows.
    #[inline]
    pub fn live_count(&self) -> usize {
        self.live
    }

    /// Iterates live rows with their slots, in slot order.
    pub fn iter_live(&self) -> impl Iterator<Item = (RowId, &Row)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(slot, row)| row.as_ref().map(|row| (slot, row)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(sno: i64, name: &str) -> Row {
        vec![Value::Int(sno), Value::from(name)]
    }

    #[test]
    fn test_insert_appends_and_overwrites() {
        let mut store = RowStore::new();
        store.insert(0, row(1, "Alice")).unwrap();
        store.insert(1, row(2, "Beta")).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.live_count(), 2);

        store.insert(0, row(9, "Omega")).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.live_count(), 2);
        assert_eq!(store.get(0), Some(&row(9, "Omega")));
    }

    #[test]
    fn test_insert_past_end_is_internal_fault() {
        let mut store = RowStore::new();
        let err = store.insert(1, row(1, "Alice")).unwrap_err();
        assert!(err.is_internal());
        assert!(store.is_empty());
    }

    #[test]
    fn test_delete_tombstones_slot() {
        let mut store = RowStore::with_capacity(4);
        store.insert(0, row(1, "Alice")).unwrap();
        store.insert(1, row(2, "Beta")).unwrap();

        let removed = store.delete(0).unwrap();
        assert_eq!(removed, row(1, "Alice"));
        assert_eq!(store.len(), 2);
        assert_eq!(store.live_count(), 1);
        assert!(store.get_all()[0].is_none());
        assert!(!store.is_live(0));
        assert!(matches!(store.delete(0), Err(TesseraError::RowNotFound(0))));
        assert!(matches!(store.delete(7), Err(TesseraError::RowNotFound(7))));

        store.insert(0, row(3, "Gamma")).unwrap();
        assert_eq!(store.live_count(), 2);
    }

    #[test]
    fn test_update_cell() {
        let mut store = RowStore::new();
        store.insert(0, row(1, "Alice")).unwrap();
        store.update(0, 1, Value::from("Alicia")).unwrap();
        assert_eq!(store.get(0).unwrap()[1], Value::from("Alicia"));

        assert!(matches!(
            store.update(0, 5, Value::Null),
            Err(TesseraError::ColumnNotFound(5))
        ));
        store.delete(0).unwrap();
        assert!(matches!(
            store.update(0, 1, Value::Null),
            Err(TesseraError::RowNotFound(0))
        ));
    }

    #[test]
    fn test_iter_live_skips_tombstones() {
        let mut store = RowStore::new();
        for i in 0..4 {
            store.insert(i, row(i as i64, "x")).unwrap();
        }
        store.delete(1).unwrap();
        store.delete(3).unwrap();
        let slots: Vec<RowId> = store.iter_live().map(|(slot, _)| slot).collect();
        assert_eq!(slots, vec![0, 2]);
    }
}
