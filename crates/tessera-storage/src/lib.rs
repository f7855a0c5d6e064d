//! Storage layer for Tessera.
//!
//! This crate provides:
//! - B+Tree index keyed on attribute values, with leaves holding row-ids
//! - Row store with tombstoned, reusable slots
//! - Storage coordinator keeping the row store and indexes consistent under
//!   uniqueness constraints

mod btree;
mod coordinator;
mod pattern;
mod rows;

pub use btree::{BPlusTreeIndex, IndexStructure, Iter, RangeOp};
pub use coordinator::StorageCoordinator;
pub use pattern::like_regex;
pub use rows::RowStore;
