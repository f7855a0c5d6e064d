//! Tessera common types, errors, and configuration.
//!
//! This crate provides shared definitions used across all Tessera components.

pub mod config;
pub mod error;
pub mod types;

pub use config::{EngineConfig, MIN_BTREE_ORDER};
pub use error::{Result, TesseraError};
pub use types::{ColumnDefinition, ColumnType, Comparator, Row, RowId, TableDefinition, Value};
