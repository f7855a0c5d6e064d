//! Configuration structures for Tessera.

use crate::error::{Result, TesseraError};
use serde::{Deserialize, Serialize};

/// Smallest B+Tree order that keeps split and merge well defined.
pub const MIN_BTREE_ORDER: usize = 3;

/// Engine configuration for a single table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum number of children per internal node (leaves hold order - 1 keys).
    pub btree_order: usize,
    /// Row slots to preallocate in the row store.
    pub initial_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            btree_order: 4,
            initial_capacity: 0,
        }
    }
}

impl EngineConfig {
    /// Checks parameter ranges.
    pub fn validate(&self) -> Result<()> {
        if self.btree_order < MIN_BTREE_ORDER {
            return Err(TesseraError::InvalidParameter {
                name: "btree_order".to_string(),
                value: self.btree_order.to_string(),
            });
        }
        Ok(())
    }

    /// Parses and validates a JSON configuration document.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: EngineConfig =
            serde_json::from_str(text).map_err(|e| TesseraError::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}
