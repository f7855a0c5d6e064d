//! Thread-safe handle around a storage coordinator.

use parking_lot::Mutex;
use std::sync::Arc;
use tessera_common::Result;
use tessera_storage::{IndexStructure, StorageCoordinator};

use crate::instruction::Program;
use crate::interpreter::run_program;
use crate::result::ResultEnvelope;

/// Cloneable handle serializing programs against one coordinator.
///
/// The lock is held for a whole program, so a program's checks and writes
/// are never interleaved with another program's.
#[derive(Debug, Clone)]
pub struct SharedTable {
    inner: Arc<Mutex<StorageCoordinator>>,
}

impl SharedTable {
    pub fn new(coordinator: StorageCoordinator) -> Self {
        Self {
            inner: Arc::new(Mutex::new(coordinator)),
        }
    }

    /// Runs `program` under the table lock.
    pub fn execute(&self, program: &Program) -> ResultEnvelope {
        let mut coordinator = self.inner.lock();
        run_program(program, &mut *coordinator)
    }

    /// Runs `f` with shared access to the coordinator.
    pub fn read<R>(&self, f: impl FnOnce(&StorageCoordinator) -> R) -> R {
        f(&self.inner.lock())
    }

    /// Snapshot of the index on `column`.
    pub fn get_index_structure(&self, column: usize) -> Result<IndexStructure> {
        self.inner.lock().get_index_structure(column)
    }
}
