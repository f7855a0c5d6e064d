//! Instruction interpreter for Tessera.
//!
//! Programs are short, branch-free instruction sequences produced by an
//! external statement compiler. The interpreter keeps two registers:
//!
//! - selector: the set of row-ids the next mutation or query applies to
//! - table: rows materialized by `query` and reshaped by `project`
//!
//! Storage is reached through the `TableAccess` trait, which
//! `StorageCoordinator` implements.

mod access;
mod condition;
mod instruction;
mod interpreter;
mod result;
mod shared;

#[cfg(test)]
mod testing;

pub use access::TableAccess;
pub use condition::evaluate_conditions;
pub use instruction::{Condition, Instruction, Program};
pub use interpreter::{Vm, run_program};
pub use result::ResultEnvelope;
pub use shared::SharedTable;
pub use tessera_common::Comparator;
