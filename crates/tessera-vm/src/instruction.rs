//! Instruction set and programs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tessera_common::{Comparator, Result, Row, TesseraError, Value};

/// A single `column <comparator> value` test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub column: usize,
    pub comparator: Comparator,
    pub value: Value,
}

impl Condition {
    pub fn new(column: usize, comparator: Comparator, value: impl Into<Value>) -> Self {
        Self {
            column,
            comparator,
            value: value.into(),
        }
    }
}

/// One interpreter instruction with its operand.
///
/// Serialized adjacently tagged, e.g. `{"op": "project", "operand": [1, 2]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", content = "operand", rename_all = "lowercase")]
pub enum Instruction {
    /// Inserts one row.
    Insert(Row),
    /// Sets column values on every selected row.
    Update(BTreeMap<usize, Value>),
    /// Deletes every selected row.
    Delete,
    /// Recomputes the selector from OR-of-AND condition groups.
    /// No groups selects every live row.
    Locate(Vec<Vec<Condition>>),
    /// Fetches the selected rows into the table register.
    Query,
    /// Re-tuples the table register by column indices.
    Project(Vec<usize>),
}

impl Instruction {
    /// Lowercase mnemonic.
    pub fn name(&self) -> &'static str {
        match self {
            Instruction::Insert(_) => "insert",
            Instruction::Update(_) => "update",
            Instruction::Delete => "delete",
            Instruction::Locate(_) => "locate",
            Instruction::Query => "query",
            Instruction::Project(_) => "project",
        }
    }
}

/// A straight-line instruction sequence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Program {
    instructions: Vec<Instruction>,
}

impl Program {
    pub fn new(instructions: Vec<Instruction>) -> Self {
        Self { instructions }
    }

    /// Parses a JSON instruction array.
    ///
    /// Unknown mnemonics and malformed operands are `InvalidInstruction`.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| TesseraError::InvalidInstruction(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| TesseraError::InvalidInstruction(e.to_string()))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Instruction> {
        self.instructions.iter()
    }
}

impl From<Vec<Instruction>> for Program {
    fn from(instructions: Vec<Instruction>) -> Self {
        Self::new(instructions)
    }
}

impl<'a> IntoIterator for &'a Program {
    type Item = &'a Instruction;
    type IntoIter = std::slice::Iter<'a, Instruction>;

    fn into_iter(self) -> Self::IntoIter {
        self.instructions.iter()
    }
}
