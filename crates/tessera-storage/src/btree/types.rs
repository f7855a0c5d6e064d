//! Public types for the B+Tree index.

use serde::{Deserialize, Serialize};
use tessera_common::{Comparator, RowId, Value};

/// Comparison supported directly by an index lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RangeOp {
    Eq,
    Lt,
    Le,
    Gt,
    Ge,
}

impl RangeOp {
    /// Maps a statement comparator onto an index lookup.
    ///
    /// `<>` and `LIKE` have no direct index form and return None.
    pub fn from_comparator(comparator: Comparator) -> Option<Self> {
        match comparator {
            Comparator::Eq => Some(RangeOp::Eq),
            Comparator::Lt => Some(RangeOp::Lt),
            Comparator::Le => Some(RangeOp::Le),
            Comparator::Gt => Some(RangeOp::Gt),
            Comparator::Ge => Some(RangeOp::Ge),
            Comparator::Ne | Comparator::Like => None,
        }
    }
}

/// Read-only snapshot of an index tree for visualization.
///
/// Leaves are numbered by their position in the leaf chain; `right_sibling`
/// refers to that number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum IndexStructure {
    Node {
        values: Vec<Value>,
        children: Vec<IndexStructure>,
    },
    Leaf {
        id: usize,
        values: Vec<Value>,
        pointers: Vec<Vec<RowId>>,
        right_sibling: Option<usize>,
    },
}

impl IndexStructure {
    /// Number of levels below and including this node.
    pub fn depth(&self) -> usize {
        match self {
            IndexStructure::Leaf { .. } => 1,
            IndexStructure::Node { children, .. } => {
                1 + children.iter().map(IndexStructure::depth).max().unwrap_or(0)
            }
        }
    }

    /// Separator or leaf keys held by this node.
    pub fn values(&self) -> &[Value] {
        match self {
            IndexStructure::Node { values, .. } | IndexStructure::Leaf { values, .. } => values,
        }
    }
}
