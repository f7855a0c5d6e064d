//! B+Tree index over attribute values.
//!
//! Each indexed column owns one `BPlusTreeIndex`. Nodes live in an arena and
//! reference each other by id:
//!
//! ```text
//!                 [ 30 | 60 ]               internal: separators, n+1 children
//!                /     |     \
//!   [10 20] <-> [30 40 50] <-> [60 70]      leaves: keys -> row-id buckets
//! ```
//!
//! Leaves form a doubly linked chain in key order, which range lookups walk
//! outward from the leaf owning the probe value. `export` produces a
//! serializable `IndexStructure` snapshot for visualization.

mod arena;
mod index;
mod types;

pub use index::{BPlusTreeIndex, Iter};
pub use types::{IndexStructure, RangeOp};
