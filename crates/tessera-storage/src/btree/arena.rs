//! Arena-based node pool for B+Tree nodes.

use tessera_common::{Result, RowId, TesseraError, Value};

/// Identifier of a node slot in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct NodeId(u32);

impl NodeId {
    #[inline(always)]
    fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Leaf node: sorted distinct keys, each with a non-empty bucket of row-ids,
/// linked to its neighbours in key order.
#[derive(Debug, Clone, Default)]
pub(crate) struct LeafNode {
    pub(crate) keys: Vec<Value>,
    pub(crate) buckets: Vec<Vec<RowId>>,
    pub(crate) prev: Option<NodeId>,
    pub(crate) next: Option<NodeId>,
}

/// Internal node: `keys.len() + 1` children.
///
/// Every key in `children[i]` is below `keys[i]`; values equal to `keys[i]`
/// live in `children[i + 1]`.
#[derive(Debug, Clone, Default)]
pub(crate) struct InternalNode {
    pub(crate) keys: Vec<Value>,
    pub(crate) children: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub(crate) enum Node {
    Leaf(LeafNode),
    Internal(InternalNode),
}

impl Node {
    #[inline]
    pub(crate) fn keys(&self) -> &[Value] {
        match self {
            Node::Leaf(leaf) => &leaf.keys,
            Node::Internal(internal) => &internal.keys,
        }
    }

    #[inline]
    pub(crate) fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf(_))
    }
}

/// Node pool addressed by `NodeId`.
///
/// Child and sibling links are ids into this pool, so splits and merges are
/// plain id reassignments. Released slots are recycled by later allocations.
#[derive(Debug, Default)]
pub(crate) struct BTreeArena {
    slots: Vec<Option<Node>>,
    free: Vec<NodeId>,
}

impl BTreeArena {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Stores `node` and returns its id.
    pub(crate) fn allocate(&mut self, node: Node) -> NodeId {
        if let Some(id) = self.free.pop() {
            self.slots[id.index()] = Some(node);
            return id;
        }
        let id = NodeId(self.slots.len() as u32);
        self.slots.push(Some(node));
        id
    }

    /// Removes a node from the pool, returning its contents.
    pub(crate) fn release(&mut self, id: NodeId) -> Result<Node> {
        let node = self
            .slots
            .get_mut(id.index())
            .and_then(Option::take)
            .ok_or_else(|| released(id))?;
        self.free.push(id);
        Ok(node)
    }

    /// Number of live nodes.
    pub(crate) fn live_nodes(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    #[inline]
    pub(crate) fn node(&self, id: NodeId) -> Result<&Node> {
        self.slots
            .get(id.index())
            .and_then(Option::as_ref)
            .ok_or_else(|| released(id))
    }

    #[inline]
    pub(crate) fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.slots
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or_else(|| released(id))
    }

    #[inline]
    pub(crate) fn leaf(&self, id: NodeId) -> Result<&LeafNode> {
        match self.node(id)? {
            Node::Leaf(leaf) => Ok(leaf),
            Node::Internal(_) => Err(wrong_kind(id, "leaf")),
        }
    }

    #[inline]
    pub(crate) fn leaf_mut(&mut self, id: NodeId) -> Result<&mut LeafNode> {
        match self.node_mut(id)? {
            Node::Leaf(leaf) => Ok(leaf),
            Node::Internal(_) => Err(wrong_kind(id, "leaf")),
        }
    }

    #[inline]
    pub(crate) fn internal(&self, id: NodeId) -> Result<&InternalNode> {
        match self.node(id)? {
            Node::Internal(internal) => Ok(internal),
            Node::Leaf(_) => Err(wrong_kind(id, "internal")),
        }
    }

    #[inline]
    pub(crate) fn internal_mut(&mut self, id: NodeId) -> Result<&mut InternalNode> {
        match self.node_mut(id)? {
            Node::Internal(internal) => Ok(internal),
            Node::Leaf(_) => Err(wrong_kind(id, "internal")),
        }
    }
}

fn released(id: NodeId) -> TesseraError {
    TesseraError::BTreeCorrupted(format!("node {} is not allocated", id))
}

fn wrong_kind(id: NodeId, expected: &str) -> TesseraError {
    TesseraError::BTreeCorrupted(format!("node {} is not a {} node", id, expected))
}
