//! Arena-based B+Tree index mapping attribute values to row-ids.

use std::collections::HashMap;

use tessera_common::{MIN_BTREE_ORDER, Result, RowId, TesseraError, Value};
use tracing::trace;

use super::arena::{BTreeArena, InternalNode, LeafNode, Node, NodeId};
use super::types::{IndexStructure, RangeOp};

/// Root-to-leaf descent path: each internal node visited and the child
/// index taken from it.
type Path = Vec<(NodeId, usize)>;

/// B+Tree of order `n` over attribute values.
///
/// Leaves hold sorted distinct keys, each with a bucket of row-ids in
/// insertion order. Internal separators are right-inclusive: a value equal
/// to `keys[i]` routes to `children[i + 1]`. Non-root nodes keep between
/// `ceil(n/2) - 1` and `n - 1` keys.
#[derive(Debug)]
pub struct BPlusTreeIndex {
    arena: BTreeArena,
    root: NodeId,
    order: usize,
    /// Levels including the leaf level (1 = root is a leaf).
    height: usize,
    /// Total row-ids across all buckets.
    entries: usize,
}

impl BPlusTreeIndex {
    /// Creates an empty index. `order` must be at least 3.
    pub fn new(order: usize) -> Result<Self> {
        if order < MIN_BTREE_ORDER {
            return Err(TesseraError::InvalidParameter {
                name: "btree_order".to_string(),
                value: order.to_string(),
            });
        }
        let mut arena = BTreeArena::new();
        let root = arena.allocate(Node::Leaf(LeafNode::default()));
        Ok(Self {
            arena,
            root,
            order,
            height: 1,
            entries: 0,
        })
    }

    #[inline]
    pub fn order(&self) -> usize {
        self.order
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Number of row-ids stored.
    #[inline]
    pub fn entry_count(&self) -> usize {
        self.entries
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }

    /// Number of nodes currently allocated.
    pub fn node_count(&self) -> usize {
        self.arena.live_nodes()
    }

    #[inline]
    fn max_keys(&self) -> usize {
        self.order - 1
    }

    #[inline]
    fn min_keys(&self) -> usize {
        self.order.div_ceil(2) - 1
    }

    // =========================================================================
    // Read Path
    // =========================================================================

    /// Returns the leaf that owns `value`.
    pub(crate) fn search(&self, value: &Value) -> Result<NodeId> {
        self.descend(value).map(|(leaf, _)| leaf)
    }

    /// Descends to the leaf owning `value`, recording the path.
    fn descend(&self, value: &Value) -> Result<(NodeId, Path)> {
        let mut path = Vec::with_capacity(self.height);
        let mut current = self.root;
        loop {
            match self.arena.node(current)? {
                Node::Leaf(_) => return Ok((current, path)),
                Node::Internal(internal) => {
                    let idx = child_index(&internal.keys, value);
                    path.push((current, idx));
                    current = internal.children[idx];
                }
            }
        }
    }

    /// Row-ids whose key satisfies `key <op> value`.
    ///
    /// Range results are gathered along the leaf chain outward from the leaf
    /// owning `value`, so they are not globally value-sorted.
    pub fn find(&self, value: &Value, op: RangeOp) -> Result<Vec<RowId>> {
        let leaf_id = self.search(value)?;
        let leaf = self.arena.leaf(leaf_id)?;
        let pos = leaf.keys.partition_point(|k| k < value);
        let hit = leaf.keys.get(pos).is_some_and(|k| k == value);

        let mut out = Vec::new();
        match op {
            RangeOp::Eq => {
                if hit {
                    out.extend_from_slice(&leaf.buckets[pos]);
                }
            }
            RangeOp::Gt | RangeOp::Ge => {
                let start = if op == RangeOp::Gt && hit { pos + 1 } else { pos };
                flatten_into(&leaf.buckets[start..], &mut out);
                let mut next = leaf.next;
                while let Some(id) = next {
                    let sibling = self.arena.leaf(id)?;
                    flatten_into(&sibling.buckets, &mut out);
                    next = sibling.next;
                }
            }
            RangeOp::Lt | RangeOp::Le => {
                let end = if op == RangeOp::Le && hit { pos + 1 } else { pos };
                flatten_into(&leaf.buckets[..end], &mut out);
                let mut prev = leaf.prev;
                while let Some(id) = prev {
                    let sibling = self.arena.leaf(id)?;
                    flatten_into(&sibling.buckets, &mut out);
                    prev = sibling.prev;
                }
            }
        }
        Ok(out)
    }

    /// Iterates `(key, row-ids)` pairs in key order along the leaf chain.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            index: self,
            leaf: self.leftmost_leaf().ok(),
            pos: 0,
        }
    }

    fn leftmost_leaf(&self) -> Result<NodeId> {
        let mut current = self.root;
        loop {
            match self.arena.node(current)? {
                Node::Leaf(_) => return Ok(current),
                Node::Internal(internal) => current = internal.children[0],
            }
        }
    }

    // =========================================================================
    // Insert
    // =========================================================================

    /// Files `row_id` under `value`.
    pub fn insert(&mut self, value: Value, row_id: RowId) -> Result<()> {
        let (leaf_id, path) = self.descend(&value)?;
        let leaf = self.arena.leaf_mut(leaf_id)?;
        match leaf.keys.binary_search(&value) {
            Ok(pos) => leaf.buckets[pos].push(row_id),
            Err(pos) => {
                leaf.keys.insert(pos, value);
                leaf.buckets.insert(pos, vec![row_id]);
            }
        }
        let overflow = leaf.keys.len() >= self.order;
        self.entries += 1;

        if overflow {
            let (separator, right) = self.split_leaf(leaf_id)?;
            self.insert_into_parent(path, leaf_id, separator, right)?;
        }
        Ok(())
    }

    /// Moves the upper half of a full leaf into a new right sibling.
    /// Returns the separator (first key of the new leaf) and its id.
    fn split_leaf(&mut self, leaf_id: NodeId) -> Result<(Value, NodeId)> {
        let mid = self.order.div_ceil(2);
        let leaf = self.arena.leaf_mut(leaf_id)?;
        let keys = leaf.keys.split_off(mid);
        let buckets = leaf.buckets.split_off(mid);
        let old_next = leaf.next;
        let separator = keys[0].clone();

        let right_id = self.arena.allocate(Node::Leaf(LeafNode {
            keys,
            buckets,
            prev: Some(leaf_id),
            next: old_next,
        }));
        self.arena.leaf_mut(leaf_id)?.next = Some(right_id);
        if let Some(next) = old_next {
            self.arena.leaf_mut(next)?.prev = Some(right_id);
        }

        trace!(left = %leaf_id, right = %right_id, separator = %separator, "leaf split");
        Ok((separator, right_id))
    }

    /// Moves the upper half of a full internal node into a new sibling.
    /// The middle key moves up and is returned with the sibling's id.
    fn split_internal(&mut self, node_id: NodeId) -> Result<(Value, NodeId)> {
        let mid = self.order / 2;
        let node = self.arena.internal_mut(node_id)?;
        let mut keys = node.keys.split_off(mid);
        let children = node.children.split_off(mid + 1);
        let promoted = keys.remove(0);

        let right_id = self
            .arena
            .allocate(Node::Internal(InternalNode { keys, children }));

        trace!(left = %node_id, right = %right_id, separator = %promoted, "internal split");
        Ok((promoted, right_id))
    }

    /// Links a freshly split `right` node next to `left` in its parent,
    /// splitting ancestors as needed and growing a new root at the top.
    fn insert_into_parent(
        &mut self,
        mut path: Path,
        mut left: NodeId,
        mut separator: Value,
        mut right: NodeId,
    ) -> Result<()> {
        loop {
            let Some((parent_id, child_idx)) = path.pop() else {
                let new_root = self.arena.allocate(Node::Internal(InternalNode {
                    keys: vec![separator],
                    children: vec![left, right],
                }));
                self.root = new_root;
                self.height += 1;
                trace!(root = %new_root, height = self.height, "root split");
                return Ok(());
            };

            let parent = self.arena.internal_mut(parent_id)?;
            parent.keys.insert(child_idx, separator);
            parent.children.insert(child_idx + 1, right);
            if parent.keys.len() < self.order {
                return Ok(());
            }

            let (promoted, sibling) = self.split_internal(parent_id)?;
            left = parent_id;
            separator = promoted;
            right = sibling;
        }
    }

    // =========================================================================
    // Delete
    // =========================================================================

    /// Removes `row_id` from the bucket of `value`, dropping the key when the
    /// bucket empties and rebalancing underfull nodes.
    pub fn delete(&mut self, row_id: RowId, value: &Value) -> Result<()> {
        let (leaf_id, path) = self.descend(value)?;
        let leaf = self.arena.leaf_mut(leaf_id)?;
        let pos = leaf.keys.binary_search(value).map_err(|_| {
            TesseraError::InternalInconsistency(format!("key {} is not in the index", value))
        })?;
        let bucket = &mut leaf.buckets[pos];
        let slot = bucket.iter().position(|&id| id == row_id).ok_or_else(|| {
            TesseraError::InternalInconsistency(format!(
                "row {} is not filed under key {}",
                row_id, value
            ))
        })?;
        bucket.remove(slot);
        if bucket.is_empty() {
            leaf.keys.remove(pos);
            leaf.buckets.remove(pos);
        }
        let underfull = leaf.keys.len() < self.min_keys();
        self.entries -= 1;

        if underfull && !path.is_empty() {
            self.rebalance(leaf_id, path)?;
        }
        Ok(())
    }

    /// Restores minimum occupancy from `node_id` upward.
    fn rebalance(&mut self, mut node_id: NodeId, mut path: Path) -> Result<()> {
        while let Some((parent_id, idx)) = path.pop() {
            if self.arena.node(node_id)?.keys().len() >= self.min_keys() {
                return Ok(());
            }
            self.fix_underflow(parent_id, idx)?;

            if parent_id == self.root {
                let root = self.arena.internal(parent_id)?;
                if root.keys.is_empty() {
                    let only_child = root.children[0];
                    self.arena.release(parent_id)?;
                    self.root = only_child;
                    self.height -= 1;
                    trace!(root = %only_child, height = self.height, "root collapsed");
                }
                return Ok(());
            }
            node_id = parent_id;
        }
        Ok(())
    }

    /// Fixes the underfull child at `idx` of `parent_id`.
    ///
    /// Merges with the left sibling when both fit in one node, else with the
    /// right sibling, else borrows from whichever sibling has surplus, left
    /// first.
    fn fix_underflow(&mut self, parent_id: NodeId, idx: usize) -> Result<()> {
        let (node_id, left, right) = {
            let parent = self.arena.internal(parent_id)?;
            let left = idx.checked_sub(1).map(|i| parent.children[i]);
            let right = parent.children.get(idx + 1).copied();
            (parent.children[idx], left, right)
        };
        let node = self.arena.node(node_id)?;
        // Internal merges also pull the parent separator down.
        let extra = usize::from(!node.is_leaf());
        let node_len = node.keys().len();
        let max = self.max_keys();
        let min = self.min_keys();

        if let Some(left_id) = left {
            if self.key_count(left_id)? + node_len + extra <= max {
                return self.merge(parent_id, idx - 1);
            }
        }
        if let Some(right_id) = right {
            if self.key_count(right_id)? + node_len + extra <= max {
                return self.merge(parent_id, idx);
            }
        }
        if let Some(left_id) = left {
            if self.key_count(left_id)? > min {
                return self.borrow_from_left(parent_id, idx);
            }
        }
        if let Some(right_id) = right {
            if self.key_count(right_id)? > min {
                return self.borrow_from_right(parent_id, idx);
            }
        }
        Err(TesseraError::InternalInconsistency(format!(
            "node {} under {} has no sibling to merge with or borrow from",
            node_id, parent_id
        )))
    }

    #[inline]
    fn key_count(&self, id: NodeId) -> Result<usize> {
        Ok(self.arena.node(id)?.keys().len())
    }

    /// Merges `children[sep_idx + 1]` into `children[sep_idx]` and drops
    /// `keys[sep_idx]` from the parent.
    fn merge(&mut self, parent_id: NodeId, sep_idx: usize) -> Result<()> {
        let parent = self.arena.internal_mut(parent_id)?;
        let separator = parent.keys.remove(sep_idx);
        let right_id = parent.children.remove(sep_idx + 1);
        let left_id = parent.children[sep_idx];

        match self.arena.release(right_id)? {
            Node::Leaf(right) => {
                let left = self.arena.leaf_mut(left_id)?;
                left.keys.extend(right.keys);
                left.buckets.extend(right.buckets);
                left.next = right.next;
                if let Some(next) = right.next {
                    self.arena.leaf_mut(next)?.prev = Some(left_id);
                }
            }
            Node::Internal(right) => {
                let left = self.arena.internal_mut(left_id)?;
                left.keys.push(separator);
                left.keys.extend(right.keys);
                left.children.extend(right.children);
            }
        }

        trace!(left = %left_id, right = %right_id, "nodes merged");
        Ok(())
    }

    /// Shifts the last entry of the left sibling into `children[idx]`.
    fn borrow_from_left(&mut self, parent_id: NodeId, idx: usize) -> Result<()> {
        let (left_id, node_id) = {
            let parent = self.arena.internal(parent_id)?;
            (parent.children[idx - 1], parent.children[idx])
        };

        if self.arena.node(node_id)?.is_leaf() {
            let left = self.arena.leaf_mut(left_id)?;
            let (key, bucket) = left
                .keys
                .pop()
                .zip(left.buckets.pop())
                .ok_or_else(|| empty_sibling(left_id))?;
            let node = self.arena.leaf_mut(node_id)?;
            node.keys.insert(0, key.clone());
            node.buckets.insert(0, bucket);
            self.arena.internal_mut(parent_id)?.keys[idx - 1] = key;
        } else {
            let left = self.arena.internal_mut(left_id)?;
            let (key, child) = left
                .keys
                .pop()
                .zip(left.children.pop())
                .ok_or_else(|| empty_sibling(left_id))?;
            let parent = self.arena.internal_mut(parent_id)?;
            let down = std::mem::replace(&mut parent.keys[idx - 1], key);
            let node = self.arena.internal_mut(node_id)?;
            node.keys.insert(0, down);
            node.children.insert(0, child);
        }

        trace!(from = %left_id, to = %node_id, "borrowed from left sibling");
        Ok(())
    }

    /// Shifts the first entry of the right sibling into `children[idx]`.
    fn borrow_from_right(&mut self, parent_id: NodeId, idx: usize) -> Result<()> {
        let (node_id, right_id) = {
            let parent = self.arena.internal(parent_id)?;
            (parent.children[idx], parent.children[idx + 1])
        };

        if self.arena.node(node_id)?.is_leaf() {
            let right = self.arena.leaf_mut(right_id)?;
            if right.keys.len() < 2 {
                return Err(empty_sibling(right_id));
            }
            let key = right.keys.remove(0);
            let bucket = right.buckets.remove(0);
            let separator = right.keys[0].clone();
            let node = self.arena.leaf_mut(node_id)?;
            node.keys.push(key);
            node.buckets.push(bucket);
            self.arena.internal_mut(parent_id)?.keys[idx] = separator;
        } else {
            let right = self.arena.internal_mut(right_id)?;
            if right.keys.is_empty() {
                return Err(empty_sibling(right_id));
            }
            let key = right.keys.remove(0);
            let child = right.children.remove(0);
            let parent = self.arena.internal_mut(parent_id)?;
            let down = std::mem::replace(&mut parent.keys[idx], key);
            let node = self.arena.internal_mut(node_id)?;
            node.keys.push(down);
            node.children.push(child);
        }

        trace!(from = %right_id, to = %node_id, "borrowed from right sibling");
        Ok(())
    }

    // =========================================================================
    // Validation and Export
    // =========================================================================

    /// Checks every structural invariant of the tree.
    ///
    /// Verifies key order, separator bounds, fill limits, uniform leaf depth,
    /// the doubly linked leaf chain, and the entry count.
    pub fn validate(&self) -> Result<()> {
        let mut leaves = Vec::new();
        self.validate_node(self.root, None, None, true, &mut leaves)?;

        let mut chain = Vec::with_capacity(leaves.len());
        let mut prev = None;
        let mut current = Some(self.leftmost_leaf()?);
        while let Some(id) = current {
            let leaf = self.arena.leaf(id)?;
            if leaf.prev != prev {
                return Err(corrupted(format!(
                    "leaf {} has prev link {:?}, expected {:?}",
                    id, leaf.prev, prev
                )));
            }
            chain.push(id);
            if chain.len() > leaves.len() {
                return Err(corrupted("leaf chain is longer than the tree".to_string()));
            }
            prev = Some(id);
            current = leaf.next;
        }
        if chain != leaves {
            return Err(corrupted(
                "leaf chain does not match tree order".to_string(),
            ));
        }

        let counted: usize = self.iter().map(|(_, bucket)| bucket.len()).sum();
        if counted != self.entries {
            return Err(corrupted(format!(
                "entry count {} does not match {} stored row-ids",
                self.entries, counted
            )));
        }
        Ok(())
    }

    /// Validates the subtree at `id` against the half-open key range
    /// `[lower, upper)` and returns its height.
    fn validate_node(
        &self,
        id: NodeId,
        lower: Option<&Value>,
        upper: Option<&Value>,
        is_root: bool,
        leaves: &mut Vec<NodeId>,
    ) -> Result<usize> {
        let node = self.arena.node(id)?;
        let keys = node.keys();

        if keys.windows(2).any(|w| w[0] >= w[1]) {
            return Err(corrupted(format!("node {} keys are not strictly increasing", id)));
        }
        if let (Some(lo), Some(first)) = (lower, keys.first()) {
            if first < lo {
                return Err(corrupted(format!("node {} key {} below bound {}", id, first, lo)));
            }
        }
        if let (Some(hi), Some(last)) = (upper, keys.last()) {
            if last >= hi {
                return Err(corrupted(format!("node {} key {} not below bound {}", id, last, hi)));
            }
        }
        if keys.len() > self.max_keys() {
            return Err(corrupted(format!("node {} overflows with {} keys", id, keys.len())));
        }
        if !is_root && keys.len() < self.min_keys() {
            return Err(corrupted(format!("node {} underflows with {} keys", id, keys.len())));
        }

        match node {
            Node::Leaf(leaf) => {
                if leaf.buckets.len() != keys.len() || leaf.buckets.iter().any(Vec::is_empty) {
                    return Err(corrupted(format!("leaf {} has malformed buckets", id)));
                }
                leaves.push(id);
                Ok(1)
            }
            Node::Internal(internal) => {
                if internal.children.len() != keys.len() + 1 {
                    return Err(corrupted(format!(
                        "internal node {} has {} keys and {} children",
                        id,
                        keys.len(),
                        internal.children.len()
                    )));
                }
                if is_root && keys.is_empty() {
                    return Err(corrupted("internal root has a single child".to_string()));
                }
                let mut depth = None;
                for (i, &child) in internal.children.iter().enumerate() {
                    let lo = if i == 0 { lower } else { Some(&keys[i - 1]) };
                    let hi = if i == keys.len() { upper } else { Some(&keys[i]) };
                    let child_depth = self.validate_node(child, lo, hi, false, leaves)?;
                    if *depth.get_or_insert(child_depth) != child_depth {
                        return Err(corrupted(format!("node {} has leaves at uneven depth", id)));
                    }
                }
                Ok(depth.unwrap_or(0) + 1)
            }
        }
    }

    /// Exports the tree as a nested read-only structure.
    pub fn export(&self) -> Result<IndexStructure> {
        let mut ordinals = HashMap::new();
        let mut current = Some(self.leftmost_leaf()?);
        while let Some(id) = current {
            ordinals.insert(id, ordinals.len());
            current = self.arena.leaf(id)?.next;
        }
        self.export_node(self.root, &ordinals)
    }

    fn export_node(&self, id: NodeId, ordinals: &HashMap<NodeId, usize>) -> Result<IndexStructure> {
        match self.arena.node(id)? {
            Node::Leaf(leaf) => Ok(IndexStructure::Leaf {
                id: ordinals.get(&id).copied().unwrap_or_default(),
                values: leaf.keys.clone(),
                pointers: leaf.buckets.clone(),
                right_sibling: leaf.next.and_then(|next| ordinals.get(&next).copied()),
            }),
            Node::Internal(internal) => Ok(IndexStructure::Node {
                values: internal.keys.clone(),
                children: internal
                    .children
                    .iter()
                    .map(|&child| self.export_node(child, ordinals))
                    .collect::<Result<Vec<_>>>()?,
            }),
        }
    }
}

/// Iterator over `(key, row-ids)` pairs in key order.
pub struct Iter<'a> {
    index: &'a BPlusTreeIndex,
    leaf: Option<NodeId>,
    pos: usize,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (&'a Value, &'a [RowId]);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let leaf = self.index.arena.leaf(self.leaf?).ok()?;
            if self.pos < leaf.keys.len() {
                let item = (&leaf.keys[self.pos], leaf.buckets[self.pos].as_slice());
                self.pos += 1;
                return Some(item);
            }
            self.leaf = leaf.next;
            self.pos = 0;
        }
    }
}

/// Child slot for `value`: keys strictly below go left, equal keys go right.
#[inline]
fn child_index(keys: &[Value], value: &Value) -> usize {
    keys.partition_point(|k| k <= value)
}

#[inline]
fn flatten_into(buckets: &[Vec<RowId>], out: &mut Vec<RowId>) {
    for bucket in buckets {
        out.extend_from_slice(bucket);
    }
}

fn corrupted(reason: String) -> TesseraError {
    TesseraError::BTreeCorrupted(reason)
}

fn empty_sibling(id: NodeId) -> TesseraError {
    TesseraError::InternalInconsistency(format!("sibling {} has no entry to lend", id))
}
