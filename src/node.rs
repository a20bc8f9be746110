//! Slot storage for trie entries.
//!
//! Entries reference each other by index into a single vector instead of by pointer. This makes
//! the cyclic link structure of a PATRICIA trie (uplinks, self loops, parent and predecessor back
//! references) expressible without reference counting or unsafe code.
use std::ops::{Index, IndexMut};

pub(crate) type NodeId = usize;

/// Slot of the root sentinel. It never moves and is never released.
pub(crate) const ROOT: NodeId = 0;

#[derive(Debug, Clone)]
pub(crate) struct Node<K, V> {
    /// `None` for the empty root and for released slots
    pub entry: Option<(K, V)>,
    /// bit tested to choose a branch, -1 for the root
    pub bit_index: isize,
    pub parent: Option<NodeId>,
    pub left: NodeId,
    /// only the root has no right link
    pub right: Option<NodeId>,
    /// the node holding the uplink that points at this node
    pub predecessor: NodeId,
}

impl<K, V> Node<K, V> {
    fn new(id: NodeId, entry: Option<(K, V)>, bit_index: isize) -> Self {
        Self {
            entry,
            bit_index,
            parent: None,
            left: id,
            right: None,
            predecessor: id,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entry.is_none()
    }

    pub fn key(&self) -> Option<&K> {
        self.entry.as_ref().map(|(k, _)| k)
    }

    pub fn value(&self) -> Option<&V> {
        self.entry.as_ref().map(|(_, v)| v)
    }

    /// an internal node is reached by a true child link from above
    pub fn is_internal(&self, id: NodeId) -> bool {
        self.left != id && self.right != Some(id)
    }

    /// replaces key and value, returning the old value
    pub fn replace(&mut self, key: K, value: V) -> Option<V> {
        self.entry.replace((key, value)).map(|(_, v)| v)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Arena<K, V> {
    nodes: Vec<Node<K, V>>,
    free: Vec<NodeId>,
}

impl<K, V> Arena<K, V> {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::new(ROOT, None, -1)],
            free: Vec::new(),
        }
    }

    pub fn alloc(&mut self, entry: (K, V), bit_index: isize) -> NodeId {
        match self.free.pop() {
            Some(id) => {
                self.nodes[id] = Node::new(id, Some(entry), bit_index);
                id
            }
            None => {
                let id = self.nodes.len();
                self.nodes.push(Node::new(id, Some(entry), bit_index));
                id
            }
        }
    }

    /// Takes the entry out of a slot and makes the slot available for reuse.
    ///
    /// The root is only emptied, never released.
    pub fn release(&mut self, id: NodeId) -> Option<(K, V)> {
        let entry = self.nodes[id].entry.take();
        if id != ROOT {
            self.nodes[id] = Node::new(id, None, 0);
            self.free.push(id);
        }
        entry
    }

    /// drops all entries and resets the root sentinel
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.free.clear();
        self.nodes.push(Node::new(ROOT, None, -1));
    }

    /// number of slots, including released ones
    #[cfg(test)]
    pub fn capacity(&self) -> usize {
        self.nodes.len()
    }
}

impl<K, V> Index<NodeId> for Arena<K, V> {
    type Output = Node<K, V>;

    fn index(&self, id: NodeId) -> &Node<K, V> {
        &self.nodes[id]
    }
}

impl<K, V> IndexMut<NodeId> for Arena<K, V> {
    fn index_mut(&mut self, id: NodeId) -> &mut Node<K, V> {
        &mut self.nodes[id]
    }
}
