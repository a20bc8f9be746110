//! The PATRICIA trie engine.
//!
//! Every entry is stored in exactly one node, and every node except the root tests exactly one bit.
//! Nodes are linked with left and right links that either point down to a node testing a higher
//! bit (a true child) or up to a node testing the same or a lower bit (an uplink). The node an
//! uplink points to holds the key that belongs at that position of the trie. The root sentinel
//! tests bit -1, may hold the one key without any set bit, and is the target of the uplink at the
//! leftmost position.
//!
//! Each node also records its parent (the node whose true child link points at it) and its
//! predecessor (the node holding the uplink that points at it). The predecessor link is what
//! makes in order traversal possible without a stack.
use crate::error::{Result, TrieError};
use crate::iterators::{CursorMut, IntoIter, IntoKeys, IntoValues, Iter, Keys, Scope, Values};
use crate::key_analyzer::{BitIndex, ByteKeyAnalyzer, KeyAnalyzer};
use crate::node::{Arena, NodeId, ROOT};
use crate::prefix_view::PrefixView;
use crate::range_view::RangeView;
use smallvec::SmallVec;
use std::borrow::Borrow;
use std::fmt::{self, Debug};
use std::ops::{Bound, Index};
use tracing::{debug, trace, warn};

/// Decision returned by the visitor of [`PatriciaTrie::traverse`] and
/// [`PatriciaTrie::select_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Visit {
    /// go on with the next entry
    Continue,
    /// stop and return the current entry
    Exit,
    /// remove the current entry and go on
    Remove,
    /// remove the current entry and return it
    RemoveAndExit,
}

/// The entry a visitor stopped at.
#[derive(Debug, PartialEq, Eq)]
pub enum Selection<'a, K, V> {
    /// the entry is still stored in the trie
    Entry(&'a K, &'a V),
    /// the entry was removed with [`Visit::RemoveAndExit`]
    Removed(K, V),
}

impl<'a, K, V> Selection<'a, K, V> {
    pub fn key(&self) -> &K {
        match self {
            Selection::Entry(k, _) => k,
            Selection::Removed(k, _) => k,
        }
    }

    pub fn value(&self) -> &V {
        match self {
            Selection::Entry(_, v) => v,
            Selection::Removed(_, v) => v,
        }
    }

    pub fn is_removed(&self) -> bool {
        matches!(self, Selection::Removed(..))
    }
}

/// Where a key falls relative to the stored keys
enum Position {
    Exact(NodeId),
    Between {
        lower: Option<NodeId>,
        higher: Option<NodeId>,
    },
}

/// Depth first stack used by select. Deep tries spill to the heap.
type SelectStack = SmallVec<[(NodeId, isize); 32]>;

/// An ordered map from keys to values, organized by the bits of the keys.
///
/// Key order, prefix decisions and bit access are all delegated to the analyzer `A`. The default
/// analyzer handles strings and byte strings.
///
/// Two keys with the same bit string (for byte strings this means they only differ in trailing
/// zero bytes, like `"a"` and `"a\0"`) are the same key as far as the trie is concerned. Inserting
/// the second one replaces the first one. Boundary searches order such a key next to the stored
/// one, using [`KeyAnalyzer::compare`].
#[derive(Clone)]
pub struct PatriciaTrie<K, V, A = ByteKeyAnalyzer> {
    nodes: Arena<K, V>,
    size: usize,
    mod_count: u64,
    analyzer: A,
}

impl<K, V, A: Default> Default for PatriciaTrie<K, V, A> {
    fn default() -> Self {
        Self::new(A::default())
    }
}

impl<K, V, A> PatriciaTrie<K, V, A> {
    pub fn new(analyzer: A) -> Self {
        Self {
            nodes: Arena::new(),
            size: 0,
            mod_count: 0,
            analyzer,
        }
    }

    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn analyzer(&self) -> &A {
        &self.analyzer
    }

    /// Number of modifications so far, counting insertions, removals and value replacements.
    pub fn mod_count(&self) -> u64 {
        self.mod_count
    }

    pub fn clear(&mut self) {
        debug!(size = self.size, "clearing trie");
        self.nodes.clear();
        self.size = 0;
        self.mod_count += 1;
    }

    /// iterate over all entries in key order
    pub fn iter(&self) -> Iter<'_, K, V, A> {
        Iter::new(self, self.first_node(), Scope::All)
    }

    pub fn keys(&self) -> Keys<'_, K, V, A> {
        Keys::new(self.iter())
    }

    pub fn values(&self) -> Values<'_, K, V, A> {
        Values::new(self.iter())
    }

    pub fn into_keys(self) -> IntoKeys<K, V, A> {
        IntoKeys::new(self.into_iter())
    }

    pub fn into_values(self) -> IntoValues<K, V, A> {
        IntoValues::new(self.into_iter())
    }

    /// A cursor over all entries that allows removing the entry it was last advanced to.
    pub fn cursor_mut(&mut self) -> CursorMut<'_, K, V, A> {
        let first = self.first_node();
        CursorMut::new(self, first, Scope::All)
    }

    pub fn first_key_value(&self) -> Option<(&K, &V)> {
        self.first_node().and_then(|id| self.entry(id))
    }

    pub fn last_key_value(&self) -> Option<(&K, &V)> {
        self.last_node().and_then(|id| self.entry(id))
    }

    pub fn first_key(&self) -> Option<&K> {
        self.first_key_value().map(|(k, _)| k)
    }

    pub fn last_key(&self) -> Option<&K> {
        self.last_key_value().map(|(k, _)| k)
    }

    pub fn pop_first(&mut self) -> Option<(K, V)> {
        let id = self.first_node()?;
        self.remove_node(id)
    }

    pub fn pop_last(&mut self) -> Option<(K, V)> {
        let id = self.last_node()?;
        self.remove_node(id)
    }

    /// linear scan over all values
    pub fn contains_value(&self, value: &V) -> bool
    where
        V: PartialEq,
        A: KeyAnalyzer<K>,
    {
        self.values().any(|v| v == value)
    }

    /// Keeps only the entries for which `f` returns true.
    pub fn retain<F>(&mut self, mut f: F)
    where
        F: FnMut(&K, &mut V) -> bool,
    {
        let mut next = self.first_node();
        while let Some(current) = next {
            next = self.next_node(current);
            let keep = match self.nodes[current].entry.as_mut() {
                Some((k, v)) => f(k, v),
                None => true,
            };
            if !keep {
                self.remove_node(current);
            }
        }
    }

    /// Visits all entries in key order until the visitor asks to exit.
    ///
    /// Entries can be removed while traversing. Returns the entry the visitor exited at, if any.
    pub fn traverse<F>(&mut self, mut visitor: F) -> Option<Selection<'_, K, V>>
    where
        F: FnMut(&K, &V) -> Visit,
    {
        let mut next = self.first_node();
        while let Some(current) = next {
            let decision = match self.nodes[current].entry.as_ref() {
                Some((k, v)) => visitor(k, v),
                None => break,
            };
            next = self.next_node(current);
            match decision {
                Visit::Continue => {}
                Visit::Exit => {
                    return self.entry(current).map(|(k, v)| Selection::Entry(k, v));
                }
                Visit::Remove => {
                    self.remove_node(current);
                }
                Visit::RemoveAndExit => {
                    return self
                        .remove_node(current)
                        .map(|(k, v)| Selection::Removed(k, v));
                }
            }
        }
        None
    }

    pub(crate) fn entry(&self, id: NodeId) -> Option<(&K, &V)> {
        self.nodes[id].entry.as_ref().map(|(k, v)| (k, v))
    }

    pub(crate) fn entry_mut(&mut self, id: NodeId) -> Option<(&K, &mut V)> {
        self.nodes[id].entry.as_mut().map(|(k, v)| (&*k, v))
    }

    pub(crate) fn bit(&self, id: NodeId) -> isize {
        self.nodes[id].bit_index
    }

    fn is_empty_node(&self, id: NodeId) -> bool {
        self.nodes[id].is_empty()
    }

    /// an uplink from `from` to a node that holds an entry
    fn is_valid_uplink(&self, next: NodeId, from: NodeId) -> bool {
        self.bit(next) <= self.bit(from) && !self.is_empty_node(next)
    }

    fn parent_of(&self, id: NodeId) -> NodeId {
        match self.nodes[id].parent {
            Some(parent) => parent,
            None => broken_link(id, "parent"),
        }
    }

    fn right_of(&self, id: NodeId) -> NodeId {
        match self.nodes[id].right {
            Some(right) => right,
            None => broken_link(id, "right"),
        }
    }

    fn child(&self, id: NodeId, right: bool) -> NodeId {
        if right {
            self.right_of(id)
        } else {
            self.nodes[id].left
        }
    }

    /// makes whichever link of `parent` pointed at `old` point at `new`
    fn relink(&mut self, parent: NodeId, old: NodeId, new: NodeId) {
        let node = &mut self.nodes[parent];
        if node.left == old {
            node.left = new;
        } else {
            node.right = Some(new);
        }
    }

    /// the first entry in the subtree below `node`, skipping the empty root
    pub(crate) fn follow_left(&self, mut node: NodeId) -> NodeId {
        loop {
            let mut child = self.nodes[node].left;
            if self.is_empty_node(child) {
                child = self.right_of(node);
            }
            if self.bit(child) <= self.bit(node) {
                return child;
            }
            node = child;
        }
    }

    /// the last uplink target in the subtree below `node`
    fn follow_right(&self, mut node: NodeId) -> Option<NodeId> {
        loop {
            let right = self.nodes[node].right?;
            if self.bit(right) <= self.bit(node) {
                return Some(right);
            }
            node = right;
        }
    }

    pub(crate) fn first_node(&self) -> Option<NodeId> {
        if self.is_empty() {
            None
        } else {
            Some(self.follow_left(ROOT))
        }
    }

    pub(crate) fn last_node(&self) -> Option<NodeId> {
        match self.follow_right(self.nodes[ROOT].left) {
            Some(id) if !self.is_empty_node(id) => Some(id),
            // the root sentinel is the only entry
            _ if !self.is_empty_node(ROOT) => Some(ROOT),
            _ => None,
        }
    }

    /// the entry after `node` in key order
    pub(crate) fn next_node(&self, node: NodeId) -> Option<NodeId> {
        self.next_node_within(self.nodes[node].predecessor, node, None)
    }

    /// the entry after `node` in key order, without leaving the subtree below `tree`
    pub(crate) fn next_in_subtree(&self, node: NodeId, tree: NodeId) -> Option<NodeId> {
        self.next_node_within(self.nodes[node].predecessor, node, Some(tree))
    }

    /// Scans for the uplink following the one that points at `previous`, starting at `start`.
    fn next_node_within(
        &self,
        mut start: NodeId,
        previous: NodeId,
        tree: Option<NodeId>,
    ) -> Option<NodeId> {
        loop {
            let mut current = start;
            if start != self.nodes[previous].predecessor {
                loop {
                    let left = self.nodes[current].left;
                    if self.is_empty_node(left) || left == previous {
                        break;
                    }
                    if self.is_valid_uplink(left, current) {
                        return Some(left);
                    }
                    current = left;
                }
            }
            if self.is_empty_node(current) {
                return None;
            }
            let right = self.nodes[current].right?;
            if right != previous {
                if self.is_valid_uplink(right, current) {
                    return Some(right);
                }
                start = right;
                continue;
            }
            // both sides are done, climb up while we are coming from the right
            while self.nodes[self.parent_of(current)].right == Some(current) {
                if Some(current) == tree {
                    return None;
                }
                current = self.parent_of(current);
            }
            if Some(current) == tree {
                return None;
            }
            let parent = self.parent_of(current);
            let parent_right = self.nodes[parent].right?;
            if parent_right != previous && self.is_valid_uplink(parent_right, parent) {
                return Some(parent_right);
            }
            if parent_right == parent {
                return None;
            }
            start = parent_right;
        }
    }

    /// the entry before `start` in key order
    pub(crate) fn previous_node(&self, start: NodeId) -> Option<NodeId> {
        let pred = self.nodes[start].predecessor;
        if self.nodes[pred].right == Some(start) {
            let left = self.nodes[pred].left;
            if self.is_valid_uplink(left, pred) {
                Some(left)
            } else {
                self.follow_right(left)
            }
        } else {
            let mut node = pred;
            while let Some(parent) = self.nodes[node].parent {
                if self.nodes[parent].left != node {
                    break;
                }
                node = parent;
            }
            let parent = self.nodes[node].parent?;
            let left = self.nodes[parent].left;
            if self.is_valid_uplink(left, parent) {
                Some(left)
            } else {
                self.follow_right(left)
            }
        }
    }

    /// Unlinks a node and hands out its entry.
    ///
    /// Other node ids stay valid, so iterators can keep a precomputed successor across removals.
    pub(crate) fn remove_node(&mut self, id: NodeId) -> Option<(K, V)> {
        if self.is_empty_node(id) {
            return None;
        }
        if id != ROOT {
            if self.nodes[id].is_internal(id) {
                self.remove_internal(id);
            } else {
                self.remove_external(id);
            }
        }
        self.size -= 1;
        self.mod_count += 1;
        trace!(node = id, size = self.size, "removed entry");
        self.nodes.release(id)
    }

    /// removes a node that has an uplink to itself
    fn remove_external(&mut self, h: NodeId) {
        let parent = self.parent_of(h);
        let child = if self.nodes[h].left == h {
            self.right_of(h)
        } else {
            self.nodes[h].left
        };
        self.relink(parent, h, child);
        if self.bit(child) > self.bit(parent) {
            self.nodes[child].parent = Some(parent);
        } else {
            self.nodes[child].predecessor = parent;
        }
    }

    /// Removes a node that is reached by true child links only.
    ///
    /// Its predecessor `p` holds the uplink to `h`, so `p` is an external node. `p` is unlinked
    /// from its own position and takes over the position and bit of `h`.
    fn remove_internal(&mut self, h: NodeId) {
        let p = self.nodes[h].predecessor;
        trace!(removed = h, replacement = p, "replacing internal node");
        self.nodes[p].bit_index = self.nodes[h].bit_index;

        // close the gap p leaves behind
        {
            let parent = self.parent_of(p);
            let child = if self.nodes[p].left == h {
                self.right_of(p)
            } else {
                self.nodes[p].left
            };
            self.relink(parent, p, child);
            if self.bit(child) > self.bit(parent) {
                self.nodes[child].parent = Some(parent);
            } else {
                // the uplink now leaves from parent, or from p again if parent is h
                self.nodes[child].predecessor = parent;
            }
        }

        // hand the neighbours of h over to p
        {
            let left = self.nodes[h].left;
            if self.nodes[left].parent == Some(h) {
                self.nodes[left].parent = Some(p);
            }
            let right = self.right_of(h);
            if self.nodes[right].parent == Some(h) {
                self.nodes[right].parent = Some(p);
            }
            let parent = self.parent_of(h);
            self.relink(parent, h, p);
        }

        let (parent, left, right) = {
            let node = &self.nodes[h];
            (node.parent, node.left, node.right)
        };
        {
            let node = &mut self.nodes[p];
            node.parent = parent;
            node.left = left;
            node.right = right;
        }
        // uplinks move with the position, including one to the empty root
        if self.bit(left) <= self.bit(p) {
            self.nodes[left].predecessor = p;
        }
        if let Some(right) = right {
            if self.bit(right) <= self.bit(p) {
                self.nodes[right].predecessor = p;
            }
        }
    }
}

impl<K: Eq, V, A: KeyAnalyzer<K>> PatriciaTrie<K, V, A> {
    /// Adds or replaces an entry, returning the previous value.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        let key_length = self.analyzer.length(&key);
        // all zero keys live in the root sentinel
        if key_length == 0 {
            return self.replace_root(key, value);
        }
        let found = self.nearest_entry(&key, key_length);
        if self.nodes[found].key() == Some(&key) {
            self.mod_count += 1;
            return self.nodes[found].replace(key, value);
        }
        let bit_index = self.analyzer.bit_index(
            &key,
            0,
            key_length,
            self.nodes[found].key(),
            0,
            self.key_length_of(found),
        );
        match bit_index {
            BitIndex::Differs(bit) => {
                let id = self.nodes.alloc((key, value), bit as isize);
                trace!(node = id, bit, "adding entry");
                self.add_entry(id, key_length);
                self.size += 1;
                self.mod_count += 1;
                None
            }
            BitIndex::AllZero => self.replace_root(key, value),
            BitIndex::Equal if found != ROOT => {
                warn!(
                    node = found,
                    "replacing an entry whose key has the same bit string as the inserted key"
                );
                self.mod_count += 1;
                self.nodes[found].replace(key, value)
            }
            BitIndex::Equal => panic!("bit string of a non zero key matches the root sentinel"),
        }
    }

    fn replace_root(&mut self, key: K, value: V) -> Option<V> {
        if self.is_empty_node(ROOT) {
            self.size += 1;
        }
        self.mod_count += 1;
        self.nodes[ROOT].replace(key, value)
    }

    fn key_length_of(&self, id: NodeId) -> usize {
        self.nodes[id]
            .key()
            .map(|key| self.analyzer.length(key))
            .unwrap_or(0)
    }

    fn key_bit_set<Q>(&self, key: &Q, key_length: usize, bit: isize) -> bool
    where
        Q: ?Sized,
        A: KeyAnalyzer<Q>,
    {
        bit >= 0 && <A as KeyAnalyzer<Q>>::is_bit_set(&self.analyzer, key, key_length, bit as usize)
    }

    /// Splices a freshly allocated node into the structure.
    ///
    /// Walks down until the next node tests a bit at or after the new node's bit, or is reached
    /// by an uplink, and inserts the new node on that link.
    fn add_entry(&mut self, t: NodeId, key_length: usize) {
        let t_bit = self.bit(t);
        let (t_right, path_right, path, current) = {
            let key = match self.nodes[t].key() {
                Some(key) => key,
                None => broken_link(t, "entry"),
            };
            let mut current = self.nodes[ROOT].left;
            let mut path = ROOT;
            loop {
                let bit = self.bit(current);
                if bit >= t_bit || bit <= self.bit(path) {
                    break;
                }
                path = current;
                current = self.child(current, self.key_bit_set(key, key_length, bit));
            }
            (
                self.key_bit_set(key, key_length, t_bit),
                path != ROOT && self.key_bit_set(key, key_length, self.bit(path)),
                path,
                current,
            )
        };
        {
            let node = &mut self.nodes[t];
            node.predecessor = t;
            if t_right {
                node.left = current;
                node.right = Some(t);
            } else {
                node.left = t;
                node.right = Some(current);
            }
            node.parent = Some(path);
        }
        let current_bit = self.bit(current);
        if current_bit >= t_bit {
            self.nodes[current].parent = Some(t);
        }
        if current_bit <= self.bit(path) {
            self.nodes[current].predecessor = t;
        }
        if path_right {
            self.nodes[path].right = Some(t);
        } else {
            self.nodes[path].left = t;
        }
    }

    /// The node reached by following the bits of `key` until the first uplink.
    ///
    /// If the key is stored, this is its node. Otherwise it is some node the key has to be
    /// compared against.
    fn nearest_entry<Q>(&self, key: &Q, key_length: usize) -> NodeId
    where
        Q: ?Sized,
        A: KeyAnalyzer<Q>,
    {
        let mut current = self.nodes[ROOT].left;
        let mut path = ROOT;
        loop {
            let bit = self.bit(current);
            if bit <= self.bit(path) {
                return current;
            }
            path = current;
            current = self.child(current, self.key_bit_set(key, key_length, bit));
        }
    }

    fn find<Q>(&self, key: &Q) -> Option<NodeId>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
        A: KeyAnalyzer<Q>,
    {
        let key_length = <A as KeyAnalyzer<Q>>::length(&self.analyzer, key);
        let id = self.nearest_entry(key, key_length);
        match self.nodes[id].key() {
            Some(found) if <K as Borrow<Q>>::borrow(found) == key => Some(id),
            _ => None,
        }
    }

    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
        A: KeyAnalyzer<Q>,
    {
        let id = self.find(key)?;
        self.nodes[id].value()
    }

    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
        A: KeyAnalyzer<Q>,
    {
        let id = self.find(key)?;
        self.nodes[id].entry.as_mut().map(|(_, v)| v)
    }

    pub fn get_key_value<Q>(&self, key: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
        A: KeyAnalyzer<Q>,
    {
        let id = self.find(key)?;
        self.entry(id)
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
        A: KeyAnalyzer<Q>,
    {
        self.find(key).is_some()
    }

    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
        A: KeyAnalyzer<Q>,
    {
        self.remove_entry(key).map(|(_, v)| v)
    }

    pub fn remove_entry<Q>(&mut self, key: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
        A: KeyAnalyzer<Q>,
    {
        let id = self.find(key)?;
        self.remove_node(id)
    }

    /// The value of the stored key that shares the longest run of leading bits with `key`.
    ///
    /// Only returns `None` if the trie is empty.
    pub fn select<Q>(&self, key: &Q) -> Option<&V>
    where
        Q: ?Sized,
        A: KeyAnalyzer<Q>,
    {
        self.select_key_value(key).map(|(_, v)| v)
    }

    /// Like [`select`](Self::select), but returns the key as well.
    pub fn select_key_value<Q>(&self, key: &Q) -> Option<(&K, &V)>
    where
        Q: ?Sized,
        A: KeyAnalyzer<Q>,
    {
        let key_length = <A as KeyAnalyzer<Q>>::length(&self.analyzer, key);
        let mut stack = self.select_stack();
        while let Some(id) = self.select_next(&mut stack, key, key_length) {
            if !self.is_empty_node(id) {
                return self.entry(id);
            }
        }
        None
    }

    /// Offers entries to `visitor` in order of decreasing closeness to `key`.
    ///
    /// Returns the entry the visitor exited at. [`Visit::Remove`] is rejected, since removing an
    /// entry in the middle of the search would invalidate it.
    pub fn select_with<Q, F>(
        &mut self,
        key: &Q,
        mut visitor: F,
    ) -> Result<Option<Selection<'_, K, V>>>
    where
        Q: ?Sized,
        A: KeyAnalyzer<Q>,
        F: FnMut(&K, &V) -> Visit,
    {
        let key_length = <A as KeyAnalyzer<Q>>::length(&self.analyzer, key);
        let mut stack = self.select_stack();
        while let Some(id) = self.select_next(&mut stack, key, key_length) {
            let decision = match self.nodes[id].entry.as_ref() {
                Some((k, v)) => visitor(k, v),
                None => continue,
            };
            match decision {
                Visit::Continue => {}
                Visit::Exit => return Ok(self.entry(id).map(|(k, v)| Selection::Entry(k, v))),
                Visit::Remove => return Err(TrieError::RemoveDuringSelect),
                Visit::RemoveAndExit => {
                    return Ok(self.remove_node(id).map(|(k, v)| Selection::Removed(k, v)));
                }
            }
        }
        Ok(None)
    }

    fn select_stack(&self) -> SelectStack {
        let mut stack = SelectStack::new();
        stack.push((self.nodes[ROOT].left, self.bit(ROOT)));
        stack
    }

    /// Next uplink target of the depth first search that prefers the branch matching `key`.
    fn select_next<Q>(&self, stack: &mut SelectStack, key: &Q, key_length: usize) -> Option<NodeId>
    where
        Q: ?Sized,
        A: KeyAnalyzer<Q>,
    {
        while let Some((id, from_bit)) = stack.pop() {
            let bit = self.bit(id);
            if bit <= from_bit {
                return Some(id);
            }
            let left = self.nodes[id].left;
            let right = self.right_of(id);
            if self.key_bit_set(key, key_length, bit) {
                stack.push((left, bit));
                stack.push((right, bit));
            } else {
                stack.push((right, bit));
                stack.push((left, bit));
            }
        }
        None
    }

    /// Finds `key` or the gap it would be inserted into, without modifying the trie.
    fn locate(&self, key: &K) -> Position {
        let key_length = self.analyzer.length(key);
        if key_length == 0 {
            return self.locate_at_root(key);
        }
        let found = self.nearest_entry(key, key_length);
        if self.nodes[found].key() == Some(key) {
            return Position::Exact(found);
        }
        let bit_index = self.analyzer.bit_index(
            key,
            0,
            key_length,
            self.nodes[found].key(),
            0,
            self.key_length_of(found),
        );
        match bit_index {
            BitIndex::Differs(bit) => self.locate_gap(key, key_length, bit as isize),
            BitIndex::AllZero => self.locate_at_root(key),
            // same bit string as a stored key, so the two are neighbours
            BitIndex::Equal => match self.nodes[found].key() {
                Some(stored) => match self.analyzer.compare(key, stored) {
                    std::cmp::Ordering::Equal => Position::Exact(found),
                    std::cmp::Ordering::Less => Position::Between {
                        lower: self.previous_node(found),
                        higher: Some(found),
                    },
                    std::cmp::Ordering::Greater => Position::Between {
                        lower: Some(found),
                        higher: self.next_node(found),
                    },
                },
                None => Position::Exact(found),
            },
        }
    }

    fn locate_at_root(&self, key: &K) -> Position {
        match self.nodes[ROOT].key() {
            None => Position::Between {
                lower: None,
                higher: self.first_node(),
            },
            Some(root_key) => match self.analyzer.compare(key, root_key) {
                std::cmp::Ordering::Equal => Position::Exact(ROOT),
                std::cmp::Ordering::Less => Position::Between {
                    lower: None,
                    higher: Some(ROOT),
                },
                std::cmp::Ordering::Greater => Position::Between {
                    lower: Some(ROOT),
                    higher: self.next_node(ROOT),
                },
            },
        }
    }

    /// Neighbours of an absent key that first differs from the stored keys at `bit`.
    ///
    /// Walks down to the link the key would be inserted on. All keys below that link share the
    /// bits before `bit` with the key, so they are either all smaller or all greater.
    fn locate_gap(&self, key: &K, key_length: usize, bit: isize) -> Position {
        let mut current = self.nodes[ROOT].left;
        let mut path = ROOT;
        loop {
            let current_bit = self.bit(current);
            if current_bit >= bit || current_bit <= self.bit(path) {
                break;
            }
            path = current;
            current = self.child(current, self.key_bit_set(key, key_length, current_bit));
        }
        let after = self.key_bit_set(key, key_length, bit);
        if self.bit(current) <= self.bit(path) {
            // a single entry below the link
            if self.is_empty_node(current) {
                return Position::Between {
                    lower: None,
                    higher: self.first_node(),
                };
            }
            if after {
                Position::Between {
                    lower: Some(current),
                    higher: self.next_node(current),
                }
            } else {
                Position::Between {
                    lower: self.previous_node(current),
                    higher: Some(current),
                }
            }
        } else if after {
            let lower = self.follow_right(current);
            Position::Between {
                lower,
                higher: lower.and_then(|id| self.next_node(id)),
            }
        } else {
            let higher = self.follow_left(current);
            Position::Between {
                lower: self.previous_node(higher),
                higher: Some(higher),
            }
        }
    }

    pub(crate) fn ceiling_node(&self, key: &K) -> Option<NodeId> {
        match self.locate(key) {
            Position::Exact(id) => Some(id),
            Position::Between { higher, .. } => higher,
        }
    }

    pub(crate) fn floor_node(&self, key: &K) -> Option<NodeId> {
        match self.locate(key) {
            Position::Exact(id) => Some(id),
            Position::Between { lower, .. } => lower,
        }
    }

    pub(crate) fn higher_node(&self, key: &K) -> Option<NodeId> {
        match self.locate(key) {
            Position::Exact(id) => self.next_node(id),
            Position::Between { higher, .. } => higher,
        }
    }

    pub(crate) fn lower_node(&self, key: &K) -> Option<NodeId> {
        match self.locate(key) {
            Position::Exact(id) => self.previous_node(id),
            Position::Between { lower, .. } => lower,
        }
    }

    /// the entry with the least key greater than or equal to `key`
    pub fn ceiling(&self, key: &K) -> Option<(&K, &V)> {
        self.ceiling_node(key).and_then(|id| self.entry(id))
    }

    /// the entry with the greatest key less than or equal to `key`
    pub fn floor(&self, key: &K) -> Option<(&K, &V)> {
        self.floor_node(key).and_then(|id| self.entry(id))
    }

    /// the entry with the least key strictly greater than `key`
    pub fn higher(&self, key: &K) -> Option<(&K, &V)> {
        self.higher_node(key).and_then(|id| self.entry(id))
    }

    /// the entry with the greatest key strictly less than `key`
    pub fn lower(&self, key: &K) -> Option<(&K, &V)> {
        self.lower_node(key).and_then(|id| self.entry(id))
    }

    /// A view of the entries between two bounds.
    ///
    /// Fails with [`TrieError::InvalidRange`] if `from` is greater than `to`.
    pub fn range(&self, from: Bound<K>, to: Bound<K>) -> Result<RangeView<&Self, K>> {
        RangeView::new(self, from, to)
    }

    pub fn range_mut(&mut self, from: Bound<K>, to: Bound<K>) -> Result<RangeView<&mut Self, K>> {
        RangeView::new(self, from, to)
    }

    /// all entries with keys strictly less than `to`
    pub fn head_map(&self, to: K) -> RangeView<&Self, K> {
        RangeView::unchecked(self, Bound::Unbounded, Bound::Excluded(to))
    }

    pub fn head_map_mut(&mut self, to: K) -> RangeView<&mut Self, K> {
        RangeView::unchecked(self, Bound::Unbounded, Bound::Excluded(to))
    }

    /// all entries with keys greater than or equal to `from`
    pub fn tail_map(&self, from: K) -> RangeView<&Self, K> {
        RangeView::unchecked(self, Bound::Included(from), Bound::Unbounded)
    }

    pub fn tail_map_mut(&mut self, from: K) -> RangeView<&mut Self, K> {
        RangeView::unchecked(self, Bound::Included(from), Bound::Unbounded)
    }

    /// all entries from `from` inclusive to `to` exclusive
    pub fn sub_map(&self, from: K, to: K) -> Result<RangeView<&Self, K>> {
        RangeView::new(self, Bound::Included(from), Bound::Excluded(to))
    }

    pub fn sub_map_mut(&mut self, from: K, to: K) -> Result<RangeView<&mut Self, K>> {
        RangeView::new(self, Bound::Included(from), Bound::Excluded(to))
    }

    /// all entries whose keys start with all bits of `prefix`
    pub fn prefixed_by(&self, prefix: K) -> PrefixView<&Self, K> {
        let length = self.analyzer.length(&prefix);
        PrefixView::unchecked(self, prefix, 0, length)
    }

    pub fn prefixed_by_mut(&mut self, prefix: K) -> PrefixView<&mut Self, K> {
        let length = self.analyzer.length(&prefix);
        PrefixView::unchecked(self, prefix, 0, length)
    }

    /// all entries whose keys start with the first `length` elements of `prefix`
    pub fn prefixed_by_elements(&self, prefix: K, length: usize) -> Result<PrefixView<&Self, K>> {
        self.prefixed_by_elements_at(prefix, 0, length)
    }

    pub fn prefixed_by_elements_mut(
        &mut self,
        prefix: K,
        length: usize,
    ) -> Result<PrefixView<&mut Self, K>> {
        self.prefixed_by_elements_at_mut(prefix, 0, length)
    }

    /// all entries whose keys start with `length` elements of `prefix`, starting at element `offset`
    pub fn prefixed_by_elements_at(
        &self,
        prefix: K,
        offset: usize,
        length: usize,
    ) -> Result<PrefixView<&Self, K>> {
        let bits = self.analyzer.bits_per_element();
        PrefixView::new(self, prefix, offset * bits, length * bits)
    }

    pub fn prefixed_by_elements_at_mut(
        &mut self,
        prefix: K,
        offset: usize,
        length: usize,
    ) -> Result<PrefixView<&mut Self, K>> {
        let bits = self.analyzer.bits_per_element();
        PrefixView::new(self, prefix, offset * bits, length * bits)
    }

    /// all entries whose keys start with the first `length` bits of `prefix`
    pub fn prefixed_by_bits(&self, prefix: K, length: usize) -> Result<PrefixView<&Self, K>> {
        PrefixView::new(self, prefix, 0, length)
    }

    pub fn prefixed_by_bits_mut(
        &mut self,
        prefix: K,
        length: usize,
    ) -> Result<PrefixView<&mut Self, K>> {
        PrefixView::new(self, prefix, 0, length)
    }

    /// all entries whose keys start with `length` bits of `prefix`, starting at bit `offset`
    pub fn prefixed_by_bits_at(
        &self,
        prefix: K,
        offset: usize,
        length: usize,
    ) -> Result<PrefixView<&Self, K>> {
        PrefixView::new(self, prefix, offset, length)
    }

    pub fn prefixed_by_bits_at_mut(
        &mut self,
        prefix: K,
        offset: usize,
        length: usize,
    ) -> Result<PrefixView<&mut Self, K>> {
        PrefixView::new(self, prefix, offset, length)
    }

    /// Anchor of the entries starting with the bit window `(offset, length)` of `prefix`.
    ///
    /// Follows the prefix bits while the tested bit lies inside the window. Every key below the
    /// node reached that way agrees on all bits of the window, so checking a single key decides
    /// for all of them. An anchor testing a bit inside the window was reached by an uplink and
    /// stands for itself only.
    pub(crate) fn prefix_subtree(&self, prefix: &K, offset: usize, length: usize) -> Option<NodeId> {
        let window = offset + length;
        let mut current = self.nodes[ROOT].left;
        let mut path = ROOT;
        loop {
            let bit = self.bit(current);
            if bit <= self.bit(path) || bit >= length as isize {
                break;
            }
            path = current;
            let right = self
                .analyzer
                .is_bit_set(prefix, window, bit as usize + offset);
            current = self.child(current, right);
        }
        let anchor = if self.is_empty_node(current) {
            path
        } else {
            current
        };
        // the anchor may be shorter than the window, so compare zero padded bits
        let key = self.nodes[anchor].key()?;
        match self.analyzer.bit_index(
            prefix,
            offset,
            length,
            Some(key),
            0,
            self.analyzer.length(key),
        ) {
            BitIndex::Differs(bit) if bit < length => None,
            _ => Some(anchor),
        }
    }

    /// Checks the link structure against the entries it should contain.
    #[cfg(test)]
    pub(crate) fn assert_consistent(&self)
    where
        K: Debug,
    {
        let forward: Vec<&K> = self.keys().collect();
        assert_eq!(forward.len(), self.size, "iteration does not match size");
        for pair in forward.windows(2) {
            assert_eq!(
                self.analyzer.compare(pair[0], pair[1]),
                std::cmp::Ordering::Less,
                "keys out of order: {:?}",
                pair
            );
        }
        let mut backward = Vec::new();
        let mut node = self.last_node();
        while let Some(id) = node {
            backward.extend(self.nodes[id].key());
            node = self.previous_node(id);
        }
        backward.reverse();
        assert_eq!(forward, backward, "backward iteration differs");
        for key in forward {
            assert!(self.find(key).is_some(), "{:?} is not retrievable", key);
        }
    }
}

#[cold]
fn broken_link(id: NodeId, link: &str) -> ! {
    panic!("trie node {} has no {} link", id, link)
}

impl<K: Debug, V: Debug, A: KeyAnalyzer<K>> Debug for PatriciaTrie<K, V, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K: PartialEq, V: PartialEq, A: KeyAnalyzer<K>> PartialEq for PatriciaTrie<K, V, A> {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().eq(other.iter())
    }
}

impl<K: Eq, V: Eq, A: KeyAnalyzer<K>> Eq for PatriciaTrie<K, V, A> {}

impl<K, V, A, Q> Index<&Q> for PatriciaTrie<K, V, A>
where
    K: Eq + Borrow<Q>,
    Q: Eq + ?Sized,
    A: KeyAnalyzer<K> + KeyAnalyzer<Q>,
{
    type Output = V;

    fn index(&self, key: &Q) -> &V {
        self.get(key).expect("no entry found for key")
    }
}

impl<K: Eq, V, A: KeyAnalyzer<K> + Default> FromIterator<(K, V)> for PatriciaTrie<K, V, A> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut trie = Self::default();
        trie.extend(iter);
        trie
    }
}

impl<K: Eq, V, A: KeyAnalyzer<K>> Extend<(K, V)> for PatriciaTrie<K, V, A> {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

impl<'a, K, V, A: KeyAnalyzer<K>> IntoIterator for &'a PatriciaTrie<K, V, A> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V, A>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K, V, A> IntoIterator for PatriciaTrie<K, V, A> {
    type Item = (K, V);
    type IntoIter = IntoIter<K, V, A>;

    fn into_iter(self) -> Self::IntoIter {
        IntoIter::new(self)
    }
}
