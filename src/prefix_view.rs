//! Views of the entries whose keys start with a given bit sequence.
use crate::error::{Result, TrieError};
use crate::iterators::{CursorMut, Iter, Keys, Scope, Values};
use crate::key_analyzer::KeyAnalyzer;
use crate::node::NodeId;
use crate::trie::PatriciaTrie;
use std::fmt::{self, Debug};
use std::ops::{Deref, DerefMut};

/// The entries of a trie whose keys start with the bit window `(offset, length)` of a prefix key.
///
/// All matching entries live in a single subtree, so iterating the view only touches that
/// subtree. A view with a zero length window covers the whole trie.
pub struct PrefixView<B, K> {
    trie: B,
    prefix: K,
    offset: usize,
    length: usize,
}

/// First entry and scope of a walk over all entries starting with the window of `prefix`.
fn scan<'k, K, V, A>(
    trie: &PatriciaTrie<K, V, A>,
    prefix: &'k K,
    offset: usize,
    length: usize,
) -> (Option<NodeId>, Scope<'k, K>)
where
    K: Eq,
    A: KeyAnalyzer<K>,
{
    if length == 0 {
        return (trie.first_node(), Scope::All);
    }
    match trie.prefix_subtree(prefix, offset, length) {
        None => (None, Scope::All),
        Some(root) => {
            let last = trie.bit(root) < length as isize;
            let first = if last { root } else { trie.follow_left(root) };
            let scope = Scope::Subtree {
                root,
                prefix,
                offset,
                length,
                last,
            };
            (Some(first), scope)
        }
    }
}

impl<B, K> PrefixView<B, K> {
    pub(crate) fn unchecked(trie: B, prefix: K, offset: usize, length: usize) -> Self {
        Self {
            trie,
            prefix,
            offset,
            length,
        }
    }

    pub fn prefix(&self) -> &K {
        &self.prefix
    }

    /// offset of the window into the prefix key, in bits
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// length of the window, in bits
    pub fn length(&self) -> usize {
        self.length
    }
}

impl<B, K, V, A> PrefixView<B, K>
where
    B: Deref<Target = PatriciaTrie<K, V, A>>,
    K: Eq,
    A: KeyAnalyzer<K>,
{
    pub(crate) fn new(trie: B, prefix: K, offset: usize, length: usize) -> Result<Self> {
        let key_length = trie.analyzer().length(&prefix);
        if offset + length > key_length {
            return Err(TrieError::prefix_out_of_bounds(offset, length, key_length));
        }
        Ok(Self::unchecked(trie, prefix, offset, length))
    }

    /// whether `key` starts with the window of this view
    pub fn in_range(&self, key: &K) -> bool {
        self.length == 0
            || self
                .trie
                .analyzer()
                .is_prefix(&self.prefix, self.offset, self.length, key)
    }

    pub fn iter(&self) -> Iter<'_, K, V, A> {
        let (first, scope) = scan(&*self.trie, &self.prefix, self.offset, self.length);
        Iter::new(&*self.trie, first, scope)
    }

    pub fn keys(&self) -> Keys<'_, K, V, A> {
        Keys::new(self.iter())
    }

    pub fn values(&self) -> Values<'_, K, V, A> {
        Values::new(self.iter())
    }

    /// Number of matching entries. This walks the view.
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    pub fn get<'s>(&'s self, key: &K) -> Option<&'s V>
    where
        K: 's,
        V: 's,
        A: 's,
    {
        if self.in_range(key) {
            self.trie.get(key)
        } else {
            None
        }
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    pub fn first_key_value<'s>(&'s self) -> Option<(&'s K, &'s V)>
    where
        K: 's,
        V: 's,
        A: 's,
    {
        self.iter().next()
    }

    pub fn last_key_value<'s>(&'s self) -> Option<(&'s K, &'s V)>
    where
        K: 's,
        V: 's,
        A: 's,
    {
        self.iter().last()
    }
}

impl<B, K, V, A> PrefixView<B, K>
where
    B: DerefMut<Target = PatriciaTrie<K, V, A>>,
    K: Eq,
    A: KeyAnalyzer<K>,
{
    /// Inserts into the underlying trie. Fails if `key` does not start with the prefix.
    pub fn insert(&mut self, key: K, value: V) -> Result<Option<V>> {
        if !self.in_range(&key) {
            return Err(TrieError::KeyOutOfRange);
        }
        Ok(self.trie.insert(key, value))
    }

    /// Removes from the underlying trie. Keys without the prefix are left alone.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        if self.in_range(key) {
            self.trie.remove(key)
        } else {
            None
        }
    }

    pub fn cursor_mut(&mut self) -> CursorMut<'_, K, V, A> {
        let (first, scope) = scan(&*self.trie, &self.prefix, self.offset, self.length);
        CursorMut::new(&mut *self.trie, first, scope)
    }

    /// Keeps only the matching entries for which `f` returns true.
    pub fn retain<F>(&mut self, f: F)
    where
        F: FnMut(&K, &mut V) -> bool,
    {
        self.cursor_mut().retain(f)
    }
}

impl<B, K, V, A> Debug for PrefixView<B, K>
where
    B: Deref<Target = PatriciaTrie<K, V, A>>,
    K: Eq + Debug,
    V: Debug,
    A: KeyAnalyzer<K>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}
