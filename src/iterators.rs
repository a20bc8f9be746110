//! Iterators over tries and trie views.
//!
//! All of them walk the threaded structure from one node to its in order successor, so none of
//! them needs a stack. Views restrict the walk with a [`Scope`].
use crate::error::{Result, TrieError};
use crate::key_analyzer::KeyAnalyzer;
use crate::node::NodeId;
use crate::trie::PatriciaTrie;
use sorted_iter::sorted_iterator::SortedByItem;
use sorted_iter::sorted_pair_iterator::SortedByKey;
use tracing::trace;

/// The part of the trie an iterator walks.
pub(crate) enum Scope<'a, K> {
    /// every entry
    All,
    /// every entry up to, but not including, the given node
    Until(Option<NodeId>),
    /// Entries below `root` that start with the bit window `(offset, length)` of `prefix`.
    ///
    /// `last` is set when `root` is the only candidate.
    Subtree {
        root: NodeId,
        prefix: &'a K,
        offset: usize,
        length: usize,
        last: bool,
    },
}

impl<'a, K> Scope<'a, K> {
    fn advance<V, A>(&self, trie: &PatriciaTrie<K, V, A>, id: NodeId) -> Option<NodeId> {
        match self {
            Scope::All => trie.next_node(id),
            Scope::Until(stop) => trie.next_node(id).filter(|next| Some(*next) != *stop),
            Scope::Subtree { last: true, .. } => None,
            Scope::Subtree { root, .. } => trie.next_in_subtree(id, *root),
        }
    }

    fn contains<V, A>(&self, trie: &PatriciaTrie<K, V, A>, id: NodeId) -> bool
    where
        A: KeyAnalyzer<K>,
    {
        match self {
            Scope::Subtree {
                prefix,
                offset,
                length,
                ..
            } => trie
                .entry(id)
                .map_or(false, |(k, _)| trie.analyzer().is_prefix(*prefix, *offset, *length, k)),
            _ => true,
        }
    }
}

/// Iterator over the entries of a trie or view, in key order.
pub struct Iter<'a, K, V, A> {
    trie: &'a PatriciaTrie<K, V, A>,
    next: Option<NodeId>,
    scope: Scope<'a, K>,
}

impl<'a, K, V, A> Iter<'a, K, V, A> {
    pub(crate) fn new(trie: &'a PatriciaTrie<K, V, A>, next: Option<NodeId>, scope: Scope<'a, K>) -> Self {
        Self { trie, next, scope }
    }
}

impl<'a, K, V, A: KeyAnalyzer<K>> Iterator for Iter<'a, K, V, A> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let trie = self.trie;
        loop {
            let id = self.next?;
            self.next = self.scope.advance(trie, id);
            if self.scope.contains(trie, id) {
                if let Some(entry) = trie.entry(id) {
                    return Some(entry);
                }
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match (&self.scope, self.next) {
            (_, None) => (0, Some(0)),
            (Scope::All, Some(_)) => (1, Some(self.trie.len())),
            _ => (0, Some(self.trie.len())),
        }
    }
}

impl<'a, K, V, A: KeyAnalyzer<K>> SortedByKey for Iter<'a, K, V, A> {}

macro_rules! projection {
    ($(#[$meta:meta])* $name:ident, $item:ty, $f:expr) => {
        $(#[$meta])*
        pub struct $name<'a, K, V, A>(Iter<'a, K, V, A>);

        impl<'a, K, V, A> $name<'a, K, V, A> {
            pub(crate) fn new(inner: Iter<'a, K, V, A>) -> Self {
                Self(inner)
            }
        }

        impl<'a, K, V, A: KeyAnalyzer<K>> Iterator for $name<'a, K, V, A> {
            type Item = $item;

            fn next(&mut self) -> Option<Self::Item> {
                self.0.next().map($f)
            }

            fn size_hint(&self) -> (usize, Option<usize>) {
                self.0.size_hint()
            }
        }
    };
}

projection!(
    /// Iterator over the keys of a trie or view, in order.
    Keys, &'a K, |(k, _)| k
);

impl<'a, K, V, A: KeyAnalyzer<K>> SortedByItem for Keys<'a, K, V, A> {}

projection!(
    /// Iterator over the values of a trie or view, in key order.
    Values, &'a V, |(_, v)| v
);

/// Owning iterator over the entries of a trie, in key order.
pub struct IntoIter<K, V, A> {
    trie: PatriciaTrie<K, V, A>,
}

impl<K, V, A> IntoIter<K, V, A> {
    pub(crate) fn new(trie: PatriciaTrie<K, V, A>) -> Self {
        Self { trie }
    }
}

impl<K, V, A> Iterator for IntoIter<K, V, A> {
    type Item = (K, V);

    fn next(&mut self) -> Option<(K, V)> {
        self.trie.pop_first()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.trie.len(), Some(self.trie.len()))
    }
}

impl<K, V, A> ExactSizeIterator for IntoIter<K, V, A> {}

impl<K, V, A> DoubleEndedIterator for IntoIter<K, V, A> {
    fn next_back(&mut self) -> Option<(K, V)> {
        self.trie.pop_last()
    }
}

impl<K, V, A> SortedByKey for IntoIter<K, V, A> {}

/// Owning iterator over the keys of a trie, in order.
pub struct IntoKeys<K, V, A>(IntoIter<K, V, A>);

impl<K, V, A> IntoKeys<K, V, A> {
    pub(crate) fn new(inner: IntoIter<K, V, A>) -> Self {
        Self(inner)
    }
}

impl<K, V, A> Iterator for IntoKeys<K, V, A> {
    type Item = K;

    fn next(&mut self) -> Option<K> {
        self.0.next().map(|(k, _)| k)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.0.size_hint()
    }
}

impl<K, V, A> SortedByItem for IntoKeys<K, V, A> {}

/// Owning iterator over the values of a trie, in key order.
pub struct IntoValues<K, V, A>(IntoIter<K, V, A>);

impl<K, V, A> IntoValues<K, V, A> {
    pub(crate) fn new(inner: IntoIter<K, V, A>) -> Self {
        Self(inner)
    }
}

impl<K, V, A> Iterator for IntoValues<K, V, A> {
    type Item = V;

    fn next(&mut self) -> Option<V> {
        self.0.next().map(|(_, v)| v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.0.size_hint()
    }
}

/// A cursor that walks entries in key order and can remove the entry it is at.
///
/// This is not an [`Iterator`], since the mutable value it hands out borrows the cursor.
/// ```
/// # use patricia_collections::PatriciaTrie;
/// let mut trie: PatriciaTrie<String, u32> = PatriciaTrie::default();
/// trie.insert("a".into(), 1);
/// trie.insert("b".into(), 2);
/// let mut cursor = trie.cursor_mut();
/// while let Some((key, value)) = cursor.next() {
///     *value *= 10;
///     if key == "a" {
///         cursor.remove_current().unwrap();
///     }
/// }
/// assert_eq!(trie.get("b"), Some(&20));
/// assert_eq!(trie.len(), 1);
/// ```
pub struct CursorMut<'a, K, V, A> {
    trie: &'a mut PatriciaTrie<K, V, A>,
    next: Option<NodeId>,
    current: Option<NodeId>,
    scope: Scope<'a, K>,
}

impl<'a, K, V, A> CursorMut<'a, K, V, A> {
    pub(crate) fn new(
        trie: &'a mut PatriciaTrie<K, V, A>,
        next: Option<NodeId>,
        scope: Scope<'a, K>,
    ) -> Self {
        Self {
            trie,
            next,
            current: None,
            scope,
        }
    }
}

impl<'a, K: Eq, V, A: KeyAnalyzer<K>> CursorMut<'a, K, V, A> {
    /// Advances to the next entry and returns it.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Option<(&K, &mut V)> {
        let id = loop {
            let id = self.next?;
            self.next = self.scope.advance(self.trie, id);
            if self.scope.contains(self.trie, id) {
                break id;
            }
        };
        self.current = Some(id);
        self.trie.entry_mut(id)
    }

    /// Removes the entry the cursor was last advanced to.
    ///
    /// Fails with [`TrieError::NoCurrentEntry`] if the cursor was not advanced yet, or if the
    /// entry was already removed.
    pub fn remove_current(&mut self) -> Result<(K, V)> {
        self.take_current().ok_or(TrieError::NoCurrentEntry)
    }

    pub(crate) fn take_current(&mut self) -> Option<(K, V)> {
        let current = self.current.take()?;
        let anchor = match &self.scope {
            Scope::Subtree { root, .. } => Some((*root, self.trie.bit(*root))),
            _ => None,
        };
        let entry = self.trie.remove_node(current);
        if let Some((root, bit)) = anchor {
            // removing an internal node moves another node into its place
            if root == current || self.trie.bit(root) != bit {
                self.relocate();
            }
        }
        entry
    }

    /// finds the anchor of a prefix scope again after the structure changed
    fn relocate(&mut self) {
        if let Scope::Subtree {
            root,
            prefix,
            offset,
            length,
            last,
        } = &mut self.scope
        {
            let anchor = self.trie.prefix_subtree(*prefix, *offset, *length);
            trace!(from = *root, to = ?anchor, "relocated prefix subtree");
            match anchor {
                Some(anchor) => {
                    *root = anchor;
                    *last = self.trie.bit(anchor) < *length as isize;
                }
                None => self.next = None,
            }
        }
    }

    /// Removes every entry in scope for which `f` returns false.
    pub(crate) fn retain<F>(mut self, mut f: F)
    where
        F: FnMut(&K, &mut V) -> bool,
    {
        while let Some((k, v)) = self.next() {
            if !f(k, v) {
                self.take_current();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::PatriciaTrie;
    use sorted_iter::SortedPairIterator;

    fn trie(keys: &[&str]) -> PatriciaTrie<String, usize> {
        keys.iter().enumerate().map(|(i, k)| (k.to_string(), i)).collect()
    }

    #[test]
    fn iterators() {
        let t = trie(&["b", "a", "ab", "c"]);
        assert_eq!(t.keys().cloned().collect::<Vec<_>>(), vec!["a", "ab", "b", "c"]);
        assert_eq!(t.values().copied().collect::<Vec<_>>(), vec![1, 2, 0, 3]);
        let (lo, hi) = t.iter().size_hint();
        assert!(lo <= 4 && hi == Some(4));
        assert_eq!((&t).into_iter().count(), 4);
        let mut owned = t.clone().into_iter();
        assert_eq!(owned.len(), 4);
        assert_eq!(owned.next_back(), Some(("c".to_string(), 3)));
        assert_eq!(owned.next(), Some(("a".to_string(), 1)));
        assert_eq!(owned.len(), 2);
        assert_eq!(t.into_keys().collect::<Vec<_>>(), vec!["a", "ab", "b", "c"]);
    }

    #[test]
    fn sorted_pair_operations() {
        let a = trie(&["a", "b", "c"]);
        let b = trie(&["b", "c", "d"]);
        let joined: Vec<(&String, (&usize, &usize))> = a.iter().join(b.iter()).collect();
        assert_eq!(joined.len(), 2);
        assert_eq!(joined[0].0, "b");
    }

    #[test]
    fn cursor_retain() {
        let mut t = trie(&["a", "b", "c", "d"]);
        t.cursor_mut().retain(|_, v| *v % 2 == 0);
        assert_eq!(t.keys().cloned().collect::<Vec<_>>(), vec!["a", "c"]);
        t.assert_consistent();
    }
}
