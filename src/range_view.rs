//! Views of the entries between two keys.
use crate::error::{Result, TrieError};
use crate::iterators::{CursorMut, Iter, Keys, Scope, Values};
use crate::key_analyzer::KeyAnalyzer;
use crate::node::NodeId;
use crate::trie::PatriciaTrie;
use std::cmp::Ordering;
use std::fmt::{self, Debug};
use std::ops::{Bound, Deref, DerefMut};

/// The entries of a trie with keys between two bounds.
///
/// The view is live: it reads through to the trie on every call. `B` is either a shared or an
/// exclusive borrow of the trie. Only views over an exclusive borrow can insert and remove.
pub struct RangeView<B, K> {
    trie: B,
    from: Bound<K>,
    to: Bound<K>,
}

impl<B, K> RangeView<B, K> {
    pub(crate) fn unchecked(trie: B, from: Bound<K>, to: Bound<K>) -> Self {
        Self { trie, from, to }
    }

    /// the lower bound
    pub fn start_bound(&self) -> Bound<&K> {
        self.from.as_ref()
    }

    /// the upper bound
    pub fn end_bound(&self) -> Bound<&K> {
        self.to.as_ref()
    }
}

impl<B, K, V, A> RangeView<B, K>
where
    B: Deref<Target = PatriciaTrie<K, V, A>>,
    K: Eq,
    A: KeyAnalyzer<K>,
{
    pub(crate) fn new(trie: B, from: Bound<K>, to: Bound<K>) -> Result<Self> {
        if let (Bound::Included(f) | Bound::Excluded(f), Bound::Included(t) | Bound::Excluded(t)) =
            (&from, &to)
        {
            if trie.analyzer().compare(f, t) == Ordering::Greater {
                return Err(TrieError::InvalidRange);
            }
        }
        Ok(Self::unchecked(trie, from, to))
    }

    fn compare(&self, a: &K, b: &K) -> Ordering {
        self.trie.analyzer().compare(a, b)
    }

    fn above_start(&self, key: &K) -> bool {
        match &self.from {
            Bound::Unbounded => true,
            Bound::Included(from) => self.compare(key, from) != Ordering::Less,
            Bound::Excluded(from) => self.compare(key, from) == Ordering::Greater,
        }
    }

    /// `touching` also accepts a key equal to an exclusive upper bound
    fn below_end(&self, key: &K, touching: bool) -> bool {
        match &self.to {
            Bound::Unbounded => true,
            Bound::Included(to) => self.compare(key, to) != Ordering::Greater,
            Bound::Excluded(to) => match self.compare(key, to) {
                Ordering::Less => true,
                Ordering::Equal => touching,
                Ordering::Greater => false,
            },
        }
    }

    /// whether `key` lies inside the bounds of this view
    pub fn in_range(&self, key: &K) -> bool {
        self.above_start(key) && self.below_end(key, false)
    }

    /// whether `key` can be used as a bound of a narrower view
    fn admits_bound(&self, key: &K) -> bool {
        self.above_start(key) && self.below_end(key, true)
    }

    fn key_of<'s>(&'s self, id: NodeId) -> Option<&'s K>
    where
        K: 's,
        V: 's,
        A: 's,
    {
        self.trie.entry(id).map(|(k, _)| k)
    }

    /// the first entry at or after the lower bound, ignoring the upper bound
    fn lowest(&self) -> Option<NodeId> {
        match &self.from {
            Bound::Unbounded => self.trie.first_node(),
            Bound::Included(from) => self.trie.ceiling_node(from),
            Bound::Excluded(from) => self.trie.higher_node(from),
        }
    }

    /// the first entry inside the view
    fn start(&self) -> Option<NodeId> {
        self.lowest()
            .filter(|id| self.key_of(*id).map_or(false, |k| self.below_end(k, false)))
    }

    /// the first entry after the view
    fn stop(&self) -> Option<NodeId> {
        match &self.to {
            Bound::Unbounded => None,
            Bound::Included(to) => self.trie.higher_node(to),
            Bound::Excluded(to) => self.trie.ceiling_node(to),
        }
    }

    pub fn iter(&self) -> Iter<'_, K, V, A> {
        Iter::new(&*self.trie, self.start(), Scope::Until(self.stop()))
    }

    pub fn keys(&self) -> Keys<'_, K, V, A> {
        Keys::new(self.iter())
    }

    pub fn values(&self) -> Values<'_, K, V, A> {
        Values::new(self.iter())
    }

    /// Number of entries inside the bounds. This walks the view.
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.start().is_none()
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
        self.start().and_then(|id| self.trie.entry(id))
    }

    pub fn last_key_value<'s>(&'s self) -> Option<(&'s K, &'s V)>
    where
        K: 's,
        V: 's,
        A: 's,
    {
        let last = match &self.to {
            Bound::Unbounded => self.trie.last_node(),
            Bound::Included(to) => self.trie.floor_node(to),
            Bound::Excluded(to) => self.trie.lower_node(to),
        };
        last.and_then(|id| self.trie.entry(id))
            .filter(|(k, _)| self.above_start(k))
    }

    /// Narrows the view to the keys from `from` inclusive to `to` exclusive.
    ///
    /// Both keys have to lie inside this view, the upper one may also be equal to its upper bound.
    pub fn sub_map(self, from: K, to: K) -> Result<Self> {
        if !self.admits_bound(&from) || !self.admits_bound(&to) {
            return Err(TrieError::KeyOutOfRange);
        }
        Self::new(self.trie, Bound::Included(from), Bound::Excluded(to))
    }

    /// narrows the view to the keys before `to`
    pub fn head_map(self, to: K) -> Result<Self> {
        if !self.admits_bound(&to) {
            return Err(TrieError::KeyOutOfRange);
        }
        Ok(Self::unchecked(self.trie, self.from, Bound::Excluded(to)))
    }

    /// narrows the view to the keys at or after `from`
    pub fn tail_map(self, from: K) -> Result<Self> {
        if !self.admits_bound(&from) {
            return Err(TrieError::KeyOutOfRange);
        }
        Ok(Self::unchecked(self.trie, Bound::Included(from), self.to))
    }
}

impl<B, K, V, A> RangeView<B, K>
where
    B: DerefMut<Target = PatriciaTrie<K, V, A>>,
    K: Eq,
    A: KeyAnalyzer<K>,
{
    /// Inserts into the underlying trie. Fails if `key` lies outside the view.
    pub fn insert(&mut self, key: K, value: V) -> Result<Option<V>> {
        if !self.in_range(&key) {
            return Err(TrieError::KeyOutOfRange);
        }
        Ok(self.trie.insert(key, value))
    }

    /// Removes from the underlying trie. Keys outside the view are left alone.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        if self.in_range(key) {
            self.trie.remove(key)
        } else {
            None
        }
    }

    pub fn cursor_mut(&mut self) -> CursorMut<'_, K, V, A> {
        let start = self.start();
        let stop = self.stop();
        CursorMut::new(&mut *self.trie, start, Scope::Until(stop))
    }

    /// Keeps only the entries of the view for which `f` returns true.
    pub fn retain<F>(&mut self, f: F)
    where
        F: FnMut(&K, &mut V) -> bool,
    {
        self.cursor_mut().retain(f)
    }
}

impl<B, K, V, A> Debug for RangeView<B, K>
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::obey::Key;
    use std::collections::BTreeMap;

    fn lime() -> PatriciaTrie<String, usize> {
        ["Lime", "LimeWire", "LimeRadio", "Lax", "Lake", "Lovely"]
            .iter()
            .enumerate()
            .map(|(i, k)| (k.to_string(), i))
            .collect()
    }

    fn s(x: &str) -> String {
        x.to_string()
    }

    fn keys<B>(view: &RangeView<B, String>) -> Vec<&str>
    where
        B: Deref<Target = PatriciaTrie<String, usize>>,
    {
        view.keys().map(String::as_str).collect()
    }

    #[test]
    fn head_tail_sub() {
        let trie = lime();
        assert_eq!(keys(&trie.head_map(s("Lime"))), vec!["Lake", "Lax"]);
        assert_eq!(
            keys(&trie.tail_map(s("Lime"))),
            vec!["Lime", "LimeRadio", "LimeWire", "Lovely"]
        );
        let sub = trie.sub_map(s("Lax"), s("LimeWire")).unwrap();
        assert_eq!(keys(&sub), vec!["Lax", "Lime", "LimeRadio"]);
        assert_eq!(sub.len(), 3);
        assert_eq!(sub.first_key_value(), Some((&s("Lax"), &3)));
        assert_eq!(sub.last_key_value(), Some((&s("LimeRadio"), &2)));
        assert_eq!(sub.get(&s("LimeWire")), None);
        assert_eq!(sub.get(&s("Lime")), Some(&0));
        assert!(!sub.contains_key(&s("Lake")));
        assert_eq!(format!("{:?}", trie.head_map(s("Lax"))), r#"{"Lake": 4}"#);
        assert!(trie.head_map(s("A")).is_empty());
        assert_eq!(trie.head_map(s("A")).last_key_value(), None);
        assert_eq!(
            trie.sub_map(s("b"), s("a")).err(),
            Some(TrieError::InvalidRange)
        );
    }

    #[test]
    fn explicit_bounds() {
        let trie = lime();
        let view = trie
            .range(Bound::Excluded(s("Lax")), Bound::Included(s("LimeWire")))
            .unwrap();
        assert_eq!(keys(&view), vec!["Lime", "LimeRadio", "LimeWire"]);
        assert_eq!(view.last_key_value().map(|(_, v)| *v), Some(1));
        let view = trie
            .range(Bound::Excluded(s("Lime")), Bound::Excluded(s("Lime")))
            .unwrap();
        assert!(view.is_empty());
        assert_eq!(view.len(), 0);
        assert_eq!(view.first_key_value(), None);
        assert_eq!(view.last_key_value(), None);
        let view = trie
            .range(Bound::Included(s("Lime")), Bound::Included(s("Lime")))
            .unwrap();
        assert_eq!(keys(&view), vec!["Lime"]);
        assert_eq!(view.start_bound(), Bound::Included(&s("Lime")));
    }

    #[test]
    fn narrowing() {
        let trie = lime();
        let view = trie.sub_map(s("Lax"), s("Lovely")).unwrap();
        assert_eq!(
            view.head_map(s("Lz")).err(),
            Some(TrieError::KeyOutOfRange)
        );
        let view = trie.sub_map(s("Lax"), s("Lovely")).unwrap();
        // the exclusive upper bound itself is accepted
        let view = view.head_map(s("Lovely")).unwrap();
        let view = view.tail_map(s("Lime")).unwrap();
        assert_eq!(keys(&view), vec!["Lime", "LimeRadio", "LimeWire"]);
        let view = view.sub_map(s("LimeA"), s("LimeX")).unwrap();
        assert_eq!(keys(&view), vec!["LimeRadio", "LimeWire"]);
        let view = trie
            .range(Bound::Excluded(s("Lax")), Bound::Unbounded)
            .unwrap();
        assert_eq!(
            view.tail_map(s("Lax")).err(),
            Some(TrieError::KeyOutOfRange)
        );
    }

    #[test]
    fn mutation_through_view() {
        let mut trie = lime();
        {
            let mut view = trie.sub_map_mut(s("Lime"), s("Lovely")).unwrap();
            assert_eq!(view.insert(s("Lz"), 9), Err(TrieError::KeyOutOfRange));
            assert_eq!(view.insert(s("LimeA"), 6), Ok(None));
            assert_eq!(view.remove(&s("Lake")), None);
            assert_eq!(view.remove(&s("LimeWire")), Some(1));
            view.retain(|k, v| {
                *v += 100;
                k != "LimeRadio"
            });
            assert_eq!(keys(&view), vec!["Lime", "LimeA"]);
        }
        trie.assert_consistent();
        let entries: Vec<(&str, usize)> = trie.iter().map(|(k, v)| (k.as_str(), *v)).collect();
        assert_eq!(
            entries,
            vec![
                ("Lake", 4),
                ("Lax", 3),
                ("Lime", 100),
                ("LimeA", 106),
                ("Lovely", 5)
            ]
        );
        {
            let mut tail = trie.tail_map_mut(s("Lime"));
            let mut cursor = tail.cursor_mut();
            while let Some((_, v)) = cursor.next() {
                if *v > 100 {
                    assert!(cursor.remove_current().is_ok());
                }
            }
        }
        assert_eq!(trie.len(), 4);
        trie.head_map_mut(s("Lime")).retain(|_, _| false);
        assert_eq!(trie.keys().collect::<Vec<_>>(), vec!["Lime", "Lovely"]);
        trie.assert_consistent();
    }

    fn bound(b: &Option<(Key, bool)>) -> Bound<Vec<u8>> {
        match b {
            None => Bound::Unbounded,
            Some((Key(k), true)) => Bound::Included(k.clone()),
            Some((Key(k), false)) => Bound::Excluded(k.clone()),
        }
    }

    fn within(from: &Bound<Vec<u8>>, to: &Bound<Vec<u8>>, key: &[u8]) -> bool {
        let above = match from {
            Bound::Unbounded => true,
            Bound::Included(f) => key >= f.as_slice(),
            Bound::Excluded(f) => key > f.as_slice(),
        };
        let below = match to {
            Bound::Unbounded => true,
            Bound::Included(t) => key <= t.as_slice(),
            Bound::Excluded(t) => key < t.as_slice(),
        };
        above && below
    }

    #[quickcheck]
    fn range_matches_btreemap(
        keys: Vec<Key>,
        from: Option<(Key, bool)>,
        to: Option<(Key, bool)>,
    ) -> bool {
        let trie: PatriciaTrie<Vec<u8>, usize> = keys
            .iter()
            .enumerate()
            .map(|(i, Key(k))| (k.clone(), i))
            .collect();
        let model: BTreeMap<Vec<u8>, usize> = trie.iter().map(|(k, v)| (k.clone(), *v)).collect();
        let (from, to) = (bound(&from), bound(&to));
        let inverted = match (&from, &to) {
            (Bound::Included(f) | Bound::Excluded(f), Bound::Included(t) | Bound::Excluded(t)) => {
                f > t
            }
            _ => false,
        };
        match trie.range(from.clone(), to.clone()) {
            Err(e) => inverted && e == TrieError::InvalidRange,
            Ok(view) => {
                let expected: Vec<(&Vec<u8>, &usize)> =
                    model.iter().filter(|(k, _)| within(&from, &to, k)).collect();
                !inverted
                    && view.iter().collect::<Vec<_>>() == expected
                    && view.first_key_value() == expected.first().copied()
                    && view.last_key_value() == expected.last().copied()
                    && view.len() == expected.len()
                    && model.keys().all(|k| view.in_range(k) == within(&from, &to, k))
            }
        }
    }

    #[quickcheck]
    fn range_removal_matches_btreemap(keys: Vec<Key>, from: Key, to: Key) -> bool {
        let mut trie: PatriciaTrie<Vec<u8>, usize> = keys
            .iter()
            .enumerate()
            .map(|(i, Key(k))| (k.clone(), i))
            .collect();
        let mut model: BTreeMap<Vec<u8>, usize> =
            trie.iter().map(|(k, v)| (k.clone(), *v)).collect();
        let (from, to) = if from <= to { (from.0, to.0) } else { (to.0, from.0) };
        let within = |k: &Vec<u8>| k >= &from && k < &to;
        if let Ok(mut view) = trie.sub_map_mut(from.clone(), to.clone()) {
            view.retain(|_, v| *v % 2 == 0);
        }
        model.retain(|k, v| !within(k) || *v % 2 == 0);
        trie.assert_consistent();
        trie.iter().eq(model.iter())
    }
}
