use crate::PatriciaTrie;
use quickcheck::{Arbitrary, Gen};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Debug;

/// Few distinct bytes, so random keys share prefixes. Includes bytes with the high bit set, but no
/// zero byte, so no two generated keys have the same bit string.
const ALPHABET: [u8; 5] = [b'a', b'b', b'z', 0x7f, 0xc3];

/// A short random byte string over a small alphabet
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Key(pub Vec<u8>);

impl Arbitrary for Key {
    fn arbitrary(g: &mut Gen) -> Self {
        let len = usize::arbitrary(g) % 7;
        Key((0..len).map(|_| *g.choose(&ALPHABET).unwrap_or(&b'a')).collect())
    }

    fn shrink(&self) -> Box<dyn Iterator<Item = Self>> {
        let key = self.0.clone();
        Box::new((0..key.len()).rev().map(move |n| Key(key[..n].to_vec())))
    }
}

#[derive(Debug, Clone)]
pub enum Op {
    Insert(Vec<u8>, u32),
    Remove(Vec<u8>),
}

impl Arbitrary for Op {
    fn arbitrary(g: &mut Gen) -> Self {
        let Key(key) = Key::arbitrary(g);
        // bias towards inserts so the trie actually grows
        if u8::arbitrary(g) % 3 == 0 {
            Op::Remove(key)
        } else {
            Op::Insert(key, u32::arbitrary(g))
        }
    }
}

/// Applies `ops` to `model` and to whatever `f` operates on, comparing each returned old value.
pub fn model_ops<F>(ops: &[Op], model: &mut BTreeMap<Vec<u8>, u32>, mut f: F) -> bool
where
    F: FnMut(&Op) -> Option<u32>,
{
    ops.iter().all(|op| {
        let expected = match op {
            Op::Insert(k, v) => model.insert(k.clone(), *v),
            Op::Remove(k) => model.remove(k),
        };
        let actual = f(op);
        if expected != actual {
            println!("{:?}: expected {:?}, got {:?}", op, expected, actual);
        }
        expected == actual
    })
}

/// Keys worth probing around a set of keys: the keys themselves, their neighbours, and keys that
/// fall in between.
pub fn sample_keys<'a>(keys: impl IntoIterator<Item = &'a Vec<u8>>) -> BTreeSet<Vec<u8>> {
    let mut res = BTreeSet::new();
    res.insert(Vec::new());
    for key in keys {
        res.insert(key.clone());
        for &b in &[b'a', 0xff, 0x01] {
            let mut longer = key.clone();
            longer.push(b);
            res.insert(longer);
        }
        if let Some((last, init)) = key.split_last() {
            res.insert(init.to_vec());
            for x in [last.wrapping_sub(1), last.wrapping_add(1)].iter() {
                if *x != 0 {
                    let mut sibling = init.to_vec();
                    sibling.push(*x);
                    res.insert(sibling);
                }
            }
        }
    }
    res
}

///
/// A support trait for comparing a map against a reference implementation.
///
pub trait TestSamples<K, V> {
    /// produces "interesting" sample points to test a property for.
    fn samples(&self, res: &mut BTreeSet<K>);

    /// gets the value of the collection at position k
    fn at(&self, k: K) -> V;
}

impl TestSamples<Vec<u8>, Option<u32>> for BTreeMap<Vec<u8>, u32> {
    fn samples(&self, res: &mut BTreeSet<Vec<u8>>) {
        res.extend(sample_keys(self.keys()));
    }

    fn at(&self, k: Vec<u8>) -> Option<u32> {
        self.get(&k).copied()
    }
}

impl TestSamples<Vec<u8>, Option<u32>> for PatriciaTrie<Vec<u8>, u32> {
    fn samples(&self, res: &mut BTreeSet<Vec<u8>>) {
        res.extend(sample_keys(self.keys()));
    }

    fn at(&self, k: Vec<u8>) -> Option<u32> {
        self.get(&k).copied()
    }
}

/// checks that `a` and the reference `r` agree at all sample points of both
pub fn element_test<A, R, K, V>(a: &A, r: &R) -> bool
where
    A: TestSamples<K, V> + Debug,
    R: TestSamples<K, V> + Debug,
    K: Ord + Clone + Debug,
    V: Eq + Debug,
{
    let mut s: BTreeSet<K> = BTreeSet::new();
    a.samples(&mut s);
    r.samples(&mut s);
    s.into_iter().all(|key| {
        let actual = a.at(key.clone());
        let expected = r.at(key.clone());
        if expected != actual {
            println!(
                "expected!=actual at: {:?}. {:?}!={:?}",
                key, expected, actual
            );
            println!("a: {:?}", a);
            println!("r: {:?}", r);
            false
        } else {
            true
        }
    })
}
