//! Bit-level analysis of keys.
//!
//! The trie never looks at a key directly. Everything it needs (the number of bits in a key, the
//! value of a single bit, where two keys start to differ, and the total order) is asked from a
//! [`KeyAnalyzer`]. Bits are numbered from the most significant bit of the first element, and a
//! key behaves as if it was followed by an infinite run of zero bits.
use num_traits::{PrimInt, Unsigned};
use std::cmp::Ordering;
use std::fmt::Debug;
use std::marker::PhantomData;
use std::mem::size_of;

/// Outcome of comparing two bit windows with [`KeyAnalyzer::bit_index`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BitIndex {
    /// index of the most significant bit at which the two windows differ
    Differs(usize),
    /// both windows consist of zero bits only
    AllZero,
    /// the windows are bitwise identical and contain at least one set bit
    Equal,
}

/// Reduces an opaque key type to a bit string.
///
/// Implementations must be consistent: `compare` has to order keys the same way as their bit
/// strings (a key that is a zero padded prefix of another one sorts first), otherwise the trie
/// iterates in an order that disagrees with the sorted map contract.
pub trait KeyAnalyzer<K: ?Sized> {
    /// total number of bits in the key
    fn length(&self, key: &K) -> usize;

    /// whether the given bit is set. Always false if `bit_index >= key_length`.
    fn is_bit_set(&self, key: &K, key_length: usize, bit_index: usize) -> bool;

    /// Most significant differing bit between the window `(key_start, key_length)` of `key` and
    /// the window `(other_start, other_length)` of `other`.
    ///
    /// The returned index is relative to the start of the windows. A missing `other` is an
    /// all-zero window.
    fn bit_index(
        &self,
        key: &K,
        key_start: usize,
        key_length: usize,
        other: Option<&K>,
        other_start: usize,
        other_length: usize,
    ) -> BitIndex;

    /// number of bits in one element of the key
    fn bits_per_element(&self) -> usize;

    /// whether `key` starts with the `length` bits of `prefix` starting at bit `offset`
    fn is_prefix(&self, prefix: &K, offset: usize, length: usize, key: &K) -> bool;

    /// total order of keys, consistent with the order of their bit strings
    fn compare(&self, a: &K, b: &K) -> Ordering;
}

/// Analyzer for keys that are sequences of unsigned fixed width elements.
///
/// `ElementKeyAnalyzer<u8>` handles `String`, `str`, `Vec<u8>` and `[u8]` keys one UTF-8 code unit
/// at a time. Since UTF-8 preserves code point order, the trie order of strings is the same as
/// their `Ord` order.
pub struct ElementKeyAnalyzer<E>(PhantomData<E>);

/// Analyzer for strings and byte strings, 8 bits per element
pub type ByteKeyAnalyzer = ElementKeyAnalyzer<u8>;

/// Analyzer for UTF-16 code unit sequences, 16 bits per element
pub type Utf16KeyAnalyzer = ElementKeyAnalyzer<u16>;

impl<E> ElementKeyAnalyzer<E> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<E> Default for ElementKeyAnalyzer<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Clone for ElementKeyAnalyzer<E> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<E> Copy for ElementKeyAnalyzer<E> {}

impl<E> Debug for ElementKeyAnalyzer<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ElementKeyAnalyzer<{}>", std::any::type_name::<E>())
    }
}

impl<E: PrimInt + Unsigned> ElementKeyAnalyzer<E> {
    const BITS: usize = size_of::<E>() * 8;

    fn element(key: &[E], index: usize) -> E {
        key.get(index).copied().unwrap_or_else(E::zero)
    }

    /// The `index`-th element wide chunk of the window `(start, length)`, zero padded.
    ///
    /// Windows do not need to be element aligned, a chunk can straddle two elements.
    fn chunk(key: &[E], start: usize, length: usize, index: usize) -> E {
        let offset = index * Self::BITS;
        if offset >= length {
            return E::zero();
        }
        let bit = start + offset;
        let element = bit / Self::BITS;
        let shift = bit % Self::BITS;
        let mut value = if shift == 0 {
            Self::element(key, element)
        } else {
            (Self::element(key, element) << shift)
                | (Self::element(key, element + 1) >> (Self::BITS - shift))
        };
        let remaining = length - offset;
        if remaining < Self::BITS {
            value = value & (E::max_value() << (Self::BITS - remaining));
        }
        value
    }
}

impl<E: PrimInt + Unsigned, K: AsRef<[E]> + ?Sized> KeyAnalyzer<K> for ElementKeyAnalyzer<E> {
    fn length(&self, key: &K) -> usize {
        key.as_ref().len() * Self::BITS
    }

    fn is_bit_set(&self, key: &K, key_length: usize, bit_index: usize) -> bool {
        if bit_index >= key_length {
            return false;
        }
        let element = Self::element(key.as_ref(), bit_index / Self::BITS);
        let mask = E::one() << (Self::BITS - 1 - bit_index % Self::BITS);
        element & mask != E::zero()
    }

    fn bit_index(
        &self,
        key: &K,
        key_start: usize,
        key_length: usize,
        other: Option<&K>,
        other_start: usize,
        other_length: usize,
    ) -> BitIndex {
        let key = key.as_ref();
        let other = other.map(AsRef::as_ref).unwrap_or(&[]);
        let length = key_length.max(other_length);
        let chunks = (length + Self::BITS - 1) / Self::BITS;
        let mut all_zero = true;
        for i in 0..chunks {
            let a = Self::chunk(key, key_start, key_length, i);
            let b = Self::chunk(other, other_start, other_length, i);
            if a != b {
                let x = a ^ b;
                return BitIndex::Differs(i * Self::BITS + x.leading_zeros() as usize);
            }
            if a != E::zero() {
                all_zero = false;
            }
        }
        if all_zero {
            BitIndex::AllZero
        } else {
            BitIndex::Equal
        }
    }

    fn bits_per_element(&self) -> usize {
        Self::BITS
    }

    fn is_prefix(&self, prefix: &K, offset: usize, length: usize, key: &K) -> bool {
        if self.length(key) < length {
            return false;
        }
        let prefix = prefix.as_ref();
        let key = key.as_ref();
        let chunks = (length + Self::BITS - 1) / Self::BITS;
        (0..chunks).all(|i| Self::chunk(prefix, offset, length, i) == Self::chunk(key, 0, length, i))
    }

    fn compare(&self, a: &K, b: &K) -> Ordering {
        a.as_ref().cmp(b.as_ref())
    }
}

/// Analyzer for fixed width unsigned integer keys.
///
/// Every key is exactly as long as the integer type, so prefix views are only useful with
/// explicit bit lengths, e.g. all addresses inside `192.168.0.0/16` for `u32` IPv4 addresses.
/// One element is one bit.
pub struct IntegerKeyAnalyzer<T>(PhantomData<T>);

impl<T> IntegerKeyAnalyzer<T> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for IntegerKeyAnalyzer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for IntegerKeyAnalyzer<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> Copy for IntegerKeyAnalyzer<T> {}

impl<T> Debug for IntegerKeyAnalyzer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "IntegerKeyAnalyzer<{}>", std::any::type_name::<T>())
    }
}

impl<T: PrimInt + Unsigned> IntegerKeyAnalyzer<T> {
    const BITS: usize = size_of::<T>() * 8;

    /// the window `(start, length)` of a key, shifted to the most significant end
    fn window(key: T, start: usize, length: usize) -> T {
        if start >= Self::BITS || length == 0 {
            return T::zero();
        }
        let value = key << start;
        if length >= Self::BITS {
            value
        } else {
            value & (T::max_value() << (Self::BITS - length))
        }
    }
}

impl<T: PrimInt + Unsigned> KeyAnalyzer<T> for IntegerKeyAnalyzer<T> {
    fn length(&self, _key: &T) -> usize {
        Self::BITS
    }

    fn is_bit_set(&self, key: &T, key_length: usize, bit_index: usize) -> bool {
        if bit_index >= key_length || bit_index >= Self::BITS {
            return false;
        }
        *key & (T::one() << (Self::BITS - 1 - bit_index)) != T::zero()
    }

    fn bit_index(
        &self,
        key: &T,
        key_start: usize,
        key_length: usize,
        other: Option<&T>,
        other_start: usize,
        other_length: usize,
    ) -> BitIndex {
        let a = Self::window(*key, key_start, key_length);
        let b = other
            .map(|other| Self::window(*other, other_start, other_length))
            .unwrap_or_else(T::zero);
        if a != b {
            BitIndex::Differs((a ^ b).leading_zeros() as usize)
        } else if a == T::zero() {
            BitIndex::AllZero
        } else {
            BitIndex::Equal
        }
    }

    fn bits_per_element(&self) -> usize {
        1
    }

    fn is_prefix(&self, prefix: &T, offset: usize, length: usize, key: &T) -> bool {
        Self::window(*prefix, offset, length) == Self::window(*key, 0, length)
    }

    fn compare(&self, a: &T, b: &T) -> Ordering {
        a.cmp(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck::TestResult;

    const BYTES: ByteKeyAnalyzer = ElementKeyAnalyzer(PhantomData);

    fn bits(key: &str) -> String {
        let len = BYTES.length(key);
        (0..len)
            .map(|i| if BYTES.is_bit_set(key, len, i) { '1' } else { '0' })
            .collect()
    }

    fn full_bit_index(a: &[u8], b: &[u8]) -> BitIndex {
        let analyzer = ByteKeyAnalyzer::new();
        analyzer.bit_index(a, 0, analyzer.length(a), Some(b), 0, analyzer.length(b))
    }

    #[test]
    fn bit_test() {
        assert_eq!(bits("a"), "01100001");
        assert_eq!(bits("aB"), "0110000101000010");
        // past the end everything is zero
        assert!(!BYTES.is_bit_set("a", 8, 8));
        assert!(!BYTES.is_bit_set("a", 1, 1));
    }

    #[test]
    fn bit_index_special_cases() {
        assert_eq!(full_bit_index(b"Lime", b"LimeWire"), BitIndex::Differs(33));
        assert_eq!(full_bit_index(b"Lax", b"Lake"), BitIndex::Differs(19));
        assert_eq!(full_bit_index(b"\0\0", b""), BitIndex::AllZero);
        assert_eq!(full_bit_index(b"abc", b"abc"), BitIndex::Equal);
        // trailing zero elements do not change the bit string
        assert_eq!(full_bit_index(b"a", b"a\0"), BitIndex::Equal);
        let analyzer = ByteKeyAnalyzer::new();
        assert_eq!(
            KeyAnalyzer::<[u8]>::bit_index(&analyzer, b"a", 0, 8, None, 0, 0),
            BitIndex::Differs(1)
        );
    }

    #[test]
    fn unaligned_windows() {
        let analyzer = ByteKeyAnalyzer::new();
        // "\x0F\xF0" starting at bit 4 is 0xFF
        let key: &[u8] = b"\x0F\xF0";
        let other: &[u8] = b"\xFF";
        assert_eq!(
            analyzer.bit_index(key, 4, 8, Some(other), 0, 8),
            BitIndex::Equal
        );
        assert_eq!(
            analyzer.bit_index(key, 4, 12, Some(other), 0, 8),
            BitIndex::Equal
        );
        assert_eq!(
            analyzer.bit_index(key, 3, 8, Some(other), 0, 8),
            BitIndex::Differs(0)
        );
        assert!(analyzer.is_prefix(&b"The Lime Plastics"[..], 32, 32, &b"LimeWire"[..]));
        assert!(!analyzer.is_prefix(&b"The Lime Plastics"[..], 32, 40, &b"LimeWire"[..]));
        assert!(analyzer.is_prefix(key, 4, 8, other));
    }

    #[test]
    fn utf16() {
        let analyzer = Utf16KeyAnalyzer::new();
        let a: Vec<u16> = "Lime".encode_utf16().collect();
        let b: Vec<u16> = "LimeWire".encode_utf16().collect();
        assert_eq!(KeyAnalyzer::<[u16]>::bits_per_element(&analyzer), 16);
        assert_eq!(analyzer.length(&a), 64);
        assert_eq!(
            analyzer.bit_index(&a, 0, 64, Some(&b), 0, 128),
            BitIndex::Differs(73)
        );
        assert!(analyzer.is_prefix(&a, 0, 32, &b));
    }

    #[test]
    fn integers() {
        let analyzer = IntegerKeyAnalyzer::<u32>::new();
        let net = 0xC0A8_0000u32;
        assert_eq!(analyzer.length(&net), 32);
        assert!(analyzer.is_bit_set(&net, 32, 0));
        assert!(!analyzer.is_bit_set(&net, 32, 2));
        assert!(analyzer.is_prefix(&net, 0, 16, &0xC0A8_0101));
        assert!(!analyzer.is_prefix(&net, 0, 16, &0xC0A9_0101));
        assert_eq!(
            analyzer.bit_index(&0x8000_0000, 0, 32, Some(&0xC000_0000), 0, 32),
            BitIndex::Differs(1)
        );
        assert_eq!(analyzer.bit_index(&0, 0, 32, None, 0, 0), BitIndex::AllZero);
        assert_eq!(analyzer.bit_index(&7, 0, 32, Some(&7), 0, 32), BitIndex::Equal);
        // windows of the same key
        assert_eq!(
            analyzer.bit_index(&0x00FF_00FF, 8, 8, Some(&0x00FF_00FF), 24, 8),
            BitIndex::Equal
        );
    }

    fn trim_zeros(x: &[u8]) -> &[u8] {
        let end = x.iter().rposition(|b| *b != 0).map(|i| i + 1).unwrap_or(0);
        &x[..end]
    }

    #[quickcheck]
    fn bit_index_agrees_with_compare(a: Vec<u8>, b: Vec<u8>) -> bool {
        let analyzer = ByteKeyAnalyzer::new();
        let (la, lb) = (analyzer.length(&a), analyzer.length(&b));
        match full_bit_index(&a, &b) {
            BitIndex::Differs(i) => {
                let abit = analyzer.is_bit_set(&a, la, i);
                let bbit = analyzer.is_bit_set(&b, lb, i);
                let same_before =
                    (0..i).all(|j| analyzer.is_bit_set(&a, la, j) == analyzer.is_bit_set(&b, lb, j));
                let order = analyzer.compare(&a, &b);
                same_before && abit != bbit && (abit == (order == Ordering::Greater))
            }
            BitIndex::AllZero => trim_zeros(&a).is_empty() && trim_zeros(&b).is_empty(),
            BitIndex::Equal => trim_zeros(&a) == trim_zeros(&b) && !trim_zeros(&a).is_empty(),
        }
    }

    #[quickcheck]
    fn is_prefix_agrees_with_starts_with(a: Vec<u8>, b: Vec<u8>) -> TestResult {
        if a.is_empty() {
            return TestResult::discard();
        }
        let analyzer = ByteKeyAnalyzer::new();
        let n = b.len().min(a.len());
        let prefix = &a[..n];
        TestResult::from_bool(
            analyzer.is_prefix(&a, 0, n * 8, &b) == b.starts_with(prefix),
        )
    }

    #[quickcheck]
    fn integer_bit_index_agrees_with_compare(a: u64, b: u64) -> bool {
        let analyzer = IntegerKeyAnalyzer::<u64>::new();
        match analyzer.bit_index(&a, 0, 64, Some(&b), 0, 64) {
            BitIndex::Differs(i) => analyzer.is_bit_set(&a, 64, i) == (a > b),
            BitIndex::AllZero => a == 0 && b == 0,
            BitIndex::Equal => a == b && a != 0,
        }
    }
}
