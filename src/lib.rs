//! An ordered map organized as a PATRICIA trie.
//!
//! Keys are compared bit by bit through a [`KeyAnalyzer`], so the same trie works for byte
//! strings, strings, UTF-16 strings and unsigned integers. Besides the usual map operations the
//! trie supports closest match lookup by bit distance ([`PatriciaTrie::select`]), sorted
//! range views, and views of all keys starting with a given prefix.
//!
//! ```
//! use patricia_collections::PatriciaTrie;
//!
//! let mut trie: PatriciaTrie<&str, &str> = PatriciaTrie::default();
//! for name in ["Lime", "LimeWire", "LimeRadio", "Lax", "Later", "Lake", "Lovely"] {
//!     trie.insert(name, name);
//! }
//! let lime: Vec<&str> = trie.prefixed_by("Lime").keys().copied().collect();
//! assert_eq!(lime, vec!["Lime", "LimeRadio", "LimeWire"]);
//! assert_eq!(trie.select("Lax"), Some(&"Lax"));
//! assert_eq!(trie.ceiling(&"Lb").map(|(k, _)| *k), Some("Lime"));
//! assert_eq!(trie.head_map("Lb").len(), 3);
//! ```
#[cfg(test)]
#[macro_use]
extern crate maplit;

#[cfg(test)]
#[macro_use(quickcheck)]
extern crate quickcheck_macros;

#[cfg(test)]
mod obey;

mod error;
mod iterators;
mod key_analyzer;
mod node;
mod prefix_view;
mod range_view;
mod trie;

pub use error::{Result, TrieError};
pub use iterators::{CursorMut, IntoIter, IntoKeys, IntoValues, Iter, Keys, Values};
pub use key_analyzer::{
    BitIndex, ByteKeyAnalyzer, ElementKeyAnalyzer, IntegerKeyAnalyzer, KeyAnalyzer,
    Utf16KeyAnalyzer,
};
pub use prefix_view::PrefixView;
pub use range_view::RangeView;
pub use trie::{PatriciaTrie, Selection, Visit};
