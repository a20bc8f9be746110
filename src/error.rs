//! Error types for patricia-collections

use thiserror::Error;

/// Result type alias using our error
pub type Result<T> = std::result::Result<T, TrieError>;

/// Recoverable faults reported by the trie and its views.
///
/// Broken invariants (a misbehaving [`KeyAnalyzer`](crate::KeyAnalyzer) or corrupted links) are
/// not represented here; those panic.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TrieError {
    /// The requested prefix window does not fit inside the prefix key
    #[error("prefix window {offset} + {length} exceeds key length of {key_length} bits")]
    PrefixOutOfBounds {
        offset: usize,
        length: usize,
        key_length: usize,
    },

    /// The lower bound of a range is greater than its upper bound
    #[error("range start is greater than range end")]
    InvalidRange,

    /// A key was given to a view that does not cover it
    #[error("key is outside the bounds of this view")]
    KeyOutOfRange,

    /// `remove_current` was called before advancing, or twice for the same entry
    #[error("no current entry to remove")]
    NoCurrentEntry,

    /// A select visitor asked to remove an entry and continue
    #[error("entries cannot be removed while selecting, use RemoveAndExit")]
    RemoveDuringSelect,
}

impl TrieError {
    pub(crate) fn prefix_out_of_bounds(offset: usize, length: usize, key_length: usize) -> Self {
        TrieError::PrefixOutOfBounds {
            offset,
            length,
            key_length,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages() {
        let e = TrieError::prefix_out_of_bounds(8, 16, 16);
        assert_eq!(
            e.to_string(),
            "prefix window 8 + 16 exceeds key length of 16 bits"
        );
        assert_eq!(
            TrieError::InvalidRange.to_string(),
            "range start is greater than range end"
        );
    }
}
