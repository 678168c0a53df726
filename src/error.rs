//! Build and decode errors.

use core::fmt;

/// Errors raised while constructing a trie or packed array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    /// Input keys (or sparse indices) are not in ascending order.
    Unsorted {
        /// Position of the offending entry
        index: usize,
    },

    /// Two identical keys (or sparse indices) in the input.
    Duplicate {
        /// Position of the second occurrence
        index: usize,
    },

    /// Value count does not match key count.
    ValueCount {
        /// Number of keys supplied
        keys: usize,
        /// Number of values supplied
        values: usize,
    },

    /// The structure needs more node ids than the id width can address.
    NodeIdOverflow {
        /// Number of nodes required
        nodes: usize,
        /// Largest representable id
        max: usize,
    },
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildError::Unsorted { index } => {
                write!(f, "input not sorted at entry {}", index)
            }
            BuildError::Duplicate { index } => {
                write!(f, "duplicate input at entry {}", index)
            }
            BuildError::ValueCount { keys, values } => {
                write!(f, "{} values supplied for {} keys", values, keys)
            }
            BuildError::NodeIdOverflow { nodes, max } => {
                write!(f, "{} nodes exceed the maximum node id {}", nodes, max)
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for BuildError {}

/// Errors raised while loading persisted bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The buffer ends before the declared content.
    TooShort {
        /// Bytes required by the header
        needed: usize,
        /// Bytes actually available
        have: usize,
    },

    /// Declared lengths are inconsistent with the element width.
    LengthMismatch {
        /// Byte length implied by count and width
        expected: usize,
        /// Byte length declared in the header
        found: usize,
    },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::TooShort { needed, have } => {
                write!(f, "buffer too short: need {} bytes, have {}", needed, have)
            }
            DecodeError::LengthMismatch { expected, found } => {
                write!(
                    f,
                    "declared data length {} does not match expected {}",
                    found, expected
                )
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for DecodeError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = BuildError::Unsorted { index: 3 };
        assert_eq!(err.to_string(), "input not sorted at entry 3");

        let err = BuildError::NodeIdOverflow {
            nodes: 70000,
            max: 65535,
        };
        assert_eq!(err.to_string(), "70000 nodes exceed the maximum node id 65535");

        let err = DecodeError::TooShort {
            needed: 16,
            have: 7,
        };
        assert_eq!(err.to_string(), "buffer too short: need 16 bytes, have 7");
    }
}
