//! Symbolic block references.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Reference to a block, resolved by the backend to at most one header.
///
/// A light client keeps no local pending state, so `Pending` resolves to the
/// same committed head as `Latest`; callers must not expect pool-derived
/// state through `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockRef {
    /// Block at a specific height.
    Number(u64),
    /// The current committed head.
    Latest,
    /// Alias for the committed head on a light client.
    Pending,
}

impl From<u64> for BlockRef {
    fn from(number: u64) -> Self {
        BlockRef::Number(number)
    }
}

impl fmt::Display for BlockRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockRef::Number(n) => write!(f, "#{n}"),
            BlockRef::Latest => write!(f, "latest"),
            BlockRef::Pending => write!(f, "pending"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_formats() {
        assert_eq!(BlockRef::Number(7).to_string(), "#7");
        assert_eq!(BlockRef::Latest.to_string(), "latest");
        assert_eq!(BlockRef::Pending.to_string(), "pending");
    }

    #[test]
    fn from_u64() {
        assert_eq!(BlockRef::from(3), BlockRef::Number(3));
    }
}
