pub mod error;
pub mod status;
pub mod tile;

pub use error::{BatchError, ErrorCategory, Result, ResultExt};
pub use status::{Outcome, Status};
pub use tile::TileId;

// =============================================================================
// Domain Newtypes
// =============================================================================

use std::fmt;

/// Worker slot identifier assigned by the pool at spawn time
///
/// Slots are numbered from 1 so that `temp_1 .. temp_N` scratch names line up
/// with the legacy coordinator log collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotId(usize);

impl SlotId {
    /// Create from a 1-based slot number
    pub fn new(number: usize) -> Self {
        Self(number.max(1))
    }

    /// Create from a 0-based pool index
    pub fn from_index(index: usize) -> Self {
        Self(index + 1)
    }

    /// 1-based slot number
    pub fn number(&self) -> usize {
        self.0
    }

    /// 0-based slot index (used for the stagger delay)
    pub fn index(&self) -> usize {
        self.0 - 1
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot-{}", self.0)
    }
}

/// Whether `name` can be joined onto a directory without leaving it
///
/// Pipeline and step names become folder names under the log root.
pub fn is_path_component(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_numbering() {
        let slot = SlotId::from_index(0);
        assert_eq!(slot.number(), 1);
        assert_eq!(slot.index(), 0);
        assert_eq!(SlotId::new(4).index(), 3);
        assert_eq!(SlotId::new(0).number(), 1);
        assert_eq!(SlotId::new(2).to_string(), "slot-2");
    }

    #[test]
    fn test_path_component() {
        assert!(is_path_component("process_tiles"));
        for name in ["", ".", "..", "a/b", "../log", "a\\b"] {
            assert!(!is_path_component(name), "{name:?}");
        }
    }
}
