//! Tile identifiers

use std::fmt;
use std::str::FromStr;

use super::error::{BatchError, Result};

/// Tile identifier in the `rrrr_ccc` form (row number, underscore, column number)
///
/// The textual form is kept verbatim so leading zeros survive a round trip
/// through file names and the progress table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileId(String);

impl TileId {
    /// Parse and validate a tile id
    pub fn parse(s: &str) -> Result<Self> {
        if Self::is_valid(s) {
            Ok(Self(s.to_string()))
        } else {
            Err(BatchError::InvalidTileId(s.to_string()))
        }
    }

    /// Check whether a string has the `digits_digits` shape
    pub fn is_valid(s: &str) -> bool {
        match s.split_once('_') {
            Some((row, col)) => is_digits(row) && is_digits(col),
            None => false,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Row part of the id
    pub fn row(&self) -> &str {
        self.parts().0
    }

    /// Column part of the id
    pub fn col(&self) -> &str {
        self.parts().1
    }

    fn parts(&self) -> (&str, &str) {
        // Validated on construction
        self.0.split_once('_').unwrap_or((&self.0, ""))
    }
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TileId {
    type Err = BatchError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl AsRef<str> for TileId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
