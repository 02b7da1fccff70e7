//! Step status tokens
//!
//! A status is an opaque token to executors and a tri-state to the scheduler.

use std::fmt;

use crate::constants::status as token;

/// Outcome token of a step (or of a whole tile in the overall column)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Status {
    /// Not yet run (or reset)
    #[default]
    Pending,
    /// Whole tile finished with every step ok
    Complete,
    /// Step finished ok
    Success,
    /// Whole tile finished with at least one failed step
    Incomplete,
    /// Tool-specific failure token, e.g. `gdalError`
    Failed(String),
}

/// Tri-state view used by scheduling decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Pending,
    Ok,
    Failed,
}

impl Status {
    /// Parse a token as stored in progress files
    ///
    /// Matching is exact; an empty cell reads as pending.
    pub fn from_token(s: &str) -> Self {
        match s {
            "" | token::PENDING => Self::Pending,
            token::COMPLETE => Self::Complete,
            token::SUCCESS => Self::Success,
            token::INCOMPLETE => Self::Incomplete,
            other => Self::Failed(other.to_string()),
        }
    }

    /// Build a failure status from a tool-specific token
    pub fn failed(token: impl Into<String>) -> Self {
        Self::from_token(&token.into())
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => token::PENDING,
            Self::Complete => token::COMPLETE,
            Self::Success => token::SUCCESS,
            Self::Incomplete => token::INCOMPLETE,
            Self::Failed(t) => t,
        }
    }

    pub fn outcome(&self) -> Outcome {
        match self {
            Self::Pending => Outcome::Pending,
            Self::Complete | Self::Success => Outcome::Ok,
            Self::Incomplete | Self::Failed(_) => Outcome::Failed,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.outcome() == Outcome::Ok
    }

    /// Overall status for a tile given its step statuses
    pub fn overall<'a>(steps: impl IntoIterator<Item = &'a Status>) -> Self {
        if steps.into_iter().all(Status::is_ok) {
            Self::Complete
        } else {
            Self::Incomplete
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_round_trip() {
        for t in ["pending", "complete", "success", "incomplete", "gdalError"] {
            assert_eq!(Status::from_token(t).as_str(), t);
        }
    }

    #[test]
    fn test_outcome_classification() {
        assert_eq!(Status::from_token("complete").outcome(), Outcome::Ok);
        assert_eq!(Status::from_token("success").outcome(), Outcome::Ok);
        assert_eq!(Status::from_token("pending").outcome(), Outcome::Pending);
        assert_eq!(Status::from_token("").outcome(), Outcome::Pending);
        assert_eq!(Status::from_token("opalsError").outcome(), Outcome::Failed);
        // Exact match only
        assert_eq!(Status::from_token("Success").outcome(), Outcome::Failed);
    }

    #[test]
    fn test_failed_normalizes_known_tokens() {
        assert_eq!(Status::failed("toolError"), Status::Failed("toolError".into()));
        assert_eq!(Status::failed("success"), Status::Success);
    }

    #[test]
    fn test_overall() {
        let ok = [Status::Success, Status::Success];
        assert_eq!(Status::overall(&ok), Status::Complete);

        let mixed = [Status::Success, Status::failed("gdalError")];
        assert_eq!(Status::overall(&mixed), Status::Incomplete);

        assert_eq!(Status::overall(&[] as &[Status]), Status::Complete);
    }
}
