//! Severity levels
//!
//! A [`Level`] is a plain integer rank. The six named levels occupy ranks
//! `0..=5`; any other rank is still a valid level (room for extensions) and
//! renders as `UNKNOWN(<n>)`.
//!
//! # Examples
//!
//! ```
//! use sinkchain::Level;
//!
//! assert!(Level::DEBUG < Level::INFO);
//! assert!(Level::ERROR.gt(&Level::WARNING));
//! assert_eq!(Level::NOTICE.to_string(), "NOTICE");
//! assert_eq!(Level::from_int(42).to_string(), "UNKNOWN(42)");
//! ```

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Total-order severity value.
///
/// Comparisons (`lt`, `gt`, `eq` and friends, all from the derived
/// `PartialOrd`/`PartialEq`) are pure integer comparisons on the rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Level(i64);

impl Level {
    /// Verbose diagnostic detail.
    pub const DEBUG: Level = Level(0);
    /// Routine information.
    pub const INFO: Level = Level(1);
    /// Normal but significant events.
    pub const NOTICE: Level = Level(2);
    /// Something unexpected that did not stop the operation.
    pub const WARNING: Level = Level(3);
    /// An operation failed.
    pub const ERROR: Level = Level(4);
    /// The system is in a state that needs immediate attention.
    pub const CRITICAL: Level = Level(5);

    /// Build a level from its integer rank.
    pub const fn from_int(rank: i64) -> Self {
        Level(rank)
    }

    /// The integer rank of this level.
    pub const fn to_int(self) -> i64 {
        self.0
    }

    /// The display name of this level.
    ///
    /// ```
    /// use sinkchain::Level;
    ///
    /// assert_eq!(Level::WARNING.name(), "WARNING");
    /// assert_eq!(Level::from_int(-1).name(), "UNKNOWN(-1)");
    /// ```
    pub fn name(self) -> Cow<'static, str> {
        match self.0 {
            0 => Cow::Borrowed("DEBUG"),
            1 => Cow::Borrowed("INFO"),
            2 => Cow::Borrowed("NOTICE"),
            3 => Cow::Borrowed("WARNING"),
            4 => Cow::Borrowed("ERROR"),
            5 => Cow::Borrowed("CRITICAL"),
            n => Cow::Owned(format!("UNKNOWN({})", n)),
        }
    }

    /// Returns true when an entry at this level is rejected by `threshold`.
    ///
    /// Equal levels pass; only strictly lower levels are filtered.
    pub fn is_below(self, threshold: Level) -> bool {
        self < threshold
    }
}

impl Default for Level {
    fn default() -> Self {
        Level::INFO
    }
}

impl From<i64> for Level {
    fn from(rank: i64) -> Self {
        Level(rank)
    }
}

impl From<Level> for i64 {
    fn from(level: Level) -> Self {
        level.0
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // `pad` keeps width/alignment flags working for formatters.
        f.pad(&self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_levels_are_ordered() {
        let levels = [
            Level::DEBUG,
            Level::INFO,
            Level::NOTICE,
            Level::WARNING,
            Level::ERROR,
            Level::CRITICAL,
        ];
        for pair in levels.windows(2) {
            assert!(pair[0].lt(&pair[1]));
            assert!(pair[1].gt(&pair[0]));
        }
    }

    #[test]
    fn test_to_int_matches_rank() {
        assert_eq!(Level::DEBUG.to_int(), 0);
        assert_eq!(Level::CRITICAL.to_int(), 5);
        assert_eq!(Level::from_int(9).to_int(), 9);
    }

    #[test]
    fn test_unknown_rank_name() {
        assert_eq!(Level::from_int(6).to_string(), "UNKNOWN(6)");
    }

    #[test]
    fn test_display_respects_width() {
        assert_eq!(format!("{:<7}|", Level::INFO), "INFO   |");
        assert_eq!(format!("{:<7}|", Level::CRITICAL), "CRITICAL|");
    }

    #[test]
    fn test_is_below_accepts_equal() {
        assert!(!Level::INFO.is_below(Level::INFO));
        assert!(Level::DEBUG.is_below(Level::INFO));
        assert!(!Level::ERROR.is_below(Level::INFO));
    }

    #[test]
    fn test_serde_as_integer() {
        let json = serde_json::to_string(&Level::WARNING).unwrap();
        assert_eq!(json, "3");
        let back: Level = serde_json::from_str("4").unwrap();
        assert_eq!(back, Level::ERROR);
    }
}
