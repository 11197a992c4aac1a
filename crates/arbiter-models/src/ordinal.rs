//! Orchestrator ordinals.
//!
//! Every Orchestrator summoned during a process lifetime gets the next
//! ordinal. Ordinals start at 1 and are shown to the user as upper-case
//! Roman numerals ("Orchestrator IV").

use serde::{Deserialize, Serialize};
use std::fmt;

/// Position of an Orchestrator in the summon sequence. Always >= 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Ordinal(u32);

impl Ordinal {
    /// The first ordinal handed out in a fresh process.
    pub const FIRST: Ordinal = Ordinal(1);

    /// Creates an ordinal, returning `None` for zero.
    pub fn new(value: u32) -> Option<Self> {
        (value > 0).then_some(Self(value))
    }

    /// Numeric value.
    pub fn get(self) -> u32 {
        self.0
    }

    /// The ordinal that follows this one.
    pub fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// Roman numeral rendering of this ordinal.
    pub fn to_roman(self) -> String {
        const TABLE: [(u32, &str); 13] = [
            (1000, "M"),
            (900, "CM"),
            (500, "D"),
            (400, "CD"),
            (100, "C"),
            (90, "XC"),
            (50, "L"),
            (40, "XL"),
            (10, "X"),
            (9, "IX"),
            (5, "V"),
            (4, "IV"),
            (1, "I"),
        ];

        let mut remaining = self.0;
        let mut out = String::new();
        for (value, numeral) in TABLE {
            while remaining >= value {
                out.push_str(numeral);
                remaining -= value;
            }
        }
        out
    }
}

impl fmt::Display for Ordinal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_roman())
    }
}

impl TryFrom<u32> for Ordinal {
    type Error = String;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Ordinal::new(value).ok_or_else(|| "ordinal must be positive".to_string())
    }
}

impl From<Ordinal> for u32 {
    fn from(ordinal: Ordinal) -> Self {
        ordinal.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_is_rejected() {
        assert!(Ordinal::new(0).is_none());
        assert_eq!(Ordinal::new(3).map(Ordinal::get), Some(3));
    }

    #[test]
    fn test_roman_rendering() {
        let cases = [
            (1, "I"),
            (2, "II"),
            (4, "IV"),
            (9, "IX"),
            (14, "XIV"),
            (40, "XL"),
            (1994, "MCMXCIV"),
        ];
        for (value, expected) in cases {
            let ordinal = Ordinal::new(value).unwrap();
            assert_eq!(ordinal.to_string(), expected, "ordinal {value}");
        }
    }

    #[test]
    fn test_next_increments_by_one() {
        assert_eq!(Ordinal::FIRST.next().get(), 2);
    }

    #[test]
    fn test_deserialize_rejects_zero() {
        assert!(serde_json::from_str::<Ordinal>("0").is_err());
        let ordinal: Ordinal = serde_json::from_str("7").unwrap();
        assert_eq!(ordinal.to_string(), "VII");
    }
}
