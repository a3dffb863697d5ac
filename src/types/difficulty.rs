// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Best-difficulty value parsing and normalization.
//!
//! Devices report their best share difficulty as a scaled string: a decimal
//! number optionally followed by one suffix letter (K/M/G/T/P) denoting
//! ×10³ … ×10¹⁵. Internally the value is normalized to a "millions" base
//! unit by dividing the suffix-multiplied value by 10⁶.
//!
//! # Examples
//!
//! ```
//! use axefleet::types::BestDifficulty;
//!
//! let diff: BestDifficulty = "5M".parse().unwrap();
//! assert_eq!(diff.as_millions(), 5.0);
//!
//! // Interior whitespace and commas are tolerated
//! let diff: BestDifficulty = "7 M".parse().unwrap();
//! assert_eq!(diff.as_millions(), 7.0);
//!
//! let diff: BestDifficulty = "4,070,000T".parse().unwrap();
//! assert_eq!(diff.as_millions(), 4.07e12);
//! ```

use std::fmt;
use std::str::FromStr;

use crate::error::ParseError;

/// A best share difficulty, normalized to millions.
///
/// Ordering is by numeric value, so `max()` over a set of difficulties picks
/// the highest share found.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct BestDifficulty(f64);

impl BestDifficulty {
    /// Creates a difficulty from a value already in millions.
    #[must_use]
    pub const fn from_millions(millions: f64) -> Self {
        Self(millions)
    }

    /// Returns the difficulty in millions.
    #[must_use]
    pub const fn as_millions(&self) -> f64 {
        self.0
    }

    /// Returns the larger of two difficulties.
    #[must_use]
    pub fn max(self, other: Self) -> Self {
        if other.0 > self.0 { other } else { self }
    }
}

impl FromStr for BestDifficulty {
    type Err = ParseError;

    /// Parses a scaled difficulty string such as `"5M"` or `"742.5K"`.
    ///
    /// Commas and whitespace inside the number are ignored; the suffix is
    /// case-insensitive. A missing suffix means the raw share value.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let cleaned: String = s
            .chars()
            .filter(|c| !c.is_whitespace() && *c != ',')
            .collect();

        if cleaned.is_empty() {
            return Err(ParseError::InvalidValue {
                field: "bestDiff".to_string(),
                message: "empty difficulty string".to_string(),
            });
        }

        let (number_part, multiplier) = match cleaned.chars().last() {
            Some(c) if c.is_ascii_alphabetic() => {
                let mult = match c.to_ascii_uppercase() {
                    'K' => 1e3,
                    'M' => 1e6,
                    'G' => 1e9,
                    'T' => 1e12,
                    'P' => 1e15,
                    other => {
                        return Err(ParseError::InvalidValue {
                            field: "bestDiff".to_string(),
                            message: format!("unknown suffix '{other}' in: {s}"),
                        });
                    }
                };
                (&cleaned[..cleaned.len() - 1], mult)
            }
            _ => (cleaned.as_str(), 1.0),
        };

        let value: f64 = number_part.parse().map_err(|_| ParseError::InvalidValue {
            field: "bestDiff".to_string(),
            message: format!("invalid number in: {s}"),
        })?;

        if !value.is_finite() || value < 0.0 {
            return Err(ParseError::InvalidValue {
                field: "bestDiff".to_string(),
                message: format!("difficulty out of range: {s}"),
            });
        }

        Ok(Self(value * multiplier / 1e6))
    }
}

impl fmt::Display for BestDifficulty {
    /// Formats the difficulty back to a human-readable scaled string.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let raw = self.0 * 1e6;
        if raw >= 1e15 {
            write!(f, "{:.2}P", raw / 1e15)
        } else if raw >= 1e12 {
            write!(f, "{:.2}T", raw / 1e12)
        } else if raw >= 1e9 {
            write!(f, "{:.2}G", raw / 1e9)
        } else if raw >= 1e6 {
            write!(f, "{:.2}M", raw / 1e6)
        } else if raw >= 1e3 {
            write!(f, "{:.2}K", raw / 1e3)
        } else {
            write!(f, "{raw:.0}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_plain_number() {
        let diff: BestDifficulty = "4200000".parse().unwrap();
        assert_eq!(diff.as_millions(), 4.2);
    }

    #[test]
    fn parse_suffixes() {
        let cases = [
            ("5K", 5e3 / 1e6),
            ("5M", 5.0),
            ("5G", 5e3),
            ("5T", 5e6),
            ("5P", 5e9),
        ];
        for (input, expected) in cases {
            let diff: BestDifficulty = input.parse().unwrap();
            assert_eq!(diff.as_millions(), expected, "input: {input}");
        }
    }

    #[test]
    fn parse_is_case_insensitive() {
        let upper: BestDifficulty = "3M".parse().unwrap();
        let lower: BestDifficulty = "3m".parse().unwrap();
        assert_eq!(upper, lower);
    }

    #[test]
    fn parse_tolerates_spaces_and_commas() {
        let diff: BestDifficulty = "7 M".parse().unwrap();
        assert_eq!(diff.as_millions(), 7.0);

        let diff: BestDifficulty = "4,070,000T".parse().unwrap();
        assert_eq!(diff.as_millions(), 4.07e12);
    }

    #[test]
    fn parse_fractional_value() {
        let diff: BestDifficulty = "742.5K".parse().unwrap();
        assert!((diff.as_millions() - 0.7425).abs() < 1e-9);
    }

    #[test]
    fn parse_is_idempotent_through_display() {
        let diff: BestDifficulty = "5M".parse().unwrap();
        let redisplayed = diff.to_string();
        let reparsed: BestDifficulty = redisplayed.parse().unwrap();
        assert_eq!(reparsed, diff);
    }

    #[test]
    fn parse_rejects_garbage() {
        for bad in ["", "   ", "M", "12X", "abc", "-5M"] {
            assert!(
                bad.parse::<BestDifficulty>().is_err(),
                "expected {bad:?} to be rejected"
            );
        }
    }

    #[test]
    fn max_picks_higher_value() {
        let a = BestDifficulty::from_millions(5.0);
        let b = BestDifficulty::from_millions(12.0);
        assert_eq!(a.max(b), b);
        assert_eq!(b.max(a), b);
    }

    #[test]
    fn display_scales_unit() {
        assert_eq!(BestDifficulty::from_millions(5.0).to_string(), "5.00M");
        assert_eq!(BestDifficulty::from_millions(5e3).to_string(), "5.00G");
        assert_eq!(BestDifficulty::from_millions(0.005).to_string(), "5.00K");
    }
}
