//! Parsing of weighting category labels.
//!
//! A label has the form `"<name>.<precision>"`. The precision is the number
//! of decimal places shares in that category may carry.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Highest number of decimal places a share may carry
pub const MAX_PRECISION: u32 = 6;

/// Parsed weighting category label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principle {
    pub name: String,
    /// Decimal places, 0..=6
    pub precision: u32,
    /// Smallest increment, `10^-precision`
    pub step: Decimal,
}

impl Principle {
    /// Round a share value to this principle's precision
    pub fn round(&self, value: Decimal) -> Decimal {
        value.round_dp_with_strategy(self.precision, RoundingStrategy::MidpointAwayFromZero)
    }

    /// Whether a label (for example an import header) names this principle
    pub fn matches(&self, label: &str) -> bool {
        parse_principle(label).name == self.name
    }
}

/// Split a label on its last `.` into name and precision.
///
/// An integer suffix (digits with an optional leading `+`) is a precision
/// suffix and is removed from the name. Precision is `min(6, suffix)` for
/// suffixes above zero and 0 otherwise; a label without such a suffix keeps
/// its whole text as name.
pub fn parse_principle(label: &str) -> Principle {
    let suffix = label
        .rsplit_once('.')
        .and_then(|(name, suffix)| integer_digits(suffix).map(|digits| (name, digits)));
    let (name, precision) = match suffix {
        Some((name, digits)) => {
            // Digit strings too long for u64 are still "above 6".
            let precision = digits
                .parse::<u64>()
                .map(|value| value.min(MAX_PRECISION as u64) as u32)
                .unwrap_or(MAX_PRECISION);
            (name, precision)
        }
        None => (label, 0),
    };

    Principle {
        name: name.to_string(),
        precision,
        step: Decimal::new(1, precision),
    }
}

fn integer_digits(suffix: &str) -> Option<&str> {
    let digits = suffix.strip_prefix('+').unwrap_or(suffix);
    (!digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())).then_some(digits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(value: &str) -> Decimal {
        Decimal::from_str(value).unwrap()
    }

    #[test]
    fn test_precision_zero_suffix() {
        let principle = parse_principle("Heads.0");
        assert_eq!(principle.name, "Heads");
        assert_eq!(principle.precision, 0);
        assert_eq!(principle.step, dec("1"));
    }

    #[test]
    fn test_precision_two() {
        let principle = parse_principle("Members.2");
        assert_eq!(principle.name, "Members");
        assert_eq!(principle.precision, 2);
        assert_eq!(principle.step, dec("0.01"));
    }

    #[test]
    fn test_precision_is_clamped() {
        let principle = parse_principle("Members.10");
        assert_eq!(principle.name, "Members");
        assert_eq!(principle.precision, 6);
        assert_eq!(principle.step, dec("0.000001"));

        let huge = parse_principle("Members.123456789012345678901234567890");
        assert_eq!(huge.precision, 6);
    }

    #[test]
    fn test_plus_signed_suffix() {
        let principle = parse_principle("Members.+3");
        assert_eq!(principle.name, "Members");
        assert_eq!(principle.precision, 3);

        let bare = parse_principle("Members.+");
        assert_eq!(bare.name, "Members.+");
        assert_eq!(bare.precision, 0);
    }

    #[test]
    fn test_missing_or_invalid_suffix() {
        let principle = parse_principle("Members");
        assert_eq!(principle.name, "Members");
        assert_eq!(principle.precision, 0);
        assert_eq!(principle.step, dec("1"));

        let dotted = parse_principle("St. Mary.x");
        assert_eq!(dotted.name, "St. Mary.x");
        assert_eq!(dotted.precision, 0);

        let negative = parse_principle("Members.-1");
        assert_eq!(negative.name, "Members.-1");
        assert_eq!(negative.precision, 0);
    }

    #[test]
    fn test_split_on_last_dot() {
        let principle = parse_principle("Art.5.3");
        assert_eq!(principle.name, "Art.5");
        assert_eq!(principle.precision, 3);
    }

    #[test]
    fn test_round_and_match() {
        let principle = parse_principle("Capital.2");
        assert_eq!(principle.round(dec("1.005")), dec("1.01"));
        assert_eq!(principle.round(dec("3")), dec("3"));
        assert!(principle.matches("Capital.6"));
        assert!(principle.matches("Capital"));
        assert!(!principle.matches("Heads.2"));
    }
}
