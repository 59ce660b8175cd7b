//! Parsing of raw statistic values.
//!
//! `QuickStats` reports every value as a string: numbers carry thousands
//! separators (`"1,234"`), and suppressed cells use parenthesised codes such
//! as `(D)` (withheld to avoid disclosing individual operations) or `(Z)`
//! (less than half the unit shown).

/// Code used for values withheld to avoid disclosure. Counted as zero.
pub const WITHHELD: &str = "(D)";

/// Why a raw value could not be used.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unparseable production value {raw:?}")]
pub struct InvalidValueError {
    /// The raw value as received.
    pub raw: String,
}

/// Parses a raw production value.
///
/// [`WITHHELD`] yields `0.0`. Thousands separators and surrounding
/// whitespace are ignored.
///
/// # Errors
///
/// Returns [`InvalidValueError`] for any other non-numeric, negative or
/// non-finite value.
pub fn parse_production_value(raw: &str) -> Result<f64, InvalidValueError> {
    let trimmed = raw.trim();
    if trimmed == WITHHELD {
        return Ok(0.0);
    }

    let cleaned: String = trimmed.chars().filter(|c| *c != ',').collect();
    match cleaned.parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 0.0 => Ok(value),
        _ => Err(InvalidValueError {
            raw: raw.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_thousands_separators() {
        assert!((parse_production_value("1,234,567").unwrap() - 1_234_567.0).abs() < f64::EPSILON);
        assert!((parse_production_value(" 42 ").unwrap() - 42.0).abs() < f64::EPSILON);
    }

    #[test]
    fn withheld_counts_as_zero() {
        assert!(parse_production_value("(D)").unwrap().abs() < f64::EPSILON);
        assert!(parse_production_value(" (D) ").unwrap().abs() < f64::EPSILON);
    }

    #[test]
    fn rejects_other_codes() {
        for raw in ["(Z)", "(NA)", "", "abc", "-5", "NaN", "inf"] {
            assert_eq!(
                parse_production_value(raw),
                Err(InvalidValueError {
                    raw: raw.to_string()
                }),
                "{raw} should be rejected"
            );
        }
    }
}
