// 💰 Tuition magnitude extraction
//
// Fee strings are free prose ("R85,000 - R95,000 per year", "Contact School
// for Fees"). Filtering and sorting need one comparable number per school.

use regex::Regex;
use std::sync::LazyLock;

/// First run of digits, optionally after a currency marker, optionally
/// comma-grouped, optionally followed by one space-separated group ("85 000").
static AMOUNT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[R$]?\s?(\d+(?:,\d+)*(?:\s\d{3}\b)?)").expect("valid tuition pattern")
});

/// Best-effort magnitude of a tuition display string.
///
/// Total: never fails. Strings without digits (or with a number too large to
/// represent) yield 0, which callers treat as "unknown".
///
/// ```
/// use school_finder::tuition::tuition_amount;
///
/// assert_eq!(tuition_amount("R85,000 - R95,000 per year"), 85000);
/// assert_eq!(tuition_amount("Contact School for Fees"), 0);
/// ```
pub fn tuition_amount(display: &str) -> u64 {
    AMOUNT_RE
        .captures(display)
        .and_then(|caps| caps.get(1))
        .map(|m| {
            m.as_str()
                .chars()
                .filter(|c| c.is_ascii_digit())
                .collect::<String>()
        })
        .and_then(|digits| digits.parse::<u64>().ok())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_annual_range() {
        assert_eq!(tuition_amount("R85,000 - R95,000 per year"), 85000);
    }

    #[test]
    fn test_monthly_amount() {
        assert_eq!(tuition_amount("R7,500 per month"), 7500);
    }

    #[test]
    fn test_sentinel_is_zero() {
        assert_eq!(tuition_amount("Contact School for Fees"), 0);
        assert_eq!(tuition_amount(""), 0);
    }

    #[test]
    fn test_space_grouped_and_multi_group() {
        assert_eq!(tuition_amount("R85 000 annually"), 85000);
        assert_eq!(tuition_amount("R1,250,000"), 1250000);
    }

    #[test]
    fn test_combined_catalog_format() {
        // Format produced by the catalog parser: annual first, monthly in brackets
        assert_eq!(tuition_amount("R98,400 (R9,840 per month)"), 98400);
    }

    #[test]
    fn test_overflow_is_zero() {
        assert_eq!(tuition_amount("R99999999999999999999999"), 0);
    }
}
