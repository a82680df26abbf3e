use rust_decimal::Decimal;
use std::str::FromStr;

/// Parse a user-entered amount, tolerating thousands separators
/// ("15,000.50") and surrounding whitespace.
pub fn parse_amount(raw: &str) -> Option<Decimal> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() {
        return None;
    }
    Decimal::from_str(&cleaned).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_formatted_amounts() {
        assert_eq!(parse_amount("15,000.50"), Decimal::from_str("15000.50").ok());
        assert_eq!(parse_amount(" 1,234,567 "), Decimal::from_str("1234567").ok());
        assert_eq!(parse_amount("0"), Decimal::from_str("0").ok());
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_amount(""), None);
        assert_eq!(parse_amount("   "), None);
        assert_eq!(parse_amount("12a"), None);
    }
}
