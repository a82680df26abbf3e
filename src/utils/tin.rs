/// Strip every non-digit character from a TIN.
///
/// The registry stores bare digit strings; forms may submit TINs with
/// dashes or stray whitespace.
pub fn normalize_tin(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Format a digit string in dash-separated groups of three,
/// e.g. "123456789000" -> "123-456-789-000".
pub fn format_tin(raw: &str) -> String {
    let digits = normalize_tin(raw);
    digits
        .as_bytes()
        .chunks(3)
        .map(|chunk| std::str::from_utf8(chunk).unwrap_or_default())
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_dashes_and_spaces() {
        assert_eq!(normalize_tin("123-456-789"), "123456789");
        assert_eq!(normalize_tin(" 123 456 789-000 "), "123456789000");
        assert_eq!(normalize_tin("no digits"), "");
    }

    #[test]
    fn format_groups_in_threes() {
        assert_eq!(format_tin("123456789"), "123-456-789");
        assert_eq!(format_tin("123456789000"), "123-456-789-000");
        assert_eq!(format_tin("12"), "12");
        assert_eq!(format_tin(""), "");
    }

    #[test]
    fn format_then_normalize_is_identity() {
        for digits in ["1", "12", "123", "1234", "123456789", "123456789012345"] {
            assert_eq!(normalize_tin(&format_tin(digits)), digits);
        }
    }
}
