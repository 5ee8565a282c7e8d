//! Best-effort canonicalization of Korean phone numbers and merchant order
//! ids. Normalization is not validation: unrecognized input passes through
//! unchanged so a typo'd number still compares equal to the same typo.

/// Strip non-digits, then re-insert hyphens per Korean numbering patterns.
/// Empty or digit-free input yields an empty string. Never panics.
pub fn normalize_phone(raw: &str) -> String {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();

    if digits.is_empty() {
        return String::new();
    }

    // 11-digit mobile: 010-XXXX-XXXX
    if digits.len() == 11 && digits.starts_with("010") {
        return format!("{}-{}-{}", &digits[..3], &digits[3..7], &digits[7..]);
    }
    // 10-digit legacy mobile prefixes: 011-XXX-XXXX
    if digits.len() == 10
        && ["011", "016", "017", "018", "019"]
            .iter()
            .any(|p| digits.starts_with(p))
    {
        return format!("{}-{}-{}", &digits[..3], &digits[3..6], &digits[6..]);
    }
    // Seoul landline: 02-XXXX-XXXX
    if digits.len() == 10 && digits.starts_with("02") {
        return format!("{}-{}-{}", &digits[..2], &digits[2..6], &digits[6..]);
    }
    // Other 11-digit landline: XXX-XXXX-XXXX
    if digits.len() == 11 {
        return format!("{}-{}-{}", &digits[..3], &digits[3..7], &digits[7..]);
    }

    // Unrecognized pattern, pass through as received.
    raw.to_string()
}

/// Trim whitespace only. Kept apart from phone logic so a future change to
/// merchant order-id formats doesn't touch number handling.
pub fn normalize_order_id(raw: &str) -> String {
    raw.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mobile_010_eleven_digits() {
        assert_eq!(normalize_phone("01012345678"), "010-1234-5678");
        assert_eq!(normalize_phone("010-1234-5678"), "010-1234-5678");
        assert_eq!(normalize_phone("010 1234 5678"), "010-1234-5678");
    }

    #[test]
    fn legacy_mobile_ten_digits() {
        assert_eq!(normalize_phone("0161234567"), "016-123-4567");
        assert_eq!(normalize_phone("0199876543"), "019-987-6543");
    }

    #[test]
    fn seoul_landline() {
        assert_eq!(normalize_phone("0212345678"), "02-1234-5678");
    }

    #[test]
    fn regional_landline_eleven_digits() {
        assert_eq!(normalize_phone("03112345678"), "031-1234-5678");
    }

    #[test]
    fn unrecognized_passes_through() {
        assert_eq!(normalize_phone("12345"), "12345");
        assert_eq!(normalize_phone("+82 10 1234"), "+82 10 1234");
    }

    #[test]
    fn empty_and_digit_free_yield_empty() {
        assert_eq!(normalize_phone(""), "");
        assert_eq!(normalize_phone("n/a"), "");
    }

    #[test]
    fn normalization_is_idempotent() {
        for raw in ["01012345678", "0161234567", "0212345678", "12345", ""] {
            let once = normalize_phone(raw);
            assert_eq!(normalize_phone(&once), once);
        }
    }

    #[test]
    fn order_id_trims_only() {
        assert_eq!(normalize_order_id("  ORD-1 \n"), "ORD-1");
        assert_eq!(normalize_order_id("ORD 1"), "ORD 1");
    }
}
