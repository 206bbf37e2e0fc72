//! Count normalization for K/M-suffixed and comma-grouped numbers.

/// Canonical decimal string for a displayed count.
///
/// `K`/`M` suffixes (either case) scale by 1 000 / 1 000 000 and truncate
/// toward zero; anything else only loses its thousands separators.
///
/// ```
/// use tally_extract::normalize_count;
///
/// assert_eq!(normalize_count("1.2K"), "1200");
/// assert_eq!(normalize_count("3M"), "3000000");
/// assert_eq!(normalize_count("1,234"), "1234");
/// ```
pub fn normalize_count(raw: &str) -> String {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    let (body, scale) = match cleaned.chars().last() {
        Some('K' | 'k') => (&cleaned[..cleaned.len() - 1], 1_000f64),
        Some('M' | 'm') => (&cleaned[..cleaned.len() - 1], 1_000_000f64),
        _ => return cleaned,
    };
    match body.parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 0.0 => format!("{}", (value * scale).trunc() as u64),
        // Callers validate first; keep whatever digits survived.
        _ => {
            let digits: String = body.chars().filter(char::is_ascii_digit).collect();
            if digits.is_empty() { "0".to_string() } else { digits }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thousands_suffix_matches_float_truncation() {
        for (raw, scaled) in [("1.2", 1.2f64), ("15", 15.0), ("2.75", 2.75), ("0.1", 0.1), ("9.99", 9.99)] {
            let expected = ((scaled * 1000.0) as u64).to_string();
            assert_eq!(normalize_count(&format!("{raw}K")), expected, "{raw}K");
            assert_eq!(normalize_count(&format!("{raw}k")), expected, "{raw}k");
        }
    }

    #[test]
    fn millions_suffix() {
        assert_eq!(normalize_count("3M"), "3000000");
        assert_eq!(normalize_count("1.5m"), "1500000");
    }

    #[test]
    fn plain_numbers_lose_separators_only() {
        assert_eq!(normalize_count("1,234"), "1234");
        assert_eq!(normalize_count("1,234,567"), "1234567");
        assert_eq!(normalize_count("42"), "42");
        assert_eq!(normalize_count(" 7 "), "7");
    }

    #[test]
    fn unsuffixed_decimals_are_left_as_shown() {
        assert_eq!(normalize_count("12.5"), "12.5");
        assert_eq!(normalize_count("1,012.5"), "1012.5");
    }

    #[test]
    fn separators_inside_suffixed_values() {
        assert_eq!(normalize_count("1,200K"), "1200000");
    }
}
