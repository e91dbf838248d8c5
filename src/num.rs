/// Format number in Rust style: `1_000_000`, keep max length of u64, 20 digits.
pub(crate) fn format_pad_u64(n: u64) -> String {
    group_digits(&format!("{:020}", n))
}

/// Format number in Rust style, padded to at least 9 digits.
pub(crate) fn format_pad9_u64(n: u64) -> String {
    group_digits(&format!("{:09}", n))
}

/// Parse a number produced by [`format_pad_u64`].
pub(crate) fn parse_pad_u64(s: &str) -> Option<u64> {
    // 20 digits and 6 separators
    if s.len() != 26 {
        return None;
    }

    let mut n: u64 = 0;
    for (i, c) in s.chars().enumerate() {
        let sep = (s.len() - i) % 4 == 0;
        match (sep, c) {
            (true, '_') => {}
            (false, '0'..='9') => {
                let d = c as u64 - '0' as u64;
                n = n.checked_mul(10)?.checked_add(d)?;
            }
            _ => return None,
        }
    }
    Some(n)
}

/// Insert a '_' before every group of 3 digits, counting from the right.
fn group_digits(digits: &str) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push('_');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::format_pad9_u64;
    use super::format_pad_u64;
    use super::parse_pad_u64;

    #[test]
    fn test_format_pad_u64() {
        assert_eq!(format_pad_u64(u64::MAX), "18_446_744_073_709_551_615");
        assert_eq!(format_pad_u64(3), "00_000_000_000_000_000_003");
        assert_eq!(format_pad_u64(1_200_000), "00_000_000_000_001_200_000");
    }

    #[test]
    fn test_format_pad9_u64() {
        assert_eq!(format_pad9_u64(0), "000_000_000");
        assert_eq!(format_pad9_u64(120_000), "000_120_000");
        assert_eq!(format_pad9_u64(1_234_567_890), "1_234_567_890");
    }

    #[test]
    fn test_parse_pad_u64() {
        assert_eq!(parse_pad_u64("00_000_000_000_000_000_003"), Some(3));
        assert_eq!(
            parse_pad_u64("18_446_744_073_709_551_615"),
            Some(u64::MAX)
        );
        assert_eq!(parse_pad_u64(&format_pad_u64(987_654)), Some(987_654));

        // overflow
        assert_eq!(parse_pad_u64("99_999_999_999_999_999_999"), None);
        // misplaced separator
        assert_eq!(parse_pad_u64("000_000_000_000_000_000_03"), None);
        assert_eq!(parse_pad_u64("00_000_000_000_000_000_0a3"), None);
        assert_eq!(parse_pad_u64("3"), None);
    }
}
