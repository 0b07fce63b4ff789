//! Rupee amounts. Stored and computed as integer paise.

pub const PAISE_PER_RUPEE: i64 = 100;

/// Parses form input such as "1200", "1,200" or "1200.50" into paise.
/// Rejects negatives, more than two decimals and anything non-numeric.
pub fn parse_inr(input: &str) -> Option<i64> {
    let cleaned: String = input
        .trim()
        .trim_start_matches('₹')
        .chars()
        .filter(|c| *c != ',')
        .collect();

    let (whole, fraction) = match cleaned.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (cleaned.as_str(), ""),
    };

    if whole.is_empty() || !whole.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    if fraction.len() > 2 || !fraction.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let rupees: i64 = whole.parse().ok()?;
    let paise: i64 = match fraction.len() {
        0 => 0,
        1 => fraction.parse::<i64>().ok()? * 10,
        _ => fraction.parse().ok()?,
    };

    rupees.checked_mul(PAISE_PER_RUPEE)?.checked_add(paise)
}

/// Formats paise as "₹1,200.00" with Indian digit grouping.
pub fn format_inr(paise: i64) -> String {
    let sign = if paise < 0 { "-" } else { "" };
    let paise = paise.unsigned_abs();
    let rupees = (paise / PAISE_PER_RUPEE as u64).to_string();
    let fraction = paise % PAISE_PER_RUPEE as u64;

    // Last three digits, then groups of two.
    let grouped = if rupees.len() > 3 {
        let (head, tail) = rupees.split_at(rupees.len() - 3);
        let mut groups: Vec<&str> = Vec::new();
        let mut end = head.len();
        while end > 0 {
            let start = end.saturating_sub(2);
            groups.push(&head[start..end]);
            end = start;
        }
        groups.reverse();
        format!("{},{}", groups.join(","), tail)
    } else {
        rupees
    };

    format!("{}₹{}.{:02}", sign, grouped, fraction)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_inr() {
        assert_eq!(parse_inr("1200"), Some(120_000));
        assert_eq!(parse_inr("1,200.5"), Some(120_050));
        assert_eq!(parse_inr("₹99.99"), Some(9_999));
        assert_eq!(parse_inr(" 0 "), Some(0));
    }

    #[test]
    fn test_parse_inr_rejects_garbage() {
        assert_eq!(parse_inr(""), None);
        assert_eq!(parse_inr("-5"), None);
        assert_eq!(parse_inr("12.345"), None);
        assert_eq!(parse_inr("12e3"), None);
        assert_eq!(parse_inr(".50"), None);
    }

    #[test]
    fn test_format_inr_uses_indian_grouping() {
        assert_eq!(format_inr(0), "₹0.00");
        assert_eq!(format_inr(80_000), "₹800.00");
        assert_eq!(format_inr(120_050), "₹1,200.50");
        assert_eq!(format_inr(1_234_567_89), "₹12,34,567.89");
        assert_eq!(format_inr(-50), "-₹0.50");
    }
}
