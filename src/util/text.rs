use std::str::FromStr;

use anyhow::{anyhow, Result};
use rust_decimal::{Decimal, RoundingStrategy};

/// 交易所以這些字串表示「目前沒有資料」
const UNAVAILABLE: &[&str] = &["", "-", "--"];

/// 判斷欄位是否為交易所的空白佔位字元
pub fn is_unavailable(s: &str) -> bool {
    UNAVAILABLE.contains(&s.trim())
}

/// Parses a decimal value from a given string.
///
/// Only the `,` thousands separator and surrounding whitespace are removed;
/// anything else that is not a number is an error.
///
/// # Example
///
/// ```
/// use twse_quote::util::text::parse_decimal;
///
/// let d = parse_decimal("1,234.56").unwrap();
/// assert_eq!(d.to_string(), "1234.56");
/// assert!(parse_decimal("7 35").is_err());
/// ```
pub fn parse_decimal(s: &str) -> Result<Decimal> {
    let cleaned = strip_thousands_separator(s);
    Decimal::from_str(&cleaned)
        .map_err(|why| anyhow!("Failed to parse '{}' as Decimal because {:?}", cleaned, why))
}

/// Parses an `i64` value from a given string.
///
/// # Example
///
/// ```
/// use twse_quote::util::text::parse_i64;
///
/// assert_eq!(parse_i64("1,234").unwrap(), 1234);
/// ```
pub fn parse_i64(s: &str) -> Result<i64> {
    let cleaned = strip_thousands_separator(s);
    i64::from_str(&cleaned)
        .map_err(|why| anyhow!("Failed to parse '{}' as i64 because: {:?}", cleaned, why))
}

fn strip_thousands_separator(s: &str) -> String {
    s.trim().chars().filter(|c| *c != ',').collect()
}

/// 整數部分每三位加上逗號，例︰1234567.5 => 1,234,567.5
pub fn group_thousands(s: &str) -> String {
    let (sign, unsigned) = match s.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", s),
    };
    let (int_part, frac_part) = match unsigned.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (unsigned, None),
    };

    let digits = int_part.chars().collect::<Vec<_>>();
    let mut grouped = String::with_capacity(s.len() + digits.len() / 3);
    grouped.push_str(sign);
    for (i, c) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(*c);
    }

    if let Some(f) = frac_part {
        grouped.push('.');
        grouped.push_str(f);
    }

    grouped
}

/// 四捨五入到小數第二位後加上千分位，例︰1035.5 => 1,035.50
pub fn format_price(d: Decimal) -> String {
    let rounded = d.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    group_thousands(&format!("{:.2}", rounded))
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    // 注意這個慣用法：在 tests 模組中，從外部範疇匯入所有名字。
    use super::*;

    #[test]
    fn test_parse_decimal() {
        assert_eq!(parse_decimal("735.0000").unwrap(), dec!(735));
        assert_eq!(parse_decimal("1,035.50").unwrap(), dec!(1035.5));
        assert_eq!(parse_decimal(" 18.5 ").unwrap(), dec!(18.5));
        assert!(parse_decimal("abc").is_err());
        assert!(parse_decimal("-").is_err());
        assert!(parse_decimal("7 35").is_err());
        assert!(parse_decimal("735元").is_err());
        assert!(parse_decimal("0.68%").is_err());
    }

    #[test]
    fn test_parse_i64() {
        assert_eq!(parse_i64("35,120").unwrap(), 35120);
        assert!(parse_i64("12.5").is_err());
        assert!(parse_i64("18 342").is_err());
    }

    #[test]
    fn test_is_unavailable() {
        assert!(is_unavailable("-"));
        assert!(is_unavailable(""));
        assert!(is_unavailable("  "));
        assert!(!is_unavailable("0.0000"));
    }

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands("0"), "0");
        assert_eq!(group_thousands("999"), "999");
        assert_eq!(group_thousands("1000"), "1,000");
        assert_eq!(group_thousands("1234567"), "1,234,567");
        assert_eq!(group_thousands("-1234.56"), "-1,234.56");
        assert_eq!(group_thousands("123456.7"), "123,456.7");
    }

    #[test]
    fn test_format_price() {
        assert_eq!(format_price(dec!(735)), "735.00");
        assert_eq!(format_price(dec!(1035.5)), "1,035.50");
        assert_eq!(format_price(dec!(18.125)), "18.13");
        assert_eq!(format_price(dec!(0.6849)), "0.68");
    }
}
