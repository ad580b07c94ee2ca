//! Display formatting for amounts, timestamps and outputs
//!
//! All functions are pure. Amounts are formatted with integer arithmetic so
//! no value ever round-trips through floating point.

use crate::utxo::Utxo;
use crate::{Error, Result};
use chrono::{DateTime, Local};
use mweb_params::{is_valid_amount, COIN};

/// Decimal places of one LTC
pub const DECIMALS: usize = 8;

/// Ticker appended by [`format_ltc`]
pub const TICKER: &str = "LTC";

const ID_EDGE: usize = 7;

/// Litoshis as a fixed 8-decimal string, e.g. `1234500000` -> `"12.34500000"`
pub fn format_amount(litoshis: u64) -> String {
    format!(
        "{}.{:0width$}",
        litoshis / COIN,
        litoshis % COIN,
        width = DECIMALS
    )
}

/// [`format_amount`] followed by the ticker
pub fn format_ltc(litoshis: u64) -> String {
    format!("{} {}", format_amount(litoshis), TICKER)
}

/// Parse a decimal LTC amount into litoshis
pub fn parse_amount(input: &str) -> Result<u64> {
    let input = input.trim();
    let invalid = || Error::InvalidAmount(input.to_string());

    let (whole, fraction) = match input.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (input, ""),
    };
    if whole.is_empty() && fraction.is_empty() {
        return Err(invalid());
    }
    if fraction.len() > DECIMALS
        || !whole.chars().all(|c| c.is_ascii_digit())
        || !fraction.chars().all(|c| c.is_ascii_digit())
    {
        return Err(invalid());
    }

    let whole: u64 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| invalid())?
    };
    let fraction: u64 = if fraction.is_empty() {
        0
    } else {
        format!("{:0<width$}", fraction, width = DECIMALS)
            .parse()
            .map_err(|_| invalid())?
    };

    let litoshis = whole
        .checked_mul(COIN)
        .and_then(|w| w.checked_add(fraction))
        .ok_or_else(invalid)?;
    if !is_valid_amount(litoshis) {
        return Err(invalid());
    }
    Ok(litoshis)
}

/// Epoch seconds as local date/time, `None` when the time is unknown (0)
pub fn format_block_time(epoch_secs: u64) -> Option<String> {
    if epoch_secs == 0 {
        return None;
    }
    let secs = i64::try_from(epoch_secs).ok()?;
    let utc = DateTime::from_timestamp(secs, 0)?;
    Some(
        utc.with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
    )
}

/// Shorten long ids to `first7…last7`
pub fn truncate_output_id(output_id: &str) -> String {
    let count = output_id.chars().count();
    if count <= ID_EDGE * 2 {
        return output_id.to_string();
    }
    let head: String = output_id.chars().take(ID_EDGE).collect();
    let tail: String = output_id.chars().skip(count - ID_EDGE).collect();
    format!("{}…{}", head, tail)
}

/// `Confirmed` or `Pending`
pub fn confirmation_label(utxo: &Utxo) -> &'static str {
    if utxo.is_confirmed() {
        "Confirmed"
    } else {
        "Pending"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(0), "0.00000000");
        assert_eq!(format_amount(1), "0.00000001");
        assert_eq!(format_amount(1_234_500_000), "12.34500000");
        assert_eq!(format_amount(COIN), "1.00000000");
        assert_eq!(format_ltc(50_000_000), "0.50000000 LTC");
    }

    #[test]
    fn test_format_amount_large_values_are_exact() {
        assert_eq!(format_amount(u64::MAX), "184467440737.09551615");
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("12.345").unwrap(), 1_234_500_000);
        assert_eq!(parse_amount("0.00000001").unwrap(), 1);
        assert_eq!(parse_amount("3").unwrap(), 3 * COIN);
        assert_eq!(parse_amount(".5").unwrap(), 50_000_000);
        assert!(parse_amount("").is_err());
        assert!(parse_amount("1.000000001").is_err());
        assert!(parse_amount("-1").is_err());
        assert!(parse_amount("84000001").is_err());
        assert!(matches!(parse_amount("abc"), Err(Error::InvalidAmount(_))));
    }

    #[test]
    fn test_format_block_time() {
        assert_eq!(format_block_time(0), None);
        let formatted = format_block_time(1_700_000_000).unwrap();
        assert!(formatted.starts_with("2023-11-1"));
        assert_eq!(formatted.len(), 19);
    }

    #[test]
    fn test_truncate_output_id() {
        assert_eq!(truncate_output_id("abcdef"), "abcdef");
        assert_eq!(truncate_output_id("0123456789abcd"), "0123456789abcd");
        assert_eq!(
            truncate_output_id("0123456789abcdef0123456789abcdef"),
            "0123456…9abcdef"
        );
    }

    #[test]
    fn test_confirmation_label() {
        let mut utxo = Utxo {
            output_id: "a".into(),
            value: 1,
            address: "addr".into(),
            height: 0,
            block_time: 0,
        };
        assert_eq!(confirmation_label(&utxo), "Pending");
        utxo.height = 10;
        assert_eq!(confirmation_label(&utxo), "Confirmed");
    }
}
