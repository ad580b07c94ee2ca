//! Monetary constants for Litecoin

/// Litoshis per LTC
pub const COIN: u64 = 100_000_000;

/// Maximum supply in litoshis (84M LTC)
pub const MAX_MONEY: u64 = 84_000_000 * COIN;

/// Check if an amount is within the money range
pub const fn is_valid_amount(amount: u64) -> bool {
    amount <= MAX_MONEY
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_amount() {
        assert!(is_valid_amount(0));
        assert!(is_valid_amount(1_000_000));
        assert!(is_valid_amount(MAX_MONEY));
        assert!(!is_valid_amount(MAX_MONEY + 1));
    }
}
