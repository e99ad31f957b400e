//! Amount helpers for ledger arithmetic.
//!
//! CRITICAL: Never use floating-point for money calculations.
//! Every amount in the ledger is a `rust_decimal::Decimal`, and balance
//! comparisons go through the fixed tolerance below instead of exact equality.

use rust_decimal::Decimal;

/// Largest difference (one cent) treated as "balanced" when comparing amounts.
pub const BALANCE_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Returns true if `a` and `b` differ by no more than [`BALANCE_TOLERANCE`].
#[must_use]
pub fn within_tolerance(a: Decimal, b: Decimal) -> bool {
    (a - b).abs() <= BALANCE_TOLERANCE
}

/// Returns true if `amount` is zero within [`BALANCE_TOLERANCE`].
#[must_use]
pub fn is_negligible(amount: Decimal) -> bool {
    amount.abs() <= BALANCE_TOLERANCE
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    #[test]
    fn test_tolerance_is_one_cent() {
        assert_eq!(BALANCE_TOLERANCE, dec!(0.01));
    }

    #[rstest]
    #[case(dec!(100.00), dec!(100.00), true)]
    #[case(dec!(100.00), dec!(100.01), true)]
    #[case(dec!(100.01), dec!(100.00), true)]
    #[case(dec!(100.00), dec!(100.011), false)]
    #[case(dec!(1000000), dec!(900000), false)]
    #[case(dec!(-0.005), dec!(0.005), true)]
    fn test_within_tolerance(#[case] a: Decimal, #[case] b: Decimal, #[case] expected: bool) {
        assert_eq!(within_tolerance(a, b), expected);
    }

    #[rstest]
    #[case(dec!(0), true)]
    #[case(dec!(0.01), true)]
    #[case(dec!(-0.01), true)]
    #[case(dec!(0.02), false)]
    #[case(dec!(-5000000), false)]
    fn test_is_negligible(#[case] amount: Decimal, #[case] expected: bool) {
        assert_eq!(is_negligible(amount), expected);
    }
}
