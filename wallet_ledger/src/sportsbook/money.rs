//! Minor-unit conversion at the sportsbook wire boundary.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

/// Minor units per currency unit
pub const MINOR_SCALE: u32 = 2;

/// Integer minor units to a decimal amount
pub fn from_minor(minor: i64) -> Decimal {
    Decimal::new(minor, MINOR_SCALE)
}

/// Decimal amount to integer minor units, rounding half away from zero
pub fn to_minor(amount: Decimal) -> Option<i64> {
    amount
        .round_dp_with_strategy(MINOR_SCALE, rust_decimal::RoundingStrategy::MidpointAwayFromZero)
        .checked_mul(Decimal::from(10_i64.pow(MINOR_SCALE)))?
        .to_i64()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_minor() {
        assert_eq!(from_minor(2000), Decimal::from(20));
        assert_eq!(from_minor(1), Decimal::new(1, 2));
    }

    #[test]
    fn test_to_minor() {
        assert_eq!(to_minor(Decimal::new(6000, 2)), Some(6000));
        assert_eq!(to_minor(Decimal::from(450)), Some(45000));
        assert_eq!(to_minor(Decimal::new(1005, 3)), Some(101));
    }
}
