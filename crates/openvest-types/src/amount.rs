//! Quantity arithmetic.
//!
//! Token amounts and payments are `Decimal` values restricted to
//! non-negative integers (base units). Every product or quotient goes through
//! the checked helpers below so that overflow is an error and division always
//! truncates toward zero, identically on every host.

use rust_decimal::Decimal;

use crate::{OpenvestError, Result, constants::BPS_DENOMINATOR};

/// Reject negative or fractional quantities.
///
/// # Errors
/// Returns `InvalidParameter` naming `what`.
pub fn ensure_quantity(amount: Decimal, what: &str) -> Result<()> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(OpenvestError::invalid(format!("{what} must not be negative")));
    }
    if !amount.fract().is_zero() {
        return Err(OpenvestError::invalid(format!(
            "{what} must be a whole number of base units"
        )));
    }
    Ok(())
}

/// Reject zero, negative, or fractional quantities.
///
/// # Errors
/// Returns `InvalidParameter` naming `what`.
pub fn ensure_positive(amount: Decimal, what: &str) -> Result<()> {
    ensure_quantity(amount, what)?;
    if amount.is_zero() {
        return Err(OpenvestError::invalid(format!("{what} must be non-zero")));
    }
    Ok(())
}

/// Reject a basis-point value above 100%.
///
/// # Errors
/// Returns `InvalidParameter` naming `what`.
pub fn ensure_bps(bps: u32, what: &str) -> Result<()> {
    if bps > BPS_DENOMINATOR {
        return Err(OpenvestError::invalid(format!(
            "{what} must be within [0, {BPS_DENOMINATOR}], got {bps}"
        )));
    }
    Ok(())
}

/// `floor(a * b / divisor)` over whole numbers.
///
/// The quotient is computed as `(p - p % divisor) / divisor`, which is exact,
/// so the result never rounds up even when it needs every digit of precision.
///
/// # Errors
/// `ArithmeticOverflow` on overflow, `InvalidParameter` if `divisor` is zero.
pub fn mul_div(a: Decimal, b: Decimal, divisor: Decimal) -> Result<Decimal> {
    if divisor.is_zero() {
        return Err(OpenvestError::invalid("division by zero"));
    }
    let product = a.checked_mul(b).ok_or(OpenvestError::ArithmeticOverflow)?;
    let rem = product
        .checked_rem(divisor)
        .ok_or(OpenvestError::ArithmeticOverflow)?;
    let quotient = (product - rem)
        .checked_div(divisor)
        .ok_or(OpenvestError::ArithmeticOverflow)?;
    Ok(quotient.trunc())
}

/// `floor(amount * bps / 10000)`.
///
/// # Errors
/// `ArithmeticOverflow` if the product does not fit.
pub fn mul_bps(amount: Decimal, bps: u32) -> Result<Decimal> {
    mul_div(
        amount,
        Decimal::from(bps),
        Decimal::from(BPS_DENOMINATOR),
    )
}

/// Checked addition.
///
/// # Errors
/// `ArithmeticOverflow` if the sum does not fit.
pub fn checked_add(a: Decimal, b: Decimal) -> Result<Decimal> {
    a.checked_add(b).ok_or(OpenvestError::ArithmeticOverflow)
}

/// Checked sum of a sequence of quantities.
///
/// # Errors
/// `ArithmeticOverflow` if the sum does not fit.
pub fn checked_sum<'a>(amounts: impl IntoIterator<Item = &'a Decimal>) -> Result<Decimal> {
    amounts
        .into_iter()
        .try_fold(Decimal::ZERO, |acc, a| checked_add(acc, *a))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(n: i64) -> Decimal {
        Decimal::new(n, 0)
    }

    #[test]
    fn quantity_rules() {
        assert!(ensure_quantity(dec(0), "amount").is_ok());
        assert!(ensure_quantity(dec(-1), "amount").is_err());
        assert!(ensure_quantity(Decimal::new(15, 1), "amount").is_err());
        assert!(ensure_positive(dec(0), "amount").is_err());
        assert!(ensure_positive(dec(1), "amount").is_ok());
    }

    #[test]
    fn bps_bounds() {
        assert!(ensure_bps(0, "fee").is_ok());
        assert!(ensure_bps(10_000, "fee").is_ok());
        assert!(ensure_bps(10_001, "fee").is_err());
    }

    #[test]
    fn mul_bps_truncates() {
        assert_eq!(mul_bps(dec(10_000), 2_000).unwrap(), dec(2_000));
        // 3 * 3333 / 10000 = 0.9999 → 0
        assert_eq!(mul_bps(dec(3), 3_333).unwrap(), dec(0));
        assert_eq!(mul_bps(dec(999), 250).unwrap(), dec(24));
    }

    #[test]
    fn mul_div_exact_near_precision_limit() {
        // A quotient with 28 integer digits and a .666… tail must floor, not round.
        let big = Decimal::from_str_exact("20000000000000000000000000000").unwrap();
        let q = mul_div(big, dec(1), dec(3)).unwrap();
        assert_eq!(q, Decimal::from_str_exact("6666666666666666666666666666").unwrap());
        assert!(q.fract().is_zero());
    }

    #[test]
    fn mul_div_overflow_and_zero_divisor() {
        assert_eq!(
            mul_div(Decimal::MAX, dec(2), dec(1)).unwrap_err(),
            OpenvestError::ArithmeticOverflow
        );
        assert!(matches!(
            mul_div(dec(1), dec(1), dec(0)).unwrap_err(),
            OpenvestError::InvalidParameter { .. }
        ));
    }

    #[test]
    fn checked_sum_detects_overflow() {
        assert_eq!(checked_sum(&[dec(1), dec(2), dec(3)]).unwrap(), dec(6));
        assert!(checked_sum(&[Decimal::MAX, dec(1)]).is_err());
    }
}
