//! Exact currency helpers.
//!
//! All amounts are [`Decimal`] values in currency units with two decimal
//! places of precision. Nothing in the ledger uses binary floating point.

use rust_decimal::{Decimal, RoundingStrategy};

/// Number of decimal places kept for currency amounts.
pub const CURRENCY_SCALE: u32 = 2;

/// Rounds an amount to currency precision (banker's rounding is avoided;
/// halves round away from zero).
#[must_use]
pub fn to_currency(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(CURRENCY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Splits `total` into `parts` currency amounts that sum exactly to the
/// rounded total. Leftover cents go to the first shares.
///
/// Returns an empty vector when `parts` is zero.
#[must_use]
pub fn split_evenly(total: Decimal, parts: u32) -> Vec<Decimal> {
    if parts == 0 {
        return Vec::new();
    }
    let total = to_currency(total);
    let count = Decimal::from(parts);
    let base = (total / count).round_dp_with_strategy(CURRENCY_SCALE, RoundingStrategy::ToZero);
    let cent = Decimal::new(1, CURRENCY_SCALE);
    let step = if total.is_sign_negative() { -cent } else { cent };

    let mut leftover = total - base * count;
    (0..parts)
        .map(|_| {
            if leftover.is_zero() {
                base
            } else {
                leftover -= step;
                base + step
            }
        })
        .collect()
}
