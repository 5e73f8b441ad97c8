//! Fixed-precision helpers for currency amounts.
//!
//! Every monetary value in the engine is a [`Decimal`]. Amounts at rest
//! (debt amounts, remainders, payments) carry exactly two fractional digits;
//! intermediate split computations may carry more precision and are rounded
//! with [`round2`] right before persistence. Equality checks between amounts
//! always go through the [`EPSILON`] tolerance, never `==`.
use rust_decimal::Decimal;

/// Tolerance for "these two amounts are the same money".
pub const EPSILON: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Rounds to 2 decimal places, away from zero on ties (0.005 -> 0.01).
#[must_use]
pub fn round2(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, rust_decimal::RoundingStrategy::MidpointAwayFromZero)
}

/// Returns `true` when the two amounts differ by at most [`EPSILON`].
#[must_use]
pub fn approx_eq(a: Decimal, b: Decimal) -> bool {
    (a - b).abs() <= EPSILON
}

/// Returns `true` when the amount is indistinguishable from zero.
#[must_use]
pub fn is_negligible(amount: Decimal) -> bool {
    amount.abs() <= EPSILON
}
