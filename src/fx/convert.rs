use rust_decimal::Decimal;

use crate::models::Currency;

/// Convert a monetary amount between currencies using a single spot rate
/// (ARS per USD).
///
/// Holds no state and performs no I/O; the rate is supplied by the caller.
/// A non-positive rate leaves the value unchanged rather than dividing by
/// zero; callers always have the fallback rate available, so this only
/// guards against a broken upstream value.
pub fn convert(value: Decimal, from: Currency, to: Currency, rate: Decimal) -> Decimal {
    if from == to {
        return value;
    }
    if rate <= Decimal::ZERO {
        return value;
    }
    match (from, to) {
        (Currency::Ars, Currency::Usd) => value / rate,
        (Currency::Usd, Currency::Ars) => value * rate,
        // Identical pairs are handled above; any future pair without a
        // defined conversion path passes through unchanged by policy.
        _ => value,
    }
}
