//! Overflow-checked `Decimal` arithmetic.
//!
//! `Decimal`'s operators panic once a result leaves roughly ±7.9e28. Share
//! counts, prices and quotes are caller input, so every product, quotient or
//! sum that grows with them goes through these helpers and fails with
//! `CoreError::Validation` instead.

use rust_decimal::Decimal;

use crate::errors::CoreError;

pub fn mul(a: Decimal, b: Decimal) -> Result<Decimal, CoreError> {
    a.checked_mul(b)
        .ok_or_else(|| overflow(format!("{a} × {b}")))
}

/// Division; a zero divisor is rejected, never mapped to zero.
pub fn div(a: Decimal, b: Decimal) -> Result<Decimal, CoreError> {
    if b.is_zero() {
        return Err(CoreError::Validation(format!("Division of {a} by zero")));
    }
    a.checked_div(b)
        .ok_or_else(|| overflow(format!("{a} ÷ {b}")))
}

pub fn add(a: Decimal, b: Decimal) -> Result<Decimal, CoreError> {
    a.checked_add(b)
        .ok_or_else(|| overflow(format!("{a} + {b}")))
}

pub fn sub(a: Decimal, b: Decimal) -> Result<Decimal, CoreError> {
    a.checked_sub(b)
        .ok_or_else(|| overflow(format!("{a} − {b}")))
}

pub fn sum<I>(values: I) -> Result<Decimal, CoreError>
where
    I: IntoIterator<Item = Decimal>,
{
    values.into_iter().try_fold(Decimal::ZERO, add)
}

fn overflow(expression: String) -> CoreError {
    CoreError::Validation(format!("Arithmetic overflow: {expression}"))
}
