use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive, Zero};

use crate::error::{QnError, QnResult};

/// Exact arbitrary-precision rational scalar used throughout the solver.
///
/// All recursion arithmetic happens on this type; conversion to `f64` is
/// reserved for the reporting boundary.
pub type Rational = num_rational::BigRational;

/// Exact conversion from an `f64` input value.
///
/// The binary expansion of the float is converted exactly (no decimal
/// re-interpretation), so repeated conversions are deterministic.
pub fn rational_from_f64(value: f64, what: &'static str) -> QnResult<Rational> {
    Rational::from_float(value).ok_or(QnError::NonFinite { what, value })
}

/// Build a rational from an integer numerator/denominator pair.
pub fn rational_from_ratio(numer: i64, denom: i64) -> QnResult<Rational> {
    if denom == 0 {
        return Err(QnError::InvalidArg {
            what: "zero denominator",
        });
    }
    Ok(Rational::new(BigInt::from(numer), BigInt::from(denom)))
}

/// Best-effort `f64` view of a rational, for the reporting boundary only.
pub fn rational_to_f64(value: &Rational) -> f64 {
    value.to_f64().unwrap_or(f64::NAN)
}

/// Render a rational as a truncated decimal string with `digits` fractional
/// digits, e.g. `decimal_string(&(1/3), 4) == "0.3333"`.
pub fn decimal_string(value: &Rational, digits: u32) -> String {
    let sign = if value.is_negative() { "-" } else { "" };
    let numer = value.numer().abs();
    let denom = value.denom().clone();
    let int_part = &numer / &denom;
    if digits == 0 {
        return format!("{sign}{int_part}");
    }
    let rem = &numer - &int_part * &denom;
    let scale = BigInt::from(10u32).pow(digits);
    let frac = (rem * &scale) / &denom;
    let frac_str = frac.to_string();
    let padding = digits as usize - frac_str.len();
    format!("{sign}{int_part}.{}{frac_str}", "0".repeat(padding))
}
