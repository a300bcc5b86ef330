use num_bigint::BigUint;
use num_traits::{ToPrimitive, Zero};

/// Exact binomial coefficients for n <= 8, indexed as `SMALL_COMBINATIONS[n][k]`.
///
/// A box is bounded by a witness and a witness sees at most 8 cells, so this
/// table covers every per-box distribution the counting engine performs.
pub(crate) const SMALL_COMBINATIONS: [[u64; 9]; 9] = [
    [1, 0, 0, 0, 0, 0, 0, 0, 0],
    [1, 1, 0, 0, 0, 0, 0, 0, 0],
    [1, 2, 1, 0, 0, 0, 0, 0, 0],
    [1, 3, 3, 1, 0, 0, 0, 0, 0],
    [1, 4, 6, 4, 1, 0, 0, 0, 0],
    [1, 5, 10, 10, 5, 1, 0, 0, 0],
    [1, 6, 15, 20, 15, 6, 1, 0, 0],
    [1, 7, 21, 35, 35, 21, 7, 1, 0],
    [1, 8, 28, 56, 70, 56, 28, 8, 1],
];

/// nCk as an exact big integer.
pub(crate) fn binomial(n: usize, k: usize) -> BigUint {
    if k > n {
        return BigUint::zero();
    }
    if n <= 8 {
        return BigUint::from(SMALL_COMBINATIONS[n][k]);
    }
    let k = k.min(n - k);
    let mut result = BigUint::from(1_u32);
    for i in 0..k {
        result *= BigUint::from(n - i);
        result /= BigUint::from(i + 1);
    }
    result
}

/// `numerator / denominator` as an `f64`, robust to operands far beyond
/// `f64`'s exponent range.
///
/// Both operands are shifted down together until they fit comfortably in a
/// double, so the quotient keeps ~52 bits of precision.
pub(crate) fn big_ratio(numerator: &BigUint, denominator: &BigUint) -> f64 {
    if denominator.is_zero() {
        return 0.0;
    }
    let bits = numerator.bits().max(denominator.bits());
    if bits <= 512 {
        let n = numerator.to_f64().unwrap_or(f64::MAX);
        let d = denominator.to_f64().unwrap_or(f64::MAX);
        return n / d;
    }
    let shift = bits - 512;
    let n = (numerator >> shift).to_f64().unwrap_or(f64::MAX);
    let d = (denominator >> shift).to_f64().unwrap_or(f64::MAX);
    if d == 0.0 {
        0.0
    } else {
        n / d
    }
}
