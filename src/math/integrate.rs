//! Trapezoidal integration over sampled curves.
//!
//! Both routines integrate `y` with respect to `x` on the sample points as
//! given (no resampling). Unequal spacing is fine; `x` only needs to be
//! aligned index-for-index with `y`.

/// Integral of `y dx` over the whole sample range.
///
/// Returns `None` when fewer than two samples are supplied or the lengths differ.
pub fn trapz(y: &[f64], x: &[f64]) -> Option<f64> {
    if y.len() != x.len() || y.len() < 2 {
        return None;
    }
    let mut total = 0.0;
    for i in 1..y.len() {
        total += 0.5 * (y[i] + y[i - 1]) * (x[i] - x[i - 1]);
    }
    Some(total)
}

/// Running integral of `y dx`, starting at `0.0` on the first sample.
///
/// The output has the same length as the input.
pub fn cumtrapz(y: &[f64], x: &[f64]) -> Option<Vec<f64>> {
    if y.len() != x.len() || y.is_empty() {
        return None;
    }
    let mut out = Vec::with_capacity(y.len());
    let mut acc = 0.0;
    out.push(acc);
    for i in 1..y.len() {
        acc += 0.5 * (y[i] + y[i - 1]) * (x[i] - x[i - 1]);
        out.push(acc);
    }
    Some(out)
}
