//! Log-space arithmetic on importance weights.
//!
//! All weights in this crate are stored as natural logarithms. A weight of
//! zero is represented by `f64::NEG_INFINITY` and is never allowed to turn
//! into `NAN` through arithmetic like `-inf - -inf` or `2 * -inf`.

/// Numerically stable `ln(sum(exp(values)))`.
///
/// Returns `-inf` for an empty slice or if every entry is `-inf`, and
/// `NAN` if any entry is `NAN`.
pub fn log_sum_exp(values: &[f64]) -> f64 {
    if values.iter().any(|v| v.is_nan()) {
        return f64::NAN;
    }
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    if max == f64::INFINITY {
        // exp(inf - inf) would be NAN
        return f64::INFINITY;
    }
    let sum: f64 = values.iter().map(|&v| (v - max).exp()).sum();
    max + sum.ln()
}

/// Normalise log weights so that they sum to one in linear space.
///
/// Entries equal to `-inf` stay `-inf`. If every entry is `-inf` the
/// population is degenerate and the weights are returned unchanged; the
/// driver reports this as [`SmcError::InvalidWeights`](crate::SmcError)
/// when it next tries to resample.
pub fn normalise(log_weights: &[f64]) -> Vec<f64> {
    let finite = finite_weights(log_weights);
    if finite.is_empty() {
        return log_weights.to_vec();
    }
    let norm = log_sum_exp(&finite);
    log_weights
        .iter()
        .map(|&w| {
            if w == f64::NEG_INFINITY {
                w
            } else {
                w - norm
            }
        })
        .collect()
}

/// Logarithm of the effective sample size of a set of log weights.
///
/// The weights do not need to be normalised. Zero weights are ignored,
/// and a population without any non-zero weight has a log-ESS of `-inf`.
pub fn log_ess(log_weights: &[f64]) -> f64 {
    let finite = finite_weights(log_weights);
    if finite.is_empty() {
        return f64::NEG_INFINITY;
    }
    let doubled: Vec<f64> = finite.iter().map(|w| 2. * w).collect();
    2. * log_sum_exp(&finite) - log_sum_exp(&doubled)
}

/// Effective sample size, `exp(log_ess(log_weights))`.
pub fn ess(log_weights: &[f64]) -> f64 {
    log_ess(log_weights).exp()
}

fn finite_weights(log_weights: &[f64]) -> Vec<f64> {
    log_weights
        .iter()
        .copied()
        .filter(|&w| w != f64::NEG_INFINITY)
        .collect()
}
