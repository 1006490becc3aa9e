//! Resampling of weighted populations.
//!
//! All schemes select particle `i` with probability proportional to
//! `exp(log_weights[i])` and return a uniformly weighted population of the
//! same size.

use rand::{
    distr::{weighted::WeightedIndex, Distribution},
    Rng,
};

use crate::{math::log_sum_exp, Result, SmcError};

/// Which resampling algorithm to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Resampling {
    /// Draw every index independently with replacement.
    #[default]
    Multinomial,
    /// One uniform offset, then evenly spaced points through the CDF.
    Systematic,
    /// Deterministic `floor(P * w)` copies, multinomial draws for the rest.
    Residual,
}

/// Draw a new, uniformly weighted population from `particles`.
///
/// `log_weights` must be normalised: if they do not sum to one within
/// `sqrt(f64::EPSILON)` this returns [`SmcError::InvalidWeights`].
pub fn resample<X, R>(
    particles: &[X],
    log_weights: &[f64],
    scheme: Resampling,
    rng: &mut R,
) -> Result<(Vec<X>, Vec<f64>)>
where
    X: Clone,
    R: Rng + ?Sized,
{
    if particles.len() != log_weights.len() {
        return Err(SmcError::LengthMismatch {
            particles: particles.len(),
            weights: log_weights.len(),
        });
    }
    if particles.is_empty() {
        return Err(SmcError::EmptyPopulation);
    }

    let sum = log_sum_exp(log_weights).exp();
    // Also catches NAN
    if !((sum - 1.).abs() < f64::EPSILON.sqrt()) {
        return Err(SmcError::InvalidWeights { sum });
    }

    let weights: Vec<f64> = log_weights.iter().map(|w| w.exp()).collect();
    let indices = match scheme {
        Resampling::Multinomial => multinomial(&weights, particles.len(), rng),
        Resampling::Systematic => Ok(systematic(&weights, rng)),
        Resampling::Residual => residual(&weights, rng),
    }
    .map_err(|_| SmcError::InvalidWeights { sum })?;

    let size = particles.len();
    let new_particles = indices.into_iter().map(|i| particles[i].clone()).collect();
    let new_log_weights = vec![-(size as f64).ln(); size];
    Ok((new_particles, new_log_weights))
}

fn multinomial<R: Rng + ?Sized>(
    weights: &[f64],
    count: usize,
    rng: &mut R,
) -> std::result::Result<Vec<usize>, rand::distr::weighted::Error> {
    let dist = WeightedIndex::new(weights)?;
    Ok((0..count).map(|_| dist.sample(rng)).collect())
}

fn systematic<R: Rng + ?Sized>(weights: &[f64], rng: &mut R) -> Vec<usize> {
    let size = weights.len();
    let step = 1. / size as f64;
    let mut point = rng.random::<f64>() * step;

    let mut indices = Vec::with_capacity(size);
    let mut cumulative = weights[0];
    let mut current = 0;
    for _ in 0..size {
        while cumulative < point && current < size - 1 {
            current += 1;
            cumulative += weights[current];
        }
        indices.push(current);
        point += step;
    }
    indices
}

/// Number of deterministic copies of each particle in residual resampling.
pub(crate) fn number_of_copies(weights: &[f64]) -> Vec<usize> {
    let size = weights.len() as f64;
    weights.iter().map(|w| (size * w).floor() as usize).collect()
}

fn residual<R: Rng + ?Sized>(
    weights: &[f64],
    rng: &mut R,
) -> std::result::Result<Vec<usize>, rand::distr::weighted::Error> {
    let size = weights.len();
    let copies = number_of_copies(weights);

    let mut indices = Vec::with_capacity(size);
    for (i, &count) in copies.iter().enumerate() {
        indices.extend(std::iter::repeat(i).take(count));
    }
    // Rounding can push the deterministic part one or two copies over
    indices.truncate(size);

    let remaining = size - indices.len();
    if remaining > 0 {
        let residuals: Vec<f64> = weights
            .iter()
            .zip(copies.iter())
            .map(|(w, &count)| (size as f64 * w - count as f64).max(0.))
            .collect();
        let extra = match multinomial(&residuals, remaining, rng) {
            Ok(extra) => extra,
            // All residuals rounded to zero
            Err(_) => multinomial(weights, remaining, rng)?,
        };
        indices.extend(extra);
    }
    Ok(indices)
}
