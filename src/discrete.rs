//! Probability mass functions over a finite list of values.

use std::fmt::Debug;

use rand::Rng;
use rand_distr::{weighted::WeightedAliasIndex, Distribution};

use crate::{
    model::{InitialProposal, Proposal},
    Result, SmcError,
};

/// A discrete distribution given by a list of values and their probabilities.
///
/// Evaluating the distribution at a value it does not know is not an error:
/// the probability is zero and a warning is logged.
pub struct DiscreteDistribution<T> {
    values: Vec<T>,
    pmf: Vec<f64>,
    index: WeightedAliasIndex<f64>,
}

impl<T: PartialEq + Clone + Debug> DiscreteDistribution<T> {
    /// Create a distribution that returns `values[i]` with probability `probs[i]`.
    ///
    /// The probabilities must be non-negative and sum to one within
    /// `sqrt(f64::EPSILON)`.
    pub fn new(values: Vec<T>, probs: Vec<f64>) -> Result<Self> {
        if values.len() != probs.len() {
            return Err(SmcError::InvalidPmf(format!(
                "got {} values but {} probabilities",
                values.len(),
                probs.len()
            )));
        }
        if values.is_empty() {
            return Err(SmcError::InvalidPmf("no values".to_string()));
        }
        if let Some(p) = probs.iter().find(|p| !p.is_finite() || **p < 0.) {
            return Err(SmcError::InvalidPmf(format!("invalid probability {}", p)));
        }
        let total: f64 = probs.iter().sum();
        if (1. - total).abs() >= f64::EPSILON.sqrt() {
            return Err(SmcError::InvalidPmf(format!(
                "probabilities sum to {} instead of one",
                total
            )));
        }
        let index = WeightedAliasIndex::new(probs.clone())
            .map_err(|err| SmcError::InvalidPmf(err.to_string()))?;
        Ok(DiscreteDistribution {
            values,
            pmf: probs,
            index,
        })
    }

    /// Every value has the same probability.
    pub fn uniform(values: Vec<T>) -> Result<Self> {
        let prob = 1. / values.len() as f64;
        let probs = vec![prob; values.len()];
        Self::new(values, probs)
    }

    pub fn values(&self) -> &[T] {
        &self.values
    }

    pub fn probabilities(&self) -> &[f64] {
        &self.pmf
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> T {
        self.values[self.index.sample(rng)].clone()
    }

    /// Probability of `value`, zero if it is not one of the values.
    pub fn prob(&self, value: &T) -> f64 {
        match self.values.iter().position(|v| v == value) {
            Some(i) => self.pmf[i],
            None => {
                log::warn!("Value {:?} not in pmf", value);
                0.
            }
        }
    }

    pub fn log_prob(&self, value: &T) -> f64 {
        self.prob(value).ln()
    }
}

impl<T: Debug> Debug for DiscreteDistribution<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscreteDistribution")
            .field("values", &self.values)
            .field("pmf", &self.pmf)
            .finish()
    }
}

impl<T: PartialEq + Clone + Debug> Proposal<T> for DiscreteDistribution<T> {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> T {
        DiscreteDistribution::sample(self, rng)
    }

    fn eval(&self, x: &T) -> f64 {
        self.log_prob(x)
    }
}

impl<T: PartialEq + Clone + Debug + Sync> InitialProposal<T> for DiscreteDistribution<T> {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> T {
        DiscreteDistribution::sample(self, rng)
    }

    fn eval(&self, x: &T) -> f64 {
        self.log_prob(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use pretty_assertions::assert_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn invalid_pmf() {
        assert!(matches!(
            DiscreteDistribution::new(vec![1, 2], vec![1.]),
            Err(SmcError::InvalidPmf(_))
        ));
        assert!(matches!(
            DiscreteDistribution::new(vec![1, 2], vec![0.5, 0.6]),
            Err(SmcError::InvalidPmf(_))
        ));
        assert!(matches!(
            DiscreteDistribution::new(vec![1, 2], vec![1.5, -0.5]),
            Err(SmcError::InvalidPmf(_))
        ));
        assert!(matches!(
            DiscreteDistribution::<u8>::new(vec![], vec![]),
            Err(SmcError::InvalidPmf(_))
        ));
    }

    #[test]
    fn unknown_value() {
        let dist = DiscreteDistribution::new(vec!["a", "b"], vec![0.25, 0.75]).unwrap();
        assert_eq!(dist.prob(&"b"), 0.75);
        assert_eq!(dist.prob(&"c"), 0.);
        assert_eq!(dist.log_prob(&"c"), f64::NEG_INFINITY);
    }

    #[test]
    fn sample_frequencies() {
        let dist = DiscreteDistribution::new(vec![10, 20, 30], vec![0.2, 0.0, 0.8]).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let draws = 10_000;
        let mut tens = 0;
        for _ in 0..draws {
            let x = dist.sample(&mut rng);
            assert_ne!(x, 20);
            if x == 10 {
                tens += 1;
            }
        }
        assert_abs_diff_eq!(tens as f64 / draws as f64, 0.2, epsilon = 0.02);
    }

    #[test]
    fn uniform() {
        let dist = DiscreteDistribution::uniform(vec!['x', 'y', 'z', 'w']).unwrap();
        assert_abs_diff_eq!(
            InitialProposal::eval(&dist, &'y'),
            0.25f64.ln(),
            epsilon = 1e-12
        );
    }
}
