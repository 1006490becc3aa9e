//! A small discrete domain for tests and benchmarks.
//!
//! Particles are integers in `0..=max` that move by a random walk, and the
//! target is an arbitrary categorical distribution over those integers, so
//! the exact posterior is always known.

use rand::Rng;

use crate::{
    discrete::DiscreteDistribution,
    math::normalise,
    model::{DiscreteVariable, Proposal, Target},
    Result,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Count {
    value: u32,
    max: u32,
}

impl Count {
    pub fn new(value: u32, max: u32) -> Count {
        assert!(value <= max);
        Count { value, max }
    }

    pub fn value(&self) -> u32 {
        self.value
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    fn neighbours(&self) -> Vec<u32> {
        if self.max == 0 {
            return vec![0];
        }
        let mut neighbours = Vec::with_capacity(2);
        if self.value > 0 {
            neighbours.push(self.value - 1);
        }
        if self.value < self.max {
            neighbours.push(self.value + 1);
        }
        neighbours
    }
}

/// Step to one of the neighbouring integers with equal probability.
#[derive(Debug, Clone)]
pub struct RandomWalk {
    from: Count,
    neighbours: Vec<u32>,
}

impl Proposal<Count> for RandomWalk {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Count {
        let i = rng.random_range(0..self.neighbours.len());
        Count::new(self.neighbours[i], self.from.max)
    }

    fn eval(&self, x: &Count) -> f64 {
        if x.max == self.from.max && self.neighbours.contains(&x.value) {
            -(self.neighbours.len() as f64).ln()
        } else {
            f64::NEG_INFINITY
        }
    }
}

impl DiscreteVariable for Count {
    type Proposal = RandomWalk;

    fn proposal(&self) -> RandomWalk {
        RandomWalk {
            from: *self,
            neighbours: self.neighbours(),
        }
    }
}

/// Probability that a [`LazyWalk`] keeps the current value.
pub const STAY_PROBABILITY: f64 = 0.9;

/// A [`Count`] whose proposal is close to the identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LazyCount(pub Count);

impl LazyCount {
    pub fn value(&self) -> u32 {
        self.0.value
    }
}

/// Keep the current value with probability [`STAY_PROBABILITY`], otherwise
/// take a [`RandomWalk`] step.
#[derive(Debug, Clone)]
pub struct LazyWalk {
    from: Count,
    walk: RandomWalk,
}

impl Proposal<LazyCount> for LazyWalk {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> LazyCount {
        if rng.random::<f64>() < STAY_PROBABILITY {
            LazyCount(self.from)
        } else {
            LazyCount(self.walk.sample(rng))
        }
    }

    fn eval(&self, x: &LazyCount) -> f64 {
        let step = (1. - STAY_PROBABILITY) * self.walk.eval(&x.0).exp();
        if x.0 == self.from {
            (STAY_PROBABILITY + step).ln()
        } else {
            step.ln()
        }
    }
}

impl DiscreteVariable for LazyCount {
    type Proposal = LazyWalk;

    fn proposal(&self) -> LazyWalk {
        LazyWalk {
            from: self.0,
            walk: self.0.proposal(),
        }
    }
}

/// Categorical distribution over `0..weights.len()`.
#[derive(Debug, Clone)]
pub struct CategoricalTarget {
    log_pmf: Vec<f64>,
}

impl CategoricalTarget {
    /// The weights do not need to be normalised.
    pub fn new(weights: &[f64]) -> CategoricalTarget {
        assert!(!weights.is_empty());
        let log_weights: Vec<f64> = weights.iter().map(|w| w.ln()).collect();
        CategoricalTarget {
            log_pmf: normalise(&log_weights),
        }
    }

    /// The largest value with (possibly) non-zero probability.
    pub fn max(&self) -> u32 {
        (self.log_pmf.len() - 1) as u32
    }

    pub fn probabilities(&self) -> Vec<f64> {
        self.log_pmf.iter().map(|w| w.exp()).collect()
    }

    pub fn mean(&self) -> f64 {
        self.probabilities()
            .iter()
            .enumerate()
            .map(|(i, p)| i as f64 * p)
            .sum()
    }

    /// Uniform initial proposal over all values of the target.
    pub fn uniform_proposal(&self) -> Result<DiscreteDistribution<Count>> {
        let max = self.max();
        DiscreteDistribution::uniform((0..=max).map(|v| Count::new(v, max)).collect())
    }

    /// Like [`uniform_proposal`](Self::uniform_proposal), for [`LazyCount`].
    pub fn uniform_lazy_proposal(&self) -> Result<DiscreteDistribution<LazyCount>> {
        let max = self.max();
        DiscreteDistribution::uniform(
            (0..=max)
                .map(|v| LazyCount(Count::new(v, max)))
                .collect(),
        )
    }
}

impl Target<Count> for CategoricalTarget {
    fn eval(&self, x: &Count) -> f64 {
        self.log_pmf
            .get(x.value as usize)
            .copied()
            .unwrap_or(f64::NEG_INFINITY)
    }
}

impl Target<LazyCount> for CategoricalTarget {
    fn eval(&self, x: &LazyCount) -> f64 {
        Target::<Count>::eval(self, &x.0)
    }
}

/// Weighted frequency of every value in a population.
pub fn weighted_frequencies(particles: &[Count], log_weights: &[f64], max: u32) -> Vec<f64> {
    let mut freq = vec![0f64; max as usize + 1];
    for (particle, w) in particles.iter().zip(log_weights.iter()) {
        freq[particle.value as usize] += w.exp();
    }
    freq
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use pretty_assertions::assert_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn walk_stays_in_range() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let start = Count::new(0, 3);
        let proposal = start.proposal();
        for _ in 0..10 {
            let x = proposal.sample(&mut rng);
            assert_eq!(x.value(), 1);
            assert_eq!(proposal.eval(&x), 0.);
        }
        let proposal = Count::new(2, 3).proposal();
        assert_abs_diff_eq!(proposal.eval(&Count::new(3, 3)), 0.5f64.ln());
        assert_eq!(proposal.eval(&Count::new(2, 3)), f64::NEG_INFINITY);
    }

    #[test]
    fn lazy_walk_mostly_stays() {
        let proposal = LazyCount(Count::new(2, 3)).proposal();
        assert_abs_diff_eq!(proposal.eval(&LazyCount(Count::new(2, 3))), 0.9f64.ln());
        assert_abs_diff_eq!(
            proposal.eval(&LazyCount(Count::new(1, 3))),
            0.05f64.ln(),
            epsilon = 1e-12
        );
        assert_eq!(proposal.eval(&LazyCount(Count::new(0, 3))), f64::NEG_INFINITY);

        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let draws = 10_000;
        let stays = (0..draws)
            .filter(|_| proposal.sample(&mut rng) == LazyCount(Count::new(2, 3)))
            .count();
        assert_abs_diff_eq!(stays as f64 / draws as f64, 0.9, epsilon = 0.02);
    }

    #[test]
    fn target_is_normalised() {
        let target = CategoricalTarget::new(&[1., 2., 1.]);
        assert_eq!(target.max(), 2);
        assert_abs_diff_eq!(target.eval(&Count::new(1, 2)), 0.5f64.ln(), epsilon = 1e-12);
        assert_eq!(
            target.eval(&LazyCount(Count::new(1, 2))),
            target.eval(&Count::new(1, 2))
        );
        assert_abs_diff_eq!(target.mean(), 1., epsilon = 1e-12);
        assert_eq!(target.eval(&Count::new(5, 5)), f64::NEG_INFINITY);
    }
}
