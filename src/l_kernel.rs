//! Backward (L-) kernels used to correct for the forward proposal.
//!
//! There are two shapes of L-kernel. The default one is built independently
//! for every particle from its new value. A population kernel is built once
//! from the whole old and new population and then queried per particle.
//! Both are used through [`LKernel`]: `prepare` once per iteration, then
//! `evaluate` for every particle index.

use crate::{
    math::log_sum_exp,
    model::{DiscreteVariable, Proposal},
    parallel::Parallelism,
};

/// An L-kernel that needs to see the whole population before it can be
/// evaluated.
pub trait PopulationLKernel<X>: Send + Sync + Sized {
    /// Build the kernel for the move `old_particles[i] -> new_particles[i]`.
    ///
    /// This is a barrier: no particle is evaluated before it returns. It may
    /// use `parallelism` to spread its own work.
    fn build(new_particles: &[X], old_particles: &[X], parallelism: &Parallelism) -> Self;

    /// Log probability of moving from `new_particles[index]` back to
    /// `old_particles[index]`.
    fn eval(&self, index: usize) -> f64;
}

/// Population approximation of the optimal L-kernel.
///
/// The old population is used as an empirical approximation of the
/// distribution the old particles were drawn from. The backward probability
/// of particle `p` is the probability that its new value was proposed from
/// its own old value, relative to being proposed from any old particle:
///
/// `L(old_p | new_p) = n(old_p) q(new_p | old_p) / sum_j q(new_p | old_j)`
///
/// where `n(old_p)` counts the old particles equal to `old_p`, so that the
/// kernel is normalised over distinct values.
#[derive(Debug, Clone)]
pub struct ForwardMixtureLKernel {
    // log_forward[p][j] = log q(new_p | old_j)
    log_forward: Vec<Vec<f64>>,
    log_multiplicity: Vec<f64>,
}

impl<X> PopulationLKernel<X> for ForwardMixtureLKernel
where
    X: DiscreteVariable + PartialEq,
    X::Proposal: Send + Sync,
{
    fn build(new_particles: &[X], old_particles: &[X], parallelism: &Parallelism) -> Self {
        // One forward proposal per old particle, shared by all rows
        let proposals: Vec<X::Proposal> =
            parallelism.map(old_particles.len(), |j| old_particles[j].proposal());
        let log_forward: Vec<Vec<f64>> = parallelism.map(new_particles.len(), |p| {
            proposals
                .iter()
                .map(|proposal| proposal.eval(&new_particles[p]))
                .collect()
        });
        let log_multiplicity = parallelism.map(old_particles.len(), |p| {
            let count = old_particles
                .iter()
                .filter(|&old| *old == old_particles[p])
                .count();
            (count as f64).ln()
        });
        ForwardMixtureLKernel {
            log_forward,
            log_multiplicity,
        }
    }

    fn eval(&self, index: usize) -> f64 {
        let row = &self.log_forward[index];
        let own = row[index];
        if own == f64::NEG_INFINITY {
            return own;
        }
        self.log_multiplicity[index] + own - log_sum_exp(row)
    }
}

/// An L-kernel prepared for one iteration.
pub(crate) enum LKernel<'a, X, K> {
    PerParticle { new: &'a [X], old: &'a [X] },
    Population(K),
}

impl<'a, X, K> LKernel<'a, X, K>
where
    X: DiscreteVariable,
    K: PopulationLKernel<X>,
{
    pub(crate) fn prepare(
        use_population: bool,
        new: &'a [X],
        old: &'a [X],
        parallelism: &Parallelism,
    ) -> Self {
        debug_assert_eq!(new.len(), old.len());
        if use_population {
            LKernel::Population(K::build(new, old, parallelism))
        } else {
            LKernel::PerParticle { new, old }
        }
    }

    pub(crate) fn evaluate(&self, index: usize) -> f64 {
        match self {
            LKernel::PerParticle { new, old } => new[index].l_kernel().eval(&old[index]),
            LKernel::Population(kernel) => kernel.eval(index),
        }
    }

    /// Reverse log probabilities for the whole population.
    pub(crate) fn evaluate_all(&self, size: usize, parallelism: &Parallelism) -> Vec<f64> {
        parallelism.map(size, |p| self.evaluate(p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_models::Count;
    use approx::assert_abs_diff_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counts(values: &[u32]) -> Vec<Count> {
        values.iter().map(|&v| Count::new(v, 10)).collect()
    }

    #[test]
    fn per_particle_uses_backward_proposal() {
        let old = counts(&[3, 3, 5]);
        let new = counts(&[4, 2, 6]);
        let kernel: LKernel<_, ForwardMixtureLKernel> =
            LKernel::prepare(false, &new, &old, &Parallelism::sequential());
        for p in 0..3 {
            assert_eq!(kernel.evaluate(p), new[p].l_kernel().eval(&old[p]));
        }
    }

    #[test]
    fn mixture_with_identical_old_particles() {
        let old = counts(&[4, 4, 4, 4]);
        let new = counts(&[3, 5, 3, 5]);
        let kernel: LKernel<_, ForwardMixtureLKernel> =
            LKernel::prepare(true, &new, &old, &Parallelism::sequential());
        let reverse = kernel.evaluate_all(4, &Parallelism::sequential());
        for r in reverse {
            // There is only one place to go back to
            assert_abs_diff_eq!(r, 0., epsilon = 1e-12);
        }
    }

    #[test]
    fn mixture_counts_duplicates() {
        let old = counts(&[2, 2, 4]);
        let new = counts(&[3, 1, 3]);
        let kernel = <ForwardMixtureLKernel as PopulationLKernel<Count>>::build(
            &new,
            &old,
            &Parallelism::sequential(),
        );
        let back_to_two = PopulationLKernel::<Count>::eval(&kernel, 0);
        let back_to_four = PopulationLKernel::<Count>::eval(&kernel, 2);
        assert_abs_diff_eq!(back_to_two, (2f64 / 3.).ln(), epsilon = 1e-12);
        assert_abs_diff_eq!(back_to_four, (1f64 / 3.).ln(), epsilon = 1e-12);
        assert_abs_diff_eq!(back_to_two.exp() + back_to_four.exp(), 1., epsilon = 1e-12);
    }

    #[test]
    fn mixture_is_a_probability() {
        let old = counts(&[1, 4, 7, 8]);
        let new = counts(&[2, 5, 6, 9]);
        let kernel = <ForwardMixtureLKernel as PopulationLKernel<Count>>::build(
            &new,
            &old,
            &Parallelism::new(true, Some(2)).unwrap(),
        );
        for p in 0..4 {
            let r = PopulationLKernel::<Count>::eval(&kernel, p);
            assert!(r <= 0.);
            assert!(r.is_finite());
        }
    }

    static PROPOSALS_BUILT: AtomicUsize = AtomicUsize::new(0);

    /// Particle that counts how often its proposal is constructed.
    #[derive(Debug, Clone, PartialEq)]
    struct Tracked(u32);

    struct Stay(u32);

    impl Proposal<Tracked> for Stay {
        fn sample<R: rand::Rng + ?Sized>(&self, _rng: &mut R) -> Tracked {
            Tracked(self.0)
        }

        fn eval(&self, x: &Tracked) -> f64 {
            if x.0 == self.0 {
                0.
            } else {
                f64::NEG_INFINITY
            }
        }
    }

    impl DiscreteVariable for Tracked {
        type Proposal = Stay;

        fn proposal(&self) -> Stay {
            PROPOSALS_BUILT.fetch_add(1, Ordering::SeqCst);
            Stay(self.0)
        }
    }

    #[test]
    fn mixture_builds_one_proposal_per_old_particle() {
        let old: Vec<Tracked> = [1, 1, 2, 3, 3].into_iter().map(Tracked).collect();
        let new = old.clone();
        PROPOSALS_BUILT.store(0, Ordering::SeqCst);
        let kernel = <ForwardMixtureLKernel as PopulationLKernel<Tracked>>::build(
            &new,
            &old,
            &Parallelism::new(true, Some(2)).unwrap(),
        );
        assert_eq!(PROPOSALS_BUILT.load(Ordering::SeqCst), old.len());
        for p in 0..old.len() {
            // Staying is the only move, so going back is certain
            assert_abs_diff_eq!(
                PopulationLKernel::<Tracked>::eval(&kernel, p),
                0.,
                epsilon = 1e-12
            );
        }
    }

    #[test]
    fn mixture_unreachable_move() {
        let old = counts(&[1, 8]);
        // 8 can not reach 1 in one step
        let new = counts(&[2, 1]);
        let kernel = <ForwardMixtureLKernel as PopulationLKernel<Count>>::build(
            &new,
            &old,
            &Parallelism::sequential(),
        );
        assert_eq!(
            PopulationLKernel::<Count>::eval(&kernel, 1),
            f64::NEG_INFINITY
        );
    }
}
