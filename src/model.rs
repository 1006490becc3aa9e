//! Capabilities a discrete variable domain has to provide to be sampled.
//!
//! The sampler never looks inside a particle. Everything it needs to know
//! about a domain (trees, graphs, partitions, ...) is expressed through the
//! traits in this module.

use rand::Rng;

/// A distribution over particles that can be sampled and evaluated.
///
/// Forward proposals are built from the particle they move away from,
/// default backward kernels from the particle they move back from.
pub trait Proposal<X> {
    /// Draw a new particle.
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> X;

    /// Log probability of drawing `x` from this distribution.
    ///
    /// Return `f64::NEG_INFINITY` if `x` can not be proposed.
    fn eval(&self, x: &X) -> f64;
}

/// The distribution the initial population is drawn from.
///
/// Unlike a [`Proposal`] it does not depend on a particle and is shared by
/// all workers, so it has to be `Sync`.
pub trait InitialProposal<X>: Sync {
    /// Draw a particle for the initial population.
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> X;

    /// Log probability of drawing `x` from this distribution.
    fn eval(&self, x: &X) -> f64;
}

/// The distribution we want to sample from.
pub trait Target<X>: Sync {
    /// Unnormalized log density of the posterior at `x`.
    fn eval(&self, x: &X) -> f64;
}

/// A discrete random object with variable structure.
///
/// Particles are moved between workers and copied during resampling, hence
/// the `Clone + Send + Sync` bound. A particle is never mutated in place by
/// the sampler. [`ForwardMixtureLKernel`](crate::ForwardMixtureLKernel)
/// additionally needs `PartialEq` to count duplicate particles.
pub trait DiscreteVariable: Clone + Send + Sync + Sized {
    /// The proposal used to evolve particles.
    type Proposal: Proposal<Self>;

    /// Forward proposal conditioned on this particle.
    fn proposal(&self) -> Self::Proposal;

    /// Backward kernel conditioned on this (new) particle.
    ///
    /// This is only used if the sampler does not use a population L-kernel.
    /// By default the backward kernel is the forward proposal.
    fn l_kernel(&self) -> Self::Proposal {
        self.proposal()
    }
}
