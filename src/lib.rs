//! Sequential Monte Carlo sampling of discrete random objects.
//!
//! The objects being sampled (decision trees, graphs, partitions, ...) can
//! have variable structure. The crate only knows them through the traits
//! [`DiscreteVariable`], [`Proposal`], [`Target`] and [`InitialProposal`]: a
//! domain supplies a forward proposal for each particle, a target density
//! and an initial proposal, and
//! [`DiscreteVariableSmc`] evolves, reweights and resamples a population of
//! particles that approximates the target.
//!
//! All weights are kept in log space. Sampling is reproducible for a fixed
//! seed, and does not depend on whether particles are evaluated on a thread
//! pool or not.

pub(crate) mod discrete;
pub(crate) mod error;
pub(crate) mod l_kernel;
pub(crate) mod math;
pub(crate) mod model;
pub(crate) mod parallel;
pub(crate) mod resample;
pub(crate) mod smc;
pub mod test_models;

pub use discrete::DiscreteDistribution;
pub use error::{Result, SmcError};
pub use l_kernel::{ForwardMixtureLKernel, PopulationLKernel};
pub use math::{ess, log_ess, log_sum_exp, normalise};
pub use model::{DiscreteVariable, InitialProposal, Proposal, Target};
pub use parallel::Parallelism;
pub use resample::{resample, Resampling};
pub use smc::{
    needs_resampling, update_weight, DiscreteVariableSmc, IterationStats, Population,
    ProgressCallback, SmcSettings,
};
