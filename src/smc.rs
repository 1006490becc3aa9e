use std::marker::PhantomData;

use itertools::izip;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::{
    l_kernel::{ForwardMixtureLKernel, LKernel, PopulationLKernel},
    math::{log_ess, log_sum_exp, normalise},
    model::{DiscreteVariable, InitialProposal, Proposal, Target},
    parallel::{particle_rng, Parallelism},
    resample::{resample, Resampling},
    Result, SmcError,
};

/// Settings for the SMC sampler
#[derive(Debug, Clone, Copy)]
pub struct SmcSettings {
    /// Use a population L-kernel instead of evaluating the backward proposal
    /// of every particle.
    pub use_optimal_l: bool,
    /// Evaluate particles on a thread pool.
    pub parallel: bool,
    /// Size of the thread pool. Defaults to the number of available cores
    /// if `parallel` is set.
    pub num_cores: Option<usize>,
    /// Resample if the effective sample size drops below this fraction of
    /// the population size.
    pub resample_threshold_fraction: f64,
    pub resampling: Resampling,
    /// Seed for [`DiscreteVariableSmc::sample`] and [`DiscreteVariableSmc::run`].
    pub seed: u64,
}

impl Default for SmcSettings {
    fn default() -> Self {
        Self {
            use_optimal_l: false,
            parallel: false,
            num_cores: None,
            resample_threshold_fraction: 0.5,
            resampling: Resampling::Multinomial,
            seed: 0,
        }
    }
}

/// Diagnostics of a single SMC iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
#[non_exhaustive]
pub struct IterationStats {
    pub iteration: usize,
    /// Effective sample size at the start of the iteration.
    pub ess: f64,
    /// Whether the population was resampled before it was evolved.
    pub resampled: bool,
}

/// Called after every iteration.
pub type ProgressCallback = Box<dyn Fn(&IterationStats) + Send + Sync>;

/// The final state of an SMC run.
#[derive(Debug, Clone)]
pub struct Population<X> {
    pub particles: Vec<X>,
    /// Normalised log weights, aligned with `particles`.
    pub log_weights: Vec<f64>,
    pub stats: Vec<IterationStats>,
}

/// Sequential Monte Carlo sampler for discrete variables.
///
/// `K` is the population L-kernel used if `use_optimal_l` is set.
pub struct DiscreteVariableSmc<X, T, I, K = ForwardMixtureLKernel> {
    target: T,
    initial_proposal: I,
    settings: SmcSettings,
    parallelism: Parallelism,
    callback: Option<ProgressCallback>,
    _types: PhantomData<fn() -> (X, K)>,
}

impl<X, T, I> DiscreteVariableSmc<X, T, I>
where
    X: DiscreteVariable,
    T: Target<X>,
    I: InitialProposal<X>,
{
    pub fn new(target: T, initial_proposal: I, settings: SmcSettings) -> Result<Self> {
        let fraction = settings.resample_threshold_fraction;
        if !(0. ..=1.).contains(&fraction) {
            return Err(SmcError::InvalidSettings(format!(
                "resample_threshold_fraction must be in [0, 1], got {}",
                fraction
            )));
        }
        let parallelism = Parallelism::new(settings.parallel, settings.num_cores)?;
        Ok(DiscreteVariableSmc {
            target,
            initial_proposal,
            settings,
            parallelism,
            callback: None,
            _types: PhantomData,
        })
    }
}

impl<X, T, I, K> DiscreteVariableSmc<X, T, I, K>
where
    X: DiscreteVariable,
{
    /// Use a different population L-kernel if `use_optimal_l` is set.
    pub fn with_population_l_kernel<K2: PopulationLKernel<X>>(
        self,
    ) -> DiscreteVariableSmc<X, T, I, K2> {
        DiscreteVariableSmc {
            target: self.target,
            initial_proposal: self.initial_proposal,
            settings: self.settings,
            parallelism: self.parallelism,
            callback: self.callback,
            _types: PhantomData,
        }
    }

    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    pub fn settings(&self) -> &SmcSettings {
        &self.settings
    }

    pub fn parallelism(&self) -> &Parallelism {
        &self.parallelism
    }
}

impl<X, T, I, K> DiscreteVariableSmc<X, T, I, K>
where
    X: DiscreteVariable,
    T: Target<X>,
    I: InitialProposal<X>,
    K: PopulationLKernel<X>,
{
    /// Run `iterations` SMC steps on a population of `size` particles and
    /// return the final particles.
    ///
    /// The final population is resampled once more, so the returned
    /// particles are equally weighted. The random numbers are generated from
    /// `settings.seed`, so repeated calls return the same population.
    pub fn sample(&self, iterations: usize, size: usize) -> Result<Vec<X>> {
        let mut rng = ChaCha8Rng::seed_from_u64(self.settings.seed);
        self.sample_with_rng(iterations, size, &mut rng)
    }

    pub fn sample_with_rng<R: Rng + ?Sized>(
        &self,
        iterations: usize,
        size: usize,
        rng: &mut R,
    ) -> Result<Vec<X>> {
        let population = self.run_with_rng(iterations, size, rng)?;
        let (particles, _) = resample(
            &population.particles,
            &population.log_weights,
            self.settings.resampling,
            rng,
        )?;
        Ok(particles)
    }

    /// Like [`sample`](Self::sample), but return the final population with
    /// its weights instead of resampling it, and the per-iteration
    /// diagnostics.
    pub fn run(&self, iterations: usize, size: usize) -> Result<Population<X>> {
        let mut rng = ChaCha8Rng::seed_from_u64(self.settings.seed);
        self.run_with_rng(iterations, size, &mut rng)
    }

    pub fn run_with_rng<R: Rng + ?Sized>(
        &self,
        iterations: usize,
        size: usize,
        rng: &mut R,
    ) -> Result<Population<X>> {
        if size == 0 {
            return Err(SmcError::EmptyPopulation);
        }

        let (mut particles, mut log_weights) = self.initialize(size, rng);
        check_weights(&log_weights)?;
        let mut stats = Vec::with_capacity(iterations);

        for iteration in 0..iterations {
            let log_neff = log_ess(&log_weights);
            log::info!("Iteration {}: ESS = {}", iteration, log_neff.exp());

            let resampled = needs_resampling(
                log_neff,
                size,
                self.settings.resample_threshold_fraction,
            );
            if resampled {
                log::debug!("Resampling population of {} particles", size);
                (particles, log_weights) =
                    resample(&particles, &log_weights, self.settings.resampling, rng)?;
            }

            let (new_particles, forward_logprob) = self.evolve(&particles, rng);
            let reverse_logprob = self.evaluate_l_kernel(&particles, &new_particles);
            let new_log_weights = self.update_weights(
                &particles,
                &new_particles,
                &log_weights,
                &forward_logprob,
                &reverse_logprob,
            );

            log_weights = normalise(&new_log_weights);
            check_weights(&log_weights)?;
            particles = new_particles;

            let iteration_stats = IterationStats {
                iteration,
                ess: log_neff.exp(),
                resampled,
            };
            if let Some(callback) = &self.callback {
                callback(&iteration_stats);
            }
            stats.push(iteration_stats);
        }

        Ok(Population {
            particles,
            log_weights,
            stats,
        })
    }

    fn initialize<R: Rng + ?Sized>(&self, size: usize, rng: &mut R) -> (Vec<X>, Vec<f64>) {
        let seed = rng.random();
        let initial = &self.initial_proposal;
        let target = &self.target;
        let (particles, log_weights): (Vec<X>, Vec<f64>) = self
            .parallelism
            .map(size, |p| {
                let particle = initial.sample(&mut particle_rng(seed, p));
                let log_weight = initial_weight(target.eval(&particle), initial.eval(&particle));
                (particle, log_weight)
            })
            .into_iter()
            .unzip();
        (particles, normalise(&log_weights))
    }

    /// Propose a new particle for every particle in the population.
    ///
    /// Returns the new particles and the log probability of each move.
    pub(crate) fn evolve<R: Rng + ?Sized>(
        &self,
        particles: &[X],
        rng: &mut R,
    ) -> (Vec<X>, Vec<f64>) {
        let seed = rng.random();
        self.parallelism
            .map(particles.len(), |p| {
                evolve_particle(&particles[p], &mut particle_rng(seed, p))
            })
            .into_iter()
            .unzip()
    }

    pub(crate) fn evaluate_l_kernel(&self, old_particles: &[X], new_particles: &[X]) -> Vec<f64> {
        let kernel: LKernel<X, K> = LKernel::prepare(
            self.settings.use_optimal_l,
            new_particles,
            old_particles,
            &self.parallelism,
        );
        kernel.evaluate_all(old_particles.len(), &self.parallelism)
    }

    pub(crate) fn update_weights(
        &self,
        old_particles: &[X],
        new_particles: &[X],
        log_weights: &[f64],
        forward_logprob: &[f64],
        reverse_logprob: &[f64],
    ) -> Vec<f64> {
        let target = &self.target;
        let (old_target, new_target): (Vec<f64>, Vec<f64>) = self
            .parallelism
            .map(old_particles.len(), |p| {
                (
                    target.eval(&old_particles[p]),
                    target.eval(&new_particles[p]),
                )
            })
            .into_iter()
            .unzip();

        izip!(
            log_weights,
            &old_target,
            &new_target,
            forward_logprob,
            reverse_logprob
        )
        .map(|(&log_weight, &old, &new, &forward, &reverse)| {
            update_weight(log_weight, old, new, forward, reverse)
        })
        .collect()
    }
}

fn evolve_particle<X, R>(particle: &X, rng: &mut R) -> (X, f64)
where
    X: DiscreteVariable,
    R: Rng + ?Sized,
{
    let forward_proposal = particle.proposal();
    let new_particle = forward_proposal.sample(rng);
    let forward_logprob = forward_proposal.eval(&new_particle);
    (new_particle, forward_logprob)
}

fn initial_weight(target_logprob: f64, proposal_logprob: f64) -> f64 {
    if target_logprob == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    target_logprob - proposal_logprob
}

/// The SMC importance weight recursion in log space.
///
/// A particle keeps a weight of zero once it has one, and a move to a
/// particle with zero target density or zero backward probability gets a
/// weight of zero, whatever the other terms are.
pub fn update_weight(
    log_weight: f64,
    old_target: f64,
    new_target: f64,
    forward_logprob: f64,
    reverse_logprob: f64,
) -> f64 {
    if log_weight == f64::NEG_INFINITY
        || new_target == f64::NEG_INFINITY
        || reverse_logprob == f64::NEG_INFINITY
    {
        return f64::NEG_INFINITY;
    }
    new_target - old_target + reverse_logprob - forward_logprob + log_weight
}

/// True if the effective sample size is strictly below
/// `fraction * size`, or if it is `NAN`.
pub fn needs_resampling(log_ess: f64, size: usize, fraction: f64) -> bool {
    log_ess.is_nan() || log_ess < (size as f64 * fraction).ln()
}

/// A `NAN` weight means a target or proposal returned `NAN` (or `+inf`)
/// somewhere upstream. Report it before it spreads through resampling.
fn check_weights(log_weights: &[f64]) -> Result<()> {
    if log_weights.iter().any(|w| w.is_nan()) {
        return Err(SmcError::InvalidWeights {
            sum: log_sum_exp(log_weights).exp(),
        });
    }
    Ok(())
}
