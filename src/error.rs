use thiserror::Error;

/// Errors that abort a call into the sampler.
#[derive(Error, Debug)]
pub enum SmcError {
    /// The normalised weights did not sum to one right before resampling.
    ///
    /// This means some target or proposal evaluation produced a non-finite
    /// value, or every particle ended up with zero weight.
    #[error("Weights do not sum to one, sum = {sum}")]
    InvalidWeights { sum: f64 },
    #[error("Got {particles} particles but {weights} weights")]
    LengthMismatch { particles: usize, weights: usize },
    #[error("Population size must be at least one")]
    EmptyPopulation,
    #[error("Invalid PMF specified: {0}")]
    InvalidPmf(String),
    #[error("Invalid sampler settings: {0}")]
    InvalidSettings(String),
    #[error("Could not start thread pool")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl SmcError {
    /// True if sampling failed because the weights collapsed numerically,
    /// as opposed to the sampler being used incorrectly.
    pub fn is_numerical_collapse(&self) -> bool {
        matches!(self, SmcError::InvalidWeights { .. })
    }
}

pub type Result<T> = std::result::Result<T, SmcError>;
