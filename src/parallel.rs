use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::{prelude::*, ThreadPool, ThreadPoolBuilder};

use crate::{Result, SmcError};

/// How per-particle work is scheduled.
///
/// This only changes how fast a run is, never its result: every
/// particle draws from its own random stream, so a sequential and a
/// parallel run with the same seed produce the same population.
#[derive(Debug)]
pub struct Parallelism {
    pool: Option<ThreadPool>,
    num_cores: usize,
}

impl Parallelism {
    /// Run everything on the calling thread.
    pub fn sequential() -> Self {
        Parallelism {
            pool: None,
            num_cores: 1,
        }
    }

    /// Resolve the `parallel` and `num_cores` settings.
    ///
    /// If `parallel` is set but `num_cores` is not, all available cores
    /// are used and a warning is logged.
    pub fn new(parallel: bool, num_cores: Option<usize>) -> Result<Self> {
        if !parallel {
            return Ok(Self::sequential());
        }
        let num_cores = match num_cores {
            Some(0) => {
                return Err(SmcError::InvalidSettings(
                    "num_cores must be at least one".to_string(),
                ))
            }
            Some(num_cores) => num_cores,
            None => {
                let num_cores = std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(1);
                log::warn!(
                    "`parallel` is set but `num_cores` is not; setting `num_cores = {}`",
                    num_cores
                );
                num_cores
            }
        };
        let pool = ThreadPoolBuilder::new()
            .num_threads(num_cores)
            .thread_name(|i| format!("smc-worker-{}", i))
            .build()?;
        Ok(Parallelism {
            pool: Some(pool),
            num_cores,
        })
    }

    pub fn is_parallel(&self) -> bool {
        self.pool.is_some()
    }

    pub fn num_cores(&self) -> usize {
        self.num_cores
    }

    /// Evaluate `func` for every index in `0..len`, in parallel if a
    /// thread pool is configured. The output is ordered by index.
    pub fn map<T, F>(&self, len: usize, func: F) -> Vec<T>
    where
        T: Send,
        F: Fn(usize) -> T + Send + Sync,
    {
        match &self.pool {
            Some(pool) => pool.install(|| (0..len).into_par_iter().map(func).collect()),
            None => (0..len).map(func).collect(),
        }
    }
}

/// Random number generator for the work on particle `index`.
///
/// All particles of one batch share the seed and use different streams.
pub(crate) fn particle_rng(seed: u64, index: usize) -> ChaCha8Rng {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    rng.set_stream(index as u64);
    rng
}
