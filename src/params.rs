//! Solver parameters.
//!
//! Defaults come from environment variables so that the behavior of an
//! already-deployed binary can be tuned without a rebuild; a
//! [`SolverParameters`] value snapshots them and can be overridden
//! programmatically before the solver is created.

use env_param::EnvParam;

/// Branching factor of the sum/min/max constraint trees.
static ARRAY_SPLIT_SIZE: EnvParam<usize> = EnvParam::new("LIBRA_ARRAY_SPLIT_SIZE", "64");
/// Initial size of the model-cache tables.
static CACHE_INITIAL_SIZE: EnvParam<usize> = EnvParam::new("LIBRA_CACHE_INITIAL_SIZE", "1024");
/// Initial capacity of the trail, in events.
static TRAIL_CHUNK_SIZE: EnvParam<usize> = EnvParam::new("LIBRA_TRAIL_CHUNK_SIZE", "64");

#[derive(Clone, Debug)]
pub struct SolverParameters {
    pub array_split_size: usize,
    pub cache_initial_size: usize,
    pub trail_chunk_size: usize,
}

impl Default for SolverParameters {
    fn default() -> Self {
        SolverParameters {
            array_split_size: ARRAY_SPLIT_SIZE.get().max(2),
            cache_initial_size: CACHE_INITIAL_SIZE.get(),
            trail_chunk_size: TRAIL_CHUNK_SIZE.get(),
        }
    }
}
