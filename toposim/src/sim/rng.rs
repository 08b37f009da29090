//! Thread-local random number generation for simulation.
//!
//! Every sample taken by a node or a workload goes through this module, so a
//! run is fully determined by the seed installed with [`set_sim_seed`]. Each
//! thread owns an independent generator, which keeps parallel test execution
//! isolated.

use rand::SeedableRng;
use rand::{
    distr::{uniform::SampleUniform, Distribution, StandardUniform},
    Rng,
};
use rand_chacha::ChaCha8Rng;
use rand_distr::Exp;
use std::cell::RefCell;

use crate::error::{SimulationError, SimulationResult};

thread_local! {
    /// Uses ChaCha8Rng for deterministic, reproducible randomness.
    static SIM_RNG: RefCell<ChaCha8Rng> = RefCell::new(ChaCha8Rng::seed_from_u64(0));

    /// The last seed installed via [`set_sim_seed`], kept for error reports.
    static CURRENT_SEED: RefCell<u64> = const { RefCell::new(0) };
}

/// Generate a random value using the thread-local simulation RNG.
pub fn sim_random<T>() -> T
where
    StandardUniform: Distribution<T>,
{
    SIM_RNG.with(|rng| rng.borrow_mut().sample(StandardUniform))
}

/// Generate a random value within `range` (exclusive upper bound).
pub fn sim_random_range<T>(range: std::ops::Range<T>) -> T
where
    T: SampleUniform + PartialOrd,
{
    SIM_RNG.with(|rng| rng.borrow_mut().random_range(range))
}

/// Generate a random value in range, or the start value if the range is empty.
pub fn sim_random_range_or_default<T>(range: std::ops::Range<T>) -> T
where
    T: SampleUniform + PartialOrd + Clone,
{
    if range.start >= range.end {
        range.start
    } else {
        sim_random_range(range)
    }
}

/// Generate a random f64 in `[0.0, 1.0)`.
pub fn sim_random_f64() -> f64 {
    SIM_RNG.with(|rng| rng.borrow_mut().sample(StandardUniform))
}

/// Draw one sample from an exponential distribution with the given mean.
///
/// Fails with `InvalidArgument` unless `mean` is finite and strictly positive.
pub fn sim_random_exponential(mean: f64) -> SimulationResult<f64> {
    let dist = exponential(mean)?;
    Ok(SIM_RNG.with(|rng| dist.sample(&mut *rng.borrow_mut())))
}

/// Build the exponential distribution for `mean`, validating it.
pub(crate) fn exponential(mean: f64) -> SimulationResult<Exp<f64>> {
    if !mean.is_finite() || mean <= 0.0 {
        return Err(SimulationError::InvalidArgument(format!(
            "exponential mean must be finite and > 0, got {mean}"
        )));
    }
    Exp::new(1.0 / mean).map_err(|e| SimulationError::InvalidArgument(e.to_string()))
}

/// Sample a prebuilt distribution with the thread-local generator.
pub(crate) fn sim_sample<D, T>(dist: &D) -> T
where
    D: Distribution<T>,
{
    SIM_RNG.with(|rng| dist.sample(&mut *rng.borrow_mut()))
}

/// Set the seed for the thread-local simulation RNG.
pub fn set_sim_seed(seed: u64) {
    SIM_RNG.with(|rng| {
        *rng.borrow_mut() = ChaCha8Rng::seed_from_u64(seed);
    });
    CURRENT_SEED.with(|current| {
        *current.borrow_mut() = seed;
    });
}

/// Get the seed last installed via [`set_sim_seed`].
pub fn get_current_sim_seed() -> u64 {
    CURRENT_SEED.with(|current| *current.borrow())
}

/// Reset the thread-local simulation RNG to its initial state.
pub fn reset_sim_rng() {
    SIM_RNG.with(|rng| {
        *rng.borrow_mut() = ChaCha8Rng::seed_from_u64(0);
    });
    CURRENT_SEED.with(|current| {
        *current.borrow_mut() = 0;
    });
}
