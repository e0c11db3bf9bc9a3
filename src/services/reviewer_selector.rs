//! Reviewer selection policy.
//!
//! Picks reviewers from a candidate pool minus an exclusion set. Small pools
//! are returned verbatim; larger pools are sampled uniformly without
//! replacement. The random draw comes from an injected [`RandomSource`] so
//! tests can replay a fixed sequence.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;

/// Selection failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("no active candidates")]
    NoActiveCandidates,
}

/// Source of uniform random indices.
pub trait RandomSource: Send + Sync {
    /// Return an index uniformly drawn from `0..upper`. `upper` is never zero.
    fn index(&self, upper: usize) -> usize;
}

/// Production source backed by the thread-local generator.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn index(&self, upper: usize) -> usize {
        rand::thread_rng().gen_range(0..upper)
    }
}

/// Reproducible source for simulations and tests.
pub struct SeededRandom {
    rng: Mutex<StdRng>,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl RandomSource for SeededRandom {
    fn index(&self, upper: usize) -> usize {
        self.rng
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .gen_range(0..upper)
    }
}

/// Pick up to `want` reviewers from `pool`, skipping anything in `excluding`.
///
/// Duplicate pool entries count once. When at most `want` candidates remain
/// they are all returned in pool order, so a 2-slot request against a single
/// candidate yields that one candidate. Otherwise `want` distinct candidates
/// are drawn, resampling an index whenever it collides with one already drawn.
///
/// Fails with [`SelectionError::NoActiveCandidates`] only when no candidate
/// remains and `want > 0`.
pub fn select<S: AsRef<str>>(
    pool: &[String],
    excluding: &[S],
    want: usize,
    random: &dyn RandomSource,
) -> Result<Vec<String>, SelectionError> {
    let mut effective: Vec<&String> = Vec::with_capacity(pool.len());
    for candidate in pool {
        let excluded = excluding.iter().any(|e| e.as_ref() == candidate.as_str());
        if !excluded && !effective.contains(&candidate) {
            effective.push(candidate);
        }
    }

    if effective.is_empty() && want > 0 {
        return Err(SelectionError::NoActiveCandidates);
    }

    if effective.len() <= want {
        return Ok(effective.into_iter().cloned().collect());
    }

    let mut drawn: Vec<usize> = Vec::with_capacity(want);
    while drawn.len() < want {
        let idx = random.index(effective.len());
        if !drawn.contains(&idx) {
            drawn.push(idx);
        }
    }

    Ok(drawn.into_iter().map(|i| effective[i].clone()).collect())
}
