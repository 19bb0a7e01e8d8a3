//! Monotonic Timing
//!
//! Nanosecond spans over `std::time::Instant`, plus an estimate of the
//! clock's resolution: the smallest delta the clock can show.

use std::sync::OnceLock;
use std::time::Instant;

/// Spin-waits averaged by [`Timer::resolution`]
pub const RESOLUTION_ROUNDS: usize = 50;

static EPOCH: OnceLock<Instant> = OnceLock::new();

/// A running span
#[derive(Debug, Clone, Copy)]
pub struct Timer {
    start: Instant,
}

impl Timer {
    /// Start a new span
    #[inline(always)]
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Nanoseconds since [`Timer::start`]
    #[inline(always)]
    pub fn elapsed_ns(&self) -> u64 {
        self.start.elapsed().as_nanos() as u64
    }

    /// Monotonic nanoseconds since the first call in this process
    #[inline(always)]
    pub fn now() -> u64 {
        EPOCH.get_or_init(Instant::now).elapsed().as_nanos() as u64
    }

    /// Mean smallest observable step of [`Timer::now`], in nanoseconds
    pub fn resolution() -> f64 {
        resolution_of(Timer::now, RESOLUTION_ROUNDS)
    }
}

/// Mean over `rounds` spin-waits of the first non-zero step of `clock`
pub fn resolution_of(mut clock: impl FnMut() -> u64, rounds: usize) -> f64 {
    if rounds == 0 {
        return 0.0;
    }
    let mut total = 0u64;
    for _ in 0..rounds {
        let begin = clock();
        let mut now = clock();
        while now == begin {
            now = clock();
        }
        total += now.saturating_sub(begin);
    }
    total as f64 / rounds as f64
}
