//! Standalone diagnostic sampling, independent of a live
//! [`crate::EntropyCollector`].
//!
//! spec.md §1 names two auxiliary offline tools as external
//! collaborators to the core: a raw-entropy recorder and a GCD
//! estimator operating on recorded delta streams. Both need the
//! untouched timing trace — timer readings with no GCD normalization,
//! no stuck classification, no health testing, no conditioning — which
//! a live collector never exposes (it only ever hands out conditioned
//! output). This module is that exposure point, plus a self-test runner
//! a caller can re-invoke at any time to see every §4.8 check's
//! pass/fail and measured statistic, not just the first failure
//! [`crate::init`] would stop at. [`crate::global::init`] itself reuses
//! [`RawSampler`] for its own warm-up sampling, so the startup gate sees
//! the same interleaved-workload jitter `read` actually produces.

use crate::flags::Flags;
use crate::memory::MemoryWorkload;
use crate::selftest::{self, SelfTestReport};
use crate::timer::{HwTimer, SwTimer, Timer, TimerSource};

const DEFAULT_MEMACCESSLOOPS: usize = 128;

/// Samples raw timer readings, interleaved with the memory workload,
/// with no GCD normalization, stuck classification, or health testing
/// applied. Selects the same timer backend
/// [`crate::EntropyCollector::alloc`] would for the given flags, but
/// does not consult or require the process-wide [`crate::init`] state.
pub struct RawSampler {
    timer: Timer,
    memory: MemoryWorkload,
    memaccessloops: usize,
}

impl RawSampler {
    pub fn new(raw_flags: u32) -> Self {
        let flags = Flags::new(raw_flags);
        let timer = if flags.force_internal_timer() {
            Timer::Software(SwTimer::new(crate::global::thread_ops()))
        } else {
            Timer::Hardware(HwTimer::new())
        };
        let memory = if flags.disable_memory_access() {
            MemoryWorkload::disabled()
        } else {
            MemoryWorkload::random(flags.max_mem_size())
        };
        Self {
            timer,
            memory,
            memaccessloops: DEFAULT_MEMACCESSLOOPS,
        }
    }

    /// Collect `count` successive raw timer readings. The first
    /// reading has no workload run before it; every later one is
    /// preceded by the memory workload, seeded from the prior reading,
    /// exactly as [`crate::EntropyCollector::read`] interleaves them.
    pub fn sample_raw_timer_stream(&mut self, count: usize) -> Vec<u64> {
        self.timer.start();
        let mut samples = Vec::with_capacity(count);
        if count == 0 {
            self.timer.stop();
            return samples;
        }
        let mut t = self.timer.now();
        samples.push(t);
        for _ in 1..count {
            if !self.memory.is_disabled() {
                self.memory.run(t, self.memaccessloops);
            }
            t = self.timer.now();
            samples.push(t);
        }
        self.timer.stop();
        samples
    }
}

/// Converts a stream of raw timer readings into successive raw deltas.
pub fn deltas_from_samples(samples: &[u64]) -> Vec<u64> {
    samples
        .windows(2)
        .map(|w| w[1].wrapping_sub(w[0]))
        .collect()
}

/// Re-runs the full §4.8 startup self-test battery against a fresh
/// warm-up sample and returns the report, independent of whether
/// [`crate::init`] has already run for the process.
pub fn run_self_test(osr: u32, raw_flags: u32) -> SelfTestReport {
    let flags = Flags::new(raw_flags);
    let mut sampler = RawSampler::new(raw_flags);
    let samples = sampler.sample_raw_timer_stream(selftest::WARMUP_SAMPLES);
    selftest::run(&samples, osr, flags.force_fips())
}
