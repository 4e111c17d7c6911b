//! Startup self-test: the acceptance gate `init` runs once per process
//! before any collector is trusted to produce output. Takes a warm-up
//! batch of raw timer readings, derives deltas, and runs every §4.8
//! check in order — the first failure is the error `init` returns.

use crate::conditioning::Sha3Conditioner;
use crate::error::InitError;
use crate::health::HealthState;
use crate::stuck::StuckDetector;

/// Number of raw timer samples taken during warm-up. Chosen to be large
/// enough to exercise a full APT window (512) and give RCT/the variation
/// checks a meaningful sample size, while staying fast enough to run
/// inline during `init`.
pub const WARMUP_SAMPLES: usize = 1024;

/// Minimum number of distinct normalized delta values required across
/// the warm-up batch.
///
/// spec.md §4.8 phrases this as "at least N/10 distinct deltas", but
/// applied literally to `N = WARMUP_SAMPLES` that rejects spec.md §8's
/// own concrete scenario 2 (replayed deltas `[5, 10, 5, 10, …]`, which
/// GCD-normalize to exactly two distinct values, `[1, 2, 1, 2, …]`, for
/// the whole warm-up batch) even though that scenario is specified to
/// succeed. A fixed small floor — reject only a degenerate single-value
/// stream, which every other acceptance check (stuck-rate, RCT, APT) is
/// better suited to classify anyway — is what actually lets every named
/// §8 scenario pass. Recorded as an Open Question resolution in
/// DESIGN.md / SPEC_FULL.md.
const MIN_DISTINCT_COUNT: usize = 2;

/// Maximum fraction of warm-up samples allowed to classify as stuck.
const MAX_STUCK_FRACTION: f64 = 0.90;

#[derive(Debug, Clone)]
pub struct SelfTestReport {
    pub samples: usize,
    pub median_delta: u64,
    pub distinct_deltas: usize,
    pub distinct_delta1: usize,
    pub distinct_delta2: usize,
    pub stuck_count: usize,
    pub rct_tripped: bool,
    pub apt_tripped: bool,
    pub lag_tripped: bool,
    pub hash_self_test_passed: bool,
    pub gcd: u64,
    pub outcome: Result<(), InitError>,
}

fn median(values: &mut [u64]) -> u64 {
    values.sort_unstable();
    values[values.len() / 2]
}

fn gcd_u64(a: u64, b: u64) -> u64 {
    if b == 0 {
        a
    } else {
        gcd_u64(b, a % b)
    }
}

/// Greatest common divisor across a batch of raw deltas, used to
/// normalize the timer's effective resolution to 1.
pub fn common_gcd(deltas: &[u64]) -> u64 {
    let gcd = deltas.iter().fold(0u64, |acc, &d| {
        if d == 0 {
            acc
        } else {
            gcd_u64(acc, d)
        }
    });
    gcd.max(1)
}

/// Runs the full warm-up batch through the stuck detector and health
/// tests, and checks every §4.8 acceptance criterion. `raw_samples` must
/// contain `WARMUP_SAMPLES` successive raw timer readings (already
/// having executed the memory workload between each pair, if enabled).
pub fn run(raw_samples: &[u64], osr: u32, fips_enabled: bool) -> SelfTestReport {
    let mut deltas = Vec::with_capacity(raw_samples.len().saturating_sub(1));
    let mut negative_delta_seen = false;
    for pair in raw_samples.windows(2) {
        let d = pair[1].wrapping_sub(pair[0]);
        if (d as i64) < 0 {
            negative_delta_seen = true;
        }
        deltas.push(d);
    }

    let gcd = common_gcd(&deltas);
    let normalized: Vec<u64> = deltas.iter().map(|&d| d / gcd).collect();

    let mut median_sample = normalized.clone();
    let median_delta = if median_sample.is_empty() {
        0
    } else {
        median(&mut median_sample)
    };

    let distinct_deltas = {
        use std::collections::HashSet;
        normalized.iter().collect::<HashSet<_>>().len()
    };

    // The Lag predictor's nominal window is 2^17 samples, ~128x larger
    // than WARMUP_SAMPLES; gating startup on it would judge a statistic
    // computed over a window the warm-up batch can't come close to
    // filling. Warm-up only runs RCT + APT, both of which complete at
    // least one full window (RCT continuously, APT every 512 samples)
    // within WARMUP_SAMPLES. Lag still runs, as designed, once a
    // collector starts reading (see `collector.rs`).
    let mut stuck = StuckDetector::new();
    let mut health = HealthState::new(osr, fips_enabled, false);
    let mut stuck_count = 0usize;
    let mut first_derivs = Vec::with_capacity(normalized.len());
    let mut second_derivs = Vec::with_capacity(normalized.len());
    let mut prev = 0i64;
    let mut prev_d1 = 0i64;
    for (i, &d) in normalized.iter().enumerate() {
        let is_stuck = stuck.classify(d);
        if is_stuck {
            stuck_count += 1;
        }
        health.update(is_stuck, d);

        let d_i64 = d as i64;
        if i > 0 {
            let d1 = d_i64 - prev;
            first_derivs.push(d1);
            if i > 1 {
                second_derivs.push(d1 - prev_d1);
            }
            prev_d1 = d1;
        }
        prev = d_i64;
    }

    let distinct_delta1 = {
        use std::collections::HashSet;
        first_derivs.iter().collect::<HashSet<_>>().len()
    };
    let distinct_delta2 = {
        use std::collections::HashSet;
        second_derivs.iter().collect::<HashSet<_>>().len()
    };

    let hash_self_test_passed = Sha3Conditioner::self_test();

    let rct_tripped = health.failure_mask() & crate::error::HEALTH_FAILURE_RCT != 0;
    let apt_or_lag_tripped = health.failure_mask()
        & (crate::error::HEALTH_FAILURE_APT | crate::error::HEALTH_FAILURE_LAG)
        != 0;
    let apt_tripped = health.failure_mask() & crate::error::HEALTH_FAILURE_APT != 0;
    let lag_tripped = health.failure_mask() & crate::error::HEALTH_FAILURE_LAG != 0;

    let n = normalized.len().max(1) as f64;
    let max_stuck = (n * MAX_STUCK_FRACTION).floor() as usize;

    let outcome = if raw_samples.is_empty() {
        Err(InitError::NoTime)
    } else if median_delta == 0 {
        Err(InitError::CoarseTime)
    } else if negative_delta_seen {
        Err(InitError::NoMonotonic)
    } else if distinct_deltas < MIN_DISTINCT_COUNT {
        Err(InitError::MinVariation)
    } else if !first_derivs.is_empty() && distinct_delta1 < 2 {
        Err(InitError::VarVar)
    } else if second_derivs.len() > 10 && distinct_delta2 < 2 {
        Err(InitError::MinVarVar)
    } else if stuck_count > max_stuck {
        Err(InitError::Stuck)
    } else if rct_tripped {
        Err(InitError::Rct)
    } else if apt_or_lag_tripped {
        Err(InitError::Health)
    } else if !hash_self_test_passed {
        Err(InitError::Hash)
    } else if gcd == 0 {
        Err(InitError::Gcd)
    } else {
        Ok(())
    };

    SelfTestReport {
        samples: raw_samples.len(),
        median_delta,
        distinct_deltas,
        distinct_delta1,
        distinct_delta2,
        stuck_count,
        rct_tripped,
        apt_tripped,
        lag_tripped,
        hash_self_test_passed,
        gcd,
        outcome,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Synthesizes a raw-sample stream from a repeating delta pattern so
    /// tests are deterministic without touching a real timer.
    fn samples_from_deltas(deltas: &[u64]) -> Vec<u64> {
        let mut samples = Vec::with_capacity(deltas.len() + 1);
        let mut t = 0u64;
        samples.push(t);
        for &d in deltas {
            t = t.wrapping_add(d);
            samples.push(t);
        }
        samples
    }

    fn healthy_deltas(n: usize) -> Vec<u64> {
        (0..n)
            .map(|i| 100 + (i as u64).wrapping_mul(2_654_435_761) % 937)
            .collect()
    }

    #[test]
    fn healthy_jittery_stream_passes() {
        let samples = samples_from_deltas(&healthy_deltas(WARMUP_SAMPLES));
        let report = run(&samples, 1, false);
        assert!(report.outcome.is_ok(), "unexpected failure: {:?}", report.outcome);
    }

    /// spec.md §8 concrete scenario 2: replayed deltas `[5, 10, 5, 10, …]`
    /// must succeed, with `gcd = 5` and normalized deltas `[1, 2, 1, 2, …]`.
    #[test]
    fn concrete_scenario_2_alternating_deltas_succeed_with_gcd_five() {
        let deltas: Vec<u64> = (0..WARMUP_SAMPLES).map(|i| if i % 2 == 0 { 5 } else { 10 }).collect();
        let samples = samples_from_deltas(&deltas);
        let report = run(&samples, 1, false);
        assert!(report.outcome.is_ok(), "unexpected failure: {:?}", report.outcome);
        assert_eq!(report.gcd, 5);
    }

    #[test]
    fn all_zero_deltas_fails_coarse_time() {
        let samples = samples_from_deltas(&vec![0u64; WARMUP_SAMPLES]);
        let report = run(&samples, 1, false);
        assert_eq!(report.outcome, Err(InitError::CoarseTime));
    }

    #[test]
    fn constant_nonzero_delta_fails_variation_or_stuck() {
        let samples = samples_from_deltas(&vec![7u64; WARMUP_SAMPLES]);
        let report = run(&samples, 1, false);
        assert!(report.outcome.is_err());
    }

    #[test]
    fn common_gcd_of_uniform_multiples() {
        let deltas = vec![5u64, 10, 15, 20, 25];
        assert_eq!(common_gcd(&deltas), 5);
    }

    #[test]
    fn common_gcd_ignores_zero_entries() {
        let deltas = vec![0u64, 6, 9, 0, 12];
        assert_eq!(common_gcd(&deltas), 3);
    }

    #[test]
    fn empty_sample_set_fails_no_time() {
        let report = run(&[], 1, false);
        assert_eq!(report.outcome, Err(InitError::NoTime));
    }
}
