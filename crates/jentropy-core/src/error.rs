//! Error types returned by collector construction and reads.
//!
//! Grounded on the error enum in the `rand_jitterentropy` FFI binding,
//! adapted from a wrapped C errno to a native Rust enum.

use std::fmt;

/// Failure during [`crate::init`] or [`crate::EntropyCollector::alloc`].
///
/// Variant order mirrors the self-test's check order: the first check
/// that fails is the error returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitError {
    /// No usable timer could be found at all.
    NoTime,
    /// The timer's resolution is too coarse to produce a nonzero median delta.
    CoarseTime,
    /// The timer produced a delta implying it runs backwards.
    NoMonotonic,
    /// Fewer than `N/10` distinct delta values were observed in warm-up.
    MinVariation,
    /// The first derivative of the delta stream shows insufficient variation.
    VarVar,
    /// The second derivative of the delta stream shows insufficient variation.
    MinVarVar,
    /// More than 90% of warm-up samples classified as stuck.
    Stuck,
    /// APT or Lag predictor tripped during warm-up.
    Health,
    /// RCT tripped during warm-up.
    Rct,
    /// The SHA3-256 self-test vector did not match.
    Hash,
    /// The memory workload buffer could not be allocated.
    Memory,
    /// The computed timer GCD was zero.
    Gcd,
    /// Caller violated the API's usage contract (e.g. switched the
    /// thread backend after `init` already ran).
    ProgErr,
}

impl fmt::Display for InitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            InitError::NoTime => "no usable timer source is available",
            InitError::CoarseTime => "timer resolution is too coarse",
            InitError::NoMonotonic => "timer is not monotonic",
            InitError::MinVariation => "insufficient delta variation during warm-up",
            InitError::VarVar => "insufficient first-derivative variation during warm-up",
            InitError::MinVarVar => "insufficient second-derivative variation during warm-up",
            InitError::Stuck => "stuck-sample rate exceeded 90% during warm-up",
            InitError::Health => "APT or lag predictor tripped during warm-up",
            InitError::Rct => "repetition count test tripped during warm-up",
            InitError::Hash => "conditioner self-test vector mismatch",
            InitError::Memory => "memory workload buffer allocation failed",
            InitError::Gcd => "computed timer GCD was zero",
            InitError::ProgErr => "invalid use of the collector API",
        };
        f.write_str(msg)
    }
}

impl std::error::Error for InitError {}

/// Health-test failure bitmask carried by [`ReadError::HealthFailure`].
pub const HEALTH_FAILURE_RCT: u32 = 1 << 0;
pub const HEALTH_FAILURE_APT: u32 = 1 << 1;
pub const HEALTH_FAILURE_LAG: u32 = 1 << 2;

fn failure_names(mask: u32) -> String {
    let mut names = Vec::new();
    if mask & HEALTH_FAILURE_RCT != 0 {
        names.push("RCT");
    }
    if mask & HEALTH_FAILURE_APT != 0 {
        names.push("APT");
    }
    if mask & HEALTH_FAILURE_LAG != 0 {
        names.push("Lag");
    }
    names.join("+")
}

/// Failure during [`crate::EntropyCollector::read`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadError {
    /// One or more online health tests have permanently tripped. The
    /// bitmask uses the `HEALTH_FAILURE_*` constants.
    HealthFailure(u32),
    /// Caller violated the API's usage contract.
    ProgErr,
}

impl fmt::Display for ReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadError::HealthFailure(mask) => {
                write!(f, "permanent health test failure: {}", failure_names(*mask))
            }
            ReadError::ProgErr => f.write_str("invalid use of the collector API"),
        }
    }
}

impl std::error::Error for ReadError {}
