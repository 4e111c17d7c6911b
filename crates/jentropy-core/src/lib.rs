//! # jentropy-core
//!
//! A non-physical true random number generator that harvests entropy
//! from CPU timing jitter: the unpredictable variation in how long
//! identical instruction sequences take to execute, caused by
//! out-of-order execution, cache state, memory controller contention,
//! and other microarchitectural noise a single-threaded observer cannot
//! predict or control.
//!
//! ## Quick start
//!
//! ```no_run
//! use jentropy_core::EntropyCollector;
//!
//! jentropy_core::init(1, 0).expect("startup self-test failed");
//! let mut collector = EntropyCollector::alloc(1, 0).expect("alloc failed");
//!
//! let mut random_bytes = [0u8; 32];
//! collector.read(&mut random_bytes).expect("read failed");
//! ```
//!
//! ## Architecture
//!
//! Timer read → bounded memory workload → timer read → GCD-normalized
//! delta → stuck detector → online health tests (RCT/APT/Lag) → SHA3-256
//! sponge conditioner → 256-bit output blocks.
//!
//! [`init`] runs a one-shot, process-wide startup self-test that picks
//! between the hardware cycle-counter timer and a software
//! free-running-thread fallback, and establishes the timer's GCD. Every
//! [`EntropyCollector`] allocated afterward reuses that choice but owns
//! its own hash state, memory buffer, and health-test counters
//! independently of every other collector.

pub mod collector;
pub mod conditioning;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod flags;
mod global;
pub mod health;
pub mod memory;
pub mod selftest;
pub mod stuck;
pub mod timer;

pub use collector::EntropyCollector;
pub use config::{CollectorConfig, MemoryAddressingMode};
pub use error::{InitError, ReadError};
pub use flags::Flags;
pub use selftest::SelfTestReport;
pub use timer::{NotimeThreadOps, StdThreadOps};

use std::sync::Arc;

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Runs the process-wide startup self-test exactly once. Safe to call
/// more than once or from more than one collector's construction path;
/// later calls are no-ops once the first has succeeded.
pub fn init(osr: u32, flags: u32) -> Result<(), InitError> {
    global::init(osr, flags)
}

/// Install a different thread backend for the software timer fallback.
/// Must be called before [`init`]; returns [`InitError::ProgErr`]
/// otherwise.
pub fn switch_notime_impl(ops: Arc<dyn NotimeThreadOps>) -> Result<(), InitError> {
    global::switch_notime_impl(ops)
}

/// Register a callback invoked the moment any collector observes a
/// permanent health-test failure during `read`/`read_safe`.
pub fn set_fips_failure_callback<F>(callback: F)
where
    F: Fn(u32) + Send + Sync + 'static,
{
    global::set_fips_failure_callback(callback)
}

pub fn is_initialized() -> bool {
    global::is_initialized()
}
