//! Black-box integration tests for jentropy-core.
//!
//! These exercise the public API only: `init` -> `alloc` -> `read`, the
//! FIPS failure callback, and config round-tripping. Unit tests for
//! individual components (stuck detector, health tests, conditioner)
//! live alongside their modules.

use jentropy_core::{CollectorConfig, EntropyCollector};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

#[test]
fn init_succeeds_on_this_host() {
    assert!(jentropy_core::init(1, 0).is_ok());
    assert!(jentropy_core::is_initialized());
}

#[test]
fn alloc_and_read_produce_requested_length() {
    jentropy_core::init(1, 0).unwrap();
    let mut collector = EntropyCollector::alloc(1, 0).unwrap();
    for size in [1, 16, 32, 64, 128, 300] {
        let mut buf = vec![0u8; size];
        let n = collector.read(&mut buf).unwrap();
        assert_eq!(n, size);
    }
}

#[test]
fn independent_collectors_produce_different_output() {
    jentropy_core::init(1, 0).unwrap();
    let mut a = EntropyCollector::alloc(1, 0).unwrap();
    let mut b = EntropyCollector::alloc(1, 0).unwrap();
    let mut out_a = [0u8; 32];
    let mut out_b = [0u8; 32];
    a.read(&mut out_a).unwrap();
    b.read(&mut out_b).unwrap();
    assert_ne!(out_a, out_b);
}

#[test]
fn disabling_memory_access_via_flags_still_reads() {
    jentropy_core::init(1, 0).unwrap();
    let mut collector = EntropyCollector::alloc(1, jentropy_core::flags::DISABLE_MEMORY_ACCESS)
        .unwrap();
    let mut buf = [0u8; 32];
    assert_eq!(collector.read(&mut buf).unwrap(), 32);
}

#[test]
fn collector_config_round_trips_and_maps_to_same_flags() {
    let config = CollectorConfig {
        osr: 2,
        disable_memory_access: true,
        ..CollectorConfig::default()
    };
    let json = config.to_json_string().unwrap();
    let parsed = CollectorConfig::from_json_str(&json).unwrap();
    assert_eq!(config.flags_bits(), parsed.flags_bits());
}

#[test]
fn fips_failure_callback_is_silent_on_a_healthy_read() {
    // A real permanent failure requires driving the online health tests
    // past their cutoffs, which this black-box test cannot force without
    // a synthetic timer (see `collector.rs`'s own
    // `read_on_all_zero_timer_trips_rct_and_fires_fips_callback`, which
    // uses the crate-private scripted-timer constructor to do exactly
    // that). This test only checks that registering a callback doesn't
    // disturb a normal, healthy read.
    jentropy_core::init(1, 0).unwrap();
    let calls = Arc::new(AtomicU32::new(0));
    let calls_clone = Arc::clone(&calls);
    jentropy_core::set_fips_failure_callback(move |_mask| {
        calls_clone.fetch_add(1, Ordering::SeqCst);
    });

    let mut collector = EntropyCollector::alloc(1, 0).unwrap();
    let mut buf = [0u8; 32];
    assert!(collector.read(&mut buf).is_ok());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn version_is_stable_across_calls() {
    assert_eq!(EntropyCollector::version(), EntropyCollector::version());
}
