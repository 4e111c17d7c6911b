//! `jentropy gcd` — estimate the common GCD of a recorded delta stream.
//!
//! spec.md §1's "GCD estimator" auxiliary tool, operating on a trace
//! produced by `jentropy record` rather than a live timer.

use jentropy_core::selftest::common_gcd;
use serde::Deserialize;
use std::fs;

#[derive(Deserialize)]
struct RecordedTrace {
    #[serde(default)]
    deltas: Vec<u64>,
    #[serde(default)]
    raw_samples: Vec<u64>,
}

pub fn run(input: &str) {
    let data = match fs::read_to_string(input) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Error: failed to read '{input}': {e}");
            std::process::exit(1);
        }
    };

    let trace: RecordedTrace = match serde_json::from_str(&data) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("Error: failed to parse '{input}': {e}");
            std::process::exit(1);
        }
    };

    let deltas = if trace.deltas.is_empty() && !trace.raw_samples.is_empty() {
        jentropy_core::diagnostics::deltas_from_samples(&trace.raw_samples)
    } else {
        trace.deltas
    };

    if deltas.is_empty() {
        eprintln!("Error: no deltas found in '{input}'");
        std::process::exit(1);
    }

    let gcd = common_gcd(&deltas);
    let normalized: Vec<u64> = deltas.iter().map(|&d| d / gcd).collect();
    let normalized_gcd = common_gcd(&normalized);

    println!("Samples:        {}", deltas.len());
    println!("Common GCD:     {gcd}");
    println!("Normalized GCD: {normalized_gcd} (expected 1)");
    println!(
        "First 10 normalized deltas: {:?}",
        &normalized[..normalized.len().min(10)]
    );
}
