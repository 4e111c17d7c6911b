//! `jentropy record` — capture a raw timing trace for offline analysis.
//!
//! This is spec.md §1's "raw-entropy recorder" auxiliary tool: it
//! bypasses the conditioner and health tests entirely, writing the
//! untouched timer readings a researcher would want to replay through
//! [`jentropy_core::selftest::run`] or feed to `jentropy gcd`.

use jentropy_core::diagnostics::{deltas_from_samples, RawSampler};
use serde::Serialize;
use std::fs;

#[derive(Serialize)]
struct RecordedTrace {
    osr: u32,
    flags: u32,
    sample_count: usize,
    raw_samples: Vec<u64>,
    deltas: Vec<u64>,
}

pub fn run(count: usize, output: &str, osr: u32, flags: u32) {
    if count < 2 {
        eprintln!("Error: --count must be at least 2 to produce a delta");
        std::process::exit(1);
    }

    let mut sampler = RawSampler::new(flags);
    let raw_samples = sampler.sample_raw_timer_stream(count);
    let deltas = deltas_from_samples(&raw_samples);

    let trace = RecordedTrace {
        osr,
        flags,
        sample_count: raw_samples.len(),
        raw_samples,
        deltas,
    };

    let json = match serde_json::to_string_pretty(&trace) {
        Ok(j) => j,
        Err(e) => {
            eprintln!("Error: failed to serialize trace: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = fs::write(output, json) {
        eprintln!("Error: failed to write '{output}': {e}");
        std::process::exit(1);
    }

    println!(
        "Recorded {} raw samples ({} deltas) to {output}",
        trace.sample_count,
        trace.deltas.len()
    );
}
