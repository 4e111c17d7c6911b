//! `jentropy selftest` — run the §4.8 startup self-test battery and
//! print every check's pass/fail status and measured statistic, not
//! just the first failure `jentropy_core::init` would stop at.

use jentropy_core::diagnostics::run_self_test;
use serde::Serialize;

pub fn run(osr: u32, flags: u32, output: Option<&str>) {
    let report = run_self_test(osr, flags);

    println!("Timer samples:              {}", report.samples);
    println!(
        "Median delta:                {} {}",
        report.median_delta,
        check(report.median_delta != 0)
    );
    println!("Distinct deltas:            {}", report.distinct_deltas);
    println!("Distinct 1st derivatives:   {}", report.distinct_delta1);
    println!("Distinct 2nd derivatives:   {}", report.distinct_delta2);
    println!(
        "Stuck samples:              {}/{}",
        report.stuck_count, report.samples
    );
    println!(
        "RCT tripped during warmup:  {} {}",
        report.rct_tripped,
        check(!report.rct_tripped)
    );
    println!(
        "APT tripped during warmup:  {} {}",
        report.apt_tripped,
        check(!report.apt_tripped)
    );
    println!(
        "Lag tripped during warmup:  {} {}",
        report.lag_tripped,
        check(!report.lag_tripped)
    );
    println!(
        "Hash self-test passed:      {} {}",
        report.hash_self_test_passed,
        check(report.hash_self_test_passed)
    );
    println!("Timer GCD:                  {}", report.gcd);

    match &report.outcome {
        Ok(()) => println!("\nResult: PASS"),
        Err(e) => println!("\nResult: FAIL ({e})"),
    }

    if let Some(path) = output {
        #[derive(Serialize)]
        struct ReportJson {
            samples: usize,
            median_delta: u64,
            distinct_deltas: usize,
            distinct_delta1: usize,
            distinct_delta2: usize,
            stuck_count: usize,
            rct_tripped: bool,
            apt_tripped: bool,
            lag_tripped: bool,
            hash_self_test_passed: bool,
            gcd: u64,
            pass: bool,
            error: Option<String>,
        }
        let json = ReportJson {
            samples: report.samples,
            median_delta: report.median_delta,
            distinct_deltas: report.distinct_deltas,
            distinct_delta1: report.distinct_delta1,
            distinct_delta2: report.distinct_delta2,
            stuck_count: report.stuck_count,
            rct_tripped: report.rct_tripped,
            apt_tripped: report.apt_tripped,
            lag_tripped: report.lag_tripped,
            hash_self_test_passed: report.hash_self_test_passed,
            gcd: report.gcd,
            pass: report.outcome.is_ok(),
            error: report.outcome.as_ref().err().map(|e| e.to_string()),
        };
        match serde_json::to_string_pretty(&json) {
            Ok(text) => {
                if let Err(e) = std::fs::write(path, text) {
                    eprintln!("Error: failed to write '{path}': {e}");
                }
            }
            Err(e) => eprintln!("Error: failed to serialize report: {e}"),
        }
    }

    if report.outcome.is_err() {
        std::process::exit(1);
    }
}

fn check(ok: bool) -> &'static str {
    if ok {
        "[ok]"
    } else {
        "[FAIL]"
    }
}
