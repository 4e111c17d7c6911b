//! CLI for jentropy — the auxiliary offline tools spec.md treats as
//! external collaborators to the core: a conditioned-output reader, a
//! raw-entropy recorder, an offline GCD estimator, and a startup
//! self-test diagnostic report.

mod commands;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "jentropy")]
#[command(about = "jentropy — a CPU timing jitter entropy collector")]
#[command(version = jentropy_core::VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Construction flags shared by every subcommand that allocates a
/// collector or samples the timer directly. Mirrors the `alloc`/`init`
/// flags bitset in `jentropy_core::flags`.
#[derive(Args, Clone, Copy, Debug)]
struct FlagArgs {
    /// Oversampling rate: measurements taken per assumed bit of entropy.
    #[arg(long, default_value_t = 1)]
    osr: u32,

    /// Disable the memory-access workload (reduces entropy rate).
    #[arg(long)]
    disable_memory_access: bool,

    /// Force the software (thread-based) timer even if the hardware
    /// timer passes its resolution check.
    #[arg(long)]
    force_internal_timer: bool,

    /// Refuse to fall back to the software timer if the hardware timer
    /// is too coarse.
    #[arg(long)]
    disable_internal_timer: bool,

    /// Run in FIPS-compliant mode (stricter RCT cutoff).
    #[arg(long)]
    fips: bool,
}

impl FlagArgs {
    fn bits(self) -> u32 {
        let mut bits = 0u32;
        if self.disable_memory_access {
            bits |= jentropy_core::flags::DISABLE_MEMORY_ACCESS;
        }
        if self.force_internal_timer {
            bits |= jentropy_core::flags::FORCE_INTERNAL_TIMER;
        }
        if self.disable_internal_timer {
            bits |= jentropy_core::flags::DISABLE_INTERNAL_TIMER;
        }
        if self.fips {
            bits |= jentropy_core::flags::FORCE_FIPS;
        }
        bits
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Print conditioned random bytes from a live entropy collector.
    Read {
        /// Number of bytes to produce.
        #[arg(long, default_value_t = 32)]
        bytes: usize,

        /// Output format.
        #[arg(long, default_value = "hex", value_parser = ["raw", "hex", "base64"])]
        format: String,

        /// Use the block-addressing memory workload (a fixed-stride walk)
        /// instead of the default random-memaccess mode, with this many
        /// bytes per block.
        #[arg(long)]
        memblocksize: Option<usize>,

        /// Number of blocks to walk in block-addressing mode. Only takes
        /// effect alongside `--memblocksize`.
        #[arg(long, default_value_t = jentropy_core::memory::DEFAULT_MEMBLOCKS)]
        memblocks: usize,

        #[command(flatten)]
        flags: FlagArgs,
    },

    /// Record a raw timing trace to disk for offline analysis. Bypasses
    /// the conditioner, stuck detector, and health tests entirely.
    Record {
        /// Number of raw timer readings to capture.
        #[arg(long, default_value_t = 4096)]
        count: usize,

        /// Output JSON path.
        #[arg(long)]
        output: String,

        #[command(flatten)]
        flags: FlagArgs,
    },

    /// Estimate the common GCD of a recorded delta stream (from
    /// `record`) and show the effect of normalizing by it.
    Gcd {
        /// Path to a JSON trace produced by `record`.
        input: String,
    },

    /// Run the §4.8 startup self-test battery and print every check's
    /// pass/fail status and measured statistic.
    Selftest {
        #[command(flatten)]
        flags: FlagArgs,

        /// Also write the full report as JSON to this path.
        #[arg(long)]
        output: Option<String>,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Read {
            bytes,
            format,
            memblocksize,
            memblocks,
            flags,
        } => commands::read::run(bytes, &format, flags.osr, flags.bits(), memblocksize, memblocks),
        Commands::Record {
            count,
            output,
            flags,
        } => commands::record::run(count, &output, flags.osr, flags.bits()),
        Commands::Gcd { input } => commands::gcd::run(&input),
        Commands::Selftest { flags, output } => {
            commands::selftest::run(flags.osr, flags.bits(), output.as_deref())
        }
    }
}
