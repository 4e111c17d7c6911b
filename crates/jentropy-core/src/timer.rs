//! Timer sources: a hardware cycle counter, and a software free-running
//! thread counter used as a fallback when no fine-grained hardware timer
//! is available or when the caller forces it via flags.
//!
//! The hardware reader is grounded on the per-arch cycle-counter
//! intrinsics in `doublegate-VeridianOS/kernel/src/arch/entropy.rs`. The
//! software counter's start/stop protocol (two atomics, no lock,
//! eventual visibility only) is the idiomatic-Rust rendition of the
//! "intentional race" the spec's design notes call for: `Ordering::Relaxed`
//! atomics are this ecosystem's equivalent of a bare volatile counter.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::Instant;

/// Reads a monotonically increasing counter. Implementations need not be
/// wall-clock time; only relative deltas between successive reads matter.
pub trait TimerSource: Send {
    fn now(&mut self) -> u64;
}

/// Hardware cycle counter, read directly with no syscall in the common
/// case. Falls back to a process-wide monotonic nanosecond counter on
/// architectures without a known intrinsic.
#[derive(Debug, Default)]
pub struct HwTimer;

impl HwTimer {
    pub fn new() -> Self {
        Self
    }

    #[inline]
    fn read() -> u64 {
        #[cfg(target_arch = "x86_64")]
        {
            // SAFETY: RDTSC is available on every x86_64 target Rust supports.
            unsafe { core::arch::x86_64::_rdtsc() }
        }
        #[cfg(target_arch = "aarch64")]
        {
            let val: u64;
            // SAFETY: CNTVCT_EL0 is readable from EL0 on every target OS
            // running this crate.
            unsafe {
                core::arch::asm!("mrs {0}, cntvct_el0", out(reg) val, options(nomem, nostack));
            }
            val
        }
        #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
        {
            monotonic_ns()
        }
    }
}

impl TimerSource for HwTimer {
    #[inline]
    fn now(&mut self) -> u64 {
        Self::read()
    }
}

static MONOTONIC_ANCHOR: OnceLock<Instant> = OnceLock::new();

/// Process-wide monotonic nanosecond counter used by [`HwTimer`] on
/// architectures without a direct cycle-counter intrinsic, and as the
/// basis for [`SwTimer`]'s fallback thread.
fn monotonic_ns() -> u64 {
    let anchor = MONOTONIC_ANCHOR.get_or_init(Instant::now);
    anchor.elapsed().as_nanos() as u64
}

/// Lifecycle hooks for the thread that backs [`SwTimer`]. Split out so a
/// caller can swap in a different threading runtime before the first
/// call to [`crate::init`] (see [`crate::switch_notime_impl`]), the Rust
/// analogue of the C library's four-function thread vtable.
pub trait NotimeThreadOps: Send + Sync {
    /// Called once when the backend is installed.
    fn init(&self) {}
    /// Called once when the backend is torn down.
    fn fini(&self) {}
    /// Spawn the counter-incrementing thread.
    fn spawn(&self, counter: Arc<AtomicU64>, interrupt: Arc<AtomicBool>) -> ThreadHandle;
}

/// Opaque join handle returned by [`NotimeThreadOps::spawn`].
pub struct ThreadHandle(Box<dyn FnOnce() + Send>);

impl ThreadHandle {
    pub fn join(self) {
        (self.0)();
    }
}

/// Default [`NotimeThreadOps`] backed by `std::thread`.
#[derive(Debug, Default)]
pub struct StdThreadOps;

impl NotimeThreadOps for StdThreadOps {
    fn spawn(&self, counter: Arc<AtomicU64>, interrupt: Arc<AtomicBool>) -> ThreadHandle {
        let handle = thread::spawn(move || {
            while !interrupt.load(Ordering::Relaxed) {
                counter.fetch_add(1, Ordering::Relaxed);
            }
        });
        ThreadHandle(Box::new(move || {
            let _ = handle.join();
        }))
    }
}

/// Free-running-thread software timer. One thread spins incrementing an
/// atomic counter; the reader samples it without synchronizing with the
/// writer. Two volatile-style fields (`counter`, `interrupt`) are all
/// that coordinate start and stop, by design: no lock is taken on the
/// hot read path.
pub struct SwTimer {
    counter: Arc<AtomicU64>,
    interrupt: Arc<AtomicBool>,
    handle: Option<ThreadHandle>,
    ops: Arc<dyn NotimeThreadOps>,
}

impl SwTimer {
    pub fn new(ops: Arc<dyn NotimeThreadOps>) -> Self {
        Self {
            counter: Arc::new(AtomicU64::new(0)),
            interrupt: Arc::new(AtomicBool::new(false)),
            handle: None,
            ops,
        }
    }

    pub fn start(&mut self) {
        if self.handle.is_some() {
            return;
        }
        self.interrupt.store(false, Ordering::Relaxed);
        self.handle = Some(
            self.ops
                .spawn(Arc::clone(&self.counter), Arc::clone(&self.interrupt)),
        );
    }

    pub fn stop(&mut self) {
        self.interrupt.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            handle.join();
        }
    }
}

impl TimerSource for SwTimer {
    #[inline]
    fn now(&mut self) -> u64 {
        self.counter.load(Ordering::Relaxed)
    }
}

impl Drop for SwTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Replays a fixed sequence of readings, cycling once exhausted. Backs
/// spec.md §8's "Sponge determinism" property — given an identical
/// replayed timer trace, two collectors produce byte-identical output —
/// and lets a captured timing trace be replayed offline for regression
/// testing.
pub struct ScriptedTimer {
    sequence: Vec<u64>,
    pos: usize,
}

impl ScriptedTimer {
    pub fn new(sequence: Vec<u64>) -> Self {
        assert!(!sequence.is_empty(), "scripted timer sequence must not be empty");
        Self { sequence, pos: 0 }
    }
}

impl TimerSource for ScriptedTimer {
    #[inline]
    fn now(&mut self) -> u64 {
        let value = self.sequence[self.pos % self.sequence.len()];
        self.pos += 1;
        value
    }
}

/// Which backend a collector instance is driving. Chosen once at
/// process-wide `init` time and reused by every `alloc`'d collector
/// unless flags force a different choice.
pub enum Timer {
    Hardware(HwTimer),
    Software(SwTimer),
    Scripted(ScriptedTimer),
}

impl Timer {
    pub fn start(&mut self) {
        if let Timer::Software(sw) = self {
            sw.start();
        }
    }

    pub fn stop(&mut self) {
        if let Timer::Software(sw) = self {
            sw.stop();
        }
    }
}

impl TimerSource for Timer {
    #[inline]
    fn now(&mut self) -> u64 {
        match self {
            Timer::Hardware(hw) => hw.now(),
            Timer::Software(sw) => sw.now(),
            Timer::Scripted(s) => s.now(),
        }
    }
}

#[cfg(test)]
mod scripted_timer_tests {
    use super::*;

    #[test]
    fn scripted_timer_replays_sequence_then_cycles() {
        let mut t = ScriptedTimer::new(vec![10, 20, 30]);
        assert_eq!(t.now(), 10);
        assert_eq!(t.now(), 20);
        assert_eq!(t.now(), 30);
        assert_eq!(t.now(), 10);
    }

    #[test]
    #[should_panic(expected = "must not be empty")]
    fn scripted_timer_rejects_empty_sequence() {
        ScriptedTimer::new(vec![]);
    }
}
