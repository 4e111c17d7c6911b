//! Bounded memory-access workload executed between timer reads so the
//! measured delta reflects cache/TLB/memory-controller jitter, not just
//! instruction-issue noise.
//!
//! Grounded on the timestamp-workload-timestamp shape of
//! `esoteric-core/src/sources/timing.rs`'s `MachTimingSource`, generalized
//! from its fixed micro-delay loop into the spec's two addressing modes.

use std::hint::black_box;

/// Default block count for `block` mode when a caller doesn't specify
/// one, matching the upstream library's own default.
pub const DEFAULT_MEMBLOCKS: usize = 64;

/// `random-memaccess`: each step's next index is derived from the prior
/// byte read, masked to the buffer's power-of-two size. `block`: a
/// fixed-stride walk over `memblocks` blocks of `memblocksize` bytes
/// each, wrapping at the buffer end.
pub enum MemoryWorkload {
    Disabled,
    Random {
        buf: Box<[u8]>,
        memmask: usize,
    },
    Block {
        buf: Box<[u8]>,
        memblocks: usize,
        memblocksize: usize,
        location: usize,
    },
}

impl MemoryWorkload {
    pub fn disabled() -> Self {
        MemoryWorkload::Disabled
    }

    /// `size` is rounded down to the nearest power of two for
    /// `random-memaccess` mode.
    pub fn random(size: usize) -> Self {
        let size = size.max(1).next_power_of_two();
        MemoryWorkload::Random {
            buf: vec![0u8; size].into_boxed_slice(),
            memmask: size - 1,
        }
    }

    /// Allocates a buffer sized to hold `memblocks * memblocksize` bytes
    /// (at least `size`, so flags-driven size requests are still
    /// honored), per spec.md §3's `(memblocks, memblocksize,
    /// memlocation)` block-mode geometry.
    pub fn block(size: usize, memblocks: usize, memblocksize: usize) -> Self {
        let memblocksize = memblocksize.max(1);
        let memblocks = memblocks.max(1);
        let walked = memblocks * memblocksize;
        MemoryWorkload::Block {
            buf: vec![0u8; size.max(walked)].into_boxed_slice(),
            memblocks,
            memblocksize,
            location: 0,
        }
    }

    /// Perform `iterations` block visits. `seed` drives the byte mix in
    /// both modes and the next index in `random-memaccess` mode; the
    /// collector seeds it from the conditioner's folded hash state
    /// (spec.md §4.2), while standalone samplers with no conditioner
    /// seed it from the prior raw timer reading instead.
    pub fn run(&mut self, seed: u64, iterations: usize) {
        match self {
            MemoryWorkload::Disabled => {}
            MemoryWorkload::Random { buf, memmask } => {
                if buf.is_empty() {
                    return;
                }
                let mut idx = (seed as usize) & *memmask;
                for i in 0..iterations {
                    let val = buf[idx];
                    let mixed = val ^ (seed.wrapping_add(i as u64) as u8);
                    buf[idx] = black_box(mixed);
                    idx = (idx ^ (mixed as usize).wrapping_mul(2_654_435_761)) & *memmask;
                }
            }
            MemoryWorkload::Block {
                buf,
                memblocks,
                memblocksize,
                location,
            } => {
                let len = buf.len();
                if len == 0 {
                    return;
                }
                // spec.md §4.2: "visit memblocks x memblocksize bytes
                // sequentially in a strided pattern" — each iteration
                // touches every byte of one whole block, not just its
                // first byte, before striding to the next block.
                let walked = (*memblocks * *memblocksize).min(len).max(*memblocksize);
                let mut loc = *location % walked;
                for i in 0..iterations {
                    let base = loc;
                    for offset in 0..*memblocksize {
                        let idx = (base + offset) % len;
                        let mixed = buf[idx] ^ (seed.wrapping_add(i as u64).wrapping_add(offset as u64) as u8);
                        buf[idx] = black_box(mixed);
                    }
                    loc = (loc + *memblocksize) % walked;
                }
                *location = loc;
            }
        }
    }

    pub fn is_disabled(&self) -> bool {
        matches!(self, MemoryWorkload::Disabled)
    }
}
