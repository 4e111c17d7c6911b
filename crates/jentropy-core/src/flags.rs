//! Construction flags bitset shared by `alloc` and `init`.
//!
//! Bit layout matches the spec's ABI table exactly, including two
//! historic bit positions that are unused but must never be reassigned.

/// Historic bit, unused. Reserved for ABI continuity.
pub const RESERVED_BIT0: u32 = 1 << 0;
/// Historic bit, unused. Reserved for ABI continuity.
pub const RESERVED_BIT1: u32 = 1 << 1;
/// Disable the memory-access workload entirely.
pub const DISABLE_MEMORY_ACCESS: u32 = 1 << 2;
/// Force selection of the software (thread-based) timer.
pub const FORCE_INTERNAL_TIMER: u32 = 1 << 3;
/// Refuse to fall back to the software timer even if the hardware timer
/// is too coarse.
pub const DISABLE_INTERNAL_TIMER: u32 = 1 << 4;
/// Run in FIPS-compliant mode (stricter RCT cutoff).
pub const FORCE_FIPS: u32 = 1 << 5;

const MAX_MEM_SHIFT_MASK: u32 = 0xF;
const MAX_MEM_SHIFT_OFFSET: u32 = 28;

/// Default memory workload size when the flags' max-mem-size field is 0.
pub const DEFAULT_MEM_SIZE: usize = 1 << 15; // 32 KiB
/// Hard cap on memory workload size regardless of the requested shift.
pub const MAX_MEM_SIZE: usize = 512 * 1024 * 1024;

/// Parsed view over the raw `u32` flags bitset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Flags(pub u32);

impl Flags {
    pub fn new(bits: u32) -> Self {
        Self(bits)
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn contains(self, bit: u32) -> bool {
        self.0 & bit != 0
    }

    pub fn disable_memory_access(self) -> bool {
        self.contains(DISABLE_MEMORY_ACCESS)
    }

    pub fn force_internal_timer(self) -> bool {
        self.contains(FORCE_INTERNAL_TIMER)
    }

    pub fn disable_internal_timer(self) -> bool {
        self.contains(DISABLE_INTERNAL_TIMER)
    }

    pub fn force_fips(self) -> bool {
        self.contains(FORCE_FIPS)
    }

    /// Requested memory size, honoring the "0 => default, k => 2^(k+14)"
    /// encoding and the 512 MiB cap.
    pub fn max_mem_size(self) -> usize {
        let shift = (self.0 >> MAX_MEM_SHIFT_OFFSET) & MAX_MEM_SHIFT_MASK;
        if shift == 0 {
            DEFAULT_MEM_SIZE
        } else {
            let requested = 1usize << (shift + 14);
            requested.min(MAX_MEM_SIZE)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_mem_size_when_shift_zero() {
        assert_eq!(Flags::new(0).max_mem_size(), DEFAULT_MEM_SIZE);
    }

    #[test]
    fn mem_size_shift_one_is_32kib() {
        let flags = Flags::new(1 << MAX_MEM_SHIFT_OFFSET);
        assert_eq!(flags.max_mem_size(), 1 << 15);
    }

    #[test]
    fn mem_size_caps_at_512mib() {
        let flags = Flags::new(0xF << MAX_MEM_SHIFT_OFFSET);
        assert_eq!(flags.max_mem_size(), MAX_MEM_SIZE);
    }

    #[test]
    fn disable_memory_access_bit() {
        assert!(Flags::new(DISABLE_MEMORY_ACCESS).disable_memory_access());
        assert!(!Flags::new(0).disable_memory_access());
    }

    #[test]
    fn reserved_bits_are_distinct_positions() {
        assert_ne!(RESERVED_BIT0, RESERVED_BIT1);
        assert_ne!(RESERVED_BIT0, DISABLE_MEMORY_ACCESS);
    }
}
