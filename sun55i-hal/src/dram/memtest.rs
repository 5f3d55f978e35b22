//! Simple DRAM tests, usable once the bring-up has finished.
//!
//! All tests are destructive for the tested region.
use crate::mmio::RegisterAccess;

#[derive(Debug, thiserror::Error, Clone, Copy, PartialEq, Eq)]
pub enum MemTestError {
    #[error("memory address is not aligned to 4 bytes")]
    AddrNotAligned,
    #[error("memory test error at {addr:#010x}: expected {expected:#010x}, found {found:#010x}")]
    Memory {
        addr: usize,
        expected: u32,
        found: u32,
    },
}

pub fn walking_zero_test<B: RegisterAccess>(
    bus: &mut B,
    base_addr: usize,
    words: usize,
) -> Result<(), MemTestError> {
    walking_value_test(bus, true, base_addr, words)
}

pub fn walking_one_test<B: RegisterAccess>(
    bus: &mut B,
    base_addr: usize,
    words: usize,
) -> Result<(), MemTestError> {
    walking_value_test(bus, false, base_addr, words)
}

/// Tests `words` words starting at `base_addr` with a single set or cleared bit walking
/// through all 32 positions.
pub fn walking_value_test<B: RegisterAccess>(
    bus: &mut B,
    walking_zero: bool,
    base_addr: usize,
    words: usize,
) -> Result<(), MemTestError> {
    if words == 0 {
        return Ok(());
    }
    if base_addr % 4 != 0 {
        return Err(MemTestError::AddrNotAligned);
    }

    for bit in 0..32 {
        let pattern = if walking_zero {
            !(1u32 << bit)
        } else {
            1u32 << bit
        };

        for i in 0..words {
            bus.write32(base_addr + i * 4, pattern);
        }
        verify(bus, base_addr, words, |_| pattern)?;
    }
    Ok(())
}

/// Alternating 0xAAAAAAAA/0x55555555 words, followed by the inverted pattern.
pub fn checkerboard_test<B: RegisterAccess>(
    bus: &mut B,
    base_addr: usize,
    words: usize,
) -> Result<(), MemTestError> {
    if words == 0 {
        return Ok(());
    }
    if base_addr % 4 != 0 {
        return Err(MemTestError::AddrNotAligned);
    }

    for pattern in [0xAAAA_AAAAu32, 0x5555_5555u32] {
        let expected = |i: usize| if i % 2 == 0 { pattern } else { !pattern };
        for i in 0..words {
            bus.write32(base_addr + i * 4, expected(i));
        }
        verify(bus, base_addr, words, expected)?;
    }
    Ok(())
}

fn verify<B: RegisterAccess>(
    bus: &mut B,
    base_addr: usize,
    words: usize,
    expected: impl Fn(usize) -> u32,
) -> Result<(), MemTestError> {
    for i in 0..words {
        let addr = base_addr + i * 4;
        let found = bus.read32(addr);
        if found != expected(i) {
            return Err(MemTestError::Memory {
                addr,
                expected: expected(i),
                found,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dram::sim::SimSoc;
    use sun55i::DRAM_BASE_ADDR;

    /// Memory with one bit stuck at one.
    struct StuckBit {
        soc: SimSoc,
        addr: usize,
        bit: u32,
    }

    impl RegisterAccess for StuckBit {
        fn read32(&mut self, addr: usize) -> u32 {
            let value = self.soc.read32(addr);
            if addr == self.addr {
                value | (1 << self.bit)
            } else {
                value
            }
        }

        fn write32(&mut self, addr: usize, value: u32) {
            self.soc.write32(addr, value)
        }

        fn read16(&mut self, addr: usize) -> u16 {
            self.soc.read16(addr)
        }

        fn write16(&mut self, addr: usize, value: u16) {
            self.soc.write16(addr, value)
        }

        fn read8(&mut self, addr: usize) -> u8 {
            self.soc.read8(addr)
        }

        fn write8(&mut self, addr: usize, value: u8) {
            self.soc.write8(addr, value)
        }
    }

    fn stuck(bit: u32) -> StuckBit {
        StuckBit {
            soc: SimSoc::healthy(),
            addr: DRAM_BASE_ADDR + 8,
            bit,
        }
    }

    #[test]
    fn test_healthy_memory() {
        let mut soc = SimSoc::healthy();
        walking_zero_test(&mut soc, DRAM_BASE_ADDR, 16).unwrap();
        walking_one_test(&mut soc, DRAM_BASE_ADDR, 16).unwrap();
        checkerboard_test(&mut soc, DRAM_BASE_ADDR, 16).unwrap();
    }

    #[test]
    fn test_unaligned() {
        let mut soc = SimSoc::healthy();
        assert_eq!(
            walking_one_test(&mut soc, DRAM_BASE_ADDR + 2, 4),
            Err(MemTestError::AddrNotAligned)
        );
        assert_eq!(
            checkerboard_test(&mut soc, DRAM_BASE_ADDR + 1, 4),
            Err(MemTestError::AddrNotAligned)
        );
    }

    #[test]
    fn test_empty_range() {
        let mut soc = SimSoc::healthy();
        assert!(walking_zero_test(&mut soc, DRAM_BASE_ADDR + 2, 0).is_ok());
        assert!(soc.writes().is_empty());
    }

    #[test]
    fn test_walking_one_finds_stuck_bit() {
        let mut bus = stuck(5);
        // The first pattern already has bit 0 set only.
        assert_eq!(
            walking_one_test(&mut bus, DRAM_BASE_ADDR, 4),
            Err(MemTestError::Memory {
                addr: DRAM_BASE_ADDR + 8,
                expected: 1,
                found: 1 | (1 << 5),
            })
        );
    }

    #[test]
    fn test_walking_zero_misses_stuck_one_until_its_bit() {
        let mut bus = stuck(3);
        assert_eq!(
            walking_zero_test(&mut bus, DRAM_BASE_ADDR, 4),
            Err(MemTestError::Memory {
                addr: DRAM_BASE_ADDR + 8,
                expected: !(1 << 3),
                found: u32::MAX,
            })
        );
    }

    #[test]
    fn test_checkerboard_finds_stuck_bit() {
        let mut bus = stuck(0);
        // Word 2 holds 0xAAAAAAAA in the first pass, bit 0 is clear there.
        assert_eq!(
            checkerboard_test(&mut bus, DRAM_BASE_ADDR, 4),
            Err(MemTestError::Memory {
                addr: DRAM_BASE_ADDR + 8,
                expected: 0xAAAA_AAAA,
                found: 0xAAAA_AAAB,
            })
        );
    }
}
