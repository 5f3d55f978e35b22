//! # Bounded polling of hardware status bits
//!
//! Every wait on a hardware status bit is bounded by a [PollLimits] iteration count. A wait that
//! does not complete yields a [PollTimeout] instead of hanging the boot.
use crate::mmio::RegisterAccess;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollLimits {
    pub max_iterations: u32,
}

impl PollLimits {
    pub const DEFAULT: Self = Self::new(1_000_000);

    pub const fn new(max_iterations: u32) -> Self {
        Self { max_iterations }
    }
}

impl Default for PollLimits {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("timeout waiting for {addr:#010x}, last read {last:#x}")]
pub struct PollTimeout {
    pub addr: usize,
    /// Last value read before giving up.
    pub last: u32,
}

/// Poll the register at `addr` until `done` accepts its value, which is returned.
pub fn await_condition<B: RegisterAccess>(
    bus: &mut B,
    addr: usize,
    limits: PollLimits,
    mut done: impl FnMut(u32) -> bool,
) -> Result<u32, PollTimeout> {
    let mut last = 0;
    for _ in 0..limits.max_iterations {
        last = bus.read32(addr);
        if done(last) {
            return Ok(last);
        }
        core::hint::spin_loop();
    }
    Err(PollTimeout { addr, last })
}

/// Poll the register at `addr` until `value & mask == expected`.
#[inline]
pub fn await_completion<B: RegisterAccess>(
    bus: &mut B,
    addr: usize,
    mask: u32,
    expected: u32,
    limits: PollLimits,
) -> Result<(), PollTimeout> {
    await_condition(bus, addr, limits, |val| val & mask == expected).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dram::sim::SimSoc;

    const STATUS: usize = 0x0311_0840;

    #[test]
    fn test_completes_immediately() {
        let mut soc = SimSoc::healthy();
        assert!(await_completion(&mut soc, STATUS, 0xc, 0xc, PollLimits::new(1)).is_ok());
        assert_eq!(soc.read_count(STATUS), 1);
    }

    #[test]
    fn test_timeout_is_bounded() {
        let mut soc = SimSoc::healthy();
        let result = await_completion(&mut soc, 0x4000_0000, 1, 1, PollLimits::new(10));
        assert_eq!(
            result,
            Err(PollTimeout {
                addr: 0x4000_0000,
                last: 0
            })
        );
        assert_eq!(soc.read_count(0x4000_0000), 10);
    }

    #[test]
    fn test_condition_returns_matching_value() {
        let mut soc = SimSoc::healthy();
        let result = await_condition(&mut soc, STATUS, PollLimits::new(1), |val| val & 0x4 != 0);
        assert_eq!(result, Ok(0xc));
    }

    #[test]
    fn test_zero_iterations_times_out() {
        let mut soc = SimSoc::healthy();
        assert!(await_completion(&mut soc, STATUS, 0, 0, PollLimits::new(0)).is_err());
    }
}
