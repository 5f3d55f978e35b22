//! # Memory clock and unit conversions
use fugit::HertzU32;

/// Picoseconds per second times two, the data rate runs at twice the memory clock.
const PS_PER_S_X2: u64 = 2_000_000_000_000;

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("memory clock must be non-zero")]
pub struct InvalidClockError;

/// Clock of a DDR memory interface.
///
/// The data rate is twice the clock frequency. All conversions from picoseconds round up, so a
/// timing constraint is never violated because of rounding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryClock {
    clk: HertzU32,
}

impl MemoryClock {
    pub fn new(clk: HertzU32) -> Result<Self, InvalidClockError> {
        if clk.raw() == 0 {
            return Err(InvalidClockError);
        }
        Ok(Self { clk })
    }

    #[inline]
    pub fn from_mhz(mhz: u32) -> Result<Self, InvalidClockError> {
        Self::new(HertzU32::from_raw(mhz.saturating_mul(1_000_000)))
    }

    #[inline]
    pub const fn clock(&self) -> HertzU32 {
        self.clk
    }

    /// Data rate in transfers per second.
    #[inline]
    pub const fn data_rate(&self) -> u64 {
        2 * self.clk.raw() as u64
    }

    /// Clock period in picoseconds, rounded to the nearest picosecond.
    pub const fn period_ps(&self) -> u32 {
        let rate = self.data_rate();
        ((PS_PER_S_X2 + rate / 2) / rate) as u32
    }

    /// Converts a duration in picoseconds to memory clock cycles, rounding up.
    ///
    /// Saturates at [u32::MAX].
    pub const fn picos_to_mclk(&self, picos: u32) -> u32 {
        if picos == 0 {
            return 0;
        }
        let clks = (picos as u128 * self.data_rate() as u128).div_ceil(PS_PER_S_X2 as u128);
        if clks > u32::MAX as u128 {
            return u32::MAX;
        }
        clks as u32
    }

    /// Same as [Self::picos_to_mclk], but never returns less than `min_clks`.
    ///
    /// This expresses the common JEDEC form "max(n nCK, t ps)".
    #[inline]
    pub const fn picos_to_mclk_min(&self, picos: u32, min_clks: u32) -> u32 {
        let clks = self.picos_to_mclk(picos);
        if clks < min_clks { min_clks } else { clks }
    }

    /// Converts memory clock cycles to picoseconds.
    #[inline]
    pub const fn mclk_to_picos(&self, mclk: u32) -> u32 {
        mclk.saturating_mul(self.period_ps())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_clock_rejected() {
        assert_eq!(MemoryClock::from_mhz(0), Err(InvalidClockError));
    }

    #[test]
    fn test_period() {
        assert_eq!(MemoryClock::from_mhz(400).unwrap().period_ps(), 2500);
        assert_eq!(MemoryClock::from_mhz(533).unwrap().period_ps(), 1876);
        assert_eq!(MemoryClock::from_mhz(360).unwrap().period_ps(), 2778);
    }

    #[test]
    fn test_picos_rounds_up() {
        let clk = MemoryClock::from_mhz(400).unwrap();
        assert_eq!(clk.picos_to_mclk(0), 0);
        assert_eq!(clk.picos_to_mclk(2500), 1);
        assert_eq!(clk.picos_to_mclk(2501), 2);
        assert_eq!(clk.picos_to_mclk(15000), 6);
        assert_eq!(clk.picos_to_mclk(7500), 3);
    }

    #[test]
    fn test_picos_min_clamp() {
        let clk = MemoryClock::from_mhz(360).unwrap();
        // 7.5 ns at 360 MHz are three cycles.
        assert_eq!(clk.picos_to_mclk(7500), 3);
        assert_eq!(clk.picos_to_mclk_min(7500, 4), 4);
        assert_eq!(clk.picos_to_mclk_min(15000, 4), 6);
    }

    #[test]
    fn test_picos_large_values() {
        let clk = MemoryClock::from_mhz(4000).unwrap();
        assert_eq!(clk.picos_to_mclk(u32::MAX), 17_179_870);
    }
}
