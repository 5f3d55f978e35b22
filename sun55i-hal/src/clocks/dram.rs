//! DRAM clock tree: PLL_DDR, the DRAM module clock and the MBUS.
use embedded_hal::delay::DelayNs;
use sun55i::ccu::{
    CCU_BASE_ADDR, DramBusGateReset, DramClockConfig, DramClockSource, MbusConfig, PllDdrControl,
    offsets,
};

use crate::{
    mmio::RegisterAccess,
    poll::{PollLimits, PollTimeout, await_condition},
    time::{Hertz, MegaHertz},
};

/// Reference oscillator feeding PLL_DDR.
pub const PLL_DDR_REF_CLK: Hertz = Hertz::from_raw(24_000_000);

/// Smallest supported PLL_DDR multiplier.
pub const PLL_DDR_N_MIN: u32 = 12;
/// Largest supported PLL_DDR multiplier.
pub const PLL_DDR_N_MAX: u32 = 255;

/// Divider M of the DRAM module clock.
const DRAM_CLK_DIV: u8 = 4;

const PLL_DDR_CTRL: usize = CCU_BASE_ADDR + offsets::PLL_DDR_CTRL;
const MBUS_CFG: usize = CCU_BASE_ADDR + offsets::MBUS_CFG;
const DRAM_CLK_CFG: usize = CCU_BASE_ADDR + offsets::DRAM_CLK_CFG;
const DRAM_BUS_GATE_RESET: usize = CCU_BASE_ADDR + offsets::DRAM_BUS_GATE_RESET;

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("pll_ddr multiplier value {0} is out of range ({PLL_DDR_N_MIN}..={PLL_DDR_N_MAX})")]
pub struct FactorOutOfRangeError(pub u32);

/// Multiplier N of PLL_DDR. The PLL runs at twice the DRAM clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PllDdrFactor(u8);

impl PllDdrFactor {
    pub const fn new(n: u32) -> Result<Self, FactorOutOfRangeError> {
        if n < PLL_DDR_N_MIN || n > PLL_DDR_N_MAX {
            return Err(FactorOutOfRangeError(n));
        }
        Ok(Self(n as u8))
    }

    /// Multiplier for the given DRAM clock, rounded down.
    pub const fn for_dram_clock(clk: MegaHertz) -> Result<Self, FactorOutOfRangeError> {
        Self::new(clk.raw().saturating_mul(2) / (PLL_DDR_REF_CLK.raw() / 1_000_000))
    }

    #[inline]
    pub const fn n(&self) -> u32 {
        self.0 as u32
    }

    /// PLL_DDR output frequency.
    #[inline]
    pub const fn pll_clock(&self) -> Hertz {
        Hertz::from_raw(PLL_DDR_REF_CLK.raw() * self.0 as u32)
    }

    /// Resulting DRAM clock.
    #[inline]
    pub const fn dram_clock(&self) -> Hertz {
        Hertz::from_raw(self.pll_clock().raw() / 2)
    }
}

/// Put all DRAM related blocks into reset, lock PLL_DDR at the requested rate and release the
/// DRAM controller and MBUS again.
///
/// The only fallible step is the wait for the PLL lock.
pub fn configure_dram_clock<B: RegisterAccess, D: DelayNs>(
    bus: &mut B,
    delay: &mut D,
    factor: PllDdrFactor,
    limits: PollLimits,
) -> Result<(), PollTimeout> {
    modify_mbus(bus, |val| val.with_enable(false));
    modify_mbus(bus, |val| val.with_reset_deasserted(false));
    modify_mbus(bus, |val| val.with_update(true));
    modify_gate_reset(bus, |val| val.with_gate_open(false));
    delay.delay_us(5);
    modify_gate_reset(bus, |val| val.with_reset_deasserted(false));
    bus.modify32(PLL_DDR_CTRL, |val| {
        PllDdrControl::new_with_raw_value(val)
            .with_enable(false)
            .raw_value()
    });
    modify_dram_clk(bus, |val| val.with_enable(false).with_update(true));
    delay.delay_us(5);

    log::debug!(
        "PLL_DDR: N = {}, DRAM clock {} Hz",
        factor.n(),
        factor.dram_clock().raw()
    );
    bus.write32(
        PLL_DDR_CTRL,
        PllDdrControl::DEFAULT
            .with_enable(true)
            .with_ldo_enable(true)
            .with_lock_enable(true)
            .with_output_enable(true)
            .with_n_minus_one((factor.n() - 1) as u8)
            .raw_value(),
    );
    await_condition(bus, PLL_DDR_CTRL, limits, |val| {
        PllDdrControl::new_with_raw_value(val).locked()
    })?;

    bus.write32(
        DRAM_CLK_CFG,
        DramClockConfig::DEFAULT
            .with_source(DramClockSource::PllDdr)
            .raw_value(),
    );
    bus.write32(
        DRAM_BUS_GATE_RESET,
        DramBusGateReset::DEFAULT
            .with_reset_deasserted(true)
            .raw_value(),
    );
    delay.delay_us(5);
    modify_gate_reset(bus, |val| val.with_gate_open(true));

    modify_mbus(bus, |val| val.with_reset_deasserted(true).with_update(true));
    modify_mbus(bus, |val| val.with_enable(true).with_update(true));

    modify_dram_clk(bus, |val| {
        val.with_m_minus_one(arbitrary_int::u5::new(DRAM_CLK_DIV - 1))
            .with_enable(true)
            .with_update(true)
    });
    delay.delay_us(5);
    Ok(())
}

#[inline]
fn modify_mbus<B: RegisterAccess>(bus: &mut B, f: impl FnOnce(MbusConfig) -> MbusConfig) {
    bus.modify32(MBUS_CFG, |val| {
        f(MbusConfig::new_with_raw_value(val)).raw_value()
    });
}

#[inline]
fn modify_gate_reset<B: RegisterAccess>(
    bus: &mut B,
    f: impl FnOnce(DramBusGateReset) -> DramBusGateReset,
) {
    bus.modify32(DRAM_BUS_GATE_RESET, |val| {
        f(DramBusGateReset::new_with_raw_value(val)).raw_value()
    });
}

#[inline]
fn modify_dram_clk<B: RegisterAccess>(
    bus: &mut B,
    f: impl FnOnce(DramClockConfig) -> DramClockConfig,
) {
    bus.modify32(DRAM_CLK_CFG, |val| {
        f(DramClockConfig::new_with_raw_value(val)).raw_value()
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dram::sim::{RecordingDelay, SimSoc};

    #[test]
    fn test_factor_range() {
        assert_eq!(PllDdrFactor::new(11), Err(FactorOutOfRangeError(11)));
        assert_eq!(PllDdrFactor::new(256), Err(FactorOutOfRangeError(256)));
        assert_eq!(PllDdrFactor::new(12).unwrap().n(), 12);
        assert_eq!(PllDdrFactor::new(255).unwrap().n(), 255);
    }

    #[test]
    fn test_factor_for_clock() {
        let factor = PllDdrFactor::for_dram_clock(MegaHertz::from_raw(360)).unwrap();
        assert_eq!(factor.n(), 30);
        assert_eq!(factor.pll_clock().raw(), 720_000_000);
        assert_eq!(factor.dram_clock().raw(), 360_000_000);
        assert_eq!(
            PllDdrFactor::for_dram_clock(MegaHertz::from_raw(1200))
                .unwrap()
                .n(),
            100
        );
        assert!(PllDdrFactor::for_dram_clock(MegaHertz::from_raw(100)).is_err());
        assert!(PllDdrFactor::for_dram_clock(MegaHertz::from_raw(0)).is_err());
    }

    #[test]
    fn test_clock_sequence() {
        let mut soc = SimSoc::healthy();
        let mut delay = RecordingDelay::default();
        let factor = PllDdrFactor::for_dram_clock(MegaHertz::from_raw(360)).unwrap();
        configure_dram_clock(&mut soc, &mut delay, factor, PollLimits::default()).unwrap();

        let pll_writes = soc.writes_to(PLL_DDR_CTRL);
        // Disable, then the final configuration with N - 1 = 29.
        assert_eq!(pll_writes.len(), 2);
        assert_eq!(pll_writes[1], 0xe800_1d00);
        assert_eq!(soc.writes_to(DRAM_CLK_CFG).last().copied(), Some(0x8800_0003));
        assert_eq!(soc.writes_to(MBUS_CFG).last().copied(), Some(0xc800_0000));
        assert_eq!(
            soc.writes_to(DRAM_BUS_GATE_RESET).last().copied(),
            Some(0x0001_0001)
        );
        assert_eq!(delay.total_us(), 20);
    }

    #[test]
    fn test_pll_lock_timeout() {
        let mut soc = SimSoc::healthy();
        soc.set_pll_lock(false);
        let mut delay = RecordingDelay::default();
        let factor = PllDdrFactor::new(30).unwrap();
        let result = configure_dram_clock(&mut soc, &mut delay, factor, PollLimits::new(100));
        assert_eq!(
            result,
            Err(PollTimeout {
                addr: PLL_DDR_CTRL,
                last: 0xe800_1d00
            })
        );
    }
}
