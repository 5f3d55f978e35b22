//! DRAM related registers of the clock control unit.
use arbitrary_int::{u3, u5};

pub const CCU_BASE_ADDR: usize = 0x0200_1000;

pub mod offsets {
    pub const PLL_DDR_CTRL: usize = 0x010;
    pub const MBUS_CFG: usize = 0x540;
    pub const DRAM_CLK_CFG: usize = 0x800;
    pub const DRAM_BUS_GATE_RESET: usize = 0x80c;
}

/// PLL_DDR control register. The PLL output runs at twice the DRAM clock.
#[bitbybit::bitfield(u32, default = 0x0, debug)]
pub struct PllDdrControl {
    #[bit(31, rw)]
    enable: bool,
    #[bit(30, rw)]
    ldo_enable: bool,
    #[bit(29, rw)]
    lock_enable: bool,
    #[bit(28, r)]
    locked: bool,
    #[bit(27, rw)]
    output_enable: bool,
    /// Output = 24 MHz * N, with the register holding N - 1.
    #[bits(8..=15, rw)]
    n_minus_one: u8,
    #[bit(1, rw)]
    input_div2: bool,
    #[bit(0, rw)]
    output_div2: bool,
}

#[bitbybit::bitfield(u32, default = 0x0, debug)]
pub struct MbusConfig {
    #[bit(31, rw)]
    enable: bool,
    /// Clearing this bit puts the MBUS into reset.
    #[bit(30, rw)]
    reset_deasserted: bool,
    #[bit(27, rw)]
    update: bool,
}

#[bitbybit::bitenum(u3, exhaustive = false)]
#[derive(Debug, PartialEq, Eq)]
pub enum DramClockSource {
    PllDdr = 0b000,
    PllPeri2x = 0b001,
    PllPeri800M = 0b010,
}

#[bitbybit::bitfield(u32, default = 0x0, debug)]
pub struct DramClockConfig {
    #[bit(31, rw)]
    enable: bool,
    #[bit(27, rw)]
    update: bool,
    #[bits(24..=26, rw)]
    source: Option<DramClockSource>,
    /// Divider M, the register holds M - 1.
    #[bits(0..=4, rw)]
    m_minus_one: u5,
}

#[bitbybit::bitfield(u32, default = 0x0, debug)]
pub struct DramBusGateReset {
    /// Clearing this bit asserts the DRAM controller reset.
    #[bit(16, rw)]
    reset_deasserted: bool,
    #[bit(0, rw)]
    gate_open: bool,
}
