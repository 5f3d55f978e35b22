//! System configuration block, resistor calibration part.
use arbitrary_int::u6;

pub const SYS_CFG_BASE_ADDR: usize = 0x0300_0000;

pub mod offsets {
    pub const RES_CAL_CTRL: usize = 0x160;
    pub const RES240_CTRL: usize = 0x168;
}

#[bitbybit::bitfield(u32, default = 0x0, debug)]
pub struct ResCalControl {
    /// Selects the external 240 Ohm reference for the DRAM ZQ calibration.
    #[bit(8, rw)]
    external_reference: bool,
}

#[bitbybit::bitfield(u32, default = 0x0, debug)]
pub struct Res240Control {
    #[bits(0..=5, rw)]
    trim: u6,
}
