//! PRCM (power, reset and clock management) registers used by the DRAM bring-up.
pub const PRCM_BASE_ADDR: usize = 0x0701_0000;

pub mod offsets {
    pub const SYS_PWROFF_GATING: usize = 0x250;
}

#[bitbybit::bitfield(u32, default = 0x0, debug)]
pub struct SysPowerOffGating {
    /// Gates the DRAM pads while the PHY is brought up.
    #[bit(0, rw)]
    dram_pad_hold: bool,
}
