//! Memory controller common block (MCTL_COM).
//!
//! Most of this block is undocumented. Only the bits touched during bring-up are named here.
pub const MCTL_COM_BASE_ADDR: usize = 0x0310_2000;

pub mod offsets {
    /// Undocumented control register.
    pub const UNK_008: usize = 0x008;
    /// Master enable register 0.
    pub const MAER0: usize = 0x020;
}

pub mod unk_008 {
    pub const BIT9: u32 = 1 << 9;
    /// Enables the PHY MMIO window. Must be cleared while the controller is configured.
    pub const PHY_MMIO_ENABLE: u32 = 1 << 24;
    pub const BIT25: u32 = 1 << 25;
}

pub mod maer0 {
    pub const PHY_MASTER: u32 = 1 << 8;
    pub const BIT9: u32 = 1 << 9;
    pub const BIT15: u32 = 1 << 15;
}
