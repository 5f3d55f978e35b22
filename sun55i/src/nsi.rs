//! Network-on-chip QoS (NSI) ports.
//!
//! Each master port has a priority register at offset 0x14 and a mode register at offset 0x18
//! relative to the port base.
use arbitrary_int::u2;

pub const NSI_BASE_ADDR: usize = 0x0202_0000;

/// NSI enable bit location for LPDDR4 operation.
pub const NSI_LPDDR4_ENABLE_ADDR: usize = 0x0202_3ea8;
/// CPU side NSI enable bit location for LPDDR4 operation.
pub const NSI_CPU_LPDDR4_ENABLE_ADDR: usize = 0x0207_1008;

pub mod ports {
    pub const NPU: usize = 0x0a00;
    pub const ISP: usize = 0x0c00;
    pub const IOMMU: usize = 0x1400;
    pub const VE_R: usize = 0x1600;
    pub const VE_RW: usize = 0x1800;
    pub const DE: usize = 0x1a00;
    pub const CSI: usize = 0x1c00;
}

pub mod autogating {
    pub const PCIE: usize = 0x0600;
    pub const RA0: usize = 0x3c00;
    pub const TA: usize = 0x3e00;
}

pub const PORT_PRIORITY_OFFSET: usize = 0x14;
pub const PORT_MODE_OFFSET: usize = 0x18;

#[bitbybit::bitenum(u2, exhaustive = true)]
#[derive(Debug, PartialEq, Eq)]
pub enum Priority {
    Low = 0,
    Medium = 1,
    High = 2,
    Highest = 3,
}

/// Read and write priority are configured separately.
#[bitbybit::bitfield(u32, default = 0x0, debug)]
pub struct PortPriority {
    #[bits(2..=3, rw)]
    write: Priority,
    #[bits(0..=1, rw)]
    read: Priority,
}

#[bitbybit::bitfield(u32, default = 0x0, debug)]
pub struct PortMode {
    /// Use the priority register instead of the priority signalled by the master.
    #[bit(0, rw)]
    use_register_priority: bool,
}
