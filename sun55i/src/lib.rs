//! # Rust peripheral access crate (PAC) for the DRAM subsystem of the Allwinner sun55i family
//!
//! This crate only covers the register blocks touched while bringing up external DRAM on the
//! A523/T527 parts:
//!
//! - The DRAM related part of the clock control unit (CCU).
//! - The PRCM power-off gating register.
//! - The system configuration block (resistor calibration).
//! - The memory controller common block (MCTL_COM).
//! - The DesignWare uMCTL2 based memory controller (MCTL_CTL).
//! - The DRAM PHY.
//! - The network-on-chip QoS (NSI) block.
//!
//! Registers are described by their offset relative to a block base address, and by
//! [bitbybit] bitfields where the field layout is known. The HAL performs the actual bus
//! accesses.
#![no_std]

pub mod ccu;
pub mod mctl_com;
pub mod mctl_ctl;
pub mod nsi;
pub mod phy;
pub mod prcm;
pub mod sys_cfg;

/// Start of the DRAM window in the physical address space.
pub const DRAM_BASE_ADDR: usize = 0x4000_0000;
