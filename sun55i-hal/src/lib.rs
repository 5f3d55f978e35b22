//! # HAL for the DRAM subsystem of the Allwinner sun55i SoC family
//!
//! This crate brings up the external DRAM of the A523/A527/T527 parts. It sits on top of the
//! [sun55i] register description crate and the [ddr_timing] math crate.
//!
//! The bring-up is split into the same building blocks the hardware is made of:
//!
//! - [clocks::dram]: PLL_DDR, DRAM module clock and MBUS sequencing.
//! - [dram::timing]: conversion of JEDEC timings into uMCTL2 timing register words.
//! - [dram::addrmap]: address map programming for a given geometry.
//! - [dram::phy]: PHY configuration and the calibration engine.
//! - [dram::ctrl]: the controller bring-up orchestrator.
//! - [dram::detect]: rank, bus width and size auto-detection, and the [dram::init] entry point.
//!
//! All register accesses go through the [RegisterAccess] trait. On hardware, [Mmio] performs
//! volatile accesses. All waits on hardware status bits are bounded, see [poll].
#![no_std]
#![cfg_attr(docsrs, feature(doc_cfg))]

#[cfg(any(test, feature = "std"))]
extern crate std;

pub mod clocks;
pub mod dram;
pub mod mmio;
pub mod poll;
pub mod time;

pub use mmio::{Mmio, RegisterAccess};
pub use poll::{PollLimits, PollTimeout};
