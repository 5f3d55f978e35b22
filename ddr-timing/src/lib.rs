//! # DDR timing math
//!
//! Technology level helpers shared by DDR memory controller drivers:
//!
//! - [clock]: memory clock handling and the picosecond to clock cycle conversion. Conversions
//!   always round towards the larger, safe cycle count.
//! - [jedec]: JEDEC latency tables and mode register encodings.
//! - [fsl]: computation of the register image of the Freescale/NXP DDR memory controller from
//!   DIMM parameters, controller options and common timing parameters.
//!
//! Everything in this crate is pure computation, no register access is performed.
#![no_std]
#![cfg_attr(docsrs, feature(doc_cfg))]

#[cfg(any(test, feature = "std"))]
extern crate std;

pub mod clock;
pub mod fsl;
pub mod jedec;

pub use clock::{InvalidClockError, MemoryClock};
