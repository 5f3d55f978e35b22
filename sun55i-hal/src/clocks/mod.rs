//! Clock module.
//!
//! Only the DRAM related clocks are handled, see [dram].
pub mod dram;

pub use dram::{FactorOutOfRangeError, PllDdrFactor, configure_dram_clock};
