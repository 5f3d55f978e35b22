//! # DRAM module
//!
//! Brings up the DesignWare uMCTL2 based DRAM controller and its PHY. The usual entry point is
//! [init] (or its fallible variant [try_init]), which detects the installed geometry and returns
//! the usable DRAM size in bytes.
//!
//! The building blocks can also be used on their own:
//!
//! 1. [crate::clocks::dram] configures the DRAM clock tree.
//! 2. [ctrl::bring_up] performs one complete bring-up attempt for a fixed geometry candidate.
//! 3. [detect] drives repeated bring-up attempts to find the installed geometry.
use arbitrary_int::{u2, u4};

use crate::{
    clocks::FactorOutOfRangeError,
    poll::{PollLimits, PollTimeout},
    time::MegaHertz,
};

pub mod addrmap;
pub mod ctrl;
pub mod detect;
pub mod memtest;
pub mod nsi;
pub mod phy;
pub mod presets;
pub mod timing;

#[cfg(test)]
pub(crate) mod sim;

pub use addrmap::{AddrMap, AddrMapError};
pub use ctrl::bring_up;
pub use detect::{calc_size, init, try_init};
pub use ddr_timing::InvalidClockError;

/// Clock used while probing the geometry.
pub const DETECTION_CLOCK: MegaHertz = MegaHertz::from_raw(360);

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, num_enum::TryFromPrimitive, num_enum::IntoPrimitive,
)]
#[repr(u8)]
pub enum DramType {
    Ddr3 = 3,
    Ddr4 = 4,
    Lpddr3 = 7,
    Lpddr4 = 8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ranks {
    Single = 1,
    Dual = 2,
}

impl Ranks {
    #[inline]
    pub const fn count(&self) -> u8 {
        *self as u8
    }
}

/// Geometry of one bring-up candidate.
///
/// Columns and rows are address bit counts. Eight banks are always assumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub ranks: Ranks,
    /// 32-bit bus if true, 16-bit bus otherwise.
    pub full_width: bool,
    pub rows: u8,
    pub cols: u8,
}

impl Geometry {
    pub const fn new(ranks: Ranks, full_width: bool, rows: u8, cols: u8) -> Self {
        Self {
            ranks,
            full_width,
            rows,
            cols,
        }
    }

    /// Bytes transferred per bus beat.
    #[inline]
    pub const fn bus_bytes(&self) -> u64 {
        if self.full_width { 4 } else { 2 }
    }

    /// 0 for the 16-bit bus, 1 for the 32-bit bus.
    #[inline]
    pub const fn width_bit(&self) -> u32 {
        self.full_width as u32
    }

    /// Byte lane mask used by the PHY status registers.
    #[inline]
    pub const fn lane_mask(&self) -> u32 {
        if self.full_width { 0xf } else { 0x3 }
    }
}

/// Bit 16..=23 enable the individual PHY calibration steps, the low byte holds the CA delay
/// when it is not taken from tpr0.
#[bitbybit::bitfield(u32, default = 0x0, debug)]
pub struct Tpr10 {
    #[bit(31, rw)]
    ca_delay_from_tpr0: bool,
    /// A non-zero value doubles the CA delay derived from [Self::ca_delay_coarse] and
    /// [Self::ca_delay_fine].
    #[bits(29..=30, rw)]
    ca_delay_double: u2,
    #[bit(23, rw)]
    write_training: bool,
    #[bit(22, rw)]
    read_training: bool,
    #[bit(21, rw)]
    read_calibration: bool,
    #[bit(20, rw)]
    write_leveling: bool,
    #[bit(18, rw)]
    dx_bit_delay1: bool,
    #[bit(17, rw)]
    dx_bit_delay0: bool,
    #[bit(16, rw)]
    ca_bit_delay: bool,
    #[bits(4..=7, rw)]
    ca_delay_coarse: u4,
    #[bits(0..=3, rw)]
    ca_delay_fine: u4,
}

/// Board specific DRAM parameters. These stay fixed for the whole bring-up.
#[derive(Debug, Clone, Copy)]
pub struct DramPara {
    pub dram_type: DramType,
    pub dx_odt: u32,
    pub dx_dri: u32,
    pub ca_dri: u32,
    pub tpr0: u32,
    pub tpr1: u32,
    pub tpr2: u32,
    pub tpr6: u32,
    pub tpr10: Tpr10,
}

/// Tuning values which differ between the detection phase and the final bring-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tuning {
    pub odt_en: u32,
    pub tpr11: u32,
    pub tpr12: u32,
    pub tpr14: u32,
}

impl Tuning {
    /// Conservative values used while the geometry is probed.
    pub const fn detection_defaults(dram_type: DramType) -> Result<Self, DramError> {
        match dram_type {
            DramType::Ddr3 => Ok(Self {
                odt_en: 0x9090_9090,
                tpr11: 0x8f91_9190,
                tpr12: 0x2222_2723,
                tpr14: 0x4848_4848,
            }),
            DramType::Lpddr4 => Ok(Self {
                odt_en: 0x8484_8484,
                tpr11: 0x9a9a_9a9a,
                tpr12: 0x0e0f_070a,
                tpr14: 0x4848_4848,
            }),
            DramType::Ddr4 | DramType::Lpddr3 => Err(DramError::UnsupportedDramType(dram_type)),
        }
    }
}

/// Everything a single bring-up attempt depends on besides the board parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DramConfig {
    pub geometry: Geometry,
    pub clk: MegaHertz,
    pub tuning: Tuning,
}

/// Build time configuration of the DRAM bring-up.
#[derive(Debug, Clone, Copy)]
pub struct DramInitConfig {
    pub para: DramPara,
    /// Production DRAM clock.
    pub clk: MegaHertz,
    /// Production tuning values.
    pub tuning: Tuning,
    pub poll: PollLimits,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationPhase {
    WriteLeveling,
    ReadCalibration,
    ReadTraining,
    WriteTraining,
}

impl CalibrationPhase {
    pub const fn name(&self) -> &'static str {
        match self {
            CalibrationPhase::WriteLeveling => "write leveling",
            CalibrationPhase::ReadCalibration => "read calibration",
            CalibrationPhase::ReadTraining => "read training",
            CalibrationPhase::WriteTraining => "write training",
        }
    }
}

/// Non-fatal outcome of one bring-up attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BringUp {
    Calibrated,
    CalibrationFailed(CalibrationPhase),
}

impl BringUp {
    #[inline]
    pub const fn is_calibrated(&self) -> bool {
        matches!(self, BringUp::Calibrated)
    }
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DramError {
    #[error("This DRAM setup is currently not supported: {0:?}")]
    UnsupportedDramType(DramType),
    #[error(transparent)]
    AddrMap(#[from] AddrMapError),
    #[error("hardware did not respond: {0}")]
    Timeout(#[from] PollTimeout),
    #[error("unsupported DRAM clock: {0}")]
    UnsupportedClock(#[from] FactorOutOfRangeError),
    #[error("invalid DRAM clock: {0}")]
    InvalidClock(#[from] InvalidClockError),
    #[error("This DRAM setup is currently not supported: no rank and bus width combination works")]
    NoWorkingGeometry,
}
