//! # Geometry detection and the DRAM init entry point
//!
//! The installed DRAM is not described by the board configuration. It is probed with repeated
//! bring-up attempts at [DETECTION_CLOCK] and conservative tuning values:
//!
//! 1. Rank count and bus width, most demanding candidate first. A less demanding candidate
//!    would also calibrate on better hardware, but leave most of the memory unused.
//! 2. Row and column bits, by checking at which address offset the memory starts to alias.
//!
//! The final bring-up then runs with the production clock and tuning values.
use embedded_hal::delay::DelayNs;
use sun55i::DRAM_BASE_ADDR;

use super::{
    DETECTION_CLOCK, DramConfig, DramError, DramInitConfig, DramPara, Geometry, Ranks, Tuning,
    ctrl::{self, bring_up},
    nsi,
};
use crate::{mmio::RegisterAccess, poll::PollLimits};

/// Probing order of the rank and bus width detection.
pub const RANK_WIDTH_CANDIDATES: [(bool, Ranks); 4] = [
    (true, Ranks::Dual),
    (true, Ranks::Single),
    (false, Ranks::Dual),
    (false, Ranks::Single),
];

/// Smallest supported geometry, used while the rank count and bus width are probed.
const MIN_ROWS: u8 = 13;
const MIN_COLS: u8 = 8;
/// Largest probed geometry during the size detection.
const MAX_ROWS: u8 = 16;
const MAX_COLS: u8 = 11;

const ALIAS_PATTERN: u32 = 0xaa55_aa55;

/// Usable DRAM size in bytes. Eight banks are assumed.
pub const fn calc_size(geometry: &Geometry) -> u64 {
    (1u64 << (geometry.cols as u32 + geometry.rows as u32 + 3))
        * geometry.bus_bytes()
        * geometry.ranks.count() as u64
}

/// Checks whether the DRAM at `offset` aliases the DRAM base address.
///
/// Both locations are restored afterwards.
pub fn mem_matches<B: RegisterAccess>(bus: &mut B, offset: usize) -> bool {
    let base = DRAM_BASE_ADDR;
    let saved_base = bus.read32(base);
    let saved_offset = bus.read32(base + offset);

    bus.write32(base, 0);
    bus.write32(base + offset, ALIAS_PATTERN);
    core::sync::atomic::compiler_fence(core::sync::atomic::Ordering::SeqCst);
    let matches = bus.read32(base) == bus.read32(base + offset);

    bus.write32(base, saved_base);
    bus.write32(base + offset, saved_offset);
    matches
}

/// Finds the most demanding rank count and bus width combination which calibrates.
pub fn detect_rank_width<B: RegisterAccess, D: DelayNs>(
    bus: &mut B,
    delay: &mut D,
    para: &DramPara,
    tuning: &Tuning,
    limits: PollLimits,
) -> Result<Geometry, DramError> {
    for (full_width, ranks) in RANK_WIDTH_CANDIDATES {
        log::debug!(
            "testing {}-bit width, rank = {}",
            if full_width { 32 } else { 16 },
            ranks.count()
        );
        let config = DramConfig {
            geometry: Geometry::new(ranks, full_width, MIN_ROWS, MIN_COLS),
            clk: DETECTION_CLOCK,
            tuning: *tuning,
        };
        if bring_up(bus, delay, para, &config, limits)?.is_calibrated() {
            return Ok(config.geometry);
        }
    }
    Err(DramError::NoWorkingGeometry)
}

fn bring_up_for_detection<B: RegisterAccess, D: DelayNs>(
    bus: &mut B,
    delay: &mut D,
    para: &DramPara,
    config: &DramConfig,
    limits: PollLimits,
) -> Result<(), DramError> {
    let result = bring_up(bus, delay, para, config, limits)?;
    if let super::BringUp::CalibrationFailed(phase) = result {
        // The aliasing check still gives usable results on a partially calibrated interface.
        log::warn!(
            "{} failed during size detection with {:?}",
            phase.name(),
            config.geometry
        );
    }
    Ok(())
}

/// Detects the row and column bits for the rank count and bus width in `geometry`.
pub fn detect_size<B: RegisterAccess, D: DelayNs>(
    bus: &mut B,
    delay: &mut D,
    para: &DramPara,
    tuning: &Tuning,
    geometry: Geometry,
    limits: PollLimits,
) -> Result<Geometry, DramError> {
    let width = geometry.width_bit();
    let mut config = DramConfig {
        geometry: Geometry {
            rows: MAX_ROWS,
            cols: MIN_COLS,
            ..geometry
        },
        clk: DETECTION_CLOCK,
        tuning: *tuning,
    };
    bring_up_for_detection(bus, delay, para, &config, limits)?;

    // Eight banks, eight bits per byte and the bus width.
    let rows = (MIN_ROWS..MAX_ROWS)
        .find(|&rows| mem_matches(bus, 1 << (rows as u32 + MIN_COLS as u32 + 4 + width)))
        .unwrap_or(MAX_ROWS);

    config.geometry.rows = rows;
    config.geometry.cols = MAX_COLS;
    bring_up_for_detection(bus, delay, para, &config, limits)?;

    let cols = (MIN_COLS..MAX_COLS)
        .find(|&cols| mem_matches(bus, 1 << (cols as u32 + 1 + width)))
        .unwrap_or(MAX_COLS);

    Ok(Geometry {
        rows,
        cols,
        ..geometry
    })
}

/// Detects the installed geometry, performs the final bring-up and configures the NSI QoS.
///
/// Returns the usable DRAM size in bytes.
pub fn try_init<B: RegisterAccess, D: DelayNs>(
    bus: &mut B,
    delay: &mut D,
    init: &DramInitConfig,
) -> Result<u64, DramError> {
    let para = &init.para;
    ctrl::check_supported(para.dram_type)?;
    let detection_tuning = Tuning::detection_defaults(para.dram_type)?;

    nsi::prepare_resistor_calibration(bus);

    let geometry = detect_rank_width(bus, delay, para, &detection_tuning, init.poll)?;
    let geometry = detect_size(bus, delay, para, &detection_tuning, geometry, init.poll)?;
    log::info!(
        "DRAM: {}-bit bus, {} rank(s), {} rows, {} columns",
        if geometry.full_width { 32 } else { 16 },
        geometry.ranks.count(),
        geometry.rows,
        geometry.cols
    );

    let config = DramConfig {
        geometry,
        clk: init.clk,
        tuning: init.tuning,
    };
    let result = bring_up(bus, delay, para, &config, init.poll)?;
    if let super::BringUp::CalibrationFailed(phase) = result {
        log::warn!("{} failed at {}", phase.name(), init.clk);
    }

    nsi::init_qos(bus);

    Ok(calc_size(&geometry))
}

/// Same as [try_init], but halts on configuration errors.
///
/// # Panics
///
/// Panics if the DRAM setup is not supported or the hardware does not respond.
pub fn init<B: RegisterAccess, D: DelayNs>(
    bus: &mut B,
    delay: &mut D,
    config: &DramInitConfig,
) -> u64 {
    match try_init(bus, delay, config) {
        Ok(size) => size,
        Err(e) => {
            log::error!("DRAM init failed: {}", e);
            panic!("{}", e);
        }
    }
}
