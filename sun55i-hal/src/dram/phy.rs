//! # DRAM PHY configuration and calibration
//!
//! [configure] performs the static PHY setup of a bring-up attempt. After the controller has
//! finished the DFI initialization, [calibrate] runs the calibration steps enabled in
//! [DramPara::tpr10] and applies the bit-delay compensation.
//!
//! Every calibration step reports success as a boolean. A step which does not complete in time
//! counts as a failed attempt, the cleanup writes of the step are always performed.
use embedded_hal::delay::DelayNs;
use sun55i::{
    mctl_com::{MCTL_COM_BASE_ADDR, offsets as com_offsets, unk_008},
    phy::{DX_LANE_STRIDE, DX_LANES, DelayAccess, PHY_BASE_ADDR, dx_delay, offsets},
    prcm::{PRCM_BASE_ADDR, SysPowerOffGating, offsets as prcm_offsets},
};

use super::{
    BringUp, CalibrationPhase, DramConfig, DramPara, DramType, Geometry, Tuning, timing,
};
use crate::{
    mmio::RegisterAccess,
    poll::{PollLimits, await_completion},
    time::MegaHertz,
};

/// Attempts per calibration step before the bring-up is given up.
pub const CALIBRATION_ATTEMPTS: u32 = 5;

const DELAY_WRITE_ENABLE: u32 = DelayAccess::DEFAULT
    .with_delay_write_enable(true)
    .raw_value();
const DX_RESET: u32 = DelayAccess::DEFAULT.with_dx_reset(true).raw_value();

/// Write leveling start bit of [offsets::WL_CTRL].
const WL_START: u16 = 1 << 2;
/// Rank select field of [offsets::WL_CTRL].
const WL_RANK_MASK: u16 = 0xc0;
const WL_RANK1: u16 = 0x40;
/// Results which indicate that write leveling found no edge.
const WL_RESULT_INVALID: [u32; 2] = [0, 0x3f];
const WL_RESULTS: [usize; 4] = [
    offsets::WL_RESULT_RANK0,
    offsets::WL_RESULT_RANK0_HI,
    offsets::WL_RESULT_RANK1,
    offsets::WL_RESULT_RANK1_HI,
];

const RC_START: u32 = 1 << 0;
const RC_RANK_MASK: u32 = 0x3c;
const RC_RANK_SELECT: [u32; 2] = [0x38, 0x34];
const RC_ERROR: u32 = 1 << 5;

/// A left and right window edge closer than this marks the training as failed.
const TRAINING_MIN_WINDOW: u32 = 6;

/// Address/command remapping, one table per DRAM type.
const AC_REMAP_DDR3: [u32; 8] = [
    0x150a_0310,
    0x1314_0816,
    0x001c_0d1b,
    0x050c_1d1a,
    0x0411_060b,
    0x0907_1217,
    0x1819_0e01,
    0x020f_1e00,
];
const AC_REMAP_DDR4: [u32; 8] = [
    0x090c_1c14,
    0x1300_060f,
    0x1203_0807,
    0x0b10_0a02,
    0x1a11_0e05,
    0x0d04_1617,
    0x1819_011b,
    0x151d_1e00,
];
const AC_REMAP_LPDDR3: [u32; 8] = [
    0x010a_1a0f,
    0x1008_1b07,
    0x1106_1c12,
    0x0013_1409,
    0x1503_0e16,
    0x0b0c_0d17,
    0x1819_0204,
    0x051d_1e00,
];
const AC_REMAP_LPDDR4: [u32; 8] = [
    0x0001_0203,
    0x0405_0607,
    0x0809_0a0b,
    0x0c0d_0e0f,
    0x1011_1213,
    0x1415_1617,
    0x1819_1a1b,
    0x1c1d_1e00,
];

#[inline]
const fn reg(offset: usize) -> usize {
    PHY_BASE_ADDR + offset
}

/// Address of a per lane register, given by its lane 0 offset.
#[inline]
const fn lane_reg(lane: usize, offset: usize) -> usize {
    PHY_BASE_ADDR + offset + lane * DX_LANE_STRIDE
}

/// Five bit field of byte `n`.
#[inline]
const fn mask_byte(value: u32, n: usize) -> u32 {
    (value >> (8 * n)) & 0x1f
}

#[inline]
const fn replicate(byte: u32) -> u32 {
    (byte << 24) | (byte << 16) | (byte << 8) | byte
}

/// Packs four delay entries into one register word, first entry in the top byte.
#[inline]
fn pack(entries: &[u32]) -> u32 {
    entries.iter().fold(0, |word, entry| (word << 8) | (entry & 0xff))
}

pub(crate) fn set_dram_pad_hold<B: RegisterAccess>(bus: &mut B, hold: bool) {
    bus.modify32(PRCM_BASE_ADDR + prcm_offsets::SYS_PWROFF_GATING, |val| {
        SysPowerOffGating::new_with_raw_value(val)
            .with_dram_pad_hold(hold)
            .raw_value()
    });
}

fn await_phy<B: RegisterAccess>(
    bus: &mut B,
    offset: usize,
    mask: u32,
    expected: u32,
    limits: PollLimits,
) -> bool {
    match await_completion(bus, reg(offset), mask, expected, limits) {
        Ok(()) => true,
        Err(e) => {
            log::debug!("PHY calibration step timed out: {}", e);
            false
        }
    }
}

pub const fn ac_remap(dram_type: DramType) -> &'static [u32; 8] {
    match dram_type {
        DramType::Ddr3 => &AC_REMAP_DDR3,
        DramType::Ddr4 => &AC_REMAP_DDR4,
        DramType::Lpddr3 => &AC_REMAP_LPDDR3,
        DramType::Lpddr4 => &AC_REMAP_LPDDR4,
    }
}

/// Clock dependent VREF settings for [offsets::CLK_VREF] and [offsets::CLK_VREF_LANES].
pub const fn clk_vref(clk: MegaHertz) -> (u32, u32) {
    // TODO: fix intervals
    match clk.raw() {
        251..=500 => (0x1800_0000, 0x1818_1818),
        126..=250 => (0x2800_0000, 0x2828_2828),
        0..=125 => (0x3800_0000, 0x3838_3838),
        _ => (0x1800_0000, 0),
    }
}

/// Drive strength and ODT of the DX lanes and the CA drive strength.
pub fn configure_odt<B: RegisterAccess>(bus: &mut B, para: &DramPara) {
    let lpddr4 = para.dram_type == DramType::Lpddr4;

    let drive_hi = para.dx_dri;
    let drive_lo = if !lpddr4 {
        para.dx_dri
    } else if para.tpr1 & 0x1f1f_1f1f != 0 {
        para.tpr1
    } else {
        0x0404_0404
    };
    for lane in 0..DX_LANES {
        bus.clrsetbits32(
            lane_reg(lane, offsets::DX_DRIVE_ODT),
            0x1f1f_0000,
            (mask_byte(drive_hi, lane) << 24) | (mask_byte(drive_lo, lane) << 16),
        );
    }

    let ca = para.ca_dri;
    bus.clrsetbits32(
        reg(offsets::CA_DRIVE),
        0x1f1f_1f1f,
        (mask_byte(ca, 0) << 24)
            | (mask_byte(ca, 0) << 16)
            | (mask_byte(ca, 1) << 8)
            | mask_byte(ca, 1),
    );

    let odt_hi = para.dx_odt;
    let odt_lo = if lpddr4 { 0 } else { para.dx_odt };
    for lane in 0..DX_LANES {
        bus.clrsetbits32(
            lane_reg(lane, offsets::DX_DRIVE_ODT),
            0x1f1f,
            (mask_byte(odt_hi, lane) << 8) | mask_byte(odt_lo, lane),
        );
    }
}

/// CA delay taken either from tpr0 or from the low byte of tpr10.
pub fn ca_delay(para: &DramPara) -> u32 {
    let tpr10 = para.tpr10;
    if tpr10.ca_delay_from_tpr0() {
        return para.tpr0;
    }
    let delay = (u32::from(tpr10.ca_delay_coarse().value()) << 9)
        | (u32::from(tpr10.ca_delay_fine().value()) << 1);
    if tpr10.ca_delay_double().value() != 0 {
        delay << 1
    } else {
        delay
    }
}

pub fn ca_bit_delay_compensation<B: RegisterAccess>(bus: &mut B, para: &DramPara) {
    let delay = ca_delay(para);
    let low = delay & 0xff;
    let high = (delay >> 8) & 0xff;

    bus.setbits32(reg(offsets::DELAY_ACCESS), DELAY_WRITE_ENABLE);
    bus.setbits32(reg(offsets::UNK_0AC), 1 << 12);
    bus.clrbits32(reg(offsets::UNK_048), 0xc000_0000);

    for offset in offsets::CA_DELAY {
        bus.write32(reg(offset), replicate(high));
    }
    match para.dram_type {
        DramType::Ddr3 | DramType::Ddr4 | DramType::Lpddr3 => {
            bus.write32(
                reg(offsets::CA_DELAY_CK),
                (low << 24) | (low << 16) | (high << 8) | high,
            );
        }
        DramType::Lpddr4 => {
            bus.write32(
                reg(offsets::CA_DELAY_LPDDR4),
                (high << 24) | (high << 16) | (low << 8) | low,
            );
            bus.write32(
                reg(offsets::CA_DELAY_CK),
                (low << 24) | (high << 16) | (low << 8) | high,
            );
        }
    }

    bus.setbits32(reg(offsets::CA_DELAY_UPDATE), 1);
    bus.clrbits32(reg(offsets::CA_DELAY_UPDATE), 1);
    bus.clrbits32(reg(offsets::DELAY_ACCESS), DELAY_WRITE_ENABLE);
}

/// Static PHY setup up to the point where the controller takes over for the DFI
/// initialization.
pub fn configure<B: RegisterAccess, D: DelayNs>(
    bus: &mut B,
    delay: &mut D,
    para: &DramPara,
    config: &DramConfig,
) {
    let dram_type = para.dram_type;

    set_dram_pad_hold(bus, false);
    delay.delay_us(1);

    bus.clrbits32(reg(offsets::DELAY_ACCESS), DELAY_WRITE_ENABLE);
    let lanes = if config.geometry.full_width { 0xf00 } else { 0x300 };
    bus.clrsetbits32(reg(offsets::CTRL), 0xf00, lanes);

    let latencies = timing::latencies(dram_type, config.clk);
    bus.write32(reg(offsets::WRITE_LATENCY), replicate(latencies.write));
    bus.write32(reg(offsets::READ_LATENCY), replicate(latencies.read));
    bus.write32(reg(offsets::UNK_008), 0);

    for (i, word) in ac_remap(dram_type).iter().enumerate() {
        bus.write32(reg(offsets::AC_REMAP + i * 4), *word);
    }

    configure_odt(bus, para);
    if para.tpr10.ca_bit_delay() {
        ca_bit_delay_compensation(bus, para);
    }

    let timing_ctrl = match dram_type {
        DramType::Ddr3 => 0x2bbd_4900,
        DramType::Ddr4 => 0x3841_b800,
        DramType::Lpddr3 => 0x1901_6300,
        DramType::Lpddr4 => 0x18fd_6300,
    };
    bus.clrsetbits32(reg(offsets::TIMING_CTRL), 0xffff_ff00, timing_ctrl);

    let type_select = match dram_type {
        DramType::Ddr3 => 0x20,
        DramType::Ddr4 => 0x40,
        DramType::Lpddr3 => 0x30,
        DramType::Lpddr4 => 0x50,
    };
    bus.clrbits32(reg(offsets::CTRL), 0x70);
    bus.setbits32(reg(offsets::CTRL), type_select);
    bus.setbits32(reg(offsets::CTRL), 0x80);

    let (vref, vref_lanes) = clk_vref(config.clk);
    bus.clrsetbits32(reg(offsets::CLK_VREF), 0x7800_0000, vref);
    bus.clrsetbits32(reg(offsets::CLK_VREF_LANES), 0x7878_7878, vref_lanes);

    bus.clrbits32(MCTL_COM_BASE_ADDR + com_offsets::UNK_008, unk_008::BIT9);
    delay.delay_us(10);

    // tpr6 holds one DX VREF byte per DRAM type.
    let vref_byte = match dram_type {
        DramType::Ddr3 => para.tpr6 & 0xff,
        DramType::Ddr4 => (para.tpr6 >> 8) & 0xff,
        DramType::Lpddr3 => (para.tpr6 >> 16) & 0xff,
        DramType::Lpddr4 => para.tpr6 >> 24,
    };
    for lane in [0, 2, 1, 3] {
        bus.clrsetbits32(
            lane_reg(lane, offsets::DX_CTRL),
            0xff80_0060,
            (vref_byte << 24) | 0x40,
        );
    }

    bus.setbits32(reg(offsets::DELAY_ACCESS), DX_RESET);
    bus.setbits32(reg(offsets::DX_UPDATE), 0x80);
    delay.delay_us(10);
    bus.clrbits32(reg(offsets::DX_UPDATE), 0x80);
    delay.delay_us(10);
    bus.clrbits32(reg(offsets::DELAY_ACCESS), DX_RESET);

    for lane in 0..=DX_LANES {
        bus.clrbits32(lane_reg(lane, offsets::DX_LANE_EN), 0x200);
    }
    if dram_type == DramType::Lpddr4 {
        for lane in 0..=DX_LANES {
            bus.setbits32(lane_reg(lane, offsets::DX_LANE_EN), 0x200);
        }
    }

    let unk_014 = if config.clk.raw() < 936 {
        0x1b00_0000
    } else {
        0x0c00_0000
    };
    bus.clrsetbits32(reg(offsets::UNK_014), 0x1f00_0000, unk_014);
}

/// Rewrites the write leveling control half word, followed by the unchanged upper half word.
fn modify_wl_ctrl<B: RegisterAccess>(bus: &mut B, f: impl FnOnce(u16) -> u16) {
    let low = f(bus.read16(reg(offsets::WL_CTRL)));
    let high = bus.read16(reg(offsets::TRAIN_CTRL));
    bus.write16(reg(offsets::WL_CTRL), low);
    bus.write16(reg(offsets::TRAIN_CTRL), high);
}

fn level_rank<B: RegisterAccess>(bus: &mut B, lane_mask: u32, limits: PollLimits) -> bool {
    modify_wl_ctrl(bus, |val| val | WL_START);
    let done = await_phy(bus, offsets::WL_DONE, lane_mask, lane_mask, limits);
    modify_wl_ctrl(bus, |val| val & !WL_START);
    done
}

pub fn write_leveling<B: RegisterAccess>(
    bus: &mut B,
    para: &DramPara,
    config: &DramConfig,
    limits: PollLimits,
) -> bool {
    let lane_mask = config.geometry.lane_mask();

    bus.clrsetbits32(reg(offsets::TRAIN_CTRL), 0xf00, 0xe00);
    if para.dram_type == DramType::Lpddr4 {
        bus.write8(reg(offsets::WL_LPDDR4_MR2), timing::lpddr4_mr2(config.clk));
    }

    let mut result = level_rank(bus, lane_mask, limits);
    for offset in WL_RESULTS {
        if WL_RESULT_INVALID.contains(&bus.read32(reg(offset))) {
            result = false;
        }
    }
    modify_wl_ctrl(bus, |val| val & !WL_RANK_MASK);

    if config.geometry.ranks.count() == 2 {
        modify_wl_ctrl(bus, |val| (val & !WL_RANK_MASK) | WL_RANK1);
        result &= level_rank(bus, lane_mask, limits);
    }
    modify_wl_ctrl(bus, |val| val & !WL_RANK_MASK);
    result
}

/// Waits for all lanes of the read calibration to finish, or for the error flag.
fn await_read_calibration<B: RegisterAccess>(
    bus: &mut B,
    lane_mask: u32,
    limits: PollLimits,
) -> bool {
    for _ in 0..limits.max_iterations {
        let status = bus.read32(reg(offsets::RC_STATUS));
        if status & lane_mask == lane_mask {
            return true;
        }
        if status & RC_ERROR != 0 {
            return false;
        }
        core::hint::spin_loop();
    }
    log::debug!("read calibration timed out");
    false
}

pub fn read_calibration<B: RegisterAccess>(
    bus: &mut B,
    para: &DramPara,
    geometry: &Geometry,
    limits: PollLimits,
) -> bool {
    if para.dram_type == DramType::Lpddr4 {
        bus.clrbits32(reg(offsets::UNK_044), 1 << 29);
    }

    let mut result = true;
    for select in RC_RANK_SELECT.iter().take(geometry.ranks.count() as usize) {
        bus.clrsetbits32(reg(offsets::TRAIN_CTRL), RC_RANK_MASK, *select);
        bus.setbits32(reg(offsets::TRAIN_CTRL), RC_START);
        result &= await_read_calibration(bus, geometry.lane_mask(), limits);
        bus.clrbits32(reg(offsets::TRAIN_CTRL), RC_START);
        bus.clrbits32(reg(offsets::TRAIN_CTRL), RC_RANK_MASK);
    }
    result
}

/// Register bits which differ between read and write training.
struct TrainingRegs {
    /// Bits of [offsets::TRAIN_START], set in order.
    start: [u32; 2],
    /// Bits of [offsets::TRAIN_START] cleared after each pass. Not the same set as `start`.
    clear: u32,
    rank_mask: u32,
    rank_select: [u32; 2],
    status: [usize; 2],
    done: u32,
    error: u32,
    windows: &'static [[(usize, usize); 2]; 2],
}

const READ_TRAINING: TrainingRegs = TrainingRegs {
    start: [0x6, 0x1],
    clear: 0x3,
    rank_mask: 0x3,
    // Both passes select the same value. Whether the second rank needs 1 is unverified.
    rank_select: [0x2, 0x2],
    status: offsets::RT_STATUS,
    done: 0xc,
    error: 0x3,
    windows: &offsets::RT_WINDOWS,
};

const WRITE_TRAINING: TrainingRegs = TrainingRegs {
    start: [0x10, 0x20],
    clear: 0x60,
    rank_mask: 0xc,
    rank_select: [0x8, 0x4],
    status: offsets::WT_STATUS,
    done: 0x3,
    error: 0xc,
    windows: &offsets::WT_WINDOWS,
};

impl TrainingRegs {
    /// Starts one training pass and checks the status of the active lane pairs.
    fn run<B: RegisterAccess>(&self, bus: &mut B, full_width: bool, limits: PollLimits) -> bool {
        bus.setbits32(reg(offsets::TRAIN_START), self.start[0]);
        bus.setbits32(reg(offsets::TRAIN_START), self.start[1]);

        let mut result = true;
        for status in self.status.iter().take(1 + full_width as usize) {
            result &= await_phy(bus, *status, self.done, self.done, limits);
            if bus.read32(reg(*status)) & self.error != 0 {
                result = false;
            }
        }
        result
    }

    /// Checks that every trained delay window is wide enough.
    fn windows_valid<B: RegisterAccess>(&self, bus: &mut B, full_width: bool) -> bool {
        let mut result = true;
        for pair in self.windows.iter().take(1 + full_width as usize) {
            for (right, left) in pair {
                for i in 0..offsets::TRAINING_WINDOW_LEN {
                    let right_edge = bus.read32(reg(right + i * 4));
                    let left_edge = bus.read32(reg(left + i * 4));
                    if right_edge.wrapping_sub(left_edge) <= TRAINING_MIN_WINDOW {
                        result = false;
                    }
                }
            }
        }
        result
    }

    /// Trains the first rank, and the second one if present. The first rank must already be
    /// selected.
    fn train<B: RegisterAccess>(
        &self,
        bus: &mut B,
        geometry: &Geometry,
        limits: PollLimits,
    ) -> bool {
        let full_width = geometry.full_width;

        let mut result = self.run(bus, full_width, limits);
        result &= self.windows_valid(bus, full_width);
        bus.clrbits32(reg(offsets::TRAIN_START), self.clear);

        if geometry.ranks.count() == 2 {
            bus.clrsetbits32(reg(offsets::TRAIN_RANK_SEL), self.rank_mask, self.rank_select[1]);
            result &= self.run(bus, full_width, limits);
            bus.clrbits32(reg(offsets::TRAIN_START), self.clear);
        }

        bus.clrbits32(reg(offsets::TRAIN_RANK_SEL), self.rank_mask);
        result
    }
}

pub fn read_training<B: RegisterAccess>(
    bus: &mut B,
    para: &DramPara,
    geometry: &Geometry,
    limits: PollLimits,
) -> bool {
    if para.dram_type == DramType::Lpddr4 {
        bus.write32(reg(offsets::RT_LPDDR4_RESET), 0);
        for offset in offsets::RT_LPDDR4_RESET_BYTES {
            bus.write8(reg(offset), 0);
        }
    }
    bus.clrsetbits32(
        reg(offsets::TRAIN_RANK_SEL),
        READ_TRAINING.rank_mask,
        READ_TRAINING.rank_select[0],
    );
    for offset in offsets::RT_CTRL {
        bus.clrsetbits32(reg(offset), 0x3f, 0xf);
    }
    READ_TRAINING.train(bus, geometry, limits)
}

pub fn write_training<B: RegisterAccess>(
    bus: &mut B,
    geometry: &Geometry,
    limits: PollLimits,
) -> bool {
    for offset in offsets::WT_RESET {
        bus.write32(reg(offset), 0);
    }
    bus.clrsetbits32(
        reg(offsets::TRAIN_RANK_SEL),
        WRITE_TRAINING.rank_mask,
        WRITE_TRAINING.rank_select[0],
    );
    WRITE_TRAINING.train(bus, geometry, limits)
}

/// Delay entries of one lane. Every bit of a lane uses the same value.
#[inline]
const fn lane_delays(word: u32, lane: usize, mask: u32) -> [u32; 8] {
    [(word >> (8 * lane)) & mask; 8]
}

#[inline]
const fn lane_base(lane: usize) -> usize {
    PHY_BASE_ADDR + offsets::DX_CTRL + lane * DX_LANE_STRIDE
}

fn write_delay1<B: RegisterAccess>(bus: &mut B, tuning: &Tuning) {
    bus.setbits32(reg(offsets::DELAY_ACCESS), DELAY_WRITE_ENABLE);
    bus.clrbits32(reg(offsets::UNK_0A0), 0x3);
    bus.setbits32(reg(offsets::TRAIN_CTRL), 0x80);
    bus.clrbits32(reg(offsets::UNK_044), 1 << 28);

    for lane in 0..DX_LANES {
        let base = lane_base(lane);
        let delays = lane_delays(tuning.tpr11, lane, 0xff);
        for (single, words) in dx_delay::DELAY1_SINGLE.iter().zip(dx_delay::DELAY1_WORDS) {
            match single {
                Some(offset) => bus.write32(base + offset, delays[0]),
                None => bus.clrsetbits32(base + dx_delay::DELAY1_MERGED, 0xff00, delays[0] << 8),
            }
            bus.write32(base + words, pack(&delays[0..4]));
            bus.write32(base + words + 4, pack(&delays[4..8]));
        }
        let odt = (tuning.odt_en >> (8 * lane)) & 0xff;
        for offset in dx_delay::DELAY1_ODT {
            bus.write32(base + offset, (odt << 24) | (odt << 8));
        }
    }

    bus.setbits32(reg(offsets::UNK_044), 1 << 28);
    bus.clrbits32(reg(offsets::UNK_044), 1 << 28);
    bus.clrbits32(reg(offsets::DELAY_ACCESS), DELAY_WRITE_ENABLE);
}

fn write_delay0<B: RegisterAccess>(bus: &mut B, tuning: &Tuning) {
    bus.setbits32(reg(offsets::DELAY_ACCESS), DELAY_WRITE_ENABLE);

    for lane in 0..DX_LANES {
        let base = lane_base(lane);
        let delays = lane_delays(tuning.tpr12, lane, 0x7f);
        for (single, words) in dx_delay::DELAY0_SINGLE.iter().zip(dx_delay::DELAY0_WORDS) {
            match single {
                Some(offset) => bus.write32(base + offset, delays[0] << 8),
                None => bus.clrsetbits32(base + dx_delay::DELAY0_MERGED, 0xff, delays[0]),
            }
            bus.write32(base + words, pack(&delays[0..4]));
            bus.write32(base + words + 4, pack(&delays[4..8]));
        }
        let value = (tuning.tpr14 >> (8 * lane)) & 0xff;
        for offset in dx_delay::DELAY0_TPR14 {
            bus.write32(base + offset, (value << 24) | (value << 8));
        }
    }

    bus.setbits32(reg(offsets::DX_UPDATE), 0x4);
    bus.clrbits32(reg(offsets::DX_UPDATE), 0x4);
    bus.clrbits32(reg(offsets::DELAY_ACCESS), DELAY_WRITE_ENABLE);
}

/// Applies the per lane bit-delay tables from [Tuning::tpr11] and [Tuning::tpr12].
pub fn bit_delay_compensation<B: RegisterAccess>(
    bus: &mut B,
    para: &DramPara,
    tuning: &Tuning,
) {
    if para.tpr10.dx_bit_delay1() {
        write_delay1(bus, tuning);
    }
    if para.tpr10.dx_bit_delay0() {
        write_delay0(bus, tuning);
    }
}

/// Runs a calibration step until it succeeds, at most [CALIBRATION_ATTEMPTS] times.
///
/// Returns the number of attempts used.
pub fn run_with_retries(
    phase: CalibrationPhase,
    mut step: impl FnMut() -> bool,
) -> Result<u32, CalibrationPhase> {
    for attempt in 1..=CALIBRATION_ATTEMPTS {
        if step() {
            return Ok(attempt);
        }
        log::trace!("{} attempt {} failed", phase.name(), attempt);
    }
    log::debug!("{} failed!", phase.name());
    Err(phase)
}

fn run_phase<B: RegisterAccess>(
    bus: &mut B,
    phase: CalibrationPhase,
    para: &DramPara,
    config: &DramConfig,
    limits: PollLimits,
) -> bool {
    match phase {
        CalibrationPhase::WriteLeveling => write_leveling(bus, para, config, limits),
        CalibrationPhase::ReadCalibration => {
            read_calibration(bus, para, &config.geometry, limits)
        }
        CalibrationPhase::ReadTraining => read_training(bus, para, &config.geometry, limits),
        CalibrationPhase::WriteTraining => write_training(bus, &config.geometry, limits),
    }
}

/// Runs the enabled calibration steps in order and applies the bit-delay compensation.
///
/// Stops at the first step which fails [CALIBRATION_ATTEMPTS] times in a row.
pub fn calibrate<B: RegisterAccess>(
    bus: &mut B,
    para: &DramPara,
    config: &DramConfig,
    limits: PollLimits,
) -> BringUp {
    let tpr10 = para.tpr10;
    let phases = [
        (CalibrationPhase::WriteLeveling, tpr10.write_leveling()),
        (CalibrationPhase::ReadCalibration, tpr10.read_calibration()),
        (CalibrationPhase::ReadTraining, tpr10.read_training()),
        (CalibrationPhase::WriteTraining, tpr10.write_training()),
    ];
    for (phase, enabled) in phases {
        if !enabled {
            continue;
        }
        if let Err(phase) = run_with_retries(phase, || run_phase(bus, phase, para, config, limits))
        {
            return BringUp::CalibrationFailed(phase);
        }
    }
    bit_delay_compensation(bus, para, &config.tuning);
    BringUp::Calibrated
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dram::{
        DramConfig, Geometry, Ranks, Tpr10, presets,
        sim::{BoardModel, SimSoc},
    };
    use arbitrary_int::u4;
    use std::vec::Vec;

    fn config(para: &DramPara, geometry: Geometry) -> DramConfig {
        DramConfig {
            geometry,
            clk: MegaHertz::from_raw(792),
            tuning: Tuning::detection_defaults(para.dram_type).unwrap(),
        }
    }

    fn only(tpr10: Tpr10) -> DramPara {
        DramPara {
            tpr10,
            ..presets::DDR3_REFERENCE.para
        }
    }

    #[test]
    fn test_odt_ddr3() {
        let mut soc = SimSoc::healthy();
        configure_odt(&mut soc, &presets::DDR3_REFERENCE.para);
        for lane in 0..DX_LANES {
            assert_eq!(soc.peek32(lane_reg(lane, offsets::DX_DRIVE_ODT)), 0x0c0c_0606);
        }
        assert_eq!(soc.peek32(reg(offsets::CA_DRIVE)), 0x1919_1919);
    }

    #[test]
    fn test_odt_lpddr4() {
        let mut soc = SimSoc::healthy();
        configure_odt(&mut soc, &presets::LPDDR4_REFERENCE.para);
        assert_eq!(soc.peek32(0x0311_0604), 0x0d06_0700);
        assert_eq!(soc.peek32(reg(offsets::CA_DRIVE)), 0x0e0e_0e0e);
    }

    #[test]
    fn test_odt_lpddr4_default_low_drive() {
        let mut soc = SimSoc::healthy();
        let para = DramPara {
            tpr1: 0,
            ..presets::LPDDR4_REFERENCE.para
        };
        configure_odt(&mut soc, &para);
        assert_eq!(soc.peek32(0x0311_0304), 0x0d04_0700);
    }

    #[test]
    fn test_ca_delay() {
        assert_eq!(ca_delay(&presets::LPDDR4_REFERENCE.para), 0x8080_8080);
        let tpr10 = Tpr10::DEFAULT
            .with_ca_delay_coarse(u4::new(1))
            .with_ca_delay_fine(u4::new(2));
        assert_eq!(ca_delay(&only(tpr10)), 0x204);
        assert_eq!(
            ca_delay(&only(tpr10.with_ca_delay_double(arbitrary_int::u2::new(1)))),
            0x408
        );
    }

    #[test]
    fn test_ca_bit_delay_ddr3() {
        let mut soc = SimSoc::healthy();
        let tpr10 = Tpr10::DEFAULT
            .with_ca_delay_coarse(u4::new(1))
            .with_ca_delay_fine(u4::new(2));
        ca_bit_delay_compensation(&mut soc, &only(tpr10));
        assert_eq!(soc.writes_to(reg(0x104)), [0x0202_0202]);
        assert_eq!(
            soc.writes_to(reg(offsets::CA_DELAY_CK)),
            [0x0202_0202, 0x0404_0202]
        );
        assert_eq!(soc.peek32(reg(offsets::DELAY_ACCESS)) & DELAY_WRITE_ENABLE, 0);
    }

    #[test]
    fn test_clk_vref() {
        assert_eq!(clk_vref(MegaHertz::from_raw(360)), (0x1800_0000, 0x1818_1818));
        assert_eq!(clk_vref(MegaHertz::from_raw(200)), (0x2800_0000, 0x2828_2828));
        assert_eq!(clk_vref(MegaHertz::from_raw(100)), (0x3800_0000, 0x3838_3838));
        assert_eq!(clk_vref(MegaHertz::from_raw(1200)), (0x1800_0000, 0));
    }

    #[test]
    fn test_retries_stop_on_success() {
        let mut calls = 0;
        let result = run_with_retries(CalibrationPhase::ReadTraining, || {
            calls += 1;
            calls == 3
        });
        assert_eq!(result, Ok(3));
        assert_eq!(calls, 3);
    }

    #[test]
    fn test_retries_are_bounded() {
        let mut calls = 0;
        let result = run_with_retries(CalibrationPhase::WriteLeveling, || {
            calls += 1;
            false
        });
        assert_eq!(result, Err(CalibrationPhase::WriteLeveling));
        assert_eq!(calls, CALIBRATION_ATTEMPTS);
    }

    #[test]
    fn test_read_calibration_recovers() {
        let para = presets::LPDDR4_REFERENCE.para;
        let config = config(&para, Geometry::new(Ranks::Dual, true, 16, 10));
        let mut soc = SimSoc::healthy();
        soc.fail_first(CalibrationPhase::ReadCalibration, 2);
        assert_eq!(
            calibrate(&mut soc, &para, &config, PollLimits::new(100)),
            BringUp::Calibrated
        );
        assert_eq!(soc.attempts(CalibrationPhase::ReadCalibration), 3);
    }

    #[test]
    fn test_read_calibration_gives_up() {
        let para = presets::LPDDR4_REFERENCE.para;
        let config = config(&para, Geometry::new(Ranks::Dual, true, 16, 10));
        let mut soc = SimSoc::healthy();
        soc.fail_first(CalibrationPhase::ReadCalibration, CALIBRATION_ATTEMPTS);
        assert_eq!(
            calibrate(&mut soc, &para, &config, PollLimits::new(100)),
            BringUp::CalibrationFailed(CalibrationPhase::ReadCalibration)
        );
        assert_eq!(
            soc.attempts(CalibrationPhase::ReadCalibration),
            CALIBRATION_ATTEMPTS
        );
        // No compensation after a failed step.
        assert!(soc.writes_to(0x0311_0320).is_empty());
    }

    #[test]
    fn test_read_calibration_single_rank_board() {
        let para = presets::DDR3_REFERENCE.para;
        let mut soc = SimSoc::new(BoardModel {
            ranks: 1,
            full_width: true,
            rows: 16,
            cols: 10,
        });
        let single = Geometry::new(Ranks::Single, true, 13, 8);
        assert!(read_calibration(&mut soc, &para, &single, PollLimits::new(100)));
        let dual = Geometry::new(Ranks::Dual, true, 13, 8);
        assert!(!read_calibration(&mut soc, &para, &dual, PollLimits::new(100)));
    }

    #[test]
    fn test_read_training_rank_select() {
        let para = only(Tpr10::DEFAULT.with_read_training(true));
        let config = config(&para, Geometry::new(Ranks::Dual, true, 16, 10));
        let mut soc = SimSoc::healthy();
        soc.fail_first(CalibrationPhase::ReadTraining, 1);
        assert_eq!(
            calibrate(&mut soc, &para, &config, PollLimits::new(100)),
            BringUp::Calibrated
        );
        assert_eq!(soc.attempts(CalibrationPhase::ReadTraining), 2);

        let selects: Vec<u32> = soc
            .writes_to(reg(offsets::TRAIN_RANK_SEL))
            .iter()
            .map(|val| val & READ_TRAINING.rank_mask)
            .collect();
        assert_eq!(selects, [2, 2, 0, 2, 2, 0]);
    }

    #[test]
    fn test_read_training_start_sequence() {
        let para = presets::DDR3_REFERENCE.para;
        let mut soc = SimSoc::healthy();
        let geometry = Geometry::new(Ranks::Single, true, 16, 10);
        assert!(read_training(&mut soc, &para, &geometry, PollLimits::new(100)));
        assert_eq!(soc.writes_to(reg(offsets::TRAIN_START)), [0x6, 0x7, 0x4]);

        let mut soc = SimSoc::healthy();
        let geometry = Geometry::new(Ranks::Dual, true, 16, 10);
        assert!(read_training(&mut soc, &para, &geometry, PollLimits::new(100)));
        assert_eq!(
            soc.writes_to(reg(offsets::TRAIN_START)),
            [0x6, 0x7, 0x4, 0x6, 0x7, 0x4]
        );
    }

    #[test]
    fn test_write_training_start_sequence() {
        let mut soc = SimSoc::healthy();
        let geometry = Geometry::new(Ranks::Single, true, 16, 10);
        assert!(write_training(&mut soc, &geometry, PollLimits::new(100)));
        assert_eq!(soc.writes_to(reg(offsets::TRAIN_START)), [0x10, 0x30, 0x10]);

        let mut soc = SimSoc::healthy();
        let geometry = Geometry::new(Ranks::Dual, true, 16, 10);
        assert!(write_training(&mut soc, &geometry, PollLimits::new(100)));
        assert_eq!(
            soc.writes_to(reg(offsets::TRAIN_START)),
            [0x10, 0x30, 0x10, 0x10, 0x30, 0x10]
        );
    }

    #[test]
    fn test_write_training_failure() {
        let para = only(Tpr10::DEFAULT.with_write_training(true));
        let config = config(&para, Geometry::new(Ranks::Single, false, 16, 10));
        let mut soc = SimSoc::healthy();
        soc.fail_first(CalibrationPhase::WriteTraining, u32::MAX);
        assert_eq!(
            calibrate(&mut soc, &para, &config, PollLimits::new(100)),
            BringUp::CalibrationFailed(CalibrationPhase::WriteTraining)
        );
        assert_eq!(
            soc.attempts(CalibrationPhase::WriteTraining),
            CALIBRATION_ATTEMPTS
        );
    }

    #[test]
    fn test_write_leveling() {
        let para = only(Tpr10::DEFAULT.with_write_leveling(true));
        let config = config(&para, Geometry::new(Ranks::Dual, true, 16, 10));
        let mut soc = SimSoc::healthy();
        soc.fail_first(CalibrationPhase::WriteLeveling, 4);
        assert_eq!(
            calibrate(&mut soc, &para, &config, PollLimits::new(100)),
            BringUp::Calibrated
        );
        assert_eq!(soc.attempts(CalibrationPhase::WriteLeveling), 5);
        assert_eq!(soc.peek32(reg(offsets::WL_CTRL)) & u32::from(WL_RANK_MASK), 0);
    }

    #[test]
    fn test_bit_delay_tables() {
        let para = presets::LPDDR4_REFERENCE.para;
        let tuning = Tuning {
            tpr12: 0xb533_302f,
            ..presets::LPDDR4_REFERENCE.tuning
        };
        let mut soc = SimSoc::healthy();
        bit_delay_compensation(&mut soc, &para, &tuning);

        assert_eq!(soc.peek32(0x0311_0320), 0xc2);
        assert_eq!(soc.peek32(0x0311_0324), 0xc2c2_c2c2);
        assert_eq!(soc.peek32(0x0311_0330), 0x2f00);
        assert_eq!(soc.peek32(0x0311_040c), 0xc22f);
        // Lane 1 ODT word.
        assert_eq!(soc.peek32(0x0311_04ac), 0x8400_8400);
        // tpr12 entries are seven bits wide.
        assert_eq!(soc.peek32(0x0311_07b4), 0x3535_3535);
        assert_eq!(soc.peek32(reg(offsets::DELAY_ACCESS)) & DELAY_WRITE_ENABLE, 0);
    }
}
