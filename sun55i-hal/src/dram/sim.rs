//! Simulated SoC for the unit tests.
//!
//! Memory is byte addressable and every access is traced. Status registers the bring-up polls
//! report completion, and the calibration results follow a [BoardModel] plus injected failures.
//! DRAM accesses are translated through the programmed address map, so a geometry larger than
//! the board aliases like real hardware does.
use std::{collections::BTreeMap, vec::Vec};

use embedded_hal::delay::DelayNs;
use sun55i::{
    DRAM_BASE_ADDR,
    ccu::{CCU_BASE_ADDR, offsets as ccu_offsets},
    mctl_ctl::{MCTL_CTL_BASE_ADDR, offsets as ctl_offsets},
    phy::{PHY_BASE_ADDR, offsets as phy_offsets},
};

use super::CalibrationPhase;
use crate::mmio::RegisterAccess;

const PLL_DDR_CTRL: usize = CCU_BASE_ADDR + ccu_offsets::PLL_DDR_CTRL;
const PLL_LOCKED: u32 = 1 << 28;
const MRCTRL0: usize = MCTL_CTL_BASE_ADDR + ctl_offsets::MRCTRL0;
const MSTR: usize = MCTL_CTL_BASE_ADDR + ctl_offsets::MSTR;
const ADDRMAP1: usize = MCTL_CTL_BASE_ADDR + ctl_offsets::ADDRMAP0 + 4;
const ACK_REGS: [usize; 3] = [
    MCTL_CTL_BASE_ADDR + ctl_offsets::SWSTAT,
    MCTL_CTL_BASE_ADDR + ctl_offsets::DFISTAT,
    MCTL_CTL_BASE_ADDR + ctl_offsets::STATR,
];

const WL_GOOD_RESULT: u32 = 0x1010_1010;
const WINDOW_RIGHT_EDGE: u32 = 0x20;
const RC_DONE: u32 = 0xf;
const RC_ERROR: u32 = 0x20;

/// Training window ranges, as (start, end) PHY offsets.
const RIGHT_EDGES: [(usize, usize); 4] =
    [(0x898, 0x8e0), (0xa98, 0xae0), (0x938, 0x980), (0xb38, 0xb80)];
const LEFT_EDGES: [(usize, usize); 4] =
    [(0x850, 0x898), (0x8f0, 0x938), (0xa50, 0xa98), (0xaf0, 0xb38)];

const fn phase_index(phase: CalibrationPhase) -> usize {
    match phase {
        CalibrationPhase::WriteLeveling => 0,
        CalibrationPhase::ReadCalibration => 1,
        CalibrationPhase::ReadTraining => 2,
        CalibrationPhase::WriteTraining => 3,
    }
}

/// The DRAM installed on the simulated board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoardModel {
    pub ranks: u8,
    pub full_width: bool,
    pub rows: u8,
    pub cols: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Access {
    pub addr: usize,
    pub value: u32,
    /// Access width in bytes.
    pub width: u8,
}

#[derive(Debug)]
pub struct SimSoc {
    mem: BTreeMap<usize, u8>,
    writes: Vec<Access>,
    reads: BTreeMap<usize, u32>,
    board: BoardModel,
    pll_lock: bool,
    fail_first: [u32; 4],
    attempts: [u32; 4],
    rc_forced_failure: bool,
    rc_failing: bool,
}

impl SimSoc {
    pub fn new(board: BoardModel) -> Self {
        Self {
            mem: BTreeMap::new(),
            writes: Vec::new(),
            reads: BTreeMap::new(),
            board,
            pll_lock: true,
            fail_first: [0; 4],
            attempts: [0; 4],
            rc_forced_failure: false,
            rc_failing: false,
        }
    }

    /// Dual rank, 32-bit, 16 rows, 10 columns. Every calibration step succeeds.
    pub fn healthy() -> Self {
        Self::new(BoardModel {
            ranks: 2,
            full_width: true,
            rows: 16,
            cols: 10,
        })
    }

    pub fn set_pll_lock(&mut self, locked: bool) {
        self.pll_lock = locked;
    }

    /// The first `count` attempts of the given calibration step fail.
    pub fn fail_first(&mut self, phase: CalibrationPhase, count: u32) {
        self.fail_first[phase_index(phase)] = count;
    }

    /// Calibration attempts started so far.
    pub fn attempts(&self, phase: CalibrationPhase) -> u32 {
        self.attempts[phase_index(phase)]
    }

    pub fn writes(&self) -> &[Access] {
        &self.writes
    }

    pub fn writes_to(&self, addr: usize) -> Vec<u32> {
        self.writes
            .iter()
            .filter(|access| access.addr == addr)
            .map(|access| access.value)
            .collect()
    }

    pub fn read_count(&self, addr: usize) -> u32 {
        self.reads.get(&addr).copied().unwrap_or(0)
    }

    pub fn clear_trace(&mut self) {
        self.writes.clear();
        self.reads.clear();
    }

    /// Stored value, without side effects.
    pub fn peek32(&self, addr: usize) -> u32 {
        self.load(addr, 4)
    }

    fn load(&self, addr: usize, width: u8) -> u32 {
        let addr = self.translate(addr);
        (0..width as usize).fold(0, |value, i| {
            value | (u32::from(self.mem.get(&(addr + i)).copied().unwrap_or(0)) << (8 * i))
        })
    }

    fn store(&mut self, addr: usize, value: u32, width: u8) {
        self.writes.push(Access { addr, value, width });
        let phys = self.translate(addr);
        for i in 0..width as usize {
            self.mem.insert(phys + i, (value >> (8 * i)) as u8);
        }
    }

    fn count_read(&mut self, addr: usize) {
        *self.reads.entry(addr).or_insert(0) += 1;
    }

    /// Starts a new attempt of a calibration step. Returns true if it is forced to fail.
    fn start_attempt(&mut self, phase: CalibrationPhase) -> bool {
        let index = phase_index(phase);
        self.attempts[index] += 1;
        self.attempts[index] <= self.fail_first[index]
    }

    fn configured_full_width(&self) -> bool {
        self.load(PHY_BASE_ADDR + phy_offsets::CTRL, 4) & 0xf00 == 0xf00
    }

    /// Maps a DRAM window address to the cell of the board which answers it.
    fn translate(&self, addr: usize) -> usize {
        if addr < DRAM_BASE_ADDR {
            return addr;
        }
        let addrmap1 = self.load_raw(ADDRMAP1);
        if addrmap1 == 0 {
            return addr;
        }
        let half_width = self.load_raw(MSTR) & (1 << 12) != 0;
        let cfg_cols = (addrmap1 & 0x3f) as usize + 2 + half_width as usize;
        let byte_bits = if half_width { 1 } else { 2 };

        let offset = addr - DRAM_BASE_ADDR;
        let word = offset >> byte_bits;
        let col = word & ((1 << cfg_cols) - 1);
        let bank = (word >> cfg_cols) & 0x7;
        let row = word >> (cfg_cols + 3);

        let cols = self.board.cols as usize;
        let col = col & ((1 << cols) - 1);
        let row = row & ((1 << self.board.rows) - 1);
        let word = (((row << 3) | bank) << cols) | col;
        DRAM_BASE_ADDR + (word << byte_bits) + (offset & ((1 << byte_bits) - 1))
    }

    /// Stored value of a register outside the DRAM window.
    fn load_raw(&self, addr: usize) -> u32 {
        (0..4).fold(0, |value, i| {
            value | (u32::from(self.mem.get(&(addr + i)).copied().unwrap_or(0)) << (8 * i))
        })
    }

    fn phy_status(&mut self, offset: usize) -> Option<u32> {
        let in_range = |ranges: &[(usize, usize)]| {
            ranges
                .iter()
                .any(|(start, end)| (*start..*end).contains(&offset))
        };
        let value = match offset {
            phy_offsets::WL_DONE => 0xf,
            phy_offsets::WL_RESULT_RANK0 => {
                if self.start_attempt(CalibrationPhase::WriteLeveling) {
                    0
                } else {
                    WL_GOOD_RESULT
                }
            }
            phy_offsets::WL_RESULT_RANK0_HI
            | phy_offsets::WL_RESULT_RANK1
            | phy_offsets::WL_RESULT_RANK1_HI => WL_GOOD_RESULT,
            phy_offsets::RC_STATUS => {
                if self.rc_failing {
                    RC_ERROR
                } else {
                    RC_DONE
                }
            }
            0x840 | 0xa40 => 0xc,
            0x8e0 | 0xae0 => 0x3,
            0x898 => {
                if self.start_attempt(CalibrationPhase::ReadTraining) {
                    0
                } else {
                    WINDOW_RIGHT_EDGE
                }
            }
            0x938 => {
                if self.start_attempt(CalibrationPhase::WriteTraining) {
                    0
                } else {
                    WINDOW_RIGHT_EDGE
                }
            }
            _ if in_range(&RIGHT_EDGES) => WINDOW_RIGHT_EDGE,
            _ if in_range(&LEFT_EDGES) => 0,
            _ => return None,
        };
        Some(value)
    }

    fn on_phy_write(&mut self, offset: usize, value: u32) {
        if offset != phy_offsets::TRAIN_CTRL {
            return;
        }
        match value & 0x3d {
            0x39 => {
                self.rc_forced_failure = self.start_attempt(CalibrationPhase::ReadCalibration);
                self.rc_failing = self.rc_forced_failure
                    || (self.configured_full_width() && !self.board.full_width);
            }
            0x35 => {
                self.rc_failing = self.rc_failing || self.board.ranks < 2;
            }
            _ => (),
        }
    }
}

impl RegisterAccess for SimSoc {
    fn read32(&mut self, addr: usize) -> u32 {
        self.count_read(addr);
        if addr == PLL_DDR_CTRL {
            let stored = self.load(addr, 4);
            return if self.pll_lock {
                stored | PLL_LOCKED
            } else {
                stored & !PLL_LOCKED
            };
        }
        if ACK_REGS.contains(&addr) {
            return 1;
        }
        if addr == MRCTRL0 {
            return self.load(addr, 4) & !(1 << 31);
        }
        if (PHY_BASE_ADDR..PHY_BASE_ADDR + 0x1000).contains(&addr) {
            if let Some(value) = self.phy_status(addr - PHY_BASE_ADDR) {
                return value;
            }
        }
        self.load(addr, 4)
    }

    fn write32(&mut self, addr: usize, value: u32) {
        self.store(addr, value, 4);
        if (PHY_BASE_ADDR..PHY_BASE_ADDR + 0x1000).contains(&addr) {
            self.on_phy_write(addr - PHY_BASE_ADDR, value);
        }
    }

    fn read16(&mut self, addr: usize) -> u16 {
        self.count_read(addr);
        self.load(addr, 2) as u16
    }

    fn write16(&mut self, addr: usize, value: u16) {
        self.store(addr, value.into(), 2);
    }

    fn read8(&mut self, addr: usize) -> u8 {
        self.count_read(addr);
        self.load(addr, 1) as u8
    }

    fn write8(&mut self, addr: usize, value: u8) {
        self.store(addr, value.into(), 1);
    }
}

/// Delay provider which only accumulates the requested time.
#[derive(Debug, Default)]
pub struct RecordingDelay {
    total_ns: u64,
}

impl RecordingDelay {
    pub fn total_us(&self) -> u64 {
        self.total_ns / 1000
    }
}

impl DelayNs for RecordingDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ns += u64::from(ns);
    }
}
