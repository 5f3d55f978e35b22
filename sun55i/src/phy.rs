//! DRAM PHY.
//!
//! The PHY register map is not documented. Register names follow their observed use during
//! bring-up; unnamed registers keep their offset as name.
pub const PHY_BASE_ADDR: usize = 0x0311_0000;

/// Distance between the register groups of two DX (byte) lanes.
pub const DX_LANE_STRIDE: usize = 0x180;
/// Number of DX lanes. The fifth lane group is only touched by the lane enable bit.
pub const DX_LANES: usize = 4;

pub mod offsets {
    /// Bits 8..=11 enable the byte lanes, bits 4..=6 select the DRAM type, bit 7 starts the PHY.
    pub const CTRL: usize = 0x000;
    /// 16-bit write leveling control: bit 2 starts leveling, bits 6..=7 select the rank.
    pub const WL_CTRL: usize = 0x002;
    /// LPDDR4 MR2 value sent during write leveling.
    pub const WL_LPDDR4_MR2: usize = 0x003;
    /// Training control. Bits 8..=11 select write leveling mode, bits 2..=5 select the
    /// read calibration rank and bit 0 starts the read calibration.
    pub const TRAIN_CTRL: usize = 0x004;
    pub const UNK_008: usize = 0x008;
    /// Read latency, replicated over four bytes.
    pub const READ_LATENCY: usize = 0x00c;
    /// Write latency, replicated over four bytes.
    pub const WRITE_LATENCY: usize = 0x010;
    pub const UNK_014: usize = 0x014;
    pub const CA_DELAY_UPDATE: usize = 0x038;
    pub const UNK_044: usize = 0x044;
    pub const UNK_048: usize = 0x048;
    /// First of eight address/command remap registers.
    pub const AC_REMAP: usize = 0x054;
    /// 16-bit write leveling done mask, one bit per lane.
    pub const WL_DONE: usize = 0x062;
    /// Bit 18 opens the delay registers for writing, bit 27 holds the DX lanes in reset.
    pub const DELAY_ACCESS: usize = 0x084;
    /// Bit 2 latches the DX bit-delay 0 values, bit 7 pulses the DX reset.
    pub const DX_UPDATE: usize = 0x094;
    pub const WL_RESULT_RANK0: usize = 0x096;
    /// Read back during write leveling. Overlaps [WL_RESULT_RANK0], effect unverified on
    /// hardware.
    pub const WL_RESULT_RANK0_HI: usize = 0x097;
    pub const UNK_0A0: usize = 0x0a0;
    pub const TIMING_CTRL: usize = 0x0a8;
    pub const UNK_0AC: usize = 0x0ac;
    pub const CLK_VREF: usize = 0x0c0;
    pub const WL_RESULT_RANK1: usize = 0x0c6;
    /// Read back during write leveling. Overlaps [WL_RESULT_RANK1], effect unverified on
    /// hardware.
    pub const WL_RESULT_RANK1_HI: usize = 0x0c7;
    pub const CLK_VREF_LANES: usize = 0x0d0;
    pub const CA_DRIVE: usize = 0x0f4;
    /// CA delay words. The word at [CA_DELAY_LPDDR4] is only written for LPDDR4.
    pub const CA_DELAY: [usize; 7] = [0x104, 0x108, 0x10c, 0x114, 0x118, 0x11c, 0x120];
    pub const CA_DELAY_LPDDR4: usize = 0x110;
    /// Also part of [CA_DELAY], rewritten with the mixed pattern afterwards.
    pub const CA_DELAY_CK: usize = 0x11c;
    pub const WT_RESET: [usize; 4] = [0x134, 0x138, 0x19c, 0x1a0];
    /// Read training starts with bits 1..=2 then bit 0, write training with bit 4 then bit 5.
    pub const TRAIN_START: usize = 0x190;
    /// Bits 0..=1 select the read training rank, bits 2..=3 the write training rank.
    pub const TRAIN_RANK_SEL: usize = 0x198;
    pub const RT_LPDDR4_RESET: usize = 0x200;
    pub const RT_LPDDR4_RESET_BYTES: [usize; 4] = [0x207, 0x208, 0x209, 0x20a];
    /// Read calibration status. The low four bits are the per lane done mask.
    pub const RC_STATUS: usize = 0x20c;

    /// Per lane DX control (VREF), lane 0. Further lanes follow at [super::DX_LANE_STRIDE].
    pub const DX_CTRL: usize = 0x300;
    /// Per lane drive strength (bits 16..=20, 24..=28) and ODT (bits 0..=4, 8..=12).
    pub const DX_DRIVE_ODT: usize = 0x304;
    pub const DX_LANE_EN: usize = 0x308;

    pub const RT_CTRL: [usize; 4] = [0x804, 0x808, 0xa04, 0xa08];
    /// Read training status of the lower and upper lane pair.
    pub const RT_STATUS: [usize; 2] = [0x840, 0xa40];
    /// Read training delay windows: (right edge, left edge) start offsets of nine word runs.
    pub const RT_WINDOWS: [[(usize, usize); 2]; 2] =
        [[(0x898, 0x850), (0x8bc, 0x874)], [(0xa98, 0xa50), (0xabc, 0xa74)]];
    /// Write training status of the lower and upper lane pair.
    pub const WT_STATUS: [usize; 2] = [0x8e0, 0xae0];
    /// Write training delay windows, same layout as [RT_WINDOWS].
    pub const WT_WINDOWS: [[(usize, usize); 2]; 2] =
        [[(0x938, 0x8f0), (0x95c, 0x914)], [(0xb38, 0xaf0), (0xb5c, 0xb14)]];
    /// Entries per training window run.
    pub const TRAINING_WINDOW_LEN: usize = 9;
}

/// DX bit-delay register groups, relative to the lane base
/// `offsets::DX_CTRL + lane * DX_LANE_STRIDE`.
pub mod dx_delay {
    /// Groups written with the "delay 1" table: single entry register, followed by two packed
    /// words. The third group has no single entry register, its first entry lives in bits
    /// 8..=15 of [DELAY1_MERGED].
    pub const DELAY1_SINGLE: [Option<usize>; 4] = [Some(0x020), Some(0x040), None, Some(0x11c)];
    pub const DELAY1_WORDS: [usize; 4] = [0x024, 0x044, 0x100, 0x120];
    pub const DELAY1_MERGED: usize = 0x10c;
    pub const DELAY1_ODT: [usize; 4] = [0x02c, 0x04c, 0x108, 0x128];

    /// Groups written with the "delay 0" table. Single entries go into bits 8..=14, the
    /// merged entry into bits 0..=7 of [DELAY0_MERGED].
    pub const DELAY0_SINGLE: [Option<usize>; 4] = [Some(0x030), Some(0x050), None, Some(0x12c)];
    pub const DELAY0_WORDS: [usize; 4] = [0x034, 0x054, 0x110, 0x130];
    pub const DELAY0_MERGED: usize = 0x10c;
    pub const DELAY0_TPR14: [usize; 4] = [0x03c, 0x05c, 0x118, 0x138];
}

#[bitbybit::bitfield(u32, default = 0x0, debug)]
pub struct DelayAccess {
    #[bit(27, rw)]
    dx_reset: bool,
    #[bit(18, rw)]
    delay_write_enable: bool,
}

static_assertions::const_assert_eq!(
    offsets::DX_CTRL + (DX_LANES - 1) * DX_LANE_STRIDE + dx_delay::DELAY0_TPR14[3],
    0x8b8
);
