//! # Controller timing registers
//!
//! Converts the JEDEC timing parameters of the selected DRAM type into the DRAMTMG, RFSHTMG and
//! DFITMG register words of the uMCTL2 controller.
//!
//! The controller runs at half the DRAM clock. All cycle counts are first computed in DRAM
//! clocks, rounding up, and then halved, again rounding up.
use arbitrary_int::{Number, u4, u5, u6, u7, u10, u12};
use ddr_timing::{MemoryClock, jedec};
use sun55i::mctl_ctl::{
    DfiTiming0, DfiTiming1, DramTiming0, DramTiming1, DramTiming2, DramTiming3, DramTiming4,
    DramTiming5, DramTiming6, DramTiming8, Init3, Init4, MCTL_CTL_BASE_ADDR, RefreshTiming,
    offsets,
};

use super::{DramType, InvalidClockError};
use crate::{mmio::RegisterAccess, time::MegaHertz};

/// Clamps a value to the width of a register field.
///
/// Timing fields only grow when they saturate, which keeps the constraint satisfied.
macro_rules! sat {
    ($ty:ident, $val:expr) => {{
        let val: u32 = $val;
        let max = $ty::MAX.value() as u32;
        $ty::new((if val > max { max } else { val }) as _)
    }};
}

/// Clock tiers used by the latency and mode register tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeedTier {
    /// Up to 936 MHz.
    Low,
    /// Up to 1200 MHz.
    Mid,
    High,
}

impl SpeedTier {
    pub const fn for_clock(clk: MegaHertz) -> Self {
        match clk.raw() {
            0..=936 => SpeedTier::Low,
            937..=1200 => SpeedTier::Mid,
            _ => SpeedTier::High,
        }
    }
}

/// Read and write latency in DRAM clocks. The PHY and the controller must agree on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Latencies {
    pub write: u32,
    pub read: u32,
}

pub const fn latencies(dram_type: DramType, clk: MegaHertz) -> Latencies {
    let (write, read) = match (dram_type, SpeedTier::for_clock(clk)) {
        (DramType::Ddr3, _) => (9, 13),
        (DramType::Ddr4, SpeedTier::Low) => (10, 14),
        (DramType::Ddr4, SpeedTier::Mid) => (12, 16),
        (DramType::Ddr4, SpeedTier::High) => (14, 18),
        (DramType::Lpddr3, _) => (8, 14),
        (DramType::Lpddr4, SpeedTier::Low) => (10, 20),
        (DramType::Lpddr4, SpeedTier::Mid) => (14, 28),
        (DramType::Lpddr4, SpeedTier::High) => (16, 32),
    };
    Latencies { write, read }
}

/// DDR3 mode registers MR0 to MR3: CL 13, WR 14, DLL on, CWL 9.
pub const DDR3_MODE_REGISTERS: [u16; 4] = [0x1f14, 0x0004, 0x0020, 0x0000];

/// LPDDR4 MR1 (preamble, nWR) for the clock tier.
pub const fn lpddr4_mr1(clk: MegaHertz) -> u8 {
    match SpeedTier::for_clock(clk) {
        SpeedTier::Low => 0x34,
        SpeedTier::Mid => 0x54,
        SpeedTier::High => 0x64,
    }
}

/// LPDDR4 MR2 (RL and WL set A, DBI off) for the clock tier.
pub const fn lpddr4_mr2(clk: MegaHertz) -> u8 {
    match SpeedTier::for_clock(clk) {
        SpeedTier::Low => 0x1b,
        SpeedTier::Mid => 0x2d,
        SpeedTier::High => 0x36,
    }
}

/// LPDDR4 MR3: pull-down drive, DBI off.
pub const LPDDR4_MR3: u8 = 0x33;
/// LPDDR4 MR13: frequency set point 0.
pub const LPDDR4_MR13: u8 = 0x00;

/// LPDDR4 mode registers written after the DFI initialization, as (address, value) pairs.
///
/// MR11 sets the DQ and CA ODT, MR12 and MR14 the CA and DQ VREF, MR22 the SoC ODT.
pub const fn lpddr4_mode_registers(clk: MegaHertz) -> [(u8, u8); 10] {
    [
        (0, 0x00),
        (1, lpddr4_mr1(clk)),
        (2, lpddr4_mr2(clk)),
        (3, LPDDR4_MR3),
        (4, 0x03),
        (11, 0x04),
        (12, 0x72),
        (13, LPDDR4_MR13),
        (14, 0x08),
        (22, 0x26),
    ]
}

/// A timing given as "max(n nCK, t ps)".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MinTiming {
    pub picos: u32,
    pub min_clks: u32,
}

impl MinTiming {
    pub const fn new(picos: u32, min_clks: u32) -> Self {
        Self { picos, min_clks }
    }

    #[inline]
    pub const fn to_mclk(&self, clk: &MemoryClock) -> u32 {
        clk.picos_to_mclk_min(self.picos, self.min_clks)
    }
}

/// JEDEC timing parameters of a DRAM type, in picoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JedecTimings {
    pub t_rcd: u32,
    pub t_rp: u32,
    pub t_ras: u32,
    pub t_rc: u32,
    pub t_faw: u32,
    pub t_rfc: u32,
    pub t_refi: u32,
    pub t_rrd: MinTiming,
    pub t_wr: MinTiming,
    pub t_wtr: MinTiming,
    pub t_rtp: MinTiming,
    pub t_xp: MinTiming,
}

impl JedecTimings {
    pub const DDR3: Self = Self {
        t_rcd: 15_000,
        t_rp: 15_000,
        t_ras: 38_000,
        t_rc: 53_000,
        t_faw: 50_000,
        t_rfc: 350_000,
        t_refi: 7_800_000,
        t_rrd: MinTiming::new(10_000, 4),
        t_wr: MinTiming::new(15_000, 3),
        t_wtr: MinTiming::new(7_500, 4),
        t_rtp: MinTiming::new(7_500, 4),
        t_xp: MinTiming::new(7_500, 3),
    };

    pub const DDR4: Self = Self {
        t_rcd: 13_750,
        t_rp: 13_750,
        t_ras: 32_000,
        t_rc: 45_750,
        t_faw: 30_000,
        t_rfc: 350_000,
        t_refi: 7_800_000,
        t_rrd: MinTiming::new(6_400, 4),
        t_wr: MinTiming::new(15_000, 0),
        t_wtr: MinTiming::new(7_500, 4),
        t_rtp: MinTiming::new(7_500, 4),
        t_xp: MinTiming::new(6_000, 4),
    };

    pub const LPDDR3: Self = Self {
        t_rcd: 18_000,
        t_rp: 18_000,
        t_ras: 42_000,
        t_rc: 60_000,
        t_faw: 50_000,
        t_rfc: 210_000,
        t_refi: 3_900_000,
        t_rrd: MinTiming::new(10_000, 2),
        t_wr: MinTiming::new(15_000, 4),
        t_wtr: MinTiming::new(7_500, 4),
        t_rtp: MinTiming::new(7_500, 4),
        t_xp: MinTiming::new(7_500, 3),
    };

    pub const LPDDR4: Self = Self {
        t_rcd: 18_000,
        t_rp: 21_000,
        t_ras: 42_000,
        t_rc: 63_000,
        t_faw: 40_000,
        t_rfc: 280_000,
        t_refi: 3_904_000,
        t_rrd: MinTiming::new(10_000, 4),
        t_wr: MinTiming::new(18_000, 0),
        t_wtr: MinTiming::new(10_000, 8),
        t_rtp: MinTiming::new(7_500, 8),
        t_xp: MinTiming::new(7_500, 5),
    };

    pub const fn for_type(dram_type: DramType) -> &'static Self {
        match dram_type {
            DramType::Ddr3 => &Self::DDR3,
            DramType::Ddr4 => &Self::DDR4,
            DramType::Lpddr3 => &Self::LPDDR3,
            DramType::Lpddr4 => &Self::LPDDR4,
        }
    }
}

/// Timing parameters in DRAM clocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingParams {
    pub dram_type: DramType,
    pub latencies: Latencies,
    pub burst_length: u32,
    pub t_rcd: u32,
    pub t_rp: u32,
    pub t_ras: u32,
    pub t_rc: u32,
    pub t_rrd: u32,
    pub t_faw: u32,
    pub t_wr: u32,
    pub t_wtr: u32,
    pub t_rtp: u32,
    pub t_xp: u32,
    pub t_rfc: u32,
    pub t_refi: u32,
    /// Mode register words sent by the controller's own initialization: MR0/MR1 for DDR3,
    /// MR1/MR2 for LPDDR4.
    pub init3: u32,
    /// MR2/MR3 for DDR3, MR3/MR13 for LPDDR4.
    pub init4: u32,
}

impl TimingParams {
    pub fn compute(dram_type: DramType, clk: MegaHertz) -> Result<Self, InvalidClockError> {
        let mclk = MemoryClock::from_mhz(clk.raw())?;
        let timings = JedecTimings::for_type(dram_type);
        let latencies = latencies(dram_type, clk);

        let (burst_length, init3, init4) = match dram_type {
            DramType::Ddr3 => {
                let cwl = jedec::ddr3_cas_write_latency(&mclk);
                if cwl > latencies.write {
                    log::warn!(
                        "DDR3 write latency {} is below the JEDEC CWL {} at {}",
                        latencies.write,
                        cwl,
                        clk
                    );
                }
                (
                    8,
                    ((DDR3_MODE_REGISTERS[0] as u32) << 16) | DDR3_MODE_REGISTERS[1] as u32,
                    ((DDR3_MODE_REGISTERS[2] as u32) << 16) | DDR3_MODE_REGISTERS[3] as u32,
                )
            }
            DramType::Lpddr4 => (
                16,
                ((lpddr4_mr1(clk) as u32) << 16) | lpddr4_mr2(clk) as u32,
                ((LPDDR4_MR3 as u32) << 16) | LPDDR4_MR13 as u32,
            ),
            DramType::Ddr4 | DramType::Lpddr3 => (8, 0, 0),
        };

        Ok(Self {
            dram_type,
            latencies,
            burst_length,
            t_rcd: mclk.picos_to_mclk(timings.t_rcd),
            t_rp: mclk.picos_to_mclk(timings.t_rp),
            t_ras: mclk.picos_to_mclk(timings.t_ras),
            t_rc: mclk.picos_to_mclk(timings.t_rc),
            t_rrd: timings.t_rrd.to_mclk(&mclk),
            t_faw: mclk.picos_to_mclk(timings.t_faw),
            t_wr: timings.t_wr.to_mclk(&mclk),
            t_wtr: timings.t_wtr.to_mclk(&mclk),
            t_rtp: timings.t_rtp.to_mclk(&mclk),
            t_xp: timings.t_xp.to_mclk(&mclk),
            t_rfc: mclk.picos_to_mclk(timings.t_rfc),
            t_refi: mclk.picos_to_mclk(timings.t_refi),
            init3,
            init4,
        })
    }
}

/// DRAM clocks to controller clocks.
#[inline]
const fn ctrl(dram_clks: u32) -> u32 {
    dram_clks.div_ceil(2)
}

/// Register words derived from [TimingParams].
#[derive(Debug, Clone, Copy)]
pub struct TimingRegs {
    pub dramtmg0: DramTiming0,
    pub dramtmg1: DramTiming1,
    pub dramtmg2: DramTiming2,
    pub dramtmg3: DramTiming3,
    pub dramtmg4: DramTiming4,
    pub dramtmg5: DramTiming5,
    pub dramtmg6: DramTiming6,
    pub dramtmg8: DramTiming8,
    pub dfitmg0: DfiTiming0,
    pub dfitmg1: DfiTiming1,
    pub rfshtmg: RefreshTiming,
    pub init3: Init3,
    pub init4: Init4,
}

impl TimingRegs {
    pub fn from_params(params: &TimingParams) -> Self {
        let wl = params.latencies.write;
        let rl = params.latencies.read;
        let half_burst = params.burst_length / 2;

        let wr2pre = ctrl(wl + half_burst + params.t_wr);
        let wr2rd = ctrl(wl + half_burst + params.t_wtr);
        let rd2wr = ctrl((rl + half_burst + 2).saturating_sub(wl));
        let t_ras_max = ctrl(9 * params.t_refi) / 1024;
        let t_xp = ctrl(params.t_xp);

        Self {
            dramtmg0: DramTiming0::DEFAULT
                .with_wr2pre(sat!(u7, wr2pre))
                .with_t_faw(sat!(u6, ctrl(params.t_faw)))
                .with_t_ras_max(sat!(u7, t_ras_max))
                .with_t_ras_min(sat!(u6, ctrl(params.t_ras))),
            dramtmg1: DramTiming1::DEFAULT
                .with_t_xp(sat!(u5, t_xp))
                .with_rd2pre(sat!(u6, ctrl(params.t_rtp)))
                .with_t_rc(sat!(u7, ctrl(params.t_rc))),
            dramtmg2: DramTiming2::DEFAULT
                .with_write_latency(sat!(u6, ctrl(wl)))
                .with_read_latency(sat!(u6, ctrl(rl)))
                .with_rd2wr(sat!(u6, rd2wr))
                .with_wr2rd(sat!(u6, wr2rd)),
            dramtmg3: DramTiming3::DEFAULT
                .with_t_mrw(u10::new(0))
                .with_t_mrd(u6::new(4))
                .with_t_mod(u10::new(12)),
            dramtmg4: DramTiming4::DEFAULT
                .with_t_rcd(sat!(u5, ctrl(params.t_rcd)))
                .with_t_ccd(u4::new(2))
                .with_t_rrd(sat!(u4, ctrl(params.t_rrd)))
                .with_t_rp(sat!(u5, ctrl(params.t_rp))),
            dramtmg5: DramTiming5::DEFAULT
                .with_t_cksrx(u4::new(4))
                .with_t_cksre(u4::new(4))
                .with_t_ckesr(u6::new(4))
                .with_t_cke(u5::new(3)),
            dramtmg6: DramTiming6::DEFAULT
                .with_t_ckdpde(u4::new(2))
                .with_t_ckdpdx(u4::new(2))
                .with_t_ckcsx(sat!(u4, t_xp + 2)),
            dramtmg8: DramTiming8::DEFAULT
                .with_t_xs_fast_x32(u7::new(4))
                .with_t_xs_abort_x32(u7::new(4))
                .with_t_xs_dll_x32(u7::new(16))
                .with_t_xs_x32(u7::new(4)),
            dfitmg0: DfiTiming0::DEFAULT
                .with_dfi_t_ctrl_delay(u5::new(2))
                .with_dfi_rddata_use_dfi_phy_clk(true)
                .with_dfi_t_rddata_en(sat!(u7, rl.saturating_sub(4)))
                .with_dfi_wrdata_use_dfi_phy_clk(true)
                .with_dfi_tphy_wrlat(sat!(u6, wl.saturating_sub(2))),
            dfitmg1: DfiTiming1::DEFAULT
                .with_dfi_t_wrdata_delay(u5::new(0x10))
                .with_dfi_t_dram_clk_disable(u4::new(2))
                .with_dfi_t_dram_clk_enable(u4::new(2)),
            rfshtmg: RefreshTiming::DEFAULT
                .with_t_rfc_nom_x32(sat!(u12, ctrl(params.t_refi) / 32))
                .with_t_rfc_min(sat!(u10, ctrl(params.t_rfc))),
            init3: Init3::new_with_raw_value(params.init3),
            init4: Init4::new_with_raw_value(params.init4),
        }
    }

    /// Writes the timing registers. Only valid while the quasi-dynamic registers are unlocked
    /// or before the controller is started.
    pub fn program<B: RegisterAccess>(&self, bus: &mut B) {
        let writes = [
            (offsets::DRAMTMG0, self.dramtmg0.raw_value()),
            (offsets::DRAMTMG1, self.dramtmg1.raw_value()),
            (offsets::DRAMTMG2, self.dramtmg2.raw_value()),
            (offsets::DRAMTMG3, self.dramtmg3.raw_value()),
            (offsets::DRAMTMG4, self.dramtmg4.raw_value()),
            (offsets::DRAMTMG5, self.dramtmg5.raw_value()),
            (offsets::DRAMTMG6, self.dramtmg6.raw_value()),
            (offsets::DRAMTMG8, self.dramtmg8.raw_value()),
            (offsets::DFITMG0, self.dfitmg0.raw_value()),
            (offsets::DFITMG1, self.dfitmg1.raw_value()),
            (offsets::RFSHTMG, self.rfshtmg.raw_value()),
            (offsets::INIT3, self.init3.raw_value()),
            (offsets::INIT4, self.init4.raw_value()),
        ];
        for (offset, value) in writes {
            bus.write32(MCTL_CTL_BASE_ADDR + offset, value);
        }
    }
}
