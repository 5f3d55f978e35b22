//! DesignWare uMCTL2 based DRAM controller (MCTL_CTL0).
//!
//! The controller is configured through the quasi-dynamic register programming sequence: the
//! software clears [SwControl::sw_done], updates the registers and then sets it again and waits
//! for the acknowledgement in [offsets::SWSTAT].
use arbitrary_int::{u2, u4, u5, u6, u7, u10, u12};

pub const MCTL_CTL_BASE_ADDR: usize = 0x0310_3000;

pub mod offsets {
    pub const MSTR: usize = 0x000;
    pub const STATR: usize = 0x004;
    pub const CLKEN: usize = 0x00c;
    pub const MRCTRL0: usize = 0x010;
    pub const MRCTRL1: usize = 0x014;
    pub const PWRCTL: usize = 0x030;
    pub const HWLPCTL: usize = 0x038;
    pub const RFSHCTL3: usize = 0x060;
    pub const RFSHTMG: usize = 0x064;
    pub const INIT3: usize = 0x0dc;
    pub const INIT4: usize = 0x0e0;
    pub const DRAMTMG0: usize = 0x100;
    pub const DRAMTMG1: usize = 0x104;
    pub const DRAMTMG2: usize = 0x108;
    pub const DRAMTMG3: usize = 0x10c;
    pub const DRAMTMG4: usize = 0x110;
    pub const DRAMTMG5: usize = 0x114;
    pub const DRAMTMG6: usize = 0x118;
    pub const DRAMTMG8: usize = 0x120;
    pub const ZQCTL0: usize = 0x180;
    pub const DFITMG0: usize = 0x190;
    pub const DFITMG1: usize = 0x194;
    pub const DFIUPD0: usize = 0x1a0;
    pub const DFIMISC: usize = 0x1b0;
    pub const DFISTAT: usize = 0x1bc;
    pub const DBICTL: usize = 0x1c0;
    /// Start of the nine address map registers.
    pub const ADDRMAP0: usize = 0x200;
    pub const ODTCFG: usize = 0x240;
    pub const ODTMAP: usize = 0x244;
    pub const SCHED0: usize = 0x250;
    pub const SCHED1: usize = 0x254;
    /// Undocumented scheduler related register.
    pub const UNK_264: usize = 0x264;
    /// Undocumented scheduler related register.
    pub const UNK_270: usize = 0x270;
    pub const SWCTL: usize = 0x320;
    pub const SWSTAT: usize = 0x324;

    /// ODTCFG copies for the additional frequency set points.
    pub const ODTCFG_FREQ: [usize; 3] = [0x2240, 0x3240, 0x4240];
    /// ZQCTL0 copies for the additional frequency set points.
    pub const ZQCTL0_FREQ: [usize; 3] = [0x2180, 0x3180, 0x4180];
}

/// Number of address map registers programmed during bring-up.
pub const ADDRMAP_COUNT: usize = 9;

#[bitbybit::bitenum(u2, exhaustive = true)]
#[derive(Debug, PartialEq, Eq)]
pub enum DeviceConfig {
    X4 = 0b00,
    X8 = 0b01,
    X16 = 0b10,
    X32 = 0b11,
}

#[bitbybit::bitenum(u2, exhaustive = false)]
#[derive(Debug, PartialEq, Eq)]
pub enum DataBusWidth {
    Full = 0b00,
    Half = 0b01,
    Quarter = 0b10,
}

#[bitbybit::bitfield(u32, default = 0x0, debug)]
pub struct Master {
    #[bits(30..=31, rw)]
    device_config: DeviceConfig,
    /// 0b01 for one rank, 0b11 for two ranks.
    #[bits(24..=25, rw)]
    active_ranks: u2,
    /// Burst length divided by two.
    #[bits(16..=19, rw)]
    burst_rdwr: u4,
    #[bits(12..=13, rw)]
    data_bus_width: Option<DataBusWidth>,
    #[bit(10, rw)]
    en_2t_timing_mode: bool,
    #[bit(5, rw)]
    lpddr4: bool,
    #[bit(4, rw)]
    ddr4: bool,
    #[bit(3, rw)]
    lpddr3: bool,
    #[bit(2, rw)]
    lpddr2: bool,
    #[bit(0, rw)]
    ddr3: bool,
}

#[bitbybit::bitfield(u32, default = 0x0, debug)]
pub struct OperatingStatus {
    /// 1 means normal operation.
    #[bits(0..=1, r)]
    operating_mode: u2,
}

/// Mode register access control. Writing [Self::mr_wr] starts the transfer, the hardware
/// clears it when the transfer is done.
#[bitbybit::bitfield(u32, default = 0x0, debug)]
pub struct ModeRegisterControl0 {
    #[bit(31, rw)]
    mr_wr: bool,
    #[bits(12..=15, rw)]
    mr_addr: u4,
    #[bits(4..=7, rw)]
    mr_rank: u4,
}

#[bitbybit::bitfield(u32, default = 0x0, debug)]
pub struct PowerControl {
    #[bit(5, rw)]
    selfref_sw: bool,
}

#[bitbybit::bitfield(u32, default = 0x0, debug)]
pub struct RefreshControl3 {
    #[bit(0, rw)]
    dis_auto_refresh: bool,
}

#[bitbybit::bitfield(u32, default = 0x0, debug)]
pub struct DfiMisc {
    #[bit(5, rw)]
    dfi_init_start: bool,
    #[bit(0, rw)]
    dfi_init_complete_en: bool,
}

#[bitbybit::bitfield(u32, default = 0x0, debug)]
pub struct SwControl {
    #[bit(0, rw)]
    sw_done: bool,
}

#[bitbybit::bitfield(u32, default = 0x0, debug)]
pub struct DramTiming0 {
    #[bits(24..=30, rw)]
    wr2pre: u7,
    #[bits(16..=21, rw)]
    t_faw: u6,
    /// tRAS(max) in multiples of 1024 clocks.
    #[bits(8..=14, rw)]
    t_ras_max: u7,
    #[bits(0..=5, rw)]
    t_ras_min: u6,
}

#[bitbybit::bitfield(u32, default = 0x0, debug)]
pub struct DramTiming1 {
    #[bits(16..=20, rw)]
    t_xp: u5,
    #[bits(8..=13, rw)]
    rd2pre: u6,
    #[bits(0..=6, rw)]
    t_rc: u7,
}

#[bitbybit::bitfield(u32, default = 0x0, debug)]
pub struct DramTiming2 {
    #[bits(24..=29, rw)]
    write_latency: u6,
    #[bits(16..=21, rw)]
    read_latency: u6,
    #[bits(8..=13, rw)]
    rd2wr: u6,
    #[bits(0..=5, rw)]
    wr2rd: u6,
}

#[bitbybit::bitfield(u32, default = 0x0, debug)]
pub struct DramTiming3 {
    #[bits(20..=29, rw)]
    t_mrw: u10,
    #[bits(12..=17, rw)]
    t_mrd: u6,
    #[bits(0..=9, rw)]
    t_mod: u10,
}

#[bitbybit::bitfield(u32, default = 0x0, debug)]
pub struct DramTiming4 {
    #[bits(24..=28, rw)]
    t_rcd: u5,
    #[bits(16..=19, rw)]
    t_ccd: u4,
    #[bits(8..=11, rw)]
    t_rrd: u4,
    #[bits(0..=4, rw)]
    t_rp: u5,
}

#[bitbybit::bitfield(u32, default = 0x0, debug)]
pub struct DramTiming5 {
    #[bits(24..=27, rw)]
    t_cksrx: u4,
    #[bits(16..=19, rw)]
    t_cksre: u4,
    #[bits(8..=13, rw)]
    t_ckesr: u6,
    #[bits(0..=4, rw)]
    t_cke: u5,
}

#[bitbybit::bitfield(u32, default = 0x0, debug)]
pub struct DramTiming6 {
    #[bits(24..=27, rw)]
    t_ckdpde: u4,
    #[bits(16..=19, rw)]
    t_ckdpdx: u4,
    #[bits(0..=3, rw)]
    t_ckcsx: u4,
}

/// Self refresh exit timings, all in multiples of 32 clocks.
#[bitbybit::bitfield(u32, default = 0x0, debug)]
pub struct DramTiming8 {
    #[bits(24..=30, rw)]
    t_xs_fast_x32: u7,
    #[bits(16..=22, rw)]
    t_xs_abort_x32: u7,
    #[bits(8..=14, rw)]
    t_xs_dll_x32: u7,
    #[bits(0..=6, rw)]
    t_xs_x32: u7,
}

#[bitbybit::bitfield(u32, default = 0x0, debug)]
pub struct RefreshTiming {
    /// tREFI in multiples of 32 clocks.
    #[bits(16..=27, rw)]
    t_rfc_nom_x32: u12,
    #[bits(0..=9, rw)]
    t_rfc_min: u10,
}

#[bitbybit::bitfield(u32, default = 0x0, debug)]
pub struct DfiTiming0 {
    #[bits(24..=28, rw)]
    dfi_t_ctrl_delay: u5,
    #[bit(23, rw)]
    dfi_rddata_use_dfi_phy_clk: bool,
    #[bits(16..=22, rw)]
    dfi_t_rddata_en: u7,
    #[bit(15, rw)]
    dfi_wrdata_use_dfi_phy_clk: bool,
    #[bits(8..=13, rw)]
    dfi_tphy_wrdata: u6,
    #[bits(0..=5, rw)]
    dfi_tphy_wrlat: u6,
}

#[bitbybit::bitfield(u32, default = 0x0, debug)]
pub struct DfiTiming1 {
    #[bits(16..=20, rw)]
    dfi_t_wrdata_delay: u5,
    #[bits(8..=11, rw)]
    dfi_t_dram_clk_disable: u4,
    #[bits(0..=3, rw)]
    dfi_t_dram_clk_enable: u4,
}

/// Mode register values the controller sends during its own initialization sequence.
#[bitbybit::bitfield(u32, default = 0x0, debug)]
pub struct Init3 {
    #[bits(16..=31, rw)]
    mr: u16,
    #[bits(0..=15, rw)]
    emr: u16,
}

#[bitbybit::bitfield(u32, default = 0x0, debug)]
pub struct Init4 {
    #[bits(16..=31, rw)]
    emr2: u16,
    #[bits(0..=15, rw)]
    emr3: u16,
}

/// Bits shared by DFIUPD0, ZQCTL0 and its copies: disable the automatic controller updates and
/// ZQ calibrations while the PHY is trained.
pub const DISABLE_AUTO_UPDATES: u32 = (1 << 31) | (1 << 30);

/// Enables the DRAM clock output of the controller.
pub const CLKEN_DRAM_CLOCK: u32 = 1 << 8;

/// Data mask/DBI enable bit of DBICTL.
pub const DBICTL_DM_EN: u32 = 1 << 0;

static_assertions::const_assert_eq!(offsets::ADDRMAP0 + ADDRMAP_COUNT * 4, 0x224);
