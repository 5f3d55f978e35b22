//! Register layouts of the Freescale/NXP DDR memory controller.
//!
//! Only the fields computed by [super::compute] are modelled.
use arbitrary_int::{u2, u3, u4, u5, u6, u7, u14};

/// Chip select memory bounds (CSn_BNDS), in units of 16 MiB.
#[bitbybit::bitfield(u32, default = 0x0, debug)]
pub struct ChipSelectBounds {
    #[bits(16..=31, rw)]
    start: u16,
    #[bits(0..=15, rw)]
    end: u16,
}

/// Chip select configuration (CSn_CONFIG).
#[bitbybit::bitfield(u32, default = 0x0, debug)]
pub struct ChipSelectConfig {
    #[bit(31, rw)]
    enable: bool,
    /// Only available for chip select 0.
    #[bits(29..=30, rw)]
    interleave_enable: u2,
    /// Only available for chip select 0.
    #[bits(24..=27, rw)]
    interleave_control: u4,
    #[bit(23, rw)]
    auto_precharge: bool,
    #[bits(20..=22, rw)]
    odt_read_config: u3,
    #[bits(16..=18, rw)]
    odt_write_config: u3,
    /// Number of bank bits minus two.
    #[bits(14..=15, rw)]
    bank_bits: u2,
    /// Number of row bits minus twelve.
    #[bits(8..=10, rw)]
    row_bits: u3,
    /// Number of column bits minus eight.
    #[bits(0..=2, rw)]
    col_bits: u3,
}

/// TIMING_CFG_0: turnaround and power-down exit timings.
#[bitbybit::bitfield(u32, default = 0x0, debug)]
pub struct TimingCfg0 {
    #[bits(30..=31, rw)]
    read_to_write: u2,
    #[bits(28..=29, rw)]
    write_to_read: u2,
    #[bits(26..=27, rw)]
    read_to_read: u2,
    #[bits(24..=25, rw)]
    write_to_write: u2,
    #[bits(20..=23, rw)]
    act_pd_exit: u4,
    #[bits(16..=19, rw)]
    pre_pd_exit: u4,
    #[bits(8..=11, rw)]
    odt_pd_exit: u4,
    #[bits(0..=4, rw)]
    mrs_cycle: u5,
}

/// TIMING_CFG_1: the low four bits of the core JEDEC timings.
#[bitbybit::bitfield(u32, default = 0x0, debug)]
pub struct TimingCfg1 {
    /// tRP
    #[bits(28..=31, rw)]
    pre_to_act: u4,
    /// tRAS
    #[bits(24..=27, rw)]
    act_to_pre: u4,
    /// tRCD
    #[bits(20..=23, rw)]
    act_to_rw: u4,
    #[bits(16..=19, rw)]
    cas_latency: u4,
    /// tRFC minus eight clocks.
    #[bits(12..=15, rw)]
    refresh_recovery: u4,
    /// tWR
    #[bits(8..=11, rw)]
    write_recovery: u4,
    /// tRRD
    #[bits(4..=7, rw)]
    act_to_act: u4,
    /// tWTR
    #[bits(0..=3, rw)]
    write_to_read: u4,
}

#[bitbybit::bitfield(u32, default = 0x0, debug)]
pub struct TimingCfg2 {
    #[bits(28..=31, rw)]
    additive_latency: u4,
    /// CAS-to-preamble override.
    #[bits(23..=27, rw)]
    cpo: u5,
    #[bits(19..=22, rw)]
    write_latency: u4,
    /// tRTP
    #[bits(13..=15, rw)]
    read_to_pre: u3,
    #[bits(10..=12, rw)]
    write_data_delay: u3,
    /// tCKE
    #[bits(6..=8, rw)]
    cke_pulse: u3,
    /// tFAW
    #[bits(0..=5, rw)]
    four_act: u6,
}

/// TIMING_CFG_3: extension bits for timings which do not fit into [TimingCfg1].
#[bitbybit::bitfield(u32, default = 0x0, debug)]
pub struct TimingCfg3 {
    #[bit(28, rw)]
    ext_pre_to_act: bool,
    #[bits(24..=25, rw)]
    ext_act_to_pre: u2,
    #[bit(22, rw)]
    ext_act_to_rw: bool,
    #[bits(16..=20, rw)]
    ext_refresh_recovery: u5,
    #[bits(12..=13, rw)]
    ext_cas_latency: u2,
    #[bit(10, rw)]
    ext_additive_latency: bool,
    #[bit(8, rw)]
    ext_write_recovery: bool,
    #[bits(0..=2, rw)]
    control_adjust: u3,
}

/// TIMING_CFG_4: turnaround times for the same chip select.
#[bitbybit::bitfield(u32, default = 0x0, debug)]
pub struct TimingCfg4 {
    #[bits(28..=31, rw)]
    read_to_write: u4,
    #[bits(24..=27, rw)]
    write_to_read: u4,
    #[bits(20..=23, rw)]
    read_to_read: u4,
    #[bits(16..=19, rw)]
    write_to_write: u4,
    #[bits(0..=1, rw)]
    dll_lock: u2,
}

/// TIMING_CFG_5: ODT timings.
#[bitbybit::bitfield(u32, default = 0x0, debug)]
pub struct TimingCfg5 {
    #[bits(24..=28, rw)]
    read_odt_on: u5,
    #[bits(20..=22, rw)]
    read_odt_off: u3,
    #[bits(12..=16, rw)]
    write_odt_on: u5,
    #[bits(8..=10, rw)]
    write_odt_off: u3,
}

#[bitbybit::bitfield(u32, default = 0x0, debug)]
pub struct SdramCfg {
    #[bit(31, rw)]
    mem_enable: bool,
    #[bit(30, rw)]
    self_refresh_enable: bool,
    #[bit(29, rw)]
    ecc_enable: bool,
    #[bit(28, rw)]
    registered_dimm: bool,
    #[bits(24..=26, rw)]
    sdram_type: u3,
    #[bit(21, rw)]
    dynamic_power: bool,
    #[bits(19..=20, rw)]
    data_bus_width: u2,
    #[bit(18, rw)]
    eight_beat: bool,
    #[bit(17, rw)]
    ncap: bool,
    #[bit(16, rw)]
    three_t: bool,
    #[bit(15, rw)]
    two_t: bool,
    #[bits(8..=14, rw)]
    bank_interleave: u7,
    #[bit(5, rw)]
    x32: bool,
    #[bit(4, rw)]
    precharge_bit8: bool,
    #[bit(3, rw)]
    half_strength: bool,
    #[bit(1, rw)]
    mem_halt: bool,
    #[bit(0, rw)]
    bypass_init: bool,
}

#[bitbybit::bitfield(u32, default = 0x0, debug)]
pub struct SdramCfg2 {
    #[bit(31, rw)]
    force_self_refresh: bool,
    #[bit(30, rw)]
    self_refresh_irq: bool,
    #[bit(29, rw)]
    dll_reset_disable: bool,
    #[bits(26..=27, rw)]
    dqs_config: u2,
    #[bits(21..=22, rw)]
    odt_config: u2,
    #[bits(12..=15, rw)]
    posted_refreshes: u4,
    #[bit(11, rw)]
    slow: bool,
    #[bit(10, rw)]
    x4: bool,
    #[bit(9, rw)]
    quad_rank: bool,
    #[bit(8, rw)]
    unique_mrs: bool,
    #[bit(6, rw)]
    otf_burst_chop: bool,
    #[bit(5, rw)]
    address_parity: bool,
    #[bit(4, rw)]
    data_init: bool,
    #[bit(2, rw)]
    rcw_enable: bool,
    #[bit(0, rw)]
    mirrored_dimm: bool,
}

/// Mode register pair: the extended mode register in the upper half and the mode register in
/// the lower half.
#[bitbybit::bitfield(u32, default = 0x0, debug)]
pub struct SdramMode {
    #[bits(16..=31, rw)]
    extended: u16,
    #[bits(0..=15, rw)]
    mode: u16,
}

#[bitbybit::bitfield(u32, default = 0x0, debug)]
pub struct SdramInterval {
    #[bits(16..=31, rw)]
    refresh_interval: u16,
    #[bits(0..=13, rw)]
    burst_to_precharge: u14,
}

#[bitbybit::bitfield(u32, default = 0x0, debug)]
pub struct ZqControl {
    #[bit(31, rw)]
    enable: bool,
    #[bits(24..=27, rw)]
    zq_init: u4,
    #[bits(16..=19, rw)]
    zq_oper: u4,
    #[bits(8..=11, rw)]
    zq_cs: u4,
}

#[bitbybit::bitfield(u32, default = 0x0, debug)]
pub struct WriteLevelingControl {
    #[bit(31, rw)]
    enable: bool,
    #[bits(24..=26, rw)]
    mrd: u3,
    #[bits(20..=22, rw)]
    odt_enable: u3,
    #[bits(16..=18, rw)]
    dqs_enable: u3,
    #[bits(12..=15, rw)]
    sample: u4,
    #[bits(8..=10, rw)]
    repetition: u3,
    #[bits(0..=4, rw)]
    start: u5,
}

/// Masks a value into an arbitrary width integer, keeping the low bits like the hardware
/// field would.
macro_rules! field {
    ($ty:ident, $val:expr) => {
        $ty::new((($val) as u32 & ($ty::MAX.value() as u32)) as _)
    };
}
pub(crate) use field;
