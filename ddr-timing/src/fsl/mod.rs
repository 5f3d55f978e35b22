//! # Freescale/NXP DDR controller register image
//!
//! Computes the complete configuration register set of the Freescale DDR memory controller
//! from the parameters of the installed DIMMs, the controller options and the timing
//! parameters common to all DIMMs.
//!
//! The image starts out zeroed, each register is populated by its own setter and the result
//! is validated for mutually exclusive settings before it is handed out. Committing the image
//! to hardware is up to the caller.
//!
//! Supported SDRAM generations are DDR2 and DDR3.
use arbitrary_int::{Number, u2, u3, u4, u5, u6, u7, u14};

use crate::clock::MemoryClock;
use crate::jedec;

pub mod regs;

use regs::{
    ChipSelectBounds, ChipSelectConfig, SdramCfg, SdramCfg2, SdramInterval, SdramMode,
    TimingCfg0, TimingCfg1, TimingCfg2, TimingCfg3, TimingCfg4, TimingCfg5, WriteLevelingControl,
    ZqControl, field,
};

pub const CHIP_SELECTS: usize = 4;
pub const DIMM_SLOTS: usize = 2;
const CHIP_SELECTS_PER_DIMM: usize = CHIP_SELECTS / DIMM_SLOTS;

/// Value written to memory when the controller initializes it.
pub const DATA_INIT_VALUE: u32 = 0xDEAD_BEEF;
/// Controller IP revisions above this one support unique mode registers per chip select.
pub const UNIQUE_MRS_MIN_IP_REV: u32 = 0x40400;

const EOR_ADDRESS_HASH: u32 = 0x4000_0000;
const ODT_CONFIG_ONLY_READ: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdramType {
    Ddr1,
    Ddr2,
    Lpddr1,
    Ddr3,
}

impl SdramType {
    /// Value of the SDRAM_TYPE field of DDR_SDRAM_CFG.
    pub const fn code(self) -> u8 {
        match self {
            SdramType::Ddr1 => 2,
            SdramType::Ddr2 => 3,
            SdramType::Lpddr1 => 6,
            SdramType::Ddr3 => 7,
        }
    }

    const fn generation(self) -> Option<Generation> {
        match self {
            SdramType::Ddr2 => Some(Generation::Ddr2),
            SdramType::Ddr3 => Some(Generation::Ddr3),
            SdramType::Ddr1 | SdramType::Lpddr1 => None,
        }
    }
}

/// SDRAM generations for which the register image can be computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Generation {
    Ddr2,
    Ddr3,
}

/// Interleaving between memory controllers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterleavingMode {
    CacheLine = 0,
    Page = 1,
    Bank = 2,
    Superbank = 3,
}

/// Bank (chip select) interleaving.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ChipSelectInterleaving {
    #[default]
    None,
    Cs0Cs1,
    Cs2Cs3,
    Cs0Cs1AndCs2Cs3,
    Cs0Cs1Cs2Cs3,
}

impl ChipSelectInterleaving {
    /// Value of the BA_INTLV_CTL field of DDR_SDRAM_CFG.
    pub const fn bits(self) -> u8 {
        match self {
            ChipSelectInterleaving::None => 0x00,
            ChipSelectInterleaving::Cs0Cs1 => 0x40,
            ChipSelectInterleaving::Cs2Cs3 => 0x20,
            ChipSelectInterleaving::Cs0Cs1AndCs2Cs3 => 0x60,
            ChipSelectInterleaving::Cs0Cs1Cs2Cs3 => 0x04,
        }
    }
}

/// Burst length. For DDR3 [BurstLength::Four] selects burst chop 4.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum BurstLength {
    Four,
    OnTheFly,
    #[default]
    Eight,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum DataBusWidth {
    #[default]
    Bits64 = 0,
    Bits32 = 1,
    Bits16 = 2,
}

/// Parameters of one DIMM slot. A slot without DIMM has zero ranks.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DimmParams {
    pub n_ranks: u32,
    pub n_banks_per_sdram_device: u32,
    pub n_row_addr: u32,
    pub n_col_addr: u32,
    /// Size of one rank in bytes.
    pub rank_density: u64,
    pub base_address: u64,
}

/// Timing parameters which satisfy all installed DIMMs.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CommonTimingParams {
    pub trcd_ps: u32,
    pub trp_ps: u32,
    pub tras_ps: u32,
    pub twr_ps: u32,
    pub twtr_ps: u32,
    pub trfc_ps: u32,
    pub trrd_ps: u32,
    pub trtp_ps: u32,
    pub refresh_rate_ps: u32,
    pub lowest_common_spd_caslat: u32,
    pub additive_latency: u32,
    pub all_dimms_registered: bool,
    pub all_dimms_unbuffered: bool,
    pub all_dimms_ecc_capable: bool,
    pub extended_op_srt: bool,
    /// Register control words, one nibble each.
    pub rcw: [u8; 16],
    pub base_address: u64,
    pub total_mem: u64,
}

/// Options of a single chip select.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ChipSelectOptions {
    pub auto_precharge: bool,
    pub odt_rd_cfg: u8,
    pub odt_wr_cfg: u8,
    pub odt_rtt_norm: u8,
    pub odt_rtt_wr: u8,
}

/// Rtt values used for all chip selects instead of the per chip select values.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RttOverride {
    pub norm: u8,
    pub wr: u8,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WriteLevelingOverride {
    pub sample: u8,
    pub start: u8,
}

/// Controller options, usually board specific.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MemctlOptions {
    pub cs_local_opts: [ChipSelectOptions; CHIP_SELECTS],
    pub memctl_interleaving: Option<InterleavingMode>,
    pub ba_intlv_ctl: ChipSelectInterleaving,
    pub ecc_mode: bool,
    pub ecc_init_using_memctl: bool,
    pub self_refresh_in_sleep: bool,
    pub dynamic_power: bool,
    pub data_bus_width: DataBusWidth,
    pub burst_length: BurstLength,
    pub otf_burst_chop_en: bool,
    pub mirrored_dimm: bool,
    pub quad_rank_present: bool,
    pub dqs_config: u8,
    pub x4_en: bool,
    pub ap_en: bool,
    pub registered_dimm_en: bool,
    pub twot_en: bool,
    pub threet_en: bool,
    pub half_strength_driver_enable: bool,
    pub cas_latency_override: Option<u32>,
    pub additive_latency_override: Option<u32>,
    /// Self refresh idle threshold, enables automatic self refresh.
    pub auto_self_refresh: Option<u8>,
    pub zq_en: bool,
    pub wrlvl_en: bool,
    pub wrlvl_override: Option<WriteLevelingOverride>,
    pub wrlvl_ctl_2: u32,
    pub wrlvl_ctl_3: u32,
    pub trwt_override: Option<u8>,
    pub rtt_override: Option<RttOverride>,
    pub rcw_override: Option<(u32, u32)>,
    pub clk_adjust: u8,
    pub cpo_override: u8,
    pub write_data_delay: u8,
    pub tcke_clock_pulse_width_ps: u32,
    pub tfaw_window_four_activates_ps: u32,
    pub bstopre: u32,
    pub addr_hash: bool,
    pub ddr_cdr1: u32,
    pub ddr_cdr2: u32,
}

/// Everything the register image is computed from.
#[derive(Debug, Clone, Copy)]
pub struct Inputs<'a> {
    pub options: &'a MemctlOptions,
    pub common: &'a CommonTimingParams,
    pub dimms: &'a [DimmParams; DIMM_SLOTS],
    pub sdram_type: SdramType,
    pub clock: MemoryClock,
    /// Controller IP revision: major and minor version in bits 8..=23, errata in bits 0..=7.
    pub ip_rev: u32,
    /// Shift applied to the rank density when only part of the data bus is used.
    pub dbw_cap_adj: u32,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ChipSelectRegs {
    pub bnds: u32,
    pub config: u32,
    pub config_2: u32,
}

/// Controller configuration register image.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FslDdrCfgRegs {
    pub cs: [ChipSelectRegs; CHIP_SELECTS],
    pub timing_cfg_0: u32,
    pub timing_cfg_1: u32,
    pub timing_cfg_2: u32,
    pub timing_cfg_3: u32,
    pub timing_cfg_4: u32,
    pub timing_cfg_5: u32,
    pub ddr_sdram_cfg: u32,
    pub ddr_sdram_cfg_2: u32,
    /// DDR_SDRAM_MODE, DDR_SDRAM_MODE_2 up to DDR_SDRAM_MODE_8. Entries 2 to 7 are only used
    /// with unique mode registers per chip select.
    pub ddr_sdram_mode: [u32; 8],
    pub ddr_sdram_interval: u32,
    pub ddr_data_init: u32,
    pub ddr_sdram_clk_cntl: u32,
    pub ddr_init_addr: u32,
    pub ddr_init_ext_addr: u32,
    pub ddr_zq_cntl: u32,
    pub ddr_wrlvl_cntl: u32,
    pub ddr_wrlvl_cntl_2: u32,
    pub ddr_wrlvl_cntl_3: u32,
    pub ddr_sr_cntr: u32,
    pub ddr_sdram_rcw_1: u32,
    pub ddr_sdram_rcw_2: u32,
    pub ddr_eor: u32,
    pub ddr_cdr1: u32,
    pub ddr_cdr2: u32,
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputeError {
    #[error("SDRAM type {0:?} is not supported")]
    UnsupportedSdramType(SdramType),
    #[error("register image contains {0} conflicting settings")]
    Conflicts(u32),
}

impl FslDdrCfgRegs {
    /// Counts mutually exclusive settings in the register image.
    pub fn check(&self) -> u32 {
        let mut conflicts = 0;
        let cfg = SdramCfg::new_with_raw_value(self.ddr_sdram_cfg);
        if cfg.registered_dimm() && cfg.two_t() {
            log::error!("DDR_SDRAM_CFG[RD_EN] and DDR_SDRAM_CFG[2T_EN] must not be set together");
            conflicts += 1;
        }
        conflicts
    }
}

/// Latencies after applying the option overrides.
#[derive(Debug, Clone, Copy)]
struct Latencies {
    cas: u32,
    additive: u32,
}

/// Computes the controller register image.
///
/// With `size_only` set, only the chip select registers are computed, which is sufficient to
/// determine the memory size.
pub fn compute(input: &Inputs<'_>, size_only: bool) -> Result<FslDdrCfgRegs, ComputeError> {
    let generation = input
        .sdram_type
        .generation()
        .ok_or(ComputeError::UnsupportedSdramType(input.sdram_type))?;
    let opts = input.options;
    let common = input.common;
    let mut regs = FslDdrCfgRegs::default();

    let lat = Latencies {
        cas: opts
            .cas_latency_override
            .unwrap_or(common.lowest_common_spd_caslat),
        additive: opts
            .additive_latency_override
            .unwrap_or(common.additive_latency),
    };

    set_chip_selects(&mut regs, input);
    if size_only {
        return Ok(regs);
    }

    if opts.addr_hash {
        regs.ddr_eor = EOR_ADDRESS_HASH;
        log::info!("address hashing enabled");
    }
    regs.timing_cfg_0 = timing_cfg_0(input, generation);
    regs.timing_cfg_3 = timing_cfg_3(input, lat);
    regs.timing_cfg_1 = timing_cfg_1(input, generation, lat);
    regs.timing_cfg_2 = timing_cfg_2(input, generation, lat);
    regs.ddr_cdr1 = opts.ddr_cdr1;
    regs.ddr_cdr2 = opts.ddr_cdr2;
    regs.ddr_sdram_cfg = sdram_cfg(input, generation);

    let unique_mrs = input.ip_rev > UNIQUE_MRS_MIN_IP_REV;
    regs.ddr_sdram_cfg_2 = sdram_cfg_2(opts, generation, unique_mrs);
    match generation {
        Generation::Ddr3 => {
            set_ddr3_sdram_mode(&mut regs, input, lat, unique_mrs);
            set_ddr3_sdram_mode_2(&mut regs, input, unique_mrs);
        }
        Generation::Ddr2 => regs.ddr_sdram_mode[0] = ddr2_sdram_mode(input, lat),
    }
    regs.ddr_sdram_interval = SdramInterval::DEFAULT
        .with_refresh_interval(
            (input.clock.picos_to_mclk(common.refresh_rate_ps) & 0xffff) as u16,
        )
        .with_burst_to_precharge(field!(u14, opts.bstopre))
        .raw_value();
    regs.ddr_data_init = DATA_INIT_VALUE;
    regs.ddr_sdram_clk_cntl = u32::from(opts.clk_adjust & 0xf) << 23;
    regs.ddr_init_addr = 0;
    regs.ddr_init_ext_addr = 0;
    regs.timing_cfg_4 = timing_cfg_4(opts, generation);
    regs.timing_cfg_5 = timing_cfg_5(regs.timing_cfg_2, generation, lat);
    regs.ddr_zq_cntl = zq_cntl(opts.zq_en);
    regs.ddr_wrlvl_cntl = wrlvl_cntl(opts);
    regs.ddr_wrlvl_cntl_2 = opts.wrlvl_ctl_2;
    regs.ddr_wrlvl_cntl_3 = opts.wrlvl_ctl_3;
    regs.ddr_sr_cntr = u32::from(opts.auto_self_refresh.unwrap_or(0) & 0xf) << 16;
    set_rcw(&mut regs, opts, common);

    match regs.check() {
        0 => Ok(regs),
        n => Err(ComputeError::Conflicts(n)),
    }
}

fn set_chip_selects(regs: &mut FslDdrCfgRegs, input: &Inputs<'_>) {
    let opts = input.options;
    let common = input.common;
    for i in 0..CHIP_SELECTS {
        let dimm_number = i / CHIP_SELECTS_PER_DIMM;
        let dimm = &input.dimms[dimm_number];
        let rank_density = dimm.rank_density >> input.dbw_cap_adj;

        if dimm.n_ranks == 0 {
            log::debug!(
                "skipping setup of CS{} because DIMM {} has no ranks",
                i,
                dimm_number
            );
            continue;
        }
        let cs_in_dimm = i % CHIP_SELECTS_PER_DIMM;
        let populated = dimm.n_ranks as usize > cs_in_dimm;
        let rank_offset = cs_in_dimm as u64 * rank_density;
        let total_end = common
            .base_address
            .wrapping_add(common.total_mem)
            .wrapping_sub(1);

        let mut cs_enabled = true;
        let (start, end) = if opts.memctl_interleaving.is_some() {
            match opts.ba_intlv_ctl {
                ChipSelectInterleaving::Cs0Cs1Cs2Cs3 => (),
                ChipSelectInterleaving::Cs0Cs1 | ChipSelectInterleaving::Cs0Cs1AndCs2Cs3 => {
                    cs_enabled = i <= 1
                }
                ChipSelectInterleaving::Cs2Cs3 | ChipSelectInterleaving::None => {
                    cs_enabled = i == 0
                }
            }
            (common.base_address, total_end)
        } else {
            match opts.ba_intlv_ctl {
                ChipSelectInterleaving::Cs0Cs1Cs2Cs3 => (common.base_address, total_end),
                ChipSelectInterleaving::Cs0Cs1AndCs2Cs3 => {
                    let start = if i >= 2 && dimm_number == 0 {
                        dimm.base_address + 2 * rank_density
                    } else {
                        dimm.base_address
                    };
                    (start, (start + 2 * rank_density).wrapping_sub(1))
                }
                ChipSelectInterleaving::Cs0Cs1 | ChipSelectInterleaving::Cs2Cs3 => {
                    let (upper, lower) = if opts.ba_intlv_ctl == ChipSelectInterleaving::Cs0Cs1 {
                        (1, 0)
                    } else {
                        (3, 2)
                    };
                    let (start, mut end) = if populated {
                        let mut start = dimm.base_address;
                        let end = (start + rank_density).wrapping_sub(1) + rank_offset;
                        if i != upper {
                            start += rank_offset;
                        }
                        (start, end)
                    } else {
                        (0, 0)
                    };
                    // The interleaved pair is covered by the bounds of its lower chip select.
                    if i == lower {
                        end = end.wrapping_add(if lower == 0 {
                            rank_density
                        } else {
                            rank_density >> input.dbw_cap_adj
                        });
                    }
                    (start, end)
                }
                ChipSelectInterleaving::None => {
                    if populated {
                        let start = dimm.base_address + rank_offset;
                        (start, (start + rank_density).wrapping_sub(1))
                    } else {
                        (0, 0)
                    }
                }
            }
        };

        regs.cs[i].bnds = if cs_enabled {
            ChipSelectBounds::DEFAULT
                .with_start(((start >> 24) & 0xffff) as u16)
                .with_end(((end >> 24) & 0xffff) as u16)
                .raw_value()
        } else {
            0xffff_ffff
        };
        log::debug!("cs[{}]_bnds = {:#010x}", i, regs.cs[i].bnds);
        regs.cs[i].config = cs_config(input, dimm_number, i);
        // Partial array self refresh is not used.
        regs.cs[i].config_2 = 0;
    }
}

fn cs_config(input: &Inputs<'_>, dimm_number: usize, cs: usize) -> u32 {
    let opts = input.options;
    let dimms = input.dimms;
    let active = match cs {
        0 => dimms[dimm_number].n_ranks > 0,
        1 => {
            (dimm_number == 0 && dimms[0].n_ranks > 1)
                || (dimm_number == 1 && dimms[1].n_ranks > 0)
        }
        2 => {
            (dimm_number == 0 && dimms[0].n_ranks > 2)
                || (dimm_number >= 1 && dimms[dimm_number].n_ranks > 0)
        }
        3 => {
            (dimm_number == 0 && dimms[0].n_ranks > 3)
                || (dimm_number == 1 && dimms[1].n_ranks > 1)
        }
        _ => false,
    };
    if !active {
        return 0;
    }
    let dimm = &dimms[dimm_number];
    let local = &opts.cs_local_opts[cs];
    let mut config = ChipSelectConfig::DEFAULT
        .with_enable(true)
        .with_auto_precharge(local.auto_precharge)
        .with_odt_read_config(field!(u3, local.odt_rd_cfg))
        .with_odt_write_config(field!(u3, local.odt_wr_cfg))
        .with_bank_bits(field!(
            u2,
            dimm.n_banks_per_sdram_device
                .checked_ilog2()
                .unwrap_or(0)
                .wrapping_sub(2)
        ))
        .with_row_bits(field!(u3, dimm.n_row_addr.wrapping_sub(12)))
        .with_col_bits(field!(u3, dimm.n_col_addr.wrapping_sub(8)));
    // Controller interleaving is only configured in CS0_CONFIG.
    if cs == 0 {
        if let Some(mode) = opts.memctl_interleaving {
            config = config
                .with_interleave_enable(u2::new(1))
                .with_interleave_control(u4::new(mode as u8));
        }
    }
    log::debug!("cs[{}]_config = {:#010x}", cs, config.raw_value());
    config.raw_value()
}

/// Avoids ODT overlap for a single quad-rank DIMM in the first slot and for two dual-rank
/// DIMMs.
fn avoid_odt_overlap(dimms: &[DimmParams; DIMM_SLOTS]) -> bool {
    dimms[0].n_ranks == 4 || (dimms[0].n_ranks == 2 && dimms[1].n_ranks == 2)
}

fn timing_cfg_0(input: &Inputs<'_>, generation: Generation) -> u32 {
    let opts = input.options;
    let clk = &input.clock;
    let mut read_to_write = 0;
    let mut write_to_read = 0;
    let mut read_to_read = 0;
    let mut write_to_write = 0;
    let act_pd_exit;
    let pre_pd_exit;
    let odt_pd_exit;
    let mrs_cycle;

    match generation {
        Generation::Ddr3 => {
            // tXP = max(3 nCK, 7.5 ns), also used for tXARD.
            let t_xp = (clk.period_ps() * 3).max(7500);
            let data_rate_mhz = clk.data_rate() / 1_000_000;
            mrs_cycle = 4;
            if avoid_odt_overlap(input.dimms) {
                write_to_write = 2;
                read_to_read = 1;
            }
            read_to_write = if data_rate_mhz > 1800 { 2 } else { 1 };
            if data_rate_mhz > 1150 || opts.memctl_interleaving.is_some() {
                write_to_read = 1;
            }
            if opts.dynamic_power {
                act_pd_exit = clk.picos_to_mclk(t_xp);
                // MR0[A12] selects fast exit.
                pre_pd_exit = act_pd_exit;
            } else {
                act_pd_exit = 1;
                pre_pd_exit = 1;
            }
            odt_pd_exit = 1;
        }
        Generation::Ddr2 => {
            act_pd_exit = 2;
            pre_pd_exit = 2;
            odt_pd_exit = 8;
            mrs_cycle = 2;
        }
    }
    if let Some(trwt) = opts.trwt_override {
        read_to_write = trwt;
    }

    let reg = TimingCfg0::DEFAULT
        .with_read_to_write(field!(u2, read_to_write))
        .with_write_to_read(field!(u2, write_to_read))
        .with_read_to_read(field!(u2, read_to_read))
        .with_write_to_write(field!(u2, write_to_write))
        .with_act_pd_exit(field!(u4, act_pd_exit))
        .with_pre_pd_exit(field!(u4, pre_pd_exit))
        .with_odt_pd_exit(field!(u4, odt_pd_exit))
        .with_mrs_cycle(field!(u5, mrs_cycle));
    log::debug!("timing_cfg_0 = {:#010x}", reg.raw_value());
    reg.raw_value()
}

fn timing_cfg_3(input: &Inputs<'_>, lat: Latencies) -> u32 {
    let clk = &input.clock;
    let common = input.common;
    let otf = if input.options.otf_burst_chop_en { 2 } else { 0 };
    let reg = TimingCfg3::DEFAULT
        .with_ext_pre_to_act((clk.picos_to_mclk(common.trp_ps) >> 4) & 1 != 0)
        .with_ext_act_to_pre(field!(u2, clk.picos_to_mclk(common.tras_ps) >> 4))
        .with_ext_act_to_rw((clk.picos_to_mclk(common.trcd_ps) >> 4) & 1 != 0)
        .with_ext_refresh_recovery(field!(
            u5,
            clk.picos_to_mclk(common.trfc_ps).wrapping_sub(8) >> 4
        ))
        .with_ext_cas_latency(field!(u2, (2 * lat.cas).wrapping_sub(1) >> 4))
        .with_ext_additive_latency((lat.additive >> 4) & 1 != 0)
        // Only write recoveries of 16 clocks and above, or 14 with on-the-fly burst chop.
        .with_ext_write_recovery(((clk.picos_to_mclk(common.twr_ps) + otf) >> 4) & 1 != 0);
    log::debug!("timing_cfg_3 = {:#010x}", reg.raw_value());
    reg.raw_value()
}

fn timing_cfg_1(input: &Inputs<'_>, generation: Generation, lat: Latencies) -> u32 {
    // Write recoveries of 9, 11, 13 and 15 clocks are not supported by the mode register.
    const WRREC_TABLE: [u32; 16] = [1, 2, 3, 4, 5, 6, 7, 8, 10, 10, 12, 12, 14, 14, 0, 0];

    let clk = &input.clock;
    let common = input.common;
    let otf = input.options.otf_burst_chop_en;

    let mut write_recovery = clk.picos_to_mclk(common.twr_ps);
    if write_recovery > 16 {
        log::warn!("WRREC does not support more than 16 clocks");
    } else {
        write_recovery = WRREC_TABLE[write_recovery.saturating_sub(1) as usize];
    }
    if otf {
        write_recovery += 2;
    }

    let mut act_to_act = clk.picos_to_mclk(common.trrd_ps);
    let mut write_to_read = clk.picos_to_mclk(common.twtr_ps);
    match generation {
        Generation::Ddr3 => {
            act_to_act = act_to_act.max(4);
            write_to_read = write_to_read.max(4);
        }
        Generation::Ddr2 => write_to_read = write_to_read.max(2),
    }
    if otf {
        write_to_read += 2;
    }

    let reg = TimingCfg1::DEFAULT
        .with_pre_to_act(field!(u4, clk.picos_to_mclk(common.trp_ps)))
        .with_act_to_pre(field!(u4, clk.picos_to_mclk(common.tras_ps)))
        .with_act_to_rw(field!(u4, clk.picos_to_mclk(common.trcd_ps)))
        .with_cas_latency(field!(u4, (2 * lat.cas).wrapping_sub(1)))
        .with_refresh_recovery(field!(
            u4,
            clk.picos_to_mclk(common.trfc_ps).wrapping_sub(8)
        ))
        .with_write_recovery(field!(u4, write_recovery))
        .with_act_to_act(field!(u4, act_to_act))
        .with_write_to_read(field!(u4, write_to_read));
    log::debug!("timing_cfg_1 = {:#010x}", reg.raw_value());
    reg.raw_value()
}

fn timing_cfg_2(input: &Inputs<'_>, generation: Generation, lat: Latencies) -> u32 {
    let opts = input.options;
    let clk = &input.clock;

    let (write_latency, min_read_to_pre) = match generation {
        Generation::Ddr3 => (jedec::ddr3_cas_write_latency(clk), 4),
        Generation::Ddr2 => (lat.cas.wrapping_sub(1), 2),
    };
    let mut read_to_pre = clk
        .picos_to_mclk(input.common.trtp_ps)
        .max(min_read_to_pre);
    if opts.otf_burst_chop_en {
        read_to_pre += 2;
    }

    let reg = TimingCfg2::DEFAULT
        .with_additive_latency(field!(u4, lat.additive))
        .with_cpo(field!(u5, opts.cpo_override))
        .with_write_latency(field!(u4, write_latency))
        .with_read_to_pre(field!(u3, read_to_pre))
        .with_write_data_delay(field!(u3, opts.write_data_delay))
        .with_cke_pulse(field!(u3, clk.picos_to_mclk(opts.tcke_clock_pulse_width_ps)))
        .with_four_act(field!(
            u6,
            clk.picos_to_mclk(opts.tfaw_window_four_activates_ps)
        ));
    log::debug!("timing_cfg_2 = {:#010x}", reg.raw_value());
    reg.raw_value()
}

fn sdram_cfg(input: &Inputs<'_>, generation: Generation) -> u32 {
    let opts = input.options;
    let common = input.common;
    let registered = common.all_dimms_registered && !common.all_dimms_unbuffered;
    let eight_beat = match generation {
        // On-the-fly burst chop requires 8-beat bursts disabled, the 32-bit bus requires them
        // enabled.
        Generation::Ddr3 => {
            opts.data_bus_width == DataBusWidth::Bits32
                || opts.burst_length == BurstLength::Eight
        }
        Generation::Ddr2 => false,
    };

    let reg = SdramCfg::DEFAULT
        .with_mem_enable(true)
        .with_self_refresh_enable(opts.self_refresh_in_sleep)
        // ECC only if all DIMMs support it.
        .with_ecc_enable(common.all_dimms_ecc_capable && opts.ecc_mode)
        .with_registered_dimm(registered)
        .with_sdram_type(field!(u3, input.sdram_type.code()))
        .with_dynamic_power(opts.dynamic_power)
        .with_data_bus_width(field!(u2, opts.data_bus_width as u8))
        .with_eight_beat(eight_beat)
        .with_three_t(opts.threet_en)
        .with_two_t(!registered && opts.twot_en)
        .with_bank_interleave(field!(u7, opts.ba_intlv_ctl.bits()))
        .with_half_strength(opts.half_strength_driver_enable);
    log::debug!("ddr_sdram_cfg = {:#010x}", reg.raw_value());
    reg.raw_value()
}

fn sdram_cfg_2(opts: &MemctlOptions, generation: Generation, unique_mrs: bool) -> u32 {
    let odt_used = opts
        .cs_local_opts
        .iter()
        .any(|cs| cs.odt_rd_cfg != 0 || cs.odt_wr_cfg != 0);
    let ddr3 = generation == Generation::Ddr3;
    let reg = SdramCfg2::DEFAULT
        .with_dll_reset_disable(true)
        .with_dqs_config(field!(u2, opts.dqs_config))
        .with_odt_config(field!(u2, if odt_used { ODT_CONFIG_ONLY_READ } else { 0 }))
        .with_posted_refreshes(u4::new(1))
        .with_x4(opts.x4_en)
        .with_quad_rank(opts.quad_rank_present)
        .with_unique_mrs(unique_mrs)
        .with_otf_burst_chop(ddr3 && opts.otf_burst_chop_en)
        .with_address_parity(opts.registered_dimm_en && opts.ap_en)
        .with_data_init(opts.ecc_init_using_memctl)
        .with_rcw_enable(opts.registered_dimm_en)
        .with_mirrored_dimm(ddr3 && opts.mirrored_dimm);
    log::debug!("ddr_sdram_cfg_2 = {:#010x}", reg.raw_value());
    reg.raw_value()
}

/// Inserts the split Rtt_Nom field into a DDR3 MR1 value.
const fn ddr3_mr1_rtt(rtt: u8) -> u16 {
    let rtt = rtt as u16;
    ((rtt & 0x4) << 7) | ((rtt & 0x2) << 5) | ((rtt & 0x1) << 2)
}

fn set_ddr3_sdram_mode(
    regs: &mut FslDdrCfgRegs,
    input: &Inputs<'_>,
    lat: Latencies,
    unique_mrs: bool,
) {
    let opts = input.options;
    let period_ps = input.clock.period_ps();
    let rtt_norm = |cs: usize| match opts.rtt_override {
        Some(rtt) => rtt.norm,
        None => opts.cs_local_opts[cs].odt_rtt_norm,
    };

    // MR1. Write leveling is handled by the controller.
    let additive = if lat.additive == lat.cas.wrapping_sub(1) {
        1
    } else if lat.additive == lat.cas.wrapping_sub(2) {
        2
    } else {
        0
    };
    // Output driver impedance 40 ohm, or 34 ohm with a quad rank DIMM.
    let dic: u16 = if opts.quad_rank_present { 1 } else { 0 };
    let mut esdmode: u16 = ddr3_mr1_rtt(rtt_norm(0))
        | ((dic & 0x2) << 4)
        | ((additive & 0x3) << 3)
        | ((dic & 0x1) << 1);

    // MR0 with fast exit DLL on and no DLL reset.
    let wr_mclk = input.common.twr_ps.div_ceil(period_ps);
    let write_recovery = jedec::ddr3_mr0_write_recovery(wr_mclk).unwrap_or_else(|| {
        log::error!("unsupported write recovery {} for mode register", wr_mclk);
        0
    });
    let cas = jedec::ddr3_mr0_cas_latency(lat.cas).unwrap_or_else(|| {
        log::error!("unsupported CAS latency {} for mode register", lat.cas);
        // Default of six clocks.
        0x20
    });
    let burst_length: u16 = match opts.burst_length {
        BurstLength::Eight => 0,
        BurstLength::OnTheFly => 1,
        BurstLength::Four => 2,
    };
    let sdmode: u16 = (1 << 12) | ((write_recovery & 0x7) << 9) | cas | burst_length;

    regs.ddr_sdram_mode[0] = SdramMode::DEFAULT
        .with_extended(esdmode)
        .with_mode(sdmode)
        .raw_value();
    log::debug!("ddr_sdram_mode = {:#010x}", regs.ddr_sdram_mode[0]);

    if unique_mrs {
        for cs in 1..CHIP_SELECTS {
            // Clear the Rtt_Nom bits 9, 6 and 2.
            esdmode &= 0xFDBB;
            esdmode |= ddr3_mr1_rtt(rtt_norm(cs));
            regs.ddr_sdram_mode[2 * cs] = SdramMode::DEFAULT
                .with_extended(esdmode)
                .with_mode(sdmode)
                .raw_value();
            log::debug!(
                "ddr_sdram_mode_{} = {:#010x}",
                2 * cs + 1,
                regs.ddr_sdram_mode[2 * cs]
            );
        }
    }
}

fn set_ddr3_sdram_mode_2(regs: &mut FslDdrCfgRegs, input: &Inputs<'_>, unique_mrs: bool) {
    let opts = input.options;
    let rtt_wr = |cs: usize| -> u16 {
        u16::from(match opts.rtt_override {
            Some(rtt) => rtt.wr,
            None => opts.cs_local_opts[cs].odt_rtt_wr,
        })
    };
    let cwl = jedec::ddr3_cas_write_latency(&input.clock);
    // Auto self refresh and partial array self refresh are disabled.
    let srt = u16::from(input.common.extended_op_srt);
    let mut esdmode2: u16 =
        ((rtt_wr(0) & 0x3) << 9) | (srt << 7) | jedec::ddr3_mr2_cas_write_latency(cwl);

    regs.ddr_sdram_mode[1] = SdramMode::DEFAULT.with_extended(esdmode2).raw_value();
    log::debug!("ddr_sdram_mode_2 = {:#010x}", regs.ddr_sdram_mode[1]);

    if unique_mrs {
        for cs in 1..CHIP_SELECTS {
            // Clear the Rtt_WR bits 9 and 10.
            esdmode2 &= 0xF9FF;
            esdmode2 |= (rtt_wr(cs) & 0x3) << 9;
            regs.ddr_sdram_mode[2 * cs + 1] =
                SdramMode::DEFAULT.with_extended(esdmode2).raw_value();
            log::debug!(
                "ddr_sdram_mode_{} = {:#010x}",
                2 * cs + 2,
                regs.ddr_sdram_mode[2 * cs + 1]
            );
        }
    }
}

fn ddr2_sdram_mode(input: &Inputs<'_>, lat: Latencies) -> u32 {
    // Rtt(nominal) of 50 ohm.
    const RTT: u16 = 3;

    let opts = input.options;
    let period_ps = input.clock.period_ps();
    let dqs_disable = u16::from(opts.dqs_config == 0);
    let esdmode: u16 = (dqs_disable << 10)
        | ((RTT & 0x2) << 5)
        | (((lat.additive & 0x7) as u16) << 3)
        | ((RTT & 0x1) << 2);

    let write_recovery = input
        .common
        .twr_ps
        .div_ceil(period_ps)
        .wrapping_sub(1);
    let burst_length: u16 = match opts.burst_length {
        BurstLength::Four => 2,
        BurstLength::Eight => 3,
        BurstLength::OnTheFly => {
            log::error!("invalid DDR2 burst length, defaulting to 4 beats");
            2
        }
    };
    let sdmode: u16 = (((write_recovery & 0x7) as u16) << 9)
        | (((lat.cas & 0x7) as u16) << 4)
        | burst_length;

    let mode = SdramMode::DEFAULT
        .with_extended(esdmode)
        .with_mode(sdmode)
        .raw_value();
    log::debug!("ddr_sdram_mode = {:#010x}", mode);
    mode
}

fn timing_cfg_4(opts: &MemctlOptions, generation: Generation) -> u32 {
    let reg = match generation {
        Generation::Ddr3 => {
            // BL/2 clocks for fixed BL8, BL/2 + 2 clocks for BC4 and on-the-fly.
            let turnaround = if opts.burst_length == BurstLength::Eight {
                0
            } else {
                2
            };
            TimingCfg4::DEFAULT
                .with_read_to_read(u4::new(turnaround))
                .with_write_to_write(u4::new(turnaround))
                // tDLLK of 512 clocks.
                .with_dll_lock(u2::new(1))
        }
        Generation::Ddr2 => TimingCfg4::DEFAULT,
    };
    log::debug!("timing_cfg_4 = {:#010x}", reg.raw_value());
    reg.raw_value()
}

fn timing_cfg_5(timing_cfg_2: u32, generation: Generation, lat: Latencies) -> u32 {
    let reg = match generation {
        Generation::Ddr3 => {
            let write_latency = TimingCfg2::new_with_raw_value(timing_cfg_2)
                .write_latency()
                .value() as u32;
            TimingCfg5::DEFAULT
                .with_read_odt_on(field!(
                    u5,
                    lat.cas.wrapping_sub(write_latency).wrapping_add(1)
                ))
                .with_read_odt_off(u3::new(4))
                .with_write_odt_on(u5::new(1))
                .with_write_odt_off(u3::new(4))
        }
        Generation::Ddr2 => TimingCfg5::DEFAULT,
    };
    log::debug!("timing_cfg_5 = {:#010x}", reg.raw_value());
    reg.raw_value()
}

fn zq_cntl(enable: bool) -> u32 {
    let reg = if enable {
        // tZQinit 512, tZQoper 256 and tZQCS 64 clocks.
        ZqControl::DEFAULT
            .with_enable(true)
            .with_zq_init(u4::new(9))
            .with_zq_oper(u4::new(8))
            .with_zq_cs(u4::new(6))
    } else {
        ZqControl::DEFAULT
    };
    log::debug!("zq_cntl = {:#010x}", reg.raw_value());
    reg.raw_value()
}

fn wrlvl_cntl(opts: &MemctlOptions) -> u32 {
    if !opts.wrlvl_en {
        return 0;
    }
    let (sample, start) = match opts.wrlvl_override {
        Some(over) => (over.sample, over.start),
        None => (0xf, 0x8),
    };
    // tWL_MRD 64, tWL_ODTEN 128, tWL_DQSEN 32 and a repetition time of 64 clocks.
    let reg = WriteLevelingControl::DEFAULT
        .with_enable(true)
        .with_mrd(u3::new(6))
        .with_odt_enable(u3::new(7))
        .with_dqs_enable(u3::new(5))
        .with_sample(field!(u4, sample))
        .with_repetition(u3::new(6))
        .with_start(field!(u5, start));
    log::debug!("wrlvl_cntl = {:#010x}", reg.raw_value());
    reg.raw_value()
}

fn set_rcw(regs: &mut FslDdrCfgRegs, opts: &MemctlOptions, common: &CommonTimingParams) {
    if !common.all_dimms_registered || common.all_dimms_unbuffered {
        return;
    }
    let (rcw_1, rcw_2) = match opts.rcw_override {
        Some(rcw) => rcw,
        None => {
            let pack = |words: &[u8]| {
                words
                    .iter()
                    .fold(0u32, |acc, &nibble| (acc << 4) | u32::from(nibble & 0xf))
            };
            (pack(&common.rcw[0..8]), pack(&common.rcw[8..16]))
        }
    };
    regs.ddr_sdram_rcw_1 = rcw_1;
    regs.ddr_sdram_rcw_2 = rcw_2;
    log::debug!("ddr_sdram_rcw_1 = {:#010x}", rcw_1);
    log::debug!("ddr_sdram_rcw_2 = {:#010x}", rcw_2);
}
