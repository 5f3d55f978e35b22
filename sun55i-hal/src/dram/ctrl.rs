//! # Controller bring-up
//!
//! [bring_up] performs one complete bring-up attempt for a fixed geometry:
//!
//! 1. DRAM clock tree.
//! 2. Static controller configuration, including the address map and the timing registers.
//! 3. Static PHY configuration.
//! 4. DFI initialization handshake between controller and PHY.
//! 5. Mode register writes.
//! 6. PHY calibration.
//! 7. Auto refresh is enabled again.
//!
//! Quasi-dynamic controller registers may only be changed while [SwControl::sw_done] is
//! cleared. The controller acknowledges the update in SWSTAT once it is set again.
use arbitrary_int::{u2, u4};
use embedded_hal::delay::DelayNs;
use sun55i::{
    mctl_com::{MCTL_COM_BASE_ADDR, maer0, offsets as com_offsets, unk_008},
    mctl_ctl::{
        CLKEN_DRAM_CLOCK, DBICTL_DM_EN, DISABLE_AUTO_UPDATES, DataBusWidth, DeviceConfig,
        DfiMisc, MCTL_CTL_BASE_ADDR, Master, ModeRegisterControl0, PowerControl,
        RefreshControl3, SwControl, offsets,
    },
    nsi::{NSI_CPU_LPDDR4_ENABLE_ADDR, NSI_LPDDR4_ENABLE_ADDR},
};

use super::{
    AddrMap, BringUp, DramConfig, DramError, DramPara, DramType, Ranks, phy,
    timing::{self, TimingParams, TimingRegs},
};
use crate::{
    clocks::{PllDdrFactor, configure_dram_clock},
    mmio::RegisterAccess,
    poll::{PollLimits, PollTimeout, await_completion},
};

const SW_DONE: u32 = SwControl::DEFAULT.with_sw_done(true).raw_value();
const DFI_INIT_COMPLETE_EN: u32 = DfiMisc::DEFAULT.with_dfi_init_complete_en(true).raw_value();
const DFI_INIT_START: u32 = DfiMisc::DEFAULT.with_dfi_init_start(true).raw_value();
const SELFREF_SW: u32 = PowerControl::DEFAULT.with_selfref_sw(true).raw_value();
const DIS_AUTO_REFRESH: u32 = RefreshControl3::DEFAULT
    .with_dis_auto_refresh(true)
    .raw_value();
/// Normal operation mode in STATR.
const OPERATING_MODE_NORMAL: u32 = 1;
/// All ranks are addressed by the mode register writes.
const MR_ALL_RANKS: u4 = u4::new(0xf);

#[inline]
const fn ctl(offset: usize) -> usize {
    MCTL_CTL_BASE_ADDR + offset
}

#[inline]
const fn com(offset: usize) -> usize {
    MCTL_COM_BASE_ADDR + offset
}

/// DRAM types the controller sequencing is implemented for.
pub const fn check_supported(dram_type: DramType) -> Result<(), DramError> {
    match dram_type {
        DramType::Ddr3 | DramType::Lpddr4 => Ok(()),
        DramType::Ddr4 | DramType::Lpddr3 => Err(DramError::UnsupportedDramType(dram_type)),
    }
}

pub fn master(dram_type: DramType, config: &DramConfig) -> Master {
    let geometry = &config.geometry;
    let mstr = Master::DEFAULT
        .with_device_config(DeviceConfig::X32)
        .with_active_ranks(match geometry.ranks {
            Ranks::Single => u2::new(0b01),
            Ranks::Dual => u2::new(0b11),
        })
        .with_data_bus_width(if geometry.full_width {
            DataBusWidth::Full
        } else {
            DataBusWidth::Half
        });
    match dram_type {
        DramType::Lpddr4 => mstr.with_burst_rdwr(u4::new(16 / 2)).with_lpddr4(true),
        _ => mstr
            .with_burst_rdwr(u4::new(8 / 2))
            .with_ddr3(true)
            .with_en_2t_timing_mode(true),
    }
}

pub const fn odt_map(ranks: Ranks) -> u32 {
    match ranks {
        Ranks::Dual => 0x0303,
        Ranks::Single => 0x0201,
    }
}

pub const fn odt_config(dram_type: DramType) -> u32 {
    match dram_type {
        DramType::Lpddr4 => 0x0400_0400,
        _ => 0x0600_0400,
    }
}

/// Runs `f` with the quasi-dynamic registers unlocked.
fn quasi_dynamic<B: RegisterAccess>(bus: &mut B, f: impl FnOnce(&mut B)) {
    bus.write32(ctl(offsets::SWCTL), 0);
    f(bus);
    bus.write32(ctl(offsets::SWCTL), SW_DONE);
}

/// Same as [quasi_dynamic], but waits for the acknowledgement of the controller.
fn quasi_dynamic_ack<B: RegisterAccess>(
    bus: &mut B,
    limits: PollLimits,
    f: impl FnOnce(&mut B),
) -> Result<(), PollTimeout> {
    quasi_dynamic(bus, f);
    await_completion(bus, ctl(offsets::SWSTAT), SW_DONE, SW_DONE, limits)
}

/// Static controller configuration. Performs only register writes and read-modify-writes with
/// fixed results, so running it twice leaves the controller in the same state.
pub fn configure_controller<B: RegisterAccess, D: DelayNs>(
    bus: &mut B,
    delay: &mut D,
    para: &DramPara,
    config: &DramConfig,
    addrmap: &AddrMap,
    timing: &TimingRegs,
) {
    let dram_type = para.dram_type;

    bus.clrsetbits32(
        com(com_offsets::UNK_008),
        unk_008::PHY_MMIO_ENABLE,
        unk_008::BIT25 | unk_008::BIT9,
    );
    bus.setbits32(com(com_offsets::MAER0), maer0::BIT15 | maer0::BIT9);

    if dram_type == DramType::Lpddr4 {
        bus.setbits32(NSI_LPDDR4_ENABLE_ADDR, 1);
        bus.setbits32(NSI_CPU_LPDDR4_ENABLE_ADDR, 1);
    }

    bus.clrsetbits32(ctl(offsets::SCHED0), 0xff08, 0x3000);
    bus.clrsetbits32(ctl(offsets::SCHED1), 0x7700_0000, 0x3300_0000);
    bus.clrsetbits32(ctl(offsets::UNK_270), 0xffff, 0x0808);
    bus.clrsetbits32(ctl(offsets::UNK_264), 0xff00_ffff, 0x1f00_0030);

    bus.write32(ctl(offsets::HWLPCTL), 0);

    bus.write32(ctl(offsets::MSTR), master(dram_type, config).raw_value());
    bus.write32(ctl(offsets::ODTMAP), odt_map(config.geometry.ranks));

    let odtcfg = odt_config(dram_type);
    bus.write32(ctl(offsets::ODTCFG), odtcfg);
    for offset in offsets::ODTCFG_FREQ {
        bus.write32(ctl(offset), odtcfg);
    }

    addrmap.program(bus);
    timing.program(bus);

    bus.write32(ctl(offsets::PWRCTL), 0);

    bus.setbits32(ctl(offsets::DFIUPD0), DISABLE_AUTO_UPDATES);
    bus.setbits32(ctl(offsets::ZQCTL0), DISABLE_AUTO_UPDATES);
    for offset in offsets::ZQCTL0_FREQ {
        bus.setbits32(ctl(offset), DISABLE_AUTO_UPDATES);
    }

    if dram_type == DramType::Lpddr4 {
        bus.setbits32(ctl(offsets::DBICTL), DBICTL_DM_EN);
    }

    bus.setbits32(ctl(offsets::RFSHCTL3), DIS_AUTO_REFRESH);
    bus.clrbits32(ctl(offsets::DFIMISC), DFI_INIT_COMPLETE_EN);

    bus.write32(ctl(offsets::PWRCTL), SELFREF_SW);
    bus.setbits32(ctl(offsets::CLKEN), CLKEN_DRAM_CLOCK);

    bus.clrsetbits32(
        com(com_offsets::UNK_008),
        unk_008::PHY_MMIO_ENABLE,
        unk_008::BIT9,
    );
    delay.delay_us(1);
    bus.setbits32(com(com_offsets::UNK_008), unk_008::PHY_MMIO_ENABLE);
}

/// DFI initialization handshake. The DRAM pads are released while the PHY runs its
/// initialization.
pub fn dfi_init<B: RegisterAccess, D: DelayNs>(
    bus: &mut B,
    delay: &mut D,
    limits: PollLimits,
) -> Result<(), PollTimeout> {
    bus.setbits32(com(com_offsets::MAER0), maer0::PHY_MASTER);

    quasi_dynamic_ack(bus, limits, |bus| {
        bus.setbits32(ctl(offsets::DFIMISC), DFI_INIT_COMPLETE_EN);
        bus.setbits32(ctl(offsets::DFIMISC), DFI_INIT_START);
    })?;
    await_completion(bus, ctl(offsets::DFISTAT), 1, 1, limits)?;

    delay.delay_us(500);
    phy::set_dram_pad_hold(bus, true);
    delay.delay_us(1);

    quasi_dynamic_ack(bus, limits, |bus| {
        bus.clrbits32(ctl(offsets::DFIMISC), DFI_INIT_START);
    })?;
    quasi_dynamic_ack(bus, limits, |bus| {
        bus.clrbits32(ctl(offsets::PWRCTL), SELFREF_SW);
    })?;
    await_completion(bus, ctl(offsets::STATR), 0x3, OPERATING_MODE_NORMAL, limits)?;

    delay.delay_us(500);

    quasi_dynamic_ack(bus, limits, |bus| {
        bus.clrbits32(ctl(offsets::DFIMISC), DFI_INIT_COMPLETE_EN);
    })
}

/// Sends one mode register write to all ranks and waits for its completion.
pub fn write_mode_register<B: RegisterAccess>(
    bus: &mut B,
    mr_addr: u4,
    data: u32,
    limits: PollLimits,
) -> Result<(), PollTimeout> {
    const MR_WR: u32 = ModeRegisterControl0::DEFAULT.with_mr_wr(true).raw_value();

    bus.write32(ctl(offsets::MRCTRL1), data);
    bus.write32(
        ctl(offsets::MRCTRL0),
        ModeRegisterControl0::DEFAULT
            .with_mr_wr(true)
            .with_mr_addr(mr_addr)
            .with_mr_rank(MR_ALL_RANKS)
            .raw_value(),
    );
    await_completion(bus, ctl(offsets::MRCTRL0), MR_WR, 0, limits)
}

pub fn write_mode_registers<B: RegisterAccess>(
    bus: &mut B,
    para: &DramPara,
    config: &DramConfig,
    limits: PollLimits,
) -> Result<(), DramError> {
    match para.dram_type {
        DramType::Ddr3 => {
            for (i, value) in timing::DDR3_MODE_REGISTERS.iter().enumerate() {
                write_mode_register(bus, u4::new(i as u8), u32::from(*value), limits)?;
            }
        }
        DramType::Lpddr4 => {
            // LPDDR4 carries the register address in MRCTRL1.
            for (mr, value) in timing::lpddr4_mode_registers(config.clk) {
                let data = (u32::from(mr) << 8) | u32::from(value);
                write_mode_register(bus, u4::new(0), data, limits)?;
            }
        }
        other => return Err(DramError::UnsupportedDramType(other)),
    }
    Ok(())
}

/// One complete bring-up attempt for the geometry in `config`.
///
/// The DRAM type, address map and clock are validated before the first register access.
/// Returns [BringUp::CalibrationFailed] if a calibration step failed. Hardware which does not
/// respond is reported as [DramError::Timeout].
pub fn bring_up<B: RegisterAccess, D: DelayNs>(
    bus: &mut B,
    delay: &mut D,
    para: &DramPara,
    config: &DramConfig,
    limits: PollLimits,
) -> Result<BringUp, DramError> {
    check_supported(para.dram_type)?;
    let addrmap = AddrMap::new(&config.geometry)?;
    let factor = PllDdrFactor::for_dram_clock(config.clk)?;
    let timing = TimingRegs::from_params(&TimingParams::compute(para.dram_type, config.clk)?);

    configure_dram_clock(bus, delay, factor, limits)?;
    configure_controller(bus, delay, para, config, &addrmap, &timing);

    phy::configure(bus, delay, para, config);
    dfi_init(bus, delay, limits)?;
    write_mode_registers(bus, para, config, limits)?;

    quasi_dynamic(bus, |bus| {
        bus.clrbits32(ctl(offsets::RFSHCTL3), DIS_AUTO_REFRESH);
    });

    let result = phy::calibrate(bus, para, config, limits);
    if !result.is_calibrated() {
        return Ok(result);
    }

    quasi_dynamic_ack(bus, limits, |bus| {
        bus.clrbits32(ctl(offsets::RFSHCTL3), DIS_AUTO_REFRESH);
    })?;
    Ok(result)
}
