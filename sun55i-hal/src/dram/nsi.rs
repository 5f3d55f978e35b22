//! Platform setup around the DRAM bring-up: the ZQ resistor calibration reference and the
//! QoS settings of the network-on-chip.
use arbitrary_int::u6;
use sun55i::{
    nsi::{
        NSI_BASE_ADDR, PORT_MODE_OFFSET, PORT_PRIORITY_OFFSET, PortMode, PortPriority, Priority,
        autogating, ports,
    },
    sys_cfg::{Res240Control, ResCalControl, SYS_CFG_BASE_ADDR, offsets},
};

use crate::mmio::RegisterAccess;

/// Port priorities, applied in table order.
pub const QOS_PRIORITIES: [(usize, Priority); 7] = [
    (ports::IOMMU, Priority::Highest),
    (ports::DE, Priority::High),
    (ports::VE_R, Priority::High),
    (ports::VE_RW, Priority::High),
    (ports::ISP, Priority::High),
    (ports::CSI, Priority::High),
    (ports::NPU, Priority::High),
];

/// Selects the external ZQ reference resistor. Must run before the first bring-up.
pub fn prepare_resistor_calibration<B: RegisterAccess>(bus: &mut B) {
    bus.modify32(SYS_CFG_BASE_ADDR + offsets::RES_CAL_CTRL, |val| {
        ResCalControl::new_with_raw_value(val)
            .with_external_reference(true)
            .raw_value()
    });
    bus.modify32(SYS_CFG_BASE_ADDR + offsets::RES240_CTRL, |val| {
        Res240Control::new_with_raw_value(val)
            .with_trim(u6::new(0))
            .raw_value()
    });
}

/// Configures the port priorities and disables the autogating of the RA0, TA and PCIe
/// ports.
pub fn init_qos<B: RegisterAccess>(bus: &mut B) {
    for (port, priority) in QOS_PRIORITIES {
        let base = NSI_BASE_ADDR + port;
        bus.write32(
            base + PORT_MODE_OFFSET,
            PortMode::DEFAULT
                .with_use_register_priority(true)
                .raw_value(),
        );
        bus.write32(
            base + PORT_PRIORITY_OFFSET,
            PortPriority::DEFAULT
                .with_write(priority)
                .with_read(priority)
                .raw_value(),
        );
    }

    for port in [autogating::RA0, autogating::TA, autogating::PCIE] {
        bus.write32(NSI_BASE_ADDR + port, 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dram::sim::SimSoc;
    use std::vec::Vec;

    #[test]
    fn test_resistor_calibration() {
        let mut soc = SimSoc::healthy();
        soc.write32(0x0300_0160, 0x0000_0003);
        soc.write32(0x0300_0168, 0x0000_1f2f);
        soc.clear_trace();
        prepare_resistor_calibration(&mut soc);
        assert_eq!(soc.peek32(0x0300_0160), 0x0000_0103);
        assert_eq!(soc.peek32(0x0300_0168), 0x0000_1f00);
    }

    #[test]
    fn test_qos_writes() {
        let mut soc = SimSoc::healthy();
        init_qos(&mut soc);
        let trace: Vec<(usize, u32)> = soc.writes().iter().map(|w| (w.addr, w.value)).collect();
        assert_eq!(trace.len(), 17);
        assert_eq!(&trace[..2], &[(0x0202_1418, 0x1), (0x0202_1414, 0xf)]);
        assert_eq!(&trace[2..4], &[(0x0202_1a18, 0x1), (0x0202_1a14, 0xa)]);
        assert_eq!(&trace[12..14], &[(0x0202_0a18, 0x1), (0x0202_0a14, 0xa)]);
        assert_eq!(
            &trace[14..],
            &[(0x0202_3c00, 0), (0x0202_3e00, 0), (0x0202_0600, 0)]
        );
    }
}
