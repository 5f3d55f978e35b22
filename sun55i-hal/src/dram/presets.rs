//! Reference configurations of known boards.
use super::{DramInitConfig, DramPara, DramType, Tpr10, Tuning};
use crate::{poll::PollLimits, time::MegaHertz};

/// LPDDR4 board running at 1200 MHz, with read calibration and bit-delay compensation.
pub const LPDDR4_REFERENCE: DramInitConfig = DramInitConfig {
    para: DramPara {
        dram_type: DramType::Lpddr4,
        dx_odt: 0x0707_0707,
        dx_dri: 0x0d0d_0d0d,
        ca_dri: 0x0e0e,
        tpr0: 0x8080_8080,
        tpr1: 0x0606_0606,
        tpr2: 0,
        tpr6: 0x3800_0000,
        tpr10: Tpr10::new_with_raw_value(0x802f_3333),
    },
    clk: MegaHertz::from_raw(1200),
    tuning: Tuning {
        odt_en: 0x8484_8484,
        tpr11: 0xc7c5_c4c2,
        tpr12: 0x3533_302f,
        tpr14: 0x4848_4848,
    },
    poll: PollLimits::DEFAULT,
};

/// DDR3 board running at 792 MHz.
pub const DDR3_REFERENCE: DramInitConfig = DramInitConfig {
    para: DramPara {
        dram_type: DramType::Ddr3,
        dx_odt: 0x0606_0606,
        dx_dri: 0x0c0c_0c0c,
        ca_dri: 0x1919,
        tpr0: 0,
        tpr1: 0,
        tpr2: 0,
        tpr6: 0x3300_c080,
        tpr10: Tpr10::DEFAULT
            .with_read_calibration(true)
            .with_dx_bit_delay1(true)
            .with_dx_bit_delay0(true)
            .with_ca_bit_delay(true),
    },
    clk: MegaHertz::from_raw(792),
    tuning: Tuning {
        odt_en: 0x9090_9090,
        tpr11: 0x8f91_9190,
        tpr12: 0x2222_2723,
        tpr14: 0x4848_4848,
    },
    poll: PollLimits::DEFAULT,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ddr3_phase_enables() {
        assert_eq!(DDR3_REFERENCE.para.tpr10.raw_value(), 0x0027_0000);
    }

    #[test]
    fn test_lpddr4_skips_trainings() {
        let tpr10 = LPDDR4_REFERENCE.para.tpr10;
        assert!(tpr10.read_calibration());
        assert!(!tpr10.read_training());
        assert!(!tpr10.write_training());
    }
}
