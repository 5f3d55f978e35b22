//! # JEDEC latency tables and mode register encodings
use crate::clock::MemoryClock;

/// DDR3 CAS write latency for the given memory clock.
///
/// Clocks faster than the table covers (period below 750 ps) log a warning and use the
/// largest table value.
pub fn ddr3_cas_write_latency(clk: &MemoryClock) -> u32 {
    let period = clk.period_ps();
    match period {
        2500.. => 5,
        1875..=2499 => 6,
        1500..=1874 => 7,
        1250..=1499 => 8,
        1070..=1249 => 9,
        935..=1069 => 10,
        833..=934 => 11,
        750..=832 => 12,
        _ => {
            log::warn!("CWL is out of range for clock period {} ps", period);
            12
        }
    }
}

/// Encodes a DDR3 CAS latency (5..=16) into the MR0 CL bit positions: bits 4..=6 and bit 2.
///
/// Returns [None] for latencies outside the DDR3 range.
pub const fn ddr3_mr0_cas_latency(cl: u32) -> Option<u16> {
    const CODES: [u16; 12] = [2, 4, 6, 8, 0xa, 0xc, 0xe, 1, 3, 5, 7, 9];
    if cl < 5 || cl > 16 {
        return None;
    }
    let code = CODES[(cl - 5) as usize];
    Some((((code >> 1) & 0x7) << 4) | ((code & 0x1) << 2))
}

/// Encodes the DDR3 write recovery in clocks into the 3-bit MR0 WR field.
///
/// Write recovery is clamped to at least five clocks. Values above 16 clocks have no
/// encoding and yield [None].
pub const fn ddr3_mr0_write_recovery(wr_mclk: u32) -> Option<u16> {
    const CODES: [u16; 12] = [1, 2, 3, 4, 5, 5, 6, 6, 7, 7, 0, 0];
    let wr = if wr_mclk < 5 { 5 } else { wr_mclk };
    if wr > 16 {
        return None;
    }
    Some(CODES[(wr - 5) as usize])
}

/// DDR3 MR2 CWL field (bits 3..=5) for the given CAS write latency.
#[inline]
pub const fn ddr3_mr2_cas_write_latency(cwl: u32) -> u16 {
    ((cwl.saturating_sub(5) & 0x7) as u16) << 3
}

/// LPDDR4 read latencies (DBI disabled) indexed by their MR2 RL code.
pub const LPDDR4_READ_LATENCIES: [u32; 8] = [6, 10, 14, 20, 24, 28, 32, 36];
/// LPDDR4 write latencies of set A indexed by their MR2 WL code.
pub const LPDDR4_WRITE_LATENCIES_SET_A: [u32; 8] = [4, 6, 8, 10, 12, 14, 16, 18];

/// LPDDR4 MR2 value for the given read and write latency, using write latency set A and
/// disabled DBI.
///
/// Returns [None] if one of the latencies is not part of the JEDEC tables.
pub fn lpddr4_mr2(read_latency: u32, write_latency: u32) -> Option<u8> {
    let rl = LPDDR4_READ_LATENCIES
        .iter()
        .position(|&rl| rl == read_latency)?;
    let wl = LPDDR4_WRITE_LATENCIES_SET_A
        .iter()
        .position(|&wl| wl == write_latency)?;
    Some((rl | (wl << 3)) as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cwl_table() {
        assert_eq!(ddr3_cas_write_latency(&MemoryClock::from_mhz(400).unwrap()), 5);
        assert_eq!(ddr3_cas_write_latency(&MemoryClock::from_mhz(360).unwrap()), 5);
        assert_eq!(ddr3_cas_write_latency(&MemoryClock::from_mhz(533).unwrap()), 6);
        assert_eq!(ddr3_cas_write_latency(&MemoryClock::from_mhz(666).unwrap()), 7);
        assert_eq!(ddr3_cas_write_latency(&MemoryClock::from_mhz(800).unwrap()), 8);
        assert_eq!(ddr3_cas_write_latency(&MemoryClock::from_mhz(933).unwrap()), 9);
        assert_eq!(ddr3_cas_write_latency(&MemoryClock::from_mhz(1066).unwrap()), 10);
    }

    #[test]
    fn test_cwl_out_of_range() {
        assert_eq!(ddr3_cas_write_latency(&MemoryClock::from_mhz(1600).unwrap()), 12);
    }

    #[test]
    fn test_mr0_cas_latency() {
        assert_eq!(ddr3_mr0_cas_latency(5), Some(0x10));
        assert_eq!(ddr3_mr0_cas_latency(6), Some(0x20));
        // CL 12 uses the low bit.
        assert_eq!(ddr3_mr0_cas_latency(12), Some(0x04));
        assert_eq!(ddr3_mr0_cas_latency(13), Some(0x14));
        assert_eq!(ddr3_mr0_cas_latency(4), None);
        assert_eq!(ddr3_mr0_cas_latency(17), None);
    }

    #[test]
    fn test_mr0_write_recovery() {
        assert_eq!(ddr3_mr0_write_recovery(3), Some(1));
        assert_eq!(ddr3_mr0_write_recovery(8), Some(4));
        assert_eq!(ddr3_mr0_write_recovery(10), Some(5));
        assert_eq!(ddr3_mr0_write_recovery(16), Some(0));
        assert_eq!(ddr3_mr0_write_recovery(17), None);
    }

    #[test]
    fn test_lpddr4_mr2() {
        assert_eq!(lpddr4_mr2(20, 10), Some(0x1b));
        assert_eq!(lpddr4_mr2(28, 14), Some(0x2d));
        assert_eq!(lpddr4_mr2(32, 16), Some(0x36));
        assert_eq!(lpddr4_mr2(21, 10), None);
    }

    #[test]
    fn test_ddr3_mr2_cwl() {
        assert_eq!(ddr3_mr2_cas_write_latency(5), 0);
        assert_eq!(ddr3_mr2_cas_write_latency(9), 0x20);
    }
}
