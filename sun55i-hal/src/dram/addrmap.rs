//! Address map programming.
//!
//! The uMCTL2 address map registers select which HIF address bit drives each rank, bank, column
//! and row bit. The map is fully determined by the geometry. Eight banks are assumed and bank
//! groups are disabled.
use sun55i::mctl_ctl::{ADDRMAP_COUNT, MCTL_CTL_BASE_ADDR, offsets};

use super::Geometry;
use crate::mmio::RegisterAccess;

/// Supported column address bits after the half width adjustment.
pub const COLS_RANGE: core::ops::RangeInclusive<u8> = 7..=12;
/// Supported row address bits.
pub const ROWS_RANGE: core::ops::RangeInclusive<u8> = 13..=18;

/// Field value which disables an address map entry: 0x1f for the 5-bit fields, 0x0f for the
/// 4-bit row fields and 0x3f for the bank group fields.
const UNUSED_5: u32 = 0x1f;
const UNUSED_4: u32 = 0x0f;
const UNUSED_BG: u32 = 0x3f;

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddrMapError {
    #[error("Unsupported DRAM configuration: column number invalid ({0})")]
    UnsupportedColumns(u8),
    #[error("Unsupported DRAM configuration: row number invalid ({0})")]
    UnsupportedRows(u8),
}

/// The nine ADDRMAP register values for one geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddrMap([u32; ADDRMAP_COUNT]);

#[inline]
const fn replicate(value: u32, count: u32) -> u32 {
    let mut result = 0;
    let mut i = 0;
    while i < count {
        result |= value << (i * 8);
        i += 1;
    }
    result
}

impl AddrMap {
    /// Computes the address map. No register is touched, so an unsupported geometry is reported
    /// before any hardware access happens.
    ///
    /// With a 16-bit bus, the lowest column bit is consumed by the bus width, so one column bit
    /// less is mapped.
    pub const fn new(geometry: &Geometry) -> Result<Self, AddrMapError> {
        let raw_cols = geometry.cols;
        let rows = geometry.rows;
        let cols = if geometry.full_width {
            raw_cols
        } else {
            raw_cols.wrapping_sub(1)
        };
        if raw_cols < *COLS_RANGE.start()
            || raw_cols > *COLS_RANGE.end()
            || cols < *COLS_RANGE.start()
        {
            return Err(AddrMapError::UnsupportedColumns(raw_cols));
        }
        if rows < *ROWS_RANGE.start() || rows > *ROWS_RANGE.end() {
            return Err(AddrMapError::UnsupportedRows(rows));
        }
        let cols = cols as u32;
        let rows_u32 = rows as u32;
        let mut map = [0; ADDRMAP_COUNT];

        map[0] = match geometry.ranks {
            super::Ranks::Dual => (UNUSED_5 << 8) | (rows_u32 + cols - 3),
            super::Ranks::Single => (UNUSED_5 << 8) | UNUSED_5,
        };
        map[1] = replicate(cols - 2, 3);
        map[2] = 0;
        let (map3, map4) = match cols {
            7 => (0x1f1f_1f00, 0x1f1f),
            8 => (0x1f1f_0000, 0x1f1f),
            9 => (0x1f00_0000, 0x1f1f),
            10 => (0, 0x1f1f),
            11 => (0, 0x1f00),
            _ => (0, 0),
        };
        map[3] = map3;
        map[4] = map4;

        let row = cols - 3;
        map[5] = replicate(row, 4);
        let (map6, map7) = match rows {
            13 => (row | (replicate(UNUSED_4, 3) << 8), replicate(UNUSED_4, 2)),
            14 => (replicate(row, 2) | (replicate(UNUSED_4, 2) << 16), replicate(UNUSED_4, 2)),
            15 => (replicate(row, 3) | (UNUSED_4 << 24), replicate(UNUSED_4, 2)),
            16 => (replicate(row, 4), replicate(UNUSED_4, 2)),
            17 => (replicate(row, 4), row | (UNUSED_4 << 8)),
            _ => (replicate(row, 4), replicate(row, 2)),
        };
        map[6] = map6;
        map[7] = map7;
        map[8] = replicate(UNUSED_BG, 2);
        Ok(Self(map))
    }

    #[inline]
    pub const fn words(&self) -> &[u32; ADDRMAP_COUNT] {
        &self.0
    }

    /// Writes ADDRMAP0 to ADDRMAP8 in ascending order.
    pub fn program<B: RegisterAccess>(&self, bus: &mut B) {
        for (i, word) in self.0.iter().enumerate() {
            bus.write32(MCTL_CTL_BASE_ADDR + offsets::ADDRMAP0 + i * 4, *word);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dram::{Ranks, sim::SimSoc};
    use std::vec::Vec;

    fn map(ranks: Ranks, full_width: bool, rows: u8, cols: u8) -> [u32; ADDRMAP_COUNT] {
        *AddrMap::new(&Geometry::new(ranks, full_width, rows, cols))
            .unwrap()
            .words()
    }

    #[test]
    fn test_column_table() {
        let expected: [(u8, u32, u32); 6] = [
            (7, 0x1f1f_1f00, 0x1f1f),
            (8, 0x1f1f_0000, 0x1f1f),
            (9, 0x1f00_0000, 0x1f1f),
            (10, 0, 0x1f1f),
            (11, 0, 0x1f00),
            (12, 0, 0),
        ];
        for (cols, map3, map4) in expected {
            let words = map(Ranks::Single, true, 13, cols);
            assert_eq!(words[3], map3, "cols {}", cols);
            assert_eq!(words[4], map4, "cols {}", cols);
            let half = map(Ranks::Single, false, 13, cols + 1);
            if cols < 12 {
                assert_eq!(half[3], map3, "half width cols {}", cols + 1);
                assert_eq!(half[4], map4, "half width cols {}", cols + 1);
            }
        }
    }

    #[test]
    fn test_eight_effective_columns() {
        // Eight mapped column bits, either from a 32-bit bus or from nine columns on a 16-bit
        // bus.
        for words in [
            map(Ranks::Single, true, 13, 8),
            map(Ranks::Single, false, 13, 9),
        ] {
            assert_eq!(words[3], 0x1f1f_0000);
            assert_eq!(words[4], 0x1f1f);
        }
        // Eight columns on a 16-bit bus only map seven bits.
        let words = map(Ranks::Single, false, 13, 8);
        assert_eq!(words[3], 0x1f1f_1f00);
        assert_eq!(words[4], 0x1f1f);
    }

    #[test]
    fn test_row_table() {
        // Ten effective columns: row fields are 7.
        let expected: [(u8, u32, u32); 6] = [
            (13, 0x0f0f_0f07, 0x0f0f),
            (14, 0x0f0f_0707, 0x0f0f),
            (15, 0x0f07_0707, 0x0f0f),
            (16, 0x0707_0707, 0x0f0f),
            (17, 0x0707_0707, 0x0f07),
            (18, 0x0707_0707, 0x0707),
        ];
        for (rows, map6, map7) in expected {
            let words = map(Ranks::Single, true, rows, 10);
            assert_eq!(words[5], 0x0707_0707);
            assert_eq!(words[6], map6, "rows {}", rows);
            assert_eq!(words[7], map7, "rows {}", rows);
        }
    }

    #[test]
    fn test_rank_and_bank_words() {
        let words = map(Ranks::Dual, true, 16, 10);
        assert_eq!(words[0], 0x1f00 | (16 + 10 - 3));
        assert_eq!(words[1], 0x0008_0808);
        assert_eq!(words[2], 0);
        assert_eq!(words[8], 0x3f3f);
        let words = map(Ranks::Single, true, 16, 10);
        assert_eq!(words[0], 0x1f1f);
    }

    #[test]
    fn test_every_supported_combination() {
        for full_width in [false, true] {
            for ranks in [Ranks::Single, Ranks::Dual] {
                for rows in ROWS_RANGE {
                    for cols in 7..=12 {
                        let result = AddrMap::new(&Geometry::new(ranks, full_width, rows, cols));
                        assert_eq!(result.is_ok(), full_width || cols > 7);
                    }
                }
            }
        }
    }

    #[test]
    fn test_reference_geometry() {
        let words = map(Ranks::Single, false, 13, 8);
        assert_eq!(
            words,
            [
                0x1f1f,
                0x0005_0505,
                0,
                0x1f1f_1f00,
                0x1f1f,
                0x0404_0404,
                0x0f0f_0f04,
                0x0f0f,
                0x3f3f
            ]
        );
    }

    #[test]
    fn test_unsupported_geometry() {
        assert_eq!(
            AddrMap::new(&Geometry::new(Ranks::Single, true, 13, 13)),
            Err(AddrMapError::UnsupportedColumns(13))
        );
        assert_eq!(
            AddrMap::new(&Geometry::new(Ranks::Single, false, 13, 13)),
            Err(AddrMapError::UnsupportedColumns(13))
        );
        assert_eq!(
            AddrMap::new(&Geometry::new(Ranks::Single, false, 13, 7)),
            Err(AddrMapError::UnsupportedColumns(7))
        );
        assert_eq!(
            AddrMap::new(&Geometry::new(Ranks::Single, true, 19, 10)),
            Err(AddrMapError::UnsupportedRows(19))
        );
        assert_eq!(
            AddrMap::new(&Geometry::new(Ranks::Single, true, 12, 10)),
            Err(AddrMapError::UnsupportedRows(12))
        );
    }

    #[test]
    fn test_program_order() {
        let mut soc = SimSoc::healthy();
        let addrmap = AddrMap::new(&Geometry::new(Ranks::Single, false, 13, 8)).unwrap();
        addrmap.program(&mut soc);
        let trace: Vec<(usize, u32)> = soc.writes().iter().map(|w| (w.addr, w.value)).collect();
        let expected: Vec<(usize, u32)> = (0..ADDRMAP_COUNT)
            .map(|i| (0x0310_3200 + i * 4, addrmap.words()[i]))
            .collect();
        assert_eq!(trace, expected);
    }
}
