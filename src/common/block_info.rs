use super::error::{QRError, QRResult};
use super::metadata::ECLevel;

// Block info
//------------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub struct BlockInfo {
    pub block_count: u8,
    pub total_per: u8,
    pub data_per: u8,
    pub ec_capacity: u8,
}

impl BlockInfo {
    const fn new(block_count: u8, total_per: u8, data_per: u8, ec_capacity: u8) -> Self {
        Self { block_count, total_per, data_per, ec_capacity }
    }
}

// Expands the ISO 18004 Table 9 row for a version and level into one entry
// per block
pub fn get_block_info(version: u32, level: ECLevel) -> QRResult<Vec<BlockInfo>> {
    if !(1..=40).contains(&version) {
        return Err(QRError::UnsupportedVersion);
    }

    let infos = BLOCK_TABLE[version as usize - 1][level as usize];

    let count = infos.iter().map(|bi| bi.block_count as usize).sum();
    let mut expanded = Vec::with_capacity(count);
    for bi in infos {
        for _ in 0..bi.block_count {
            expanded.push(*bi);
        }
    }

    Ok(expanded)
}

// (block count, codewords per block, data codewords per block, correctable
// errors per block), indexed by version and EC level
use BlockInfo as B;

static BLOCK_TABLE: [[&[BlockInfo]; 4]; 40] = [
    // Version 1
    [&[B::new(1, 26, 19, 2)], &[B::new(1, 26, 16, 4)], &[B::new(1, 26, 13, 6)], &[B::new(1, 26, 9, 8)]],
    // Version 2
    [&[B::new(1, 44, 34, 4)], &[B::new(1, 44, 28, 8)], &[B::new(1, 44, 22, 11)], &[B::new(1, 44, 16, 14)]],
    // Version 3
    [&[B::new(1, 70, 55, 7)], &[B::new(1, 70, 44, 13)], &[B::new(2, 35, 17, 9)], &[B::new(2, 35, 13, 11)]],
    // Version 4
    [&[B::new(1, 100, 80, 10)], &[B::new(2, 50, 32, 9)], &[B::new(2, 50, 24, 13)], &[B::new(4, 25, 9, 8)]],
    // Version 5
    [&[B::new(1, 134, 108, 13)], &[B::new(2, 67, 43, 12)], &[B::new(2, 33, 15, 9), B::new(2, 34, 16, 9)], &[B::new(2, 33, 11, 11), B::new(2, 34, 12, 11)]],
    // Version 6
    [&[B::new(2, 86, 68, 9)], &[B::new(4, 43, 27, 8)], &[B::new(4, 43, 19, 12)], &[B::new(4, 43, 15, 14)]],
    // Version 7
    [&[B::new(2, 98, 78, 10)], &[B::new(4, 49, 31, 9)], &[B::new(2, 32, 14, 9), B::new(4, 33, 15, 9)], &[B::new(4, 39, 13, 13), B::new(1, 40, 14, 13)]],
    // Version 8
    [&[B::new(2, 121, 97, 12)], &[B::new(2, 60, 38, 11), B::new(2, 61, 39, 11)], &[B::new(4, 40, 18, 11), B::new(2, 41, 19, 11)], &[B::new(4, 40, 14, 13), B::new(2, 41, 15, 13)]],
    // Version 9
    [&[B::new(2, 146, 116, 15)], &[B::new(3, 58, 36, 11), B::new(2, 59, 37, 11)], &[B::new(4, 36, 16, 10), B::new(4, 37, 17, 10)], &[B::new(4, 36, 12, 12), B::new(4, 37, 13, 12)]],
    // Version 10
    [&[B::new(2, 86, 68, 9), B::new(2, 87, 69, 9)], &[B::new(4, 69, 43, 13), B::new(1, 70, 44, 13)], &[B::new(6, 43, 19, 12), B::new(2, 44, 20, 12)], &[B::new(6, 43, 15, 14), B::new(2, 44, 16, 14)]],
    // Version 11
    [&[B::new(4, 101, 81, 10)], &[B::new(1, 80, 50, 15), B::new(4, 81, 51, 15)], &[B::new(4, 50, 22, 14), B::new(4, 51, 23, 14)], &[B::new(3, 36, 12, 12), B::new(8, 37, 13, 12)]],
    // Version 12
    [&[B::new(2, 116, 92, 12), B::new(2, 117, 93, 12)], &[B::new(6, 58, 36, 11), B::new(2, 59, 37, 11)], &[B::new(4, 46, 20, 13), B::new(6, 47, 21, 13)], &[B::new(7, 42, 14, 14), B::new(4, 43, 15, 14)]],
    // Version 13
    [&[B::new(4, 133, 107, 13)], &[B::new(8, 59, 37, 11), B::new(1, 60, 38, 11)], &[B::new(8, 44, 20, 12), B::new(4, 45, 21, 12)], &[B::new(12, 33, 11, 11), B::new(4, 34, 12, 11)]],
    // Version 14
    [&[B::new(3, 145, 115, 15), B::new(1, 146, 116, 15)], &[B::new(4, 64, 40, 12), B::new(5, 65, 41, 12)], &[B::new(11, 36, 16, 10), B::new(5, 37, 17, 10)], &[B::new(11, 36, 12, 12), B::new(5, 37, 13, 12)]],
    // Version 15
    [&[B::new(5, 109, 87, 11), B::new(1, 110, 88, 11)], &[B::new(5, 65, 41, 12), B::new(5, 66, 42, 12)], &[B::new(5, 54, 24, 15), B::new(7, 55, 25, 15)], &[B::new(11, 36, 12, 12), B::new(7, 37, 13, 12)]],
    // Version 16
    [&[B::new(5, 122, 98, 12), B::new(1, 123, 99, 12)], &[B::new(7, 73, 45, 14), B::new(3, 74, 46, 14)], &[B::new(15, 43, 19, 12), B::new(2, 44, 20, 12)], &[B::new(3, 45, 15, 15), B::new(13, 46, 16, 15)]],
    // Version 17
    [&[B::new(1, 135, 107, 14), B::new(5, 136, 108, 14)], &[B::new(10, 74, 46, 14), B::new(1, 75, 47, 14)], &[B::new(1, 50, 22, 14), B::new(15, 51, 23, 14)], &[B::new(2, 42, 14, 14), B::new(17, 43, 15, 14)]],
    // Version 18
    [&[B::new(5, 150, 120, 15), B::new(1, 151, 121, 15)], &[B::new(9, 69, 43, 13), B::new(4, 70, 44, 13)], &[B::new(17, 50, 22, 14), B::new(1, 51, 23, 14)], &[B::new(2, 42, 14, 14), B::new(19, 43, 15, 14)]],
    // Version 19
    [&[B::new(3, 141, 113, 14), B::new(4, 142, 114, 14)], &[B::new(3, 70, 44, 13), B::new(11, 71, 45, 13)], &[B::new(17, 47, 21, 13), B::new(4, 48, 22, 13)], &[B::new(9, 39, 13, 13), B::new(16, 40, 14, 13)]],
    // Version 20
    [&[B::new(3, 135, 107, 14), B::new(5, 136, 108, 14)], &[B::new(3, 67, 41, 13), B::new(13, 68, 42, 13)], &[B::new(15, 54, 24, 15), B::new(5, 55, 25, 15)], &[B::new(15, 43, 15, 14), B::new(10, 44, 16, 14)]],
    // Version 21
    [&[B::new(4, 144, 116, 14), B::new(4, 145, 117, 14)], &[B::new(17, 68, 42, 13)], &[B::new(17, 50, 22, 14), B::new(6, 51, 23, 14)], &[B::new(19, 46, 16, 15), B::new(6, 47, 17, 15)]],
    // Version 22
    [&[B::new(2, 139, 111, 14), B::new(7, 140, 112, 14)], &[B::new(17, 74, 46, 14)], &[B::new(7, 54, 24, 15), B::new(16, 55, 25, 15)], &[B::new(34, 37, 13, 12)]],
    // Version 23
    [&[B::new(4, 151, 121, 15), B::new(5, 152, 122, 15)], &[B::new(4, 75, 47, 14), B::new(14, 76, 48, 14)], &[B::new(11, 54, 24, 15), B::new(14, 55, 25, 15)], &[B::new(16, 45, 15, 15), B::new(14, 46, 16, 15)]],
    // Version 24
    [&[B::new(6, 147, 117, 15), B::new(4, 148, 118, 15)], &[B::new(6, 73, 45, 14), B::new(14, 74, 46, 14)], &[B::new(11, 54, 24, 15), B::new(16, 55, 25, 15)], &[B::new(30, 46, 16, 15), B::new(2, 47, 17, 15)]],
    // Version 25
    [&[B::new(8, 132, 106, 13), B::new(4, 133, 107, 13)], &[B::new(8, 75, 47, 14), B::new(13, 76, 48, 14)], &[B::new(7, 54, 24, 15), B::new(22, 55, 25, 15)], &[B::new(22, 45, 15, 15), B::new(13, 46, 16, 15)]],
    // Version 26
    [&[B::new(10, 142, 114, 14), B::new(2, 143, 115, 14)], &[B::new(19, 74, 46, 14), B::new(4, 75, 47, 14)], &[B::new(28, 50, 22, 14), B::new(6, 51, 23, 14)], &[B::new(33, 46, 16, 15), B::new(4, 47, 17, 15)]],
    // Version 27
    [&[B::new(8, 152, 122, 15), B::new(4, 153, 123, 15)], &[B::new(22, 73, 45, 14), B::new(3, 74, 46, 14)], &[B::new(8, 53, 23, 15), B::new(26, 54, 24, 15)], &[B::new(12, 45, 15, 15), B::new(28, 46, 16, 15)]],
    // Version 28
    [&[B::new(3, 147, 117, 15), B::new(10, 148, 118, 15)], &[B::new(3, 73, 45, 14), B::new(23, 74, 46, 14)], &[B::new(4, 54, 24, 15), B::new(31, 55, 25, 15)], &[B::new(11, 45, 15, 15), B::new(31, 46, 16, 15)]],
    // Version 29
    [&[B::new(7, 146, 116, 15), B::new(7, 147, 117, 15)], &[B::new(21, 73, 45, 14), B::new(7, 74, 46, 14)], &[B::new(1, 53, 23, 15), B::new(37, 54, 24, 15)], &[B::new(19, 45, 15, 15), B::new(26, 46, 16, 15)]],
    // Version 30
    [&[B::new(5, 145, 115, 15), B::new(10, 146, 116, 15)], &[B::new(19, 75, 47, 14), B::new(10, 76, 48, 14)], &[B::new(15, 54, 24, 15), B::new(25, 55, 25, 15)], &[B::new(23, 45, 15, 15), B::new(25, 46, 16, 15)]],
    // Version 31
    [&[B::new(13, 145, 115, 15), B::new(3, 146, 116, 15)], &[B::new(2, 74, 46, 14), B::new(29, 75, 47, 14)], &[B::new(42, 54, 24, 15), B::new(1, 55, 25, 15)], &[B::new(23, 45, 15, 15), B::new(28, 46, 16, 15)]],
    // Version 32
    [&[B::new(17, 145, 115, 15)], &[B::new(10, 74, 46, 14), B::new(23, 75, 47, 14)], &[B::new(10, 54, 24, 15), B::new(35, 55, 25, 15)], &[B::new(19, 45, 15, 15), B::new(35, 46, 16, 15)]],
    // Version 33
    [&[B::new(17, 145, 115, 15), B::new(1, 146, 116, 15)], &[B::new(14, 74, 46, 14), B::new(21, 75, 47, 14)], &[B::new(29, 54, 24, 15), B::new(19, 55, 25, 15)], &[B::new(11, 45, 15, 15), B::new(46, 46, 16, 15)]],
    // Version 34
    [&[B::new(13, 145, 115, 15), B::new(6, 146, 116, 15)], &[B::new(14, 74, 46, 14), B::new(23, 75, 47, 14)], &[B::new(44, 54, 24, 15), B::new(7, 55, 25, 15)], &[B::new(59, 46, 16, 15), B::new(1, 47, 17, 15)]],
    // Version 35
    [&[B::new(12, 151, 121, 15), B::new(7, 152, 122, 15)], &[B::new(12, 75, 47, 14), B::new(26, 76, 48, 14)], &[B::new(39, 54, 24, 15), B::new(14, 55, 25, 15)], &[B::new(22, 45, 15, 15), B::new(41, 46, 16, 15)]],
    // Version 36
    [&[B::new(6, 151, 121, 15), B::new(14, 152, 122, 15)], &[B::new(6, 75, 47, 14), B::new(34, 76, 48, 14)], &[B::new(46, 54, 24, 15), B::new(10, 55, 25, 15)], &[B::new(2, 45, 15, 15), B::new(64, 46, 16, 15)]],
    // Version 37
    [&[B::new(17, 152, 122, 15), B::new(4, 153, 123, 15)], &[B::new(29, 74, 46, 14), B::new(14, 75, 47, 14)], &[B::new(49, 54, 24, 15), B::new(10, 55, 25, 15)], &[B::new(24, 45, 15, 15), B::new(46, 46, 16, 15)]],
    // Version 38
    [&[B::new(4, 152, 122, 15), B::new(18, 153, 123, 15)], &[B::new(13, 74, 46, 14), B::new(32, 75, 47, 14)], &[B::new(48, 54, 24, 15), B::new(14, 55, 25, 15)], &[B::new(42, 45, 15, 15), B::new(32, 46, 16, 15)]],
    // Version 39
    [&[B::new(20, 147, 117, 15), B::new(4, 148, 118, 15)], &[B::new(40, 75, 47, 14), B::new(7, 76, 48, 14)], &[B::new(43, 54, 24, 15), B::new(22, 55, 25, 15)], &[B::new(10, 45, 15, 15), B::new(67, 46, 16, 15)]],
    // Version 40
    [&[B::new(19, 148, 118, 15), B::new(6, 149, 119, 15)], &[B::new(18, 75, 47, 14), B::new(31, 76, 48, 14)], &[B::new(34, 54, 24, 15), B::new(34, 55, 25, 15)], &[B::new(20, 45, 15, 15), B::new(61, 46, 16, 15)]],];

#[cfg(test)]
mod block_info_tests {
    use test_case::test_case;

    use super::{get_block_info, BlockInfo};
    use crate::common::error::QRError;
    use crate::common::metadata::ECLevel;

    #[test_case(1, ECLevel::L, &[(26, 19, 2)])]
    #[test_case(1, ECLevel::H, &[(26, 9, 8)])]
    #[test_case(5, ECLevel::Q, &[(33, 15, 9), (33, 15, 9), (34, 16, 9), (34, 16, 9)])]
    #[test_case(7, ECLevel::H, &[(39, 13, 13), (39, 13, 13), (39, 13, 13), (39, 13, 13), (40, 14, 13)])]
    #[test_case(10, ECLevel::M, &[(69, 43, 13), (69, 43, 13), (69, 43, 13), (69, 43, 13), (70, 44, 13)])]
    fn test_expansion(version: u32, level: ECLevel, expected: &[(u8, u8, u8)]) {
        let blocks = get_block_info(version, level).unwrap();
        let found: Vec<_> =
            blocks.iter().map(|bi| (bi.total_per, bi.data_per, bi.ec_capacity)).collect();
        assert_eq!(found, expected);
    }

    #[test]
    fn test_version_bounds() {
        assert_eq!(get_block_info(0, ECLevel::L), Err(QRError::UnsupportedVersion));
        assert_eq!(get_block_info(41, ECLevel::L), Err(QRError::UnsupportedVersion));
        assert!(get_block_info(40, ECLevel::H).is_ok());
    }

    #[test]
    fn test_table_consistency() {
        for version in 1..=40u32 {
            let totals: Vec<usize> = [ECLevel::L, ECLevel::M, ECLevel::Q, ECLevel::H]
                .into_iter()
                .map(|level| {
                    get_block_info(version, level)
                        .unwrap()
                        .iter()
                        .map(|bi| bi.total_per as usize)
                        .sum()
                })
                .collect();

            // Codeword capacity is a property of the version alone
            assert!(
                totals.iter().all(|&t| t == totals[0]),
                "Level totals disagree for version {version}: {totals:?}"
            );
        }
    }

    #[test]
    fn test_syndrome_counts_fit() {
        for version in 1..=40u32 {
            for level in [ECLevel::L, ECLevel::M, ECLevel::Q, ECLevel::H] {
                for BlockInfo { total_per, data_per, ec_capacity, .. } in
                    get_block_info(version, level).unwrap()
                {
                    assert!(
                        2 * ec_capacity as usize <= (total_per - data_per) as usize,
                        "Version {version}: syndromes exceed ec codewords"
                    );
                }
            }
        }
    }
}
