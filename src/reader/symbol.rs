use crate::common::block_info::{get_block_info, BlockInfo};
use crate::common::ec::rectify_format;
use crate::common::error::{QRError, QRResult};
use crate::common::mask::MaskPattern;
use crate::common::metadata::{AlignmentLocation, ECLevel, Version};

// Extracted bit matrix
//------------------------------------------------------------------------------

// Sampled modules in row-major order, 0 = dark. Reads go through index, which
// flips to the codeword convention where dark is 1.
#[derive(Debug, Clone, PartialEq)]
pub struct QRData {
    data: Vec<u8>,
    pub side: u32,
    pub version: Version,
}

impl QRData {
    pub fn new(data: Vec<u8>, side: u32, version: Version) -> Self {
        debug_assert_eq!(data.len(), (side * side) as usize, "Matrix isn't side * side");
        debug_assert_eq!(side, version.width(), "Side doesn't match version");
        Self { data, side, version }
    }

    // 1 for a dark module, 0 for light; out-of-range reads are 1
    pub fn index(&self, x: u32, y: u32) -> u8 {
        match self.data.get((y * self.side + x) as usize) {
            Some(0) => 1,
            Some(_) => 0,
            None => 1,
        }
    }
}

// Format info
//------------------------------------------------------------------------------

pub static FORMAT_MASK: [u8; 15] = [1, 0, 1, 0, 1, 0, 0, 0, 0, 0, 1, 0, 0, 1, 0];

// Reads the copy around the top-left finder first and falls back to the one
// split across the other two corners
pub fn read_format(data: &QRData) -> QRResult<(ECLevel, MaskPattern)> {
    let format = read_format_copy1(data).or_else(|_| read_format_copy2(data))?;

    let ecl = ECLevel::from_format_bits(format[0] * 2 + format[1])?;
    let mask = MaskPattern::new(format[2] * 4 + format[3] * 2 + format[4]);

    Ok((ecl, mask))
}

fn read_format_copy1(data: &QRData) -> QRResult<[u8; 15]> {
    let mut format = [0u8; 15];
    let mut i = 0;

    for x in 0..9 {
        if x == 6 {
            continue;
        }
        format[i] = data.index(x, 8);
        i += 1;
    }
    for y in (0..8).rev() {
        if y == 6 {
            continue;
        }
        format[i] = data.index(8, y);
        i += 1;
    }

    unmask_and_rectify(format)
}

fn read_format_copy2(data: &QRData) -> QRResult<[u8; 15]> {
    let side = data.side;
    let mut format = [0u8; 15];
    let mut i = 0;

    for y in (side - 7..side).rev() {
        format[i] = data.index(8, y);
        i += 1;
    }
    for x in side - 8..side {
        format[i] = data.index(x, 8);
        i += 1;
    }

    unmask_and_rectify(format)
}

fn unmask_and_rectify(mut format: [u8; 15]) -> QRResult<[u8; 15]> {
    for (bit, mask) in format.iter_mut().zip(FORMAT_MASK) {
        *bit ^= mask;
    }
    rectify_format(&mut format)?;
    Ok(format)
}

// Data region traversal
//------------------------------------------------------------------------------

// Walks the data modules in codeword order: column pairs right to left,
// zig-zagging up and down and stepping over the vertical timing column
pub struct DataRegionIter {
    side: u32,
    version: Version,
    loc: AlignmentLocation,
    x: u32,
    // Half-steps taken within the current column pair
    step: u32,
    done: bool,
}

impl DataRegionIter {
    pub fn new(version: Version) -> Self {
        let side = version.width();
        Self {
            side,
            version,
            loc: version.alignment_location(),
            x: side - 1,
            step: 0,
            done: false,
        }
    }

    fn upward(&self) -> bool {
        let x = if self.x < 6 { self.x + 1 } else { self.x };
        (self.side - 1 - x) % 4 == 0
    }
}

impl Iterator for DataRegionIter {
    type Item = (u32, u32);

    fn next(&mut self) -> Option<(u32, u32)> {
        while !self.done {
            let i = self.step / 2;
            let y = if self.upward() { self.side - 1 - i } else { i };
            let x = if self.step % 2 == 0 { self.x } else { self.x - 1 };

            self.step += 1;
            if self.step == 2 * self.side {
                self.step = 0;
                if self.x == 1 {
                    self.done = true;
                } else {
                    self.x -= 2;
                    if self.x == 6 {
                        // Vertical timing column
                        self.x = 5;
                    }
                }
            }

            if is_data(self.side, self.version, &self.loc, x, y) {
                return Some((x, y));
            }
        }

        None
    }
}

pub(crate) fn is_data(
    side: u32,
    version: Version,
    loc: &AlignmentLocation,
    x: u32,
    y: u32,
) -> bool {
    // Timing patterns
    if x == 6 || y == 6 {
        return false;
    }

    // The three finder corners with their separators and format strips
    if x < 9 && y < 9 {
        return false;
    }
    if x > side - 9 && y < 9 {
        return false;
    }
    if x < 9 && y > side - 9 {
        return false;
    }

    // Version information blocks
    if *version >= 7 && x > side - 12 && y < 6 {
        return false;
    }
    if *version >= 7 && y > side - 12 && x < 6 {
        return false;
    }

    // The column against the top-right finder and the row against the
    // bottom-left one carry data even where an alignment strip would claim
    // them; the corner patterns there are omitted
    if x == side - 9 && y < 9 {
        return true;
    }
    if y == side - 9 && x < 9 {
        return true;
    }

    !(loc.covers(x) && loc.covers(y))
}

// Codeword assembly
//------------------------------------------------------------------------------

struct Codewords {
    current_byte: u8,
    bit_count: u8,
    blocks: Blocks,
}

impl Codewords {
    fn new(block_info: Vec<BlockInfo>) -> Self {
        Self { current_byte: 0, bit_count: 0, blocks: Blocks::new(block_info) }
    }

    fn add_bit(&mut self, bit: u8) {
        self.current_byte = (self.current_byte << 1) | bit;
        self.bit_count += 1;
        if self.bit_count == 8 {
            self.blocks.push(self.current_byte);
            self.current_byte = 0;
            self.bit_count = 0;
        }
    }
}

// Distributes incoming codewords across blocks in the QR interleave: data
// rounds skip blocks that are already full, ec rounds cover every block
struct Blocks {
    block_info: Vec<BlockInfo>,
    blocks: Vec<Vec<u8>>,
    round: usize,
    max_data_round: usize,
    block: usize,
    in_data: bool,
}

impl Blocks {
    fn new(block_info: Vec<BlockInfo>) -> Self {
        let blocks = vec![Vec::new(); block_info.len()];
        let max_data_round =
            block_info.iter().map(|bi| bi.data_per as usize).max().unwrap_or(0);
        Self { block_info, blocks, round: 0, max_data_round, block: 0, in_data: true }
    }

    fn push(&mut self, codeword: u8) {
        while self.in_data && self.round >= self.block_info[self.block].data_per as usize {
            self.advance();
        }
        self.blocks[self.block].push(codeword);
        self.advance();
    }

    fn advance(&mut self) {
        if self.block != self.block_info.len() - 1 {
            self.block += 1;
            return;
        }
        self.block = 0;
        self.round += 1;
        if self.round == self.max_data_round {
            self.in_data = false;
        }
    }
}

// Reads every data module, unmasks it and de-interleaves the codewords into
// their blocks
pub fn read_codewords(
    data: &QRData,
    ecl: ECLevel,
    mask: MaskPattern,
) -> QRResult<Vec<Vec<u8>>> {
    let block_info = get_block_info(*data.version, ecl)?;
    let expected = block_info.len();
    let mut codewords = Codewords::new(block_info.clone());

    for (x, y) in DataRegionIter::new(data.version) {
        codewords.add_bit(data.index(x, y) ^ mask.bit_at(x, y));
    }

    let blocks = codewords.blocks.blocks;
    if blocks.len() != expected {
        return Err(QRError::BlockCountMismatch { expected, found: blocks.len() });
    }

    for (block, bi) in blocks.iter().zip(&block_info) {
        if block.len() != bi.total_per as usize {
            return Err(QRError::CodewordCountMismatch {
                expected: bi.total_per as usize,
                found: block.len(),
            });
        }
    }

    Ok(blocks)
}

#[cfg(test)]
mod symbol_tests {
    use test_case::test_case;

    use super::{read_format, DataRegionIter, QRData};
    use crate::common::block_info::get_block_info;
    use crate::common::metadata::{ECLevel, Version};
    use crate::testutil::QRBuilder;

    #[test]
    fn test_index_inverts_and_saturates() {
        let ver = Version::new(1).unwrap();
        let mut cells = vec![1u8; 441];
        cells[0] = 0; // dark module at (0, 0)
        let data = QRData::new(cells, 21, ver);

        assert_eq!(data.index(0, 0), 1);
        assert_eq!(data.index(1, 0), 0);
        assert_eq!(data.index(20, 20), 0);
        assert_eq!(data.index(0, 21), 1, "Out of range reads as 1");
    }

    #[test]
    fn test_data_region_matches_codeword_capacity() {
        // Data modules, less the remainder bits, must hold exactly the
        // version's codewords
        for v in 1..=40 {
            let ver = Version::new(v).unwrap();
            let count = DataRegionIter::new(ver).count();
            for ecl in [ECLevel::L, ECLevel::M, ECLevel::Q, ECLevel::H] {
                let total: usize = get_block_info(v, ecl)
                    .unwrap()
                    .iter()
                    .map(|bi| bi.total_per as usize)
                    .sum();
                assert_eq!(total, count / 8, "Version {v}");
                assert!(count - 8 * total < 8, "Version {v} remainder bits");
            }
        }
    }

    #[test]
    fn test_data_region_stays_in_bounds_and_unique() {
        for v in [1, 2, 7, 20, 40] {
            let ver = Version::new(v).unwrap();
            let side = ver.width();
            let mut seen = vec![false; (side * side) as usize];
            for (x, y) in DataRegionIter::new(ver) {
                assert!(x < side && y < side, "Version {v}: ({x}, {y})");
                let idx = (y * side + x) as usize;
                assert!(!seen[idx], "Version {v}: ({x}, {y}) visited twice");
                seen[idx] = true;
            }
        }
    }

    #[test]
    fn test_data_region_starts_bottom_right() {
        let ver = Version::new(1).unwrap();
        let mut iter = DataRegionIter::new(ver);
        assert_eq!(iter.next(), Some((20, 20)));
        assert_eq!(iter.next(), Some((19, 20)));
        assert_eq!(iter.next(), Some((20, 19)));
    }

    #[test_case(ECLevel::L, 0)]
    #[test_case(ECLevel::M, 3)]
    #[test_case(ECLevel::Q, 5)]
    #[test_case(ECLevel::H, 7)]
    fn test_read_format_round_trip(ecl: ECLevel, mask: u8) {
        let builder = QRBuilder::numeric(b"31415926", 1, ecl, mask);
        let data = builder.to_qr_data();

        let (read_ecl, read_mask) = read_format(&data).unwrap();
        assert_eq!(read_ecl, ecl);
        assert_eq!(*read_mask, mask);
    }

    #[test]
    fn test_read_format_survives_broken_first_copy() {
        let builder = QRBuilder::numeric(b"31415926", 1, ECLevel::Q, 2);
        let mut matrix = builder.build_matrix();

        // Cell (8, 0) holds the first copy's lowest format bit, the one spot
        // its corrector refuses to touch, so the first copy must be rejected
        matrix[8] = !matrix[8];

        let data = QRBuilder::matrix_to_qr_data(&matrix, 1);
        let (read_ecl, read_mask) = read_format(&data).unwrap();
        assert_eq!(read_ecl, ECLevel::Q);
        assert_eq!(*read_mask, 2);
    }
}
