// Test support: a minimal QR symbol builder and renderer so reader tests can
// round-trip without fixture images. Placement reuses the reader's own data
// region iterator; Reed-Solomon parity and the BCH words are computed from
// scratch here so the decoder is tested against an independent encoder.

use image::GrayImage;

use crate::common::block_info::get_block_info;
use crate::common::codec::{Mode, ALPHANUMERIC_CHARSET};
use crate::common::galois::Gf8;
use crate::common::mask::MaskPattern;
use crate::common::metadata::{ECLevel, Version};
use crate::reader::binarize::BinaryImage;
use crate::reader::symbol::{DataRegionIter, QRData, FORMAT_MASK};

// Bit writer
//------------------------------------------------------------------------------

pub struct BitWriter {
    data: Vec<u8>,
    len: usize,
}

impl BitWriter {
    pub fn new() -> Self {
        Self { data: Vec::new(), len: 0 }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn push_bits(&mut self, bits: u32, size: usize) {
        debug_assert!(size <= 16, "Push size out of range: {size}");
        debug_assert!(size as u32 >= 32 - bits.leading_zeros(), "Bits exceed size {size}: {bits}");

        for i in (0..size).rev() {
            if self.len % 8 == 0 {
                self.data.push(0);
            }
            if (bits >> i) & 1 == 1 {
                *self.data.last_mut().unwrap() |= 0x80 >> (self.len % 8);
            }
            self.len += 1;
        }
    }
}

// Reed-Solomon encoder
//------------------------------------------------------------------------------

// Parity codewords from the generator with roots alpha^0 .. alpha^(ec_len - 1)
pub fn rs_encode(data: &[u8], ec_len: usize) -> Vec<u8> {
    // Generator coefficients, highest degree first
    let mut gen = vec![Gf8(1)];
    for i in 0..ec_len {
        let mut next = vec![Gf8(0); gen.len() + 1];
        for (j, &coeff) in gen.iter().enumerate() {
            next[j] += coeff;
            next[j + 1] += coeff * Gf8::pow(i);
        }
        gen = next;
    }

    // Long division of data * x^ec_len
    let mut rem: Vec<Gf8> = data.iter().map(|&b| Gf8(b)).collect();
    rem.extend(std::iter::repeat(Gf8(0)).take(ec_len));
    for i in 0..data.len() {
        let factor = rem[i];
        if factor == Gf8(0) {
            continue;
        }
        for (j, &coeff) in gen.iter().enumerate() {
            rem[i + j] += factor * coeff;
        }
    }

    rem[data.len()..].iter().map(|g| g.0).collect()
}

// BCH words
//------------------------------------------------------------------------------

fn bch_remainder(mut value: u32, generator: u32, gen_degree: u32, total_bits: u32) -> u32 {
    for i in (gen_degree..total_bits).rev() {
        if value & (1 << i) != 0 {
            value ^= generator << (i - gen_degree);
        }
    }
    value
}

// The unmasked 15-bit format word, most significant bit first
pub fn format_word_bits(ecl: ECLevel, mask: u8) -> [u8; 15] {
    let ec_bits: u32 = match ecl {
        ECLevel::L => 0b01,
        ECLevel::M => 0b00,
        ECLevel::Q => 0b11,
        ECLevel::H => 0b10,
    };
    let data5 = (ec_bits << 3) | mask as u32;
    let word = (data5 << 10) | bch_remainder(data5 << 10, 0x537, 10, 15);

    let mut bits = [0u8; 15];
    for (i, bit) in bits.iter_mut().enumerate() {
        *bit = ((word >> (14 - i)) & 1) as u8;
    }
    bits
}

// Builder
//------------------------------------------------------------------------------

pub struct QRBuilder {
    data: Vec<u8>,
    mode: Mode,
    version: Version,
    ecl: ECLevel,
    mask: MaskPattern,
}

impl QRBuilder {
    pub fn numeric(data: &[u8], version: u32, ecl: ECLevel, mask: u8) -> Self {
        Self::new(data, Mode::Numeric, version, ecl, mask)
    }

    pub fn alphanumeric(data: &[u8], version: u32, ecl: ECLevel, mask: u8) -> Self {
        Self::new(data, Mode::Alphanumeric, version, ecl, mask)
    }

    pub fn byte(data: &[u8], version: u32, ecl: ECLevel, mask: u8) -> Self {
        Self::new(data, Mode::Byte, version, ecl, mask)
    }

    fn new(data: &[u8], mode: Mode, version: u32, ecl: ECLevel, mask: u8) -> Self {
        Self {
            data: data.to_vec(),
            mode,
            version: Version::new(version).unwrap(),
            ecl,
            mask: MaskPattern::new(mask),
        }
    }

    pub fn version(&self) -> Version {
        self.version
    }

    // Module matrix, true = dark
    pub fn build_matrix(&self) -> Vec<bool> {
        let ver = self.version;
        let side = ver.width();
        let mut matrix = vec![false; (side * side) as usize];

        // Finder patterns; separators stay light
        for (fx, fy) in [(0, 0), (side - 7, 0), (0, side - 7)] {
            for dy in 0..7 {
                for dx in 0..7 {
                    let dark = dx == 0
                        || dx == 6
                        || dy == 0
                        || dy == 6
                        || ((2..=4).contains(&dx) && (2..=4).contains(&dy));
                    matrix[((fy + dy) * side + fx + dx) as usize] = dark;
                }
            }
        }

        // Timing patterns
        for i in 8..side - 8 {
            matrix[(6 * side + i) as usize] = i % 2 == 0;
            matrix[(i * side + 6) as usize] = i % 2 == 0;
        }

        // Alignment patterns, skipping the three finder corners
        let centers = alignment_centers(ver);
        for &cy in &centers {
            for &cx in &centers {
                if (cx == 6 && cy == 6)
                    || (cx == 6 && cy == side - 7)
                    || (cx == side - 7 && cy == 6)
                {
                    continue;
                }
                for dy in -2i32..=2 {
                    for dx in -2i32..=2 {
                        let dark = dx.abs() == 2 || dy.abs() == 2 || (dx == 0 && dy == 0);
                        let x = (cx as i32 + dx) as u32;
                        let y = (cy as i32 + dy) as u32;
                        matrix[(y * side + x) as usize] = dark;
                    }
                }
            }
        }

        // Dark module
        matrix[((side - 8) * side + 8) as usize] = true;

        self.place_format(&mut matrix, side);

        // Version information blocks
        if *ver >= 7 {
            let word = (*ver << 12) | bch_remainder(*ver << 12, 0x1F25, 12, 18);
            for i in 0..18 {
                let dark = (word >> i) & 1 == 1;
                let (bx, by) = (side - 11 + i % 3, i / 3);
                matrix[(by * side + bx) as usize] = dark;
                matrix[(bx * side + by) as usize] = dark;
            }
        }

        // Masked data modules, in the same order the reader walks them
        let codewords = self.encode_codewords();
        let mut bits = codewords
            .iter()
            .flat_map(|&cw| (0..8).rev().map(move |b| (cw >> b) & 1));
        for (x, y) in DataRegionIter::new(ver) {
            let bit = bits.next().unwrap_or(0);
            matrix[(y * side + x) as usize] = bit ^ self.mask.bit_at(x, y) == 1;
        }
        assert!(bits.next().is_none(), "Codewords exceed the data region");

        matrix
    }

    fn place_format(&self, matrix: &mut [bool], side: u32) {
        let format = format_word_bits(self.ecl, *self.mask);
        let masked: Vec<bool> =
            format.iter().zip(FORMAT_MASK).map(|(bit, mask)| bit ^ mask == 1).collect();

        // First copy, around the top-left finder
        let mut i = 0;
        for x in 0..9 {
            if x == 6 {
                continue;
            }
            matrix[(8 * side + x) as usize] = masked[i];
            i += 1;
        }
        for y in (0..8).rev() {
            if y == 6 {
                continue;
            }
            matrix[(y * side + 8) as usize] = masked[i];
            i += 1;
        }

        // Second copy, split across the other two finders
        let mut i = 0;
        for y in (side - 7..side).rev() {
            matrix[(y * side + 8) as usize] = masked[i];
            i += 1;
        }
        for x in side - 8..side {
            matrix[(8 * side + x) as usize] = masked[i];
            i += 1;
        }
    }

    fn encode_codewords(&self) -> Vec<u8> {
        let block_info = get_block_info(*self.version, self.ecl).unwrap();
        let data_capacity: usize = block_info.iter().map(|bi| bi.data_per as usize).sum();

        let mut bits = BitWriter::new();
        let mode_bits = match self.mode {
            Mode::Numeric => 0b0001,
            Mode::Alphanumeric => 0b0010,
            Mode::Byte => 0b0100,
        };
        bits.push_bits(mode_bits, 4);
        bits.push_bits(self.data.len() as u32, self.version.char_count_bits(self.mode) as usize);

        match self.mode {
            Mode::Numeric => {
                for chunk in self.data.chunks(3) {
                    let value: u32 =
                        std::str::from_utf8(chunk).unwrap().parse().expect("numeric data");
                    let size = match chunk.len() {
                        3 => 10,
                        2 => 7,
                        _ => 4,
                    };
                    bits.push_bits(value, size);
                }
            }
            Mode::Alphanumeric => {
                let value = |c: u8| {
                    ALPHANUMERIC_CHARSET.iter().position(|&a| a == c).expect("alphanumeric data")
                        as u32
                };
                for chunk in self.data.chunks(2) {
                    if let [a, b] = chunk {
                        bits.push_bits(value(*a) * 45 + value(*b), 11);
                    } else {
                        bits.push_bits(value(chunk[0]), 6);
                    }
                }
            }
            Mode::Byte => {
                for &byte in &self.data {
                    bits.push_bits(byte as u32, 8);
                }
            }
        }

        // Terminator, byte alignment, then alternating pad codewords
        let capacity = data_capacity * 8;
        assert!(bits.len() <= capacity, "Test payload too long for version");
        let terminator = (capacity - bits.len()).min(4);
        if terminator > 0 {
            bits.push_bits(0, terminator);
        }
        let partial = bits.len() % 8;
        if partial != 0 {
            bits.push_bits(0, 8 - partial);
        }
        let mut pad = [0xECu32, 0x11].into_iter().cycle();
        while bits.len() < capacity {
            bits.push_bits(pad.next().unwrap(), 8);
        }

        // Per-block split and parity
        let data_bytes = bits.data();
        let mut offset = 0;
        let mut data_blocks = Vec::new();
        let mut ec_blocks = Vec::new();
        for bi in &block_info {
            let chunk = &data_bytes[offset..offset + bi.data_per as usize];
            offset += bi.data_per as usize;
            ec_blocks.push(rs_encode(chunk, (bi.total_per - bi.data_per) as usize));
            data_blocks.push(chunk.to_vec());
        }

        // Interleave data rounds, then ec rounds
        let mut interleaved = Vec::new();
        let max_data = data_blocks.iter().map(Vec::len).max().unwrap();
        for round in 0..max_data {
            for block in &data_blocks {
                if round < block.len() {
                    interleaved.push(block[round]);
                }
            }
        }
        let max_ec = ec_blocks.iter().map(Vec::len).max().unwrap();
        for round in 0..max_ec {
            for block in &ec_blocks {
                if round < block.len() {
                    interleaved.push(block[round]);
                }
            }
        }

        interleaved
    }

    pub fn to_image(&self, scale: u32) -> GrayImage {
        render_matrix(&self.build_matrix(), self.version.width(), scale)
    }

    pub fn to_binary_image(&self, scale: u32) -> BinaryImage {
        let img = self.to_image(scale);
        let (w, h) = img.dimensions();
        BinaryImage::new(img.into_raw(), w, h)
    }

    pub fn to_qr_data(&self) -> QRData {
        Self::matrix_to_qr_data(&self.build_matrix(), *self.version)
    }

    pub fn matrix_to_qr_data(matrix: &[bool], version: u32) -> QRData {
        let ver = Version::new(version).unwrap();
        let cells = matrix.iter().map(|&dark| if dark { 0u8 } else { 1 }).collect();
        QRData::new(cells, ver.width(), ver)
    }
}

fn alignment_centers(ver: Version) -> Vec<u32> {
    let mut centers = vec![6u32];
    if *ver >= 2 {
        let loc = ver.alignment_location();
        let side = ver.width();
        let mut c = loc.start;
        while c <= side - 7 {
            centers.push(c);
            c += loc.step;
        }
    }
    centers
}

// Renders a module matrix at the given pixel scale with a four-module quiet
// zone, dark modules as 0 and light as 255
pub fn render_matrix(matrix: &[bool], side: u32, scale: u32) -> GrayImage {
    const QUIET: u32 = 4;
    let full = (side + 2 * QUIET) * scale;
    let mut img = GrayImage::from_pixel(full, full, image::Luma([255]));

    for y in 0..side {
        for x in 0..side {
            if !matrix[(y * side + x) as usize] {
                continue;
            }
            for py in 0..scale {
                for px in 0..scale {
                    img.put_pixel((QUIET + x) * scale + px, (QUIET + y) * scale + py, image::Luma([0]));
                }
            }
        }
    }

    img
}

#[cfg(test)]
mod testutil_tests {
    use super::{format_word_bits, rs_encode, BitWriter};
    use crate::ECLevel;

    #[test]
    fn test_bit_writer() {
        let mut bits = BitWriter::new();
        bits.push_bits(0b1101, 4);
        bits.push_bits(0b0010_0011, 8);
        bits.push_bits(0b0100, 4);
        assert_eq!(bits.data(), &[0b11010010, 0b00110100]);
        assert_eq!(bits.len(), 16);
    }

    #[test]
    fn test_format_word_matches_published_value() {
        // ISO 18004 gives 111011111000100 for level L, mask 0, after masking
        let bits = format_word_bits(ECLevel::L, 0);
        let word: u32 = bits.iter().fold(0, |acc, &b| (acc << 1) | b as u32);
        assert_eq!(word ^ 0x5412, 0b111011111000100);
    }

    #[test]
    fn test_rs_parity_matches_published_vector() {
        // The ISO 18004 example: "01234567" at version 1-M produces these ten
        // parity codewords
        let data = [
            0b00010000, 0b00100000, 0b00001100, 0b01010110, 0b01100001, 0b10000000, 0b11101100,
            0b00010001, 0b11101100, 0b00010001, 0b11101100, 0b00010001, 0b11101100, 0b00010001,
            0b11101100, 0b00010001,
        ];
        let parity = rs_encode(&data, 10);
        assert_eq!(parity, vec![0b10100101, 0b00100100, 0b11010100, 0b11000001, 0b11101101, 0b00110110, 0b11000111, 0b10000111, 0b00101100, 0b01010101]);
    }
}
