use std::ops::Deref;

use super::codec::Mode;
use super::error::{QRError, QRResult};

// Error correction level
//------------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum ECLevel {
    L = 0,
    M = 1,
    Q = 2,
    H = 3,
}

impl ECLevel {
    // ISO 18004 Table 12. The 2-bit encoding is deliberately non-monotone
    pub fn from_format_bits(bits: u8) -> QRResult<Self> {
        match bits {
            0b01 => Ok(Self::L),
            0b00 => Ok(Self::M),
            0b11 => Ok(Self::Q),
            0b10 => Ok(Self::H),
            _ => Err(QRError::InvalidECLevel),
        }
    }
}

// Version
//------------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub struct Version(u32);

impl Version {
    pub fn new(version: u32) -> QRResult<Self> {
        if (1..=40).contains(&version) {
            Ok(Self(version))
        } else {
            Err(QRError::UnsupportedVersion)
        }
    }

    // Modules per side
    pub const fn width(self) -> u32 {
        4 * self.0 + 17
    }

    pub(crate) fn alignment_location(self) -> AlignmentLocation {
        let (start, step) = ALIGNMENT_LOCATIONS[self.0 as usize - 1];
        AlignmentLocation { start, step }
    }

    pub(crate) fn char_count_bits(self, mode: Mode) -> u8 {
        match self.0 {
            1..=9 => match mode {
                Mode::Numeric => 10,
                Mode::Alphanumeric => 9,
                Mode::Byte => 8,
            },
            10..=26 => match mode {
                Mode::Numeric => 12,
                Mode::Alphanumeric => 11,
                Mode::Byte => 16,
            },
            _ => match mode {
                Mode::Numeric => 14,
                Mode::Alphanumeric => 13,
                Mode::Byte => 16,
            },
        }
    }
}

impl Deref for Version {
    type Target = u32;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

// Alignment pattern locations
//------------------------------------------------------------------------------

// Coordinate of the first alignment pattern center past the top-left finder
// and the spacing to the next. Version 1 has no alignment patterns and
// versions 2-6 only one; the 1000 sentinel keeps the predicate total without
// special cases.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub struct AlignmentLocation {
    pub start: u32,
    pub step: u32,
}

impl AlignmentLocation {
    // Whether a row/column coordinate falls within a 5-module alignment strip
    pub fn covers(&self, coord: u32) -> bool {
        // The strip around the center on row/column 6
        if coord >= 4 && coord - 4 <= 4 {
            return true;
        }

        if coord < self.start - 2 {
            return false;
        }

        (coord - (self.start - 2)) % self.step <= 4
    }
}

static ALIGNMENT_LOCATIONS: [(u32, u32); 40] = [
    (1000, 1000), (18, 1000), (22, 1000), (26, 1000), (30, 1000), (34, 1000), (22, 16), (24, 18),
    (26, 20), (28, 22), (30, 24), (32, 26), (34, 28), (26, 20), (26, 22), (26, 24),
    (30, 24), (30, 26), (30, 28), (34, 28), (28, 22), (26, 24), (30, 24), (28, 26),
    (32, 26), (30, 28), (34, 28), (26, 24), (30, 24), (26, 26), (30, 26), (34, 26),
    (30, 28), (34, 28), (30, 24), (24, 26), (28, 26), (32, 26), (26, 28), (30, 28),
];

#[cfg(test)]
mod metadata_tests {
    use test_case::test_case;

    use super::{ECLevel, Version};
    use crate::common::error::QRError;

    #[test]
    fn test_version_bounds() {
        assert_eq!(Version::new(0), Err(QRError::UnsupportedVersion));
        assert_eq!(Version::new(41), Err(QRError::UnsupportedVersion));
        assert_eq!(Version::new(1).unwrap().width(), 21);
        assert_eq!(Version::new(40).unwrap().width(), 177);
    }

    #[test]
    fn test_ec_level_mapping() {
        assert_eq!(ECLevel::from_format_bits(0b01), Ok(ECLevel::L));
        assert_eq!(ECLevel::from_format_bits(0b00), Ok(ECLevel::M));
        assert_eq!(ECLevel::from_format_bits(0b11), Ok(ECLevel::Q));
        assert_eq!(ECLevel::from_format_bits(0b10), Ok(ECLevel::H));
        assert_eq!(ECLevel::from_format_bits(0b100), Err(QRError::InvalidECLevel));
    }

    #[test]
    fn test_alignment_location_v1_never_covers() {
        let loc = Version::new(1).unwrap().alignment_location();
        for coord in 0..Version::new(1).unwrap().width() {
            assert!(!loc.covers(coord), "Version 1 has no alignment patterns");
        }
    }

    #[test_case(2, &[18])]
    #[test_case(6, &[34])]
    #[test_case(7, &[22, 38])]
    #[test_case(14, &[26, 46, 66])]
    #[test_case(40, &[30, 58, 86, 114, 142, 170])]
    fn test_alignment_strips(version: u32, centers: &[u32]) {
        let ver = Version::new(version).unwrap();
        let loc = ver.alignment_location();

        for coord in 0..ver.width() {
            let in_strip = (coord >= 4 && coord <= 8)
                || centers.iter().any(|&c| coord + 2 >= c && coord <= c + 2);
            assert_eq!(loc.covers(coord), in_strip, "Version {version}, coord {coord}");
        }

        // The last center always sits seven modules from the far edge
        assert_eq!(*centers.last().unwrap(), ver.width() - 7);
    }
}
