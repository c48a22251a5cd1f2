use super::block_info::BlockInfo;
use super::error::{QRError, QRResult};
use super::galois::{Gf4, Gf8, LOG4};

pub const MAX_BLOCK_SIZE: usize = 256;

// Block
//------------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Block {
    data: [u8; MAX_BLOCK_SIZE],
    // Block length
    len: usize,
    // Data length
    dlen: usize,
    // Correctable codewords
    ec_cap: usize,
}

impl Block {
    pub fn with_encoded(encoded: &[u8], info: &BlockInfo) -> Self {
        debug_assert_eq!(
            encoded.len(),
            info.total_per as usize,
            "Codeword count doesn't match block info"
        );

        let mut data = [0u8; MAX_BLOCK_SIZE];
        data[..encoded.len()].copy_from_slice(encoded);
        Self {
            data,
            len: encoded.len(),
            dlen: info.data_per as usize,
            ec_cap: info.ec_capacity as usize,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data[..self.dlen]
    }

    pub fn full(&self) -> &[u8] {
        &self.data[..self.len]
    }
}

// Rectifier
//------------------------------------------------------------------------------

impl Block {
    // Peterson-Gorenstein-Zierler correction in place. Returns the number of
    // corrected bit errors
    pub fn rectify(&mut self) -> QRResult<usize> {
        let synd = match self.syndromes() {
            Ok(()) => return Ok(0),
            Err(synd) => synd,
        };

        let locs = self.find_locations(&synd)?;
        let magnitudes = self.distances(&synd, &locs)?;

        let mut err_count = 0;
        for (loc, magnitude) in locs.iter().zip(&magnitudes) {
            err_count += magnitude.0.count_ones() as usize;
            let index = (self.len as i32 - 1 - *loc as i32).clamp(0, self.len as i32 - 1);
            self.data[index as usize] ^= magnitude.0;
        }

        match self.syndrome(Gf8::pow(0)).0 {
            0 => Ok(err_count),
            _ => Err(QRError::CorrectionFailed),
        }
    }

    fn syndromes(&self) -> Result<(), Vec<Gf8>> {
        let mut synd = vec![Gf8(0); self.ec_cap * 2];
        let mut all_fine = true;
        for (i, s) in synd.iter_mut().enumerate() {
            *s = self.syndrome(Gf8::pow(i));
            if s.0 != 0 {
                all_fine = false;
            }
        }

        if all_fine {
            Ok(())
        } else {
            Err(synd)
        }
    }

    // S = sum of c_k * base^k, codewords indexed from the low-order end
    fn syndrome(&self, base: Gf8) -> Gf8 {
        let mut synd = Gf8(0);
        let mut alpha = Gf8(1);
        for &codeword in self.full().iter().rev() {
            synd += alpha * Gf8(codeword);
            alpha = alpha * base;
        }
        synd
    }

    // Solves for the error locator polynomial and runs a Chien search over
    // the block's positions
    fn find_locations(&self, synd: &[Gf8]) -> QRResult<Vec<usize>> {
        let z = self.ec_cap;
        let mut eq = Vec::with_capacity(z);
        for i in 0..z {
            eq.push(synd[i..=z + i].to_vec());
        }

        let sigma = solve(eq).ok_or(QRError::SigmaFailed)?;

        let mut locs = Vec::new();
        for i in 0..=self.len {
            let exp = Gf8::pow(i);
            let mut x = exp;
            let mut check = sigma[0];
            for &coeff in &sigma[1..] {
                check += x * coeff;
                x = x * exp;
            }
            check += x;
            if check.0 == 0 {
                locs.push(i);
            }
        }

        Ok(locs)
    }

    fn distances(&self, synd: &[Gf8], locs: &[usize]) -> QRResult<Vec<Gf8>> {
        if locs.is_empty() {
            return Err(QRError::DistancesFailed);
        }

        let mut eq = Vec::with_capacity(locs.len());
        for i in 0..locs.len() {
            let mut row: Vec<Gf8> = locs.iter().map(|&loc| Gf8::pow(i * loc)).collect();
            row.push(synd[i]);
            eq.push(row);
        }

        solve(eq).ok_or(QRError::DistancesFailed)
    }
}

// Gaussian elimination
//------------------------------------------------------------------------------

// Solves an augmented system over GF(2^8) with partial pivoting. A pivotless
// column becomes a free variable fixed at zero; an inconsistent row fails the
// whole system. Rank-deficient but consistent systems are expected whenever a
// block carries fewer errors than its capacity.
fn solve(mut eq: Vec<Vec<Gf8>>) -> Option<Vec<Gf8>> {
    let rows = eq.len();
    if rows == 0 {
        return None;
    }
    let cols = eq[0].len();

    for i in 0..rows {
        let pivot_row = match (i..rows).find(|&r| eq[r][i].0 != 0) {
            Some(r) => r,
            None => continue,
        };
        eq.swap(i, pivot_row);

        let pivot = eq[i][i];
        for k in i..cols {
            eq[i][k] = eq[i][k] / pivot;
        }

        for j in i + 1..rows {
            let factor = eq[j][i];
            if factor.0 == 0 {
                continue;
            }
            for k in i..cols {
                let scaled = factor * eq[i][k];
                eq[j][k] += scaled;
            }
        }
    }

    let mut solution = vec![Gf8(0); rows];
    for i in (0..rows).rev() {
        let mut val = eq[i][cols - 1];
        for j in i + 1..rows {
            val += eq[i][j] * solution[j];
        }
        if eq[i][i].0 == 0 {
            if val.0 != 0 {
                return None;
            }
        } else {
            solution[i] = val;
        }
    }

    Some(solution)
}

// Rectifier for the 15-bit format word
//------------------------------------------------------------------------------

// BCH(15, 5) over GF(2^4). Syndromes s1, s3, s5 feed the closed-form error
// locator for up to three bit errors; even syndromes follow from squaring.
pub fn rectify_format(format: &mut [u8; 15]) -> QRResult<()> {
    let s1 = format_syndrome(format, 1);
    if s1.0 == 0 {
        return Ok(());
    }

    let s2 = s1 * s1;
    let s4 = s2 * s2;
    let s3 = format_syndrome(format, 3);
    let s5 = format_syndrome(format, 5);

    let sigma1 = s1;
    let sigma2 = (s5 + s4 * sigma1 + s2 * (s3 + s2 * sigma1)) / (s3 + s1 * s2);
    let sigma3 = s3 + s2 * sigma1 + s1 * sigma2;

    for i in 0..16u8 {
        let x = Gf4(i);
        let check = sigma3 + sigma2 * x + sigma1 * x * x + x * x * x;
        if check.0 == 0 {
            let log = LOG4[i as usize];
            if log != 0 {
                format[14 - log as usize] ^= 1;
            }
        }
    }

    match format_syndrome(format, 1).0 {
        0 => Ok(()),
        _ => Err(QRError::FormatCorrupted),
    }
}

fn format_syndrome(format: &[u8; 15], power: usize) -> Gf4 {
    let mut synd = Gf4(0);
    for (i, &bit) in format.iter().rev().enumerate() {
        synd += Gf4(bit) * Gf4::pow(power * i);
    }
    synd
}


#[cfg(test)]
mod format_rectifier_tests {
    use test_case::test_case;

    use super::rectify_format;
    use crate::common::error::QRError;
    use crate::testutil::format_word_bits;

    #[test]
    fn test_clean_word() {
        let mut format = format_word_bits(crate::ECLevel::L, 0);
        let expected = format;
        assert_eq!(rectify_format(&mut format), Ok(()));
        assert_eq!(format, expected);
    }

    #[test_case(&[3]; "single error")]
    #[test_case(&[1, 9]; "double error")]
    #[test_case(&[2, 7, 13]; "triple error")]
    #[test_case(&[14]; "error in the high bit")]
    fn test_corrects_bit_errors(positions: &[usize]) {
        for ecl in [crate::ECLevel::L, crate::ECLevel::M, crate::ECLevel::Q, crate::ECLevel::H] {
            for mask in 0..8 {
                let expected = format_word_bits(ecl, mask);
                let mut format = expected;
                for &pos in positions {
                    format[14 - pos] ^= 1;
                }
                assert_eq!(rectify_format(&mut format), Ok(()), "{ecl:?} mask {mask}");
                assert_eq!(format, expected, "{ecl:?} mask {mask} positions {positions:?}");
            }
        }
    }

    #[test]
    fn test_error_at_position_zero_is_refused() {
        // The Chien root for position 0 shares its log with the zero sentinel
        // and is skipped; the recheck must then flag the word
        let mut format = format_word_bits(crate::ECLevel::M, 5);
        format[14] ^= 1;
        assert_eq!(rectify_format(&mut format), Err(QRError::FormatCorrupted));
    }
}
