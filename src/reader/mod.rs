pub mod binarize;
pub mod detect;
pub mod extract;
pub mod symbol;
pub mod utils;

use image::{GenericImageView, Pixel as ImgPixel};

use crate::common::block_info::get_block_info;
use crate::common::codec;
use crate::common::ec::Block;
use crate::common::error::{QRError, QRResult};
use crate::debug_println;
use binarize::{BinaryImage, BlockedMean};
use symbol::QRData;

// Reader
//------------------------------------------------------------------------------

pub struct QRReader;

impl QRReader {
    /// Decodes every QR symbol in the image and returns their payloads in
    /// detection order. Fails only when no symbol location is found at all;
    /// symbols that fail extraction or decoding are dropped.
    pub fn decode<I>(img: &I) -> QRResult<Vec<Vec<u8>>>
    where
        I: GenericImageView,
        I::Pixel: ImgPixel<Subpixel = u8>,
    {
        let decoded = Self::decode_with_error_counts(img)?;
        Ok(decoded.into_iter().map(|(payload, _)| payload).collect())
    }

    /// Like decode, but each payload comes with the number of bit errors the
    /// Reed-Solomon stage corrected for that symbol
    pub fn decode_with_error_counts<I>(img: &I) -> QRResult<Vec<(Vec<u8>, usize)>>
    where
        I: GenericImageView,
        I::Pixel: ImgPixel<Subpixel = u8>,
    {
        debug_println!("Preparing image...");
        let prepared = BlockedMean::new(3, 7).prepare(img);

        Self::decode_prepared(&prepared)
    }

    /// Entry point for embedders that binarize themselves
    pub fn decode_prepared(img: &BinaryImage) -> QRResult<Vec<(Vec<u8>, usize)>> {
        debug_println!("Locating finders...");
        let finders = detect::locate_finders(img);

        debug_println!("Combining {} finders...", finders.len());
        let locations = detect::group_finders(&finders);

        if locations.is_empty() {
            return Err(QRError::NoSymbolsFound);
        }

        let mut decoded = Vec::new();
        for location in &locations {
            debug_println!("Extracting symbol at {:?}...", location.top_left);
            let data = match extract::extract(img, location) {
                Ok(data) => data,
                Err(_) => continue,
            };

            debug_println!("Decoding symbol...");
            match decode_symbol(&data) {
                Ok(result) => decoded.push(result),
                Err(_) => continue,
            }
        }

        Ok(decoded)
    }
}

// Per-symbol pipeline: format, codeword blocks, correction, data
fn decode_symbol(data: &QRData) -> QRResult<(Vec<u8>, usize)> {
    let (ecl, mask) = symbol::read_format(data)?;
    let blocks = symbol::read_codewords(data, ecl, mask)?;
    let block_info = get_block_info(*data.version, ecl)?;

    let mut payload = Vec::new();
    let mut err_count = 0;
    for (raw, info) in blocks.iter().zip(&block_info) {
        let mut block = Block::with_encoded(raw, info);
        err_count += block.rectify()?;
        payload.extend_from_slice(block.data());
    }

    codec::decode(&payload, data.version).map(|decoded| (decoded, err_count))
}
