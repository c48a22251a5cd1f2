use image::{GenericImageView, Pixel as ImgPixel};

// Binary image
//------------------------------------------------------------------------------

pub const DARK: u8 = 0;
pub const LIGHT: u8 = 255;

// Two-valued pixel grid, {0 = dark, 255 = light}, row major
#[derive(Debug, Clone)]
pub struct BinaryImage {
    data: Vec<u8>,
    pub w: u32,
    pub h: u32,
}

impl BinaryImage {
    pub fn new(data: Vec<u8>, w: u32, h: u32) -> Self {
        debug_assert_eq!(data.len(), (w * h) as usize, "Pixel buffer doesn't match dimensions");
        debug_assert!(data.iter().all(|&p| p == DARK || p == LIGHT), "Pixels must be 0 or 255");
        Self { data, w, h }
    }

    // Out-of-bounds reads count as light, the quiet zone around a symbol
    pub fn get(&self, x: i64, y: i64) -> u8 {
        if x < 0 || y < 0 || x >= self.w as i64 || y >= self.h as i64 {
            return LIGHT;
        }
        self.data[(y * self.w as i64 + x) as usize]
    }
}

// Blocked-mean thresholding
//------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default)]
struct Stat {
    total: u64,
    count: u64,
}

// Reduces an image to black/white with local thresholds:
// 1. Split the image into block_size x block_size blocks and accumulate each
//    block's grayscale total
// 2. Threshold for a block is the mean over the window of blocks around it
// 3. A pixel is light iff its gray value exceeds its block's threshold, with
//    shortcuts for blocks that are nearly all light or all dark
pub struct BlockedMean {
    block_size: u32,
    block_mean_size: u32,
}

impl BlockedMean {
    pub fn new(block_size: u32, block_mean_size: u32) -> Self {
        debug_assert!(block_size > 0 && block_mean_size % 2 == 1, "Mean window must be odd");
        Self { block_size, block_mean_size }
    }

    pub fn prepare<I>(&self, img: &I) -> BinaryImage
    where
        I: GenericImageView,
        I::Pixel: ImgPixel<Subpixel = u8>,
    {
        let (w, h) = img.dimensions();
        let mut gray = vec![0u8; (w * h) as usize];
        for y in 0..h {
            for x in 0..w {
                gray[(y * w + x) as usize] = img.get_pixel(x, y).to_luma()[0];
            }
        }

        let block_map = self.as_block_map(&gray, w, h);
        let block_mean_map = self.to_block_mean_map(&block_map, w, h);

        self.to_threshold(&gray, &block_mean_map, w, h)
    }

    fn block_coords(&self, x: u32, y: u32) -> (u32, u32) {
        (x / self.block_size, y / self.block_size)
    }

    fn as_block_map(&self, gray: &[u8], w: u32, h: u32) -> Vec<Stat> {
        let (bw, bh) = self.block_coords(w, h);
        let mut blocks = vec![Stat::default(); ((bw + 1) * (bh + 1)) as usize];

        for y in 0..h {
            for x in 0..w {
                let (bx, by) = self.block_coords(x, y);
                let stat = &mut blocks[(by * (bw + 1) + bx) as usize];
                stat.total += gray[(y * w + x) as usize] as u64;
                stat.count += 1;
            }
        }

        blocks
    }

    fn to_block_mean_map(&self, blocks: &[Stat], w: u32, h: u32) -> Vec<f64> {
        let stride = (self.block_mean_size - 1) / 2;
        let (bw, bh) = self.block_coords(w, h);
        let mut means = vec![0.0; ((bw + 1) * (bh + 1)) as usize];

        for by in 0..=bh {
            for bx in 0..=bw {
                let x_start = bx.saturating_sub(stride);
                let x_end = (bx + stride).min(bw);
                let y_start = by.saturating_sub(stride);
                let y_end = (by + stride).min(bh);

                let (mut total, mut count) = (0u64, 0u64);
                for x in x_start..=x_end {
                    for y in y_start..=y_end {
                        // Edge blocks carry fewer pixels, so sum the real
                        // counts instead of assuming full blocks
                        let stat = blocks[(y * (bw + 1) + x) as usize];
                        total += stat.total;
                        count += stat.count;
                    }
                }

                if count > 0 {
                    means[(by * (bw + 1) + bx) as usize] = total as f64 / count as f64;
                }
            }
        }

        means
    }

    fn to_threshold(&self, gray: &[u8], means: &[f64], w: u32, h: u32) -> BinaryImage {
        let (bw, _) = self.block_coords(w, h);
        let mut data = vec![DARK; (w * h) as usize];

        for y in 0..h {
            for x in 0..w {
                let (bx, by) = self.block_coords(x, y);
                let mean = means[(by * (bw + 1) + bx) as usize];
                let pixel = gray[(y * w + x) as usize] as f64;

                let light = mean > 250.0 || (mean >= 5.0 && pixel > mean);
                if light {
                    data[(y * w + x) as usize] = LIGHT;
                }
            }
        }

        BinaryImage::new(data, w, h)
    }
}

#[cfg(test)]
mod binarize_tests {
    use image::GrayImage;

    use super::{BlockedMean, DARK, LIGHT};

    #[test]
    fn test_uniform_images() {
        let white = GrayImage::from_pixel(32, 32, image::Luma([255]));
        let prepared = BlockedMean::new(3, 7).prepare(&white);
        assert!((0..32).all(|y| (0..32).all(|x| prepared.get(x, y) == LIGHT)));

        let black = GrayImage::from_pixel(32, 32, image::Luma([0]));
        let prepared = BlockedMean::new(3, 7).prepare(&black);
        assert!((0..32).all(|y| (0..32).all(|x| prepared.get(x, y) == DARK)));
    }

    #[test]
    fn test_high_contrast_split() {
        // Left half dark, right half light
        let img = GrayImage::from_fn(30, 30, |x, _| {
            if x < 15 {
                image::Luma([10])
            } else {
                image::Luma([240])
            }
        });
        let prepared = BlockedMean::new(3, 7).prepare(&img);
        assert_eq!(prepared.get(2, 15), DARK);
        // Near the boundary the window mixes both halves, so the threshold
        // lands between them
        assert_eq!(prepared.get(16, 15), LIGHT);
        assert_eq!(prepared.get(13, 15), DARK);
    }

    #[test]
    fn test_out_of_bounds_is_light() {
        let black = GrayImage::from_pixel(8, 8, image::Luma([0]));
        let prepared = BlockedMean::new(3, 7).prepare(&black);
        assert_eq!(prepared.get(-1, 0), LIGHT);
        assert_eq!(prepared.get(0, -1), LIGHT);
        assert_eq!(prepared.get(8, 0), LIGHT);
        assert_eq!(prepared.get(0, 8), LIGHT);
    }
}
