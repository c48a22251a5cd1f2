use crate::common::metadata::Version;

use super::binarize::BinaryImage;
use super::utils::geometry::Point;

// Scans a prepared image line by line for the three finder patterns, refines
// each candidate vertically, horizontally and diagonally, then assembles
// triples of candidates into symbol locations.

// QR location
//------------------------------------------------------------------------------

// The three points are the centers of the finder patterns
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QRLocation {
    pub top_left: Point,
    pub top_right: Point,
    pub bottom_left: Point,
    pub module_size: f64,
    pub version: Version,
}

#[derive(Debug, Clone, Copy)]
pub struct QRFinderPosition {
    pub location: Point,
    pub module_size: f64,
    pub last_module_size: f64,
}

// Finder pattern window
//------------------------------------------------------------------------------

// Run lengths of the most recent color runs under the scanner. Slot 6 is the
// run still growing, slots 2..=5 the finished runs it is matched against, and
// slots 0..1 older history kept for the noise heuristic in slide.
#[derive(Debug, Default, Clone, Copy)]
struct QRFinderPattern([u32; 7]);

impl QRFinderPattern {
    fn slide(&mut self) {
        let runs = &mut self.0;

        // A new run far shorter than the one before it is scanner noise.
        // Swallow it: the previous run keeps growing and the older history
        // shifts up one slot.
        if (runs[6] as f64) < runs[5] as f64 / 10.0 && runs[4] != 0 {
            runs[6] += runs[5];
            runs[5] = runs[4];
            runs[4] = runs[3];
            runs[3] = runs[2];
            runs[2] = runs[1];
            runs[1] = runs[0];
            runs[0] = 0;
            return;
        }

        runs.rotate_left(1);
        runs[6] = 1;
    }

    fn estimate_module_size(&self) -> f64 {
        (self.0[2] + self.0[3] + self.0[4] + self.0[5] + self.0[6]) as f64 / 7.0
    }

    // The 1:1:3:1:1 ratio centered on the middle bar
    fn looks_like_finder(&self) -> bool {
        let runs = &self.0[2..=6];
        let total: u32 = runs.iter().sum();
        if total < 7 {
            return false;
        }

        let module_size = total as f64 / 7.0;
        let max_variance = module_size / 1.5;

        static RATIOS: [f64; 5] = [1.0, 1.0, 3.0, 1.0, 1.0];
        runs.iter()
            .zip(RATIOS)
            .all(|(&run, ratio)| (run as f64 - ratio * module_size).abs() <= max_variance)
    }
}

// Locate finders
//------------------------------------------------------------------------------

type Refine = fn(&BinaryImage, &Point, f64) -> Option<QRFinderPosition>;

// Candidates come from a horizontal scan, so the first confirmation pass runs
// vertically; the non-diagonal passes also re-center the candidate.
static REFINEMENTS: [(Refine, f64, f64, bool); 3] = [
    (refine_vertical, 0.0, 1.0, false),
    (refine_horizontal, 1.0, 0.0, false),
    (refine_diagonal, 1.0, 1.0, true),
];

pub fn locate_finders(img: &BinaryImage) -> Vec<QRFinderPosition> {
    let mut candidates: Vec<QRFinderPosition> = Vec::new();

    for y in 0..img.h {
        let mut last_pixel = 127;
        let mut pattern = QRFinderPattern::default();

        'pixels: for x in 0..img.w {
            let pixel = img.get(x as i64, y as i64);
            if pixel == last_pixel {
                pattern.0[6] += 1;
                // A pattern flush with the right edge never sees a closing
                // run, so probe it before the row ends
                if x != img.w - 1 {
                    continue;
                }
            }

            if !pattern.looks_like_finder() {
                last_pixel = pixel;
                pattern.slide();
                continue;
            }

            let mut module_size = pattern.estimate_module_size();
            let mut finder = Point::new(x as f64 - module_size * 3.5, y as f64);

            for candidate in &candidates {
                if finder.distance(&candidate.location) < 7.0 * module_size {
                    last_pixel = pixel;
                    pattern.slide();
                    continue 'pixels;
                }
            }

            for (refine, dx, dy, is_diagonal) in REFINEMENTS {
                let refined = match refine(img, &finder, module_size) {
                    Some(position) => position,
                    None => {
                        last_pixel = pixel;
                        pattern.slide();
                        continue 'pixels;
                    }
                };

                if !is_diagonal {
                    let half_finder = 3.5 * refined.last_module_size;
                    finder = Point::new(
                        refined.location.x - dx * half_finder,
                        refined.location.y - dy * half_finder,
                    );
                    module_size = refined.module_size;
                }
            }

            candidates.push(QRFinderPosition {
                location: finder,
                module_size,
                last_module_size: 0.0,
            });

            last_pixel = pixel;
            pattern.slide();
        }
    }

    candidates
}

fn refine_horizontal(
    img: &BinaryImage,
    finder: &Point,
    module_size: f64,
) -> Option<QRFinderPosition> {
    let start = (finder.x - 5.0 * module_size).max(0.0).round() as u32;
    let end = ((finder.x + 5.0 * module_size).round() as u32).min(img.w);
    let y = finder.y.round() as u32;

    refine(img, module_size, (start..end).map(move |x| (x, y)), false)
}

fn refine_vertical(
    img: &BinaryImage,
    finder: &Point,
    module_size: f64,
) -> Option<QRFinderPosition> {
    let start = (finder.y - 5.0 * module_size).max(0.0).round() as u32;
    let end = ((finder.y + 5.0 * module_size).round() as u32).min(img.h);
    let x = finder.x.round() as u32;

    refine(img, module_size, (start..end).map(move |y| (x, y)), false)
}

fn refine_diagonal(
    img: &BinaryImage,
    finder: &Point,
    module_size: f64,
) -> Option<QRFinderPosition> {
    let side = 5.0 * module_size;
    let (fx, fy) = (finder.x, finder.y);

    // Clamp the start against the image edges without leaving the diagonal
    // through the candidate
    let (mut start_x, mut start_y) = (0.0, 0.0);
    if fx < side && fy < side {
        if fx < fy {
            start_y = fy - fx;
        } else {
            start_x = fx - fy;
        }
    } else if fx < side {
        start_y = fy - fx;
    } else if fy < side {
        start_x = fx - fy;
    } else {
        start_x = fx - side;
        start_y = fy - side;
    }

    let end_x = ((fx + side).round() as u32).min(img.w);
    let end_y = ((fy + side).round() as u32).min(img.h);
    let coords = (start_x.round() as u32..end_x).zip(start_y.round() as u32..end_y);

    refine(img, module_size, coords, true)
}

fn refine(
    img: &BinaryImage,
    module_size: f64,
    coords: impl Iterator<Item = (u32, u32)>,
    is_diagonal: bool,
) -> Option<QRFinderPosition> {
    let mut last_pixel = 127;
    let mut pattern = QRFinderPattern::default();
    let mut last = (0u32, 0u32);

    let matches = |pattern: &QRFinderPattern| {
        pattern.looks_like_finder()
            && (is_diagonal || diff(module_size, pattern.estimate_module_size()) < 0.2)
    };

    for (x, y) in coords {
        let pixel = img.get(x as i64, y as i64);
        if pixel == last_pixel {
            pattern.0[6] += 1;
        } else if matches(&pattern) {
            let estimate = pattern.estimate_module_size();
            return Some(QRFinderPosition {
                location: Point::new(x as f64, y as f64),
                module_size: (module_size + estimate) / 2.0,
                last_module_size: estimate,
            });
        } else {
            last_pixel = pixel;
            pattern.slide();
        }
        last = (x, y);
    }

    if matches(&pattern) {
        let estimate = pattern.estimate_module_size();
        return Some(QRFinderPosition {
            location: Point::new(last.0 as f64, last.1 as f64),
            module_size: (module_size + estimate) / 2.0,
            last_module_size: estimate,
        });
    }

    None
}

// Combine finders
//------------------------------------------------------------------------------

pub fn group_finders(candidates: &[QRFinderPosition]) -> Vec<QRLocation> {
    let mut locations = Vec::new();

    for (i1, c1) in candidates.iter().enumerate() {
        for (i2, c2) in candidates.iter().enumerate().skip(i1 + 1) {
            if diff(c1.module_size, c2.module_size) > 0.1 {
                continue;
            }

            for c3 in candidates.iter().skip(i2 + 1) {
                if diff(c1.module_size, c3.module_size) > 0.1 {
                    continue;
                }

                if let Some(location) =
                    find_qr(&c1.location, &c2.location, &c3.location, c1.module_size)
                {
                    locations.push(location);
                }
            }
        }
    }

    locations
}

fn find_qr(a: &Point, b: &Point, c: &Point, module_size: f64) -> Option<QRLocation> {
    find_qr_internal(a, b, c, module_size)
        .or_else(|| find_qr_internal(b, a, c, module_size))
        .or_else(|| find_qr_internal(c, a, b, module_size))
}

// Treats the first point as the presumed top-left corner and checks that the
// other two sit at equal distance, perpendicular, and a plausible number of
// modules away
fn find_qr_internal(a: &Point, b: &Point, c: &Point, module_size: f64) -> Option<QRLocation> {
    let va = *b - *a;
    let vb = *c - *a;

    let cross = -(va.x * vb.y - va.y * vb.x);
    let len_a = va.x.hypot(va.y);
    let len_b = vb.x.hypot(vb.y);

    if diff(len_a, len_b) > 0.15 {
        return None;
    }

    let perpendicular = cross / len_a / len_b;
    if (perpendicular.abs() - 1.0).abs() > 0.05 {
        return None;
    }

    let mut dist = (a.distance(c) / module_size).round() as u32 + 7;
    if dist < 20 {
        return None;
    }

    // Snap to the nearest 17 + 4 * version
    match dist % 4 {
        0 => dist += 1,
        1 => (),
        2 => dist -= 1,
        _ => dist -= 2,
    }

    let version = Version::new((dist - 17) / 4).ok()?;

    Some(if perpendicular > 0.0 {
        QRLocation { top_left: *a, top_right: *c, bottom_left: *b, module_size, version }
    } else {
        QRLocation { top_left: *a, top_right: *b, bottom_left: *c, module_size, version }
    })
}

// Relative difference between two measurements
fn diff(a: f64, b: f64) -> f64 {
    if a > b {
        (a - b) / a
    } else {
        (b - a) / b
    }
}

#[cfg(test)]
mod detect_tests {
    use super::{diff, find_qr, group_finders, locate_finders, QRFinderPattern, QRFinderPosition};
    use crate::reader::utils::geometry::Point;
    use crate::testutil::QRBuilder;

    #[test]
    fn test_locate_rendered_symbol() {
        let builder = QRBuilder::numeric(b"0123456789", 2, crate::ECLevel::M, 4);
        let img = builder.to_binary_image(4);

        let finders = locate_finders(&img);
        let locations = group_finders(&finders);
        assert_eq!(locations.len(), 1);

        // Finder centers sit 18 modules apart at 4 pixels per module
        let location = &locations[0];
        assert_eq!(*location.version, 2);
        assert!((location.top_left.distance(&location.top_right) - 72.0).abs() < 2.0);
        assert!((location.top_left.distance(&location.bottom_left) - 72.0).abs() < 2.0);
        assert!((location.module_size - 4.0).abs() < 0.5);
    }

    #[test]
    fn test_looks_like_finder() {
        let pattern = QRFinderPattern([9, 9, 4, 4, 12, 4, 4]);
        assert!(pattern.looks_like_finder());

        // Middle bar too short
        let pattern = QRFinderPattern([0, 0, 4, 4, 6, 4, 4]);
        assert!(!pattern.looks_like_finder());

        // Middle bar too long
        let pattern = QRFinderPattern([0, 0, 4, 4, 20, 4, 4]);
        assert!(!pattern.looks_like_finder());

        // Too small overall
        let pattern = QRFinderPattern([0, 0, 1, 1, 2, 1, 1]);
        assert!(!pattern.looks_like_finder());
    }

    #[test]
    fn test_slide_rotates() {
        let mut pattern = QRFinderPattern([1, 2, 3, 4, 5, 6, 7]);
        pattern.slide();
        assert_eq!(pattern.0, [2, 3, 4, 5, 6, 7, 1]);
    }

    #[test]
    fn test_slide_swallows_noise_sliver() {
        // Current run of 1 against a previous run of 20 is a noise sliver
        let mut pattern = QRFinderPattern([2, 3, 4, 5, 6, 20, 1]);
        pattern.slide();
        assert_eq!(pattern.0, [0, 2, 3, 4, 5, 6, 21]);
    }

    #[test]
    fn test_diff() {
        assert_eq!(diff(10.0, 8.0), 0.2);
        assert_eq!(diff(8.0, 10.0), 0.2);
        assert_eq!(diff(5.0, 5.0), 0.0);
    }

    #[test]
    fn test_find_qr_right_angle_triple() {
        // Finder centers of an upright version 2 symbol, 4 pixels per module
        let tl = Point::new(100.0, 100.0);
        let tr = Point::new(172.0, 100.0);
        let bl = Point::new(100.0, 172.0);

        let location = find_qr(&tl, &bl, &tr, 4.0).expect("Triple should form a symbol");
        assert_eq!(location.top_left, tl);
        assert_eq!(location.top_right, tr);
        assert_eq!(location.bottom_left, bl);
        assert_eq!(*location.version, 2);
    }

    #[test]
    fn test_find_qr_rejects_collinear() {
        let a = Point::new(100.0, 100.0);
        let b = Point::new(172.0, 100.0);
        let c = Point::new(244.0, 100.0);
        assert!(find_qr(&a, &b, &c, 4.0).is_none());
    }

    #[test]
    fn test_find_qr_rejects_tiny_symbol() {
        // 10 modules between centers snaps below the version 1 distance
        let a = Point::new(100.0, 100.0);
        let b = Point::new(140.0, 100.0);
        let c = Point::new(100.0, 140.0);
        assert!(find_qr(&a, &b, &c, 4.0).is_none());
    }

    #[test]
    fn test_group_finders_rejects_module_size_mismatch() {
        let mk = |x, y, m| QRFinderPosition {
            location: Point::new(x, y),
            module_size: m,
            last_module_size: 0.0,
        };
        let candidates =
            [mk(100.0, 100.0, 4.0), mk(172.0, 100.0, 4.0), mk(100.0, 172.0, 5.0)];
        assert!(group_finders(&candidates).is_empty());

        let candidates =
            [mk(100.0, 100.0, 4.0), mk(172.0, 100.0, 4.0), mk(100.0, 172.0, 4.2)];
        assert_eq!(group_finders(&candidates).len(), 1);
    }
}
