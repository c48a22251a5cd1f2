use crate::common::error::{QRError, QRResult};

use super::binarize::{BinaryImage, DARK, LIGHT};
use super::detect::QRLocation;
use super::symbol::QRData;
use super::utils::geometry::Point;

// Perspective estimate
//------------------------------------------------------------------------------

// Module-sized steps across the grid. ddx bends dx a little per row once the
// bottom-right alignment pattern has been found; ddy stays zero.
#[derive(Debug, Clone, Copy)]
struct Perspective {
    dx: Point,
    ddx: Point,
    dy: Point,
    ddy: Point,
}

pub fn extract(img: &BinaryImage, loc: &QRLocation) -> QRResult<QRData> {
    let side = loc.version.width();
    let perspective = determine_perspective(img, side, loc)?;
    Ok(sample(img, side, loc, &perspective))
}

fn determine_perspective(
    img: &BinaryImage,
    side: u32,
    loc: &QRLocation,
) -> QRResult<Perspective> {
    let scale = (side - 7) as f64;
    let dx = (loc.top_right - loc.top_left) / scale;
    let dy = (loc.bottom_left - loc.top_left) / scale;

    if *loc.version == 1 {
        return Ok(Perspective { dx, ddx: Point::default(), dy, ddy: Point::default() });
    }

    // The bottom-right alignment pattern center, estimated from the top-right
    // finder along x and the bottom-left finder along y
    let offset = (side - 10) as f64;
    let origin_est = Point::new(
        (loc.top_right - dx * 3.0 + dy * offset).x,
        (loc.bottom_left + dx * offset - dy * 3.0).y,
    );

    let alignment =
        search_alignment(img, origin_est, &dx, &dy).ok_or(QRError::AlignmentNotFound)?;
    let refined = snap_to_stone(img, alignment);

    let delta = (refined - origin_est) / (offset * offset);
    Ok(Perspective { dx, ddx: delta, dy, ddy: Point::default() })
}

// Probes a widening grid of half-module offsets around the estimate, retrying
// each ring with slightly rescaled module steps
fn search_alignment(
    img: &BinaryImage,
    est: Point,
    dx: &Point,
    dy: &Point,
) -> Option<Point> {
    for i in 0..4i32 {
        for j in [0.0, 1.0, -1.0, 2.0, -2.0, 3.0] {
            let scale = 1.0 + j / 10.0;
            let (sdx, sdy) = (*dx * scale, *dy * scale);

            if i == 0 {
                if is_alignment(img, &est, &sdx, &sdy) {
                    return Some(est);
                }
                continue;
            }

            let half = i as f64 / 2.0;
            for x in -i..=i {
                let step = *dx * (x as f64 / 2.0);
                for trial in [est + step - *dy * half, est + step + *dy * half] {
                    if is_alignment(img, &trial, &sdx, &sdy) {
                        return Some(trial);
                    }
                }
            }
            for y in (-i + 1)..i {
                let step = *dy * (y as f64 / 2.0);
                for trial in [est - *dx * half + step, est + *dx * half + step] {
                    if is_alignment(img, &trial, &sdx, &sdy) {
                        return Some(trial);
                    }
                }
            }
        }
    }

    None
}

// The 5x5 alignment pattern reads 1:1:1:1:1 through its center: a dark outer
// ring, a light inner ring and a dark center module. Any out-of-bounds sample
// rejects the probe.
fn is_alignment(img: &BinaryImage, p: &Point, dx: &Point, dy: &Point) -> bool {
    let sample = |pt: Point| -> Option<u8> {
        let (x, y) = (pt.x.round() as i64, pt.y.round() as i64);
        if x < 0 || y < 0 || x >= img.w as i64 || y >= img.h as i64 {
            return None;
        }
        Some(img.get(x, y))
    };

    // Dark outer ring, two modules out
    for k in -2..=2i32 {
        let kf = k as f64;
        let ring = [
            *p + *dx * kf - *dy * 2.0,
            *p + *dx * kf + *dy * 2.0,
            *p - *dx * 2.0 + *dy * kf,
            *p + *dx * 2.0 + *dy * kf,
        ];
        if ring.into_iter().any(|pt| sample(pt) != Some(DARK)) {
            return false;
        }
    }

    // Light inner ring, one module out
    for (ex, ey) in [(-1, -1), (0, -1), (1, -1), (-1, 0), (1, 0), (-1, 1), (0, 1), (1, 1)] {
        let pt = *p + *dx * ex as f64 + *dy * ey as f64;
        if sample(pt) != Some(LIGHT) {
            return false;
        }
    }

    sample(*p) == Some(DARK)
}

// Scans from the trial center to the nearest light pixel on each side and
// takes the midpoints, centering on the stone to sub-module precision
fn snap_to_stone(img: &BinaryImage, alignment: Point) -> Point {
    let (ax, ay) = (alignment.x.round() as i64, alignment.y.round() as i64);

    let mut left = 0;
    let mut right = img.w as i64;
    for x in (0..=ax).rev() {
        if img.get(x, ay) == LIGHT {
            left = x;
            break;
        }
    }
    for x in ax..img.w as i64 {
        if img.get(x, ay) == LIGHT {
            right = x;
            break;
        }
    }
    let snapped_x = (left + right) as f64 / 2.0;

    let ax = snapped_x.round() as i64;
    let mut top = 0;
    let mut bottom = img.h as i64;
    for y in (0..=ay).rev() {
        if img.get(ax, y) == LIGHT {
            top = y;
            break;
        }
    }
    for y in ay..img.h as i64 {
        if img.get(ax, y) == LIGHT {
            bottom = y;
            break;
        }
    }

    Point::new(snapped_x, (top + bottom) as f64 / 2.0)
}

// Sampling
//------------------------------------------------------------------------------

fn sample(img: &BinaryImage, side: u32, loc: &QRLocation, p: &Perspective) -> QRData {
    let mut data = Vec::with_capacity((side * side) as usize);
    let mut dx = p.dx;
    let mut dy = p.dy;
    let mut start = loc.top_left - dy * 3.0 - p.ddy * 3.0;

    for _ in 0..side {
        let mut line = start - dx * 3.0;
        for _ in 0..side {
            let pixel = img.get(line.x.round() as i64, line.y.round() as i64);
            data.push(if pixel == DARK { 0 } else { 1 });
            line = line + dx;
        }
        dx = dx + p.ddx;
        start = start + dy;
        dy = dy + p.ddy;
    }

    QRData::new(data, side, loc.version)
}
