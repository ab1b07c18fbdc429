//! Document detection and perspective correction.
//!
//! Finds the bounding quadrilateral of the dominant bright region (the
//! document) via Otsu binarisation and corner extremes, then warps it to an
//! axis-aligned rectangle with a projective transform. Detection is
//! best-effort: when no plausible quad exists the caller passes the image
//! through unmodified.

use image::{GrayImage, Rgb, RgbImage};

/// Corners in fixed order: top-left, top-right, bottom-right, bottom-left.
pub(crate) type Quad = [(f32, f32); 4];

/// Fraction bounds a candidate quad must occupy relative to the frame.
/// Below the minimum it is noise; above the maximum the "document" is just
/// the frame itself and rectification would be a no-op crop.
const MIN_AREA_FRACTION: f64 = 0.05;
const MAX_AREA_FRACTION: f64 = 0.90;

/// Locate the document's bounding quadrilateral, if a plausible one exists.
pub(crate) fn find_document_quad(gray: &GrayImage) -> Option<Quad> {
    let threshold = otsu_threshold(gray);
    let (width, height) = gray.dimensions();

    // Corner extremes over the foreground mask: min/max of x+y pick the
    // top-left/bottom-right corners, min/max of x-y the remaining two.
    let mut tl = (0.0f32, 0.0f32);
    let mut tr = (0.0f32, 0.0f32);
    let mut br = (0.0f32, 0.0f32);
    let mut bl = (0.0f32, 0.0f32);
    let (mut min_sum, mut max_sum) = (i64::MAX, i64::MIN);
    let (mut min_diff, mut max_diff) = (i64::MAX, i64::MIN);
    let mut foreground = 0u64;

    for (x, y, pixel) in gray.enumerate_pixels() {
        if pixel[0] <= threshold {
            continue;
        }
        foreground += 1;
        let (xi, yi) = (x as i64, y as i64);
        if xi + yi < min_sum {
            min_sum = xi + yi;
            tl = (x as f32, y as f32);
        }
        if xi + yi > max_sum {
            max_sum = xi + yi;
            br = (x as f32, y as f32);
        }
        if xi - yi > max_diff {
            max_diff = xi - yi;
            tr = (x as f32, y as f32);
        }
        if xi - yi < min_diff {
            min_diff = xi - yi;
            bl = (x as f32, y as f32);
        }
    }

    let frame_area = (width as f64) * (height as f64);
    if (foreground as f64) < frame_area * MIN_AREA_FRACTION {
        return None;
    }

    let quad = [tl, tr, br, bl];
    let area = quad_area(&quad);
    if area < frame_area * MIN_AREA_FRACTION || area > frame_area * MAX_AREA_FRACTION {
        return None;
    }
    Some(quad)
}

/// Warp the quad region to an axis-aligned rectangle sized by the quad's
/// longer opposing edges.
pub(crate) fn rectify(src: &RgbImage, quad: &Quad) -> RgbImage {
    let [tl, tr, br, bl] = *quad;
    let width = distance(br, bl).max(distance(tr, tl)).round().max(1.0) as u32;
    let height = distance(tr, br).max(distance(tl, bl)).round().max(1.0) as u32;

    let dst: Quad = [
        (0.0, 0.0),
        ((width - 1) as f32, 0.0),
        ((width - 1) as f32, (height - 1) as f32),
        (0.0, (height - 1) as f32),
    ];

    // Map output coordinates back into the source quad and sample bilinearly.
    let Some(h) = homography(&dst, quad) else {
        // Degenerate quad; keep the original rather than producing garbage.
        return src.clone();
    };

    RgbImage::from_fn(width, height, |x, y| {
        let (u, v) = project(&h, x as f64, y as f64);
        sample_bilinear(src, u, v)
    })
}

// ── Geometry helpers ──────────────────────────────────────────────────────────

fn distance(a: (f32, f32), b: (f32, f32)) -> f32 {
    let dx = a.0 - b.0;
    let dy = a.1 - b.1;
    (dx * dx + dy * dy).sqrt()
}

/// Shoelace area of the (convex, ordered) quad.
fn quad_area(quad: &Quad) -> f64 {
    let mut acc = 0.0f64;
    for i in 0..4 {
        let (x0, y0) = quad[i];
        let (x1, y1) = quad[(i + 1) % 4];
        acc += (x0 as f64) * (y1 as f64) - (x1 as f64) * (y0 as f64);
    }
    acc.abs() / 2.0
}

/// Projective transform coefficients `[a..h]` with the ninth entry fixed at 1.
type Homography = [f64; 8];

/// Solve for the homography taking each `src[i]` to `dst[i]`.
///
/// Standard 8×8 linear system (two rows per point pair), solved by Gaussian
/// elimination with partial pivoting. Returns `None` for degenerate input.
fn homography(src: &Quad, dst: &Quad) -> Option<Homography> {
    let mut m = [[0.0f64; 9]; 8];
    for i in 0..4 {
        let (x, y) = (src[i].0 as f64, src[i].1 as f64);
        let (u, v) = (dst[i].0 as f64, dst[i].1 as f64);
        m[2 * i] = [x, y, 1.0, 0.0, 0.0, 0.0, -x * u, -y * u, u];
        m[2 * i + 1] = [0.0, 0.0, 0.0, x, y, 1.0, -x * v, -y * v, v];
    }

    for col in 0..8 {
        let pivot = (col..8).max_by(|&a, &b| {
            m[a][col]
                .abs()
                .partial_cmp(&m[b][col].abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        })?;
        if m[pivot][col].abs() < 1e-9 {
            return None;
        }
        m.swap(col, pivot);
        for row in 0..8 {
            if row == col {
                continue;
            }
            let factor = m[row][col] / m[col][col];
            for k in col..9 {
                m[row][k] -= factor * m[col][k];
            }
        }
    }

    let mut h = [0.0f64; 8];
    for i in 0..8 {
        h[i] = m[i][8] / m[i][i];
    }
    Some(h)
}

fn project(h: &Homography, x: f64, y: f64) -> (f64, f64) {
    let w = h[6] * x + h[7] * y + 1.0;
    let u = (h[0] * x + h[1] * y + h[2]) / w;
    let v = (h[3] * x + h[4] * y + h[5]) / w;
    (u, v)
}

fn sample_bilinear(src: &RgbImage, u: f64, v: f64) -> Rgb<u8> {
    let (width, height) = src.dimensions();
    if u < 0.0 || v < 0.0 || u > (width - 1) as f64 || v > (height - 1) as f64 {
        return Rgb([0, 0, 0]);
    }
    let x0 = u.floor() as u32;
    let y0 = v.floor() as u32;
    let x1 = (x0 + 1).min(width - 1);
    let y1 = (y0 + 1).min(height - 1);
    let fx = u - x0 as f64;
    let fy = v - y0 as f64;

    let mut out = [0u8; 3];
    for c in 0..3 {
        let p00 = src.get_pixel(x0, y0)[c] as f64;
        let p10 = src.get_pixel(x1, y0)[c] as f64;
        let p01 = src.get_pixel(x0, y1)[c] as f64;
        let p11 = src.get_pixel(x1, y1)[c] as f64;
        let top = p00 * (1.0 - fx) + p10 * fx;
        let bottom = p01 * (1.0 - fx) + p11 * fx;
        out[c] = (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8;
    }
    Rgb(out)
}

/// Otsu's threshold: maximises between-class variance over the histogram.
fn otsu_threshold(gray: &GrayImage) -> u8 {
    let mut histogram = [0u64; 256];
    for pixel in gray.pixels() {
        histogram[pixel[0] as usize] += 1;
    }
    let total: u64 = histogram.iter().sum();
    if total == 0 {
        return 0;
    }
    let weighted_total: f64 = histogram
        .iter()
        .enumerate()
        .map(|(v, &count)| (v as f64) * (count as f64))
        .sum();

    let mut best_threshold = 0u8;
    let mut best_variance = -1.0f64;
    let mut background_count = 0u64;
    let mut background_sum = 0.0f64;

    for threshold in 0..256usize {
        background_count += histogram[threshold];
        if background_count == 0 {
            continue;
        }
        let foreground_count = total - background_count;
        if foreground_count == 0 {
            break;
        }
        background_sum += (threshold as f64) * (histogram[threshold] as f64);

        let w0 = background_count as f64;
        let w1 = foreground_count as f64;
        let mean0 = background_sum / w0;
        let mean1 = (weighted_total - background_sum) / w1;
        let variance = w0 * w1 * (mean0 - mean1) * (mean0 - mean1);
        if variance > best_variance {
            best_variance = variance;
            best_threshold = threshold as u8;
        }
    }
    best_threshold
}
