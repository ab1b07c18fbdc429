//! Scalar quality metrics over a grayscale image.

use image::GrayImage;

/// Variance of the 3×3 Laplacian response; a standard sharpness proxy.
/// A crisp image has strong edge responses everywhere, a blurred one does not.
pub(crate) fn laplacian_variance(gray: &GrayImage) -> f64 {
    let (width, height) = gray.dimensions();
    if width < 3 || height < 3 {
        return 0.0;
    }

    let n = ((width - 2) as f64) * ((height - 2) as f64);
    let mut sum = 0.0;
    let mut sum_sq = 0.0;
    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let center = gray.get_pixel(x, y)[0] as f64;
            let response = gray.get_pixel(x - 1, y)[0] as f64
                + gray.get_pixel(x + 1, y)[0] as f64
                + gray.get_pixel(x, y - 1)[0] as f64
                + gray.get_pixel(x, y + 1)[0] as f64
                - 4.0 * center;
            sum += response;
            sum_sq += response * response;
        }
    }
    let mean = sum / n;
    sum_sq / n - mean * mean
}

/// Fraction of pixels at or above `cutoff` luminance.
pub(crate) fn bright_fraction(gray: &GrayImage, cutoff: u8) -> f64 {
    let total = gray.pixels().len() as f64;
    let bright = gray.pixels().filter(|p| p[0] >= cutoff).count() as f64;
    bright / total
}

/// Mean luminance over the whole frame.
pub(crate) fn mean_luminance(gray: &GrayImage) -> f64 {
    let total = gray.pixels().len() as f64;
    let sum: f64 = gray.pixels().map(|p| p[0] as f64).sum();
    sum / total
}
