//! Deterministic image quality gate.
//!
//! Runs a fixed sequence of checks against a raw upload before the expensive
//! analysis call: blur, glare, darkness, then document detection + deskew.
//! The first failing check rejects the image with its reason; a passing image
//! comes back re-encoded as JPEG, perspective-corrected when a document
//! quadrilateral was found. Pure function over bytes — no storage side
//! effects.

mod deskew;
mod metrics;

use image::RgbImage;
use thiserror::Error;
use tracing::debug;

use crate::config::GateConfig;
use crate::runtime::types::RejectReason;

/// Why the gate refused to produce a corrected image.
#[derive(Debug, Clone, Error)]
pub enum GateError {
    /// One of the quality checks failed; carries the matching reason.
    #[error("{0}")]
    Rejected(RejectReason),

    /// The bytes do not decode as an image at all.
    #[error("undecodable image: {0}")]
    Unreadable(String),
}

/// The gate itself; cheap to clone, holds only thresholds.
#[derive(Debug, Clone)]
pub struct QualityGate {
    config: GateConfig,
}

impl QualityGate {
    pub fn new(config: GateConfig) -> Self {
        Self { config }
    }

    /// Check the raw image and return corrected JPEG bytes, or the first
    /// failing reason.
    ///
    /// Check order is fixed and short-circuits: blur, glare, darkness,
    /// deskew. Failing to *find* a document is not a rejection — the image
    /// passes through unrectified.
    pub fn gate(&self, raw: &[u8]) -> Result<Vec<u8>, GateError> {
        let img = image::load_from_memory(raw)
            .map_err(|e| GateError::Unreadable(e.to_string()))?;
        let gray = img.to_luma8();

        let sharpness = metrics::laplacian_variance(&gray);
        if sharpness < self.config.blur_threshold {
            debug!(sharpness, threshold = self.config.blur_threshold, "rejected: blur");
            return Err(GateError::Rejected(RejectReason::Blur));
        }

        let glare = metrics::bright_fraction(&gray, self.config.glare_pixel_min);
        if glare > self.config.glare_ratio {
            debug!(glare, threshold = self.config.glare_ratio, "rejected: glare");
            return Err(GateError::Rejected(RejectReason::Glare));
        }

        let luminance = metrics::mean_luminance(&gray);
        if luminance < self.config.dark_threshold {
            debug!(luminance, threshold = self.config.dark_threshold, "rejected: dark");
            return Err(GateError::Rejected(RejectReason::Dark));
        }

        let rgb = img.to_rgb8();
        let corrected = match deskew::find_document_quad(&gray) {
            Some(quad) => {
                debug!(?quad, "document quad found; rectifying");
                deskew::rectify(&rgb, &quad)
            }
            None => rgb,
        };

        encode_jpeg(&corrected, self.config.jpeg_quality)
    }
}

fn encode_jpeg(img: &RgbImage, quality: u8) -> Result<Vec<u8>, GateError> {
    let mut out = Vec::new();
    let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, quality);
    encoder
        .encode_image(img)
        .map_err(|e| GateError::Unreadable(format!("jpeg encode failed: {e}")))?;
    Ok(out)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
