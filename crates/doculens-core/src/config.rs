//! Core configuration.
//!
//! One immutable [`CoreConfig`] is constructed at process start and injected
//! into each component; there are no ambient globals. Every field has a
//! default matching the production constants, and tests override individual
//! fields through plain struct update syntax.

use std::time::Duration;

/// Tunables for the whole task pipeline.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Quality-gate thresholds.
    pub gate: GateConfig,
    /// Retry envelope for the analysis stage.
    pub retry: RetryPolicy,
    /// Per-attempt wall-clock limits.
    pub limits: TimeLimits,
    /// Lifetime of a terminal result in the store (default: 30 minutes).
    pub result_ttl: Duration,
    /// How often the store sweeps expired results (default: 60 s).
    pub sweep_interval: Duration,
    /// Bounded submission-queue capacity (default: 64).
    pub queue_capacity: usize,
    /// Number of pool workers consuming the queue (default: 4).
    pub worker_count: usize,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            gate: GateConfig::default(),
            retry: RetryPolicy::default(),
            limits: TimeLimits::default(),
            result_ttl: Duration::from_secs(1800),
            sweep_interval: Duration::from_secs(60),
            queue_capacity: 64,
            worker_count: 4,
        }
    }
}

/// Thresholds for the deterministic image quality gate.
///
/// All three rejection checks compare a metric computed over the grayscale
/// image against one of these values; tests override them freely.
#[derive(Debug, Clone)]
pub struct GateConfig {
    /// Minimum Laplacian-response variance; below this the image is `blur`.
    pub blur_threshold: f64,
    /// Maximum fraction of near-saturated pixels; above this the image is `glare`.
    pub glare_ratio: f64,
    /// Pixel luminance at or above which a pixel counts as near-saturated.
    pub glare_pixel_min: u8,
    /// Minimum mean luminance; below this the image is `dark`.
    pub dark_threshold: f64,
    /// JPEG quality used when re-encoding the corrected image.
    pub jpeg_quality: u8,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            blur_threshold: 100.0,
            glare_ratio: 0.01,
            glare_pixel_min: 220,
            dark_threshold: 80.0,
            jpeg_quality: 90,
        }
    }
}

/// Retry envelope applied around the analysis stage.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first (default: 3).
    pub max_attempts: u32,
    /// Fixed delay between attempts (default: 60 s).
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay: Duration::from_secs(60),
        }
    }
}

/// Per-attempt wall-clock limits.
///
/// Invariant: `hard > soft`. The soft limit lets an attempt fail gracefully
/// with a timeout-class error; the hard limit aborts the attempt future
/// outright. Both kinds of expiry count against the same retry budget.
#[derive(Debug, Clone)]
pub struct TimeLimits {
    /// Graceful-abort threshold for the analysis call (default: 240 s).
    pub soft: Duration,
    /// Forced-kill threshold for the whole attempt (default: 300 s).
    pub hard: Duration,
}

impl Default for TimeLimits {
    fn default() -> Self {
        Self {
            soft: Duration::from_secs(240),
            hard: Duration::from_secs(300),
        }
    }
}
