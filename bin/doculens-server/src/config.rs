//! Server configuration, loaded from environment variables at startup.

use std::path::PathBuf;
use std::time::Duration;

use doculens_core::analysis::VisionConfig;
use doculens_core::{CoreConfig, GateConfig, RetryPolicy, TimeLimits};

/// Runtime configuration for doculens-server.
///
/// Every field except the API keys has a default so the server works
/// out-of-the-box; `DOCULENS_API_KEY` is mandatory because without it every
/// caller would be rejected (or worse, accepted).
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP address to bind (default: `"0.0.0.0:8000"`).
    pub bind_address: String,

    /// Static API key compared against the `X-API-Key` request header.
    pub api_key: String,

    /// Directory where uploads are spooled before the pipeline consumes them.
    pub spool_dir: PathBuf,

    /// Upload size cap in megabytes (default: 20).
    pub max_upload_size_mb: usize,

    /// `tracing` filter string, e.g. `"info"` or `"debug,tower_http=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,

    /// Expose Swagger UI at `/swagger-ui` (default: true; disable in
    /// production deployments that should not advertise the API surface).
    pub enable_swagger: bool,

    /// Comma-separated CORS origin allow-list; wildcard when unset.
    pub cors_allowed_origins: Option<String>,

    /// External vision-service connection settings.
    pub vision: VisionConfig,

    /// Task-pipeline tunables handed to doculens-core.
    pub core: CoreConfig,
}

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> anyhow::Result<Self> {
        let api_key = std::env::var("DOCULENS_API_KEY")
            .map_err(|_| anyhow::anyhow!("DOCULENS_API_KEY environment variable is not set"))?;

        let vision = VisionConfig {
            endpoint: env_or(
                "DOCULENS_VISION_ENDPOINT",
                "https://api.openai.com/v1/chat/completions",
            ),
            api_key: env_or("DOCULENS_VISION_API_KEY", ""),
            model: env_or("DOCULENS_VISION_MODEL", "gpt-4o"),
            request_timeout: secs_env("DOCULENS_VISION_TIMEOUT_SECS", 120),
            ..VisionConfig::default()
        };

        let defaults = CoreConfig::default();
        let core = CoreConfig {
            gate: GateConfig {
                blur_threshold: parse_env("DOCULENS_BLUR_THRESHOLD", 100.0),
                glare_ratio: parse_env("DOCULENS_GLARE_RATIO", 0.01),
                glare_pixel_min: parse_env("DOCULENS_GLARE_PIXEL_MIN", 220),
                dark_threshold: parse_env("DOCULENS_DARK_THRESHOLD", 80.0),
                ..defaults.gate
            },
            retry: RetryPolicy {
                max_attempts: parse_env("DOCULENS_MAX_ATTEMPTS", 3),
                retry_delay: secs_env("DOCULENS_RETRY_DELAY_SECS", 60),
            },
            limits: TimeLimits {
                soft: secs_env("DOCULENS_SOFT_LIMIT_SECS", 240),
                hard: secs_env("DOCULENS_HARD_LIMIT_SECS", 300),
            },
            result_ttl: secs_env("DOCULENS_RESULT_TTL_SECS", 1800),
            sweep_interval: secs_env("DOCULENS_SWEEP_INTERVAL_SECS", 60),
            queue_capacity: parse_env("DOCULENS_QUEUE_CAPACITY", 64),
            worker_count: parse_env("DOCULENS_WORKER_COUNT", 4),
        };
        anyhow::ensure!(
            core.limits.hard > core.limits.soft,
            "hard time limit must exceed the soft limit"
        );

        Ok(Self {
            bind_address: env_or("DOCULENS_BIND", "0.0.0.0:8000"),
            api_key,
            spool_dir: std::env::var("DOCULENS_SPOOL_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| std::env::temp_dir().join("doculens-spool")),
            max_upload_size_mb: parse_env("DOCULENS_MAX_UPLOAD_SIZE_MB", 20),
            log_level: env_or("DOCULENS_LOG", "info"),
            log_json: std::env::var("DOCULENS_LOG_JSON")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            enable_swagger: std::env::var("DOCULENS_ENABLE_SWAGGER")
                .map(|v| v != "0" && !v.eq_ignore_ascii_case("false"))
                .unwrap_or(true),
            cors_allowed_origins: std::env::var("DOCULENS_CORS_ORIGINS").ok(),
            vision,
            core,
        })
    }

    /// Minimal configuration for in-process tests (no env lookups).
    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self {
            bind_address: "127.0.0.1:0".to_owned(),
            api_key: "test-key".to_owned(),
            spool_dir: std::env::temp_dir().join("doculens-spool-test"),
            max_upload_size_mb: 20,
            log_level: "info".to_owned(),
            log_json: false,
            enable_swagger: false,
            cors_allowed_origins: None,
            vision: VisionConfig::default(),
            core: CoreConfig::default(),
        }
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn secs_env(key: &str, default: u64) -> Duration {
    Duration::from_secs(parse_env(key, default))
}
