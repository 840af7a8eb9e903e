//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gate.
//! All types derive Serde traits for deserialization from config files, and
//! every field has a default so an empty file is a valid configuration.

use serde::{Deserialize, Serialize};

/// Root configuration for the upload gate.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GateConfig {
    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Per-endpoint token bucket settings.
    pub rate_limit: RateLimitConfig,

    /// Long-horizon abuse detection.
    pub suspicious: SuspiciousConfig,

    /// Eviction of idle identifiers from the rate limit and abuse maps.
    pub eviction: EvictionConfig,

    /// Upload batch policy.
    pub upload: UploadConfig,

    /// Conversion defaults.
    pub conversion: ConversionConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    pub security: SecurityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            tls: None,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 60 }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Requests allowed per window on the compress endpoint.
    pub compress_limit: u32,

    /// Window over which the compress bucket refills, in milliseconds.
    pub compress_window_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            compress_limit: 3,
            compress_window_ms: 60_000,
        }
    }
}

/// Suspicious activity detection.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SuspiciousConfig {
    pub enabled: bool,

    /// Window in which exceeding `threshold` flags a client, in milliseconds.
    pub detection_window_ms: u64,

    /// Requests allowed within the detection window.
    pub threshold: u64,

    /// Age after which a client's counter starts over, in milliseconds.
    /// Must be longer than the detection window.
    pub reset_horizon_ms: u64,
}

impl Default for SuspiciousConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            detection_window_ms: 300_000,
            threshold: 10,
            reset_horizon_ms: 3_600_000,
        }
    }
}

/// Eviction of tracked identifiers. Disabled by default: identifiers are kept
/// for the life of the process.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct EvictionConfig {
    pub enabled: bool,

    /// Drop identifiers idle for longer than this many seconds.
    pub idle_ttl_secs: Option<u64>,

    /// Cap on tracked identifiers per map; least recently used go first.
    pub max_entries: Option<usize>,

    /// How often the idle sweep runs, in seconds.
    pub sweep_interval_secs: Option<u64>,
}

/// Upload batch policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Maximum files per request.
    pub max_files: usize,

    /// Maximum size of a single file in bytes. A batch may use twice this.
    pub max_file_size: u64,

    /// Maximum file name length in characters.
    pub max_name_len: usize,

    /// Accepted declared MIME types.
    pub allowed_types: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_files: 5,
            max_file_size: 30 * 1024 * 1024,
            max_name_len: 100,
            allowed_types: [
                "image/jpeg",
                "image/jpg",
                "image/png",
                "image/webp",
                "image/gif",
                "application/pdf",
                "application/msword",
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
                "text/plain",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

/// Conversion settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConversionConfig {
    /// Quality used when the request does not name one.
    pub default_quality: u8,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self { default_quality: 80 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Enable security headers.
    pub enable_headers: bool,

    /// Maximum request body size in bytes.
    pub max_body_size: usize,

    /// Client addresses that are always refused.
    pub blacklist: Vec<String>,

    /// Origins allowed to call the API cross-origin.
    pub allowed_origins: Vec<String>,

    /// Shortest `User-Agent` accepted on uploads.
    pub min_user_agent_len: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            enable_headers: true,
            max_body_size: 61 * 1024 * 1024, // two max-size files plus multipart overhead
            blacklist: Vec::new(),
            allowed_origins: vec!["http://localhost:3000".to_string()],
            min_user_agent_len: 10,
        }
    }
}
