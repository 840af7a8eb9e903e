//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GateConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    ConversionConfig, EvictionConfig, GateConfig, ListenerConfig, LogFormat, ObservabilityConfig,
    RateLimitConfig, SecurityConfig, SuspiciousConfig, TimeoutConfig, TlsConfig, UploadConfig,
};
pub use validation::{validate_config, ValidationError};
