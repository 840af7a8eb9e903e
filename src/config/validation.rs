//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (limits > 0, windows > 0)
//! - Check that the abuse reset horizon outlasts the detection window
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GateConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::GateConfig;
use crate::security::is_valid_ip;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Check a configuration, collecting every problem found.
pub fn validate_config(config: &GateConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be positive"));
    }

    if config.rate_limit.compress_limit == 0 {
        errors.push(ValidationError::new("rate_limit.compress_limit", "must be positive"));
    }
    if config.rate_limit.compress_window_ms == 0 {
        errors.push(ValidationError::new("rate_limit.compress_window_ms", "must be positive"));
    }

    let suspicious = &config.suspicious;
    if suspicious.detection_window_ms == 0 {
        errors.push(ValidationError::new("suspicious.detection_window_ms", "must be positive"));
    }
    if suspicious.reset_horizon_ms <= suspicious.detection_window_ms {
        errors.push(ValidationError::new(
            "suspicious.reset_horizon_ms",
            "must be longer than suspicious.detection_window_ms",
        ));
    }

    let eviction = &config.eviction;
    if eviction.enabled {
        if eviction.idle_ttl_secs.is_none() && eviction.max_entries.is_none() {
            errors.push(ValidationError::new(
                "eviction",
                "enabled but neither idle_ttl_secs nor max_entries is set",
            ));
        }
        if eviction.idle_ttl_secs == Some(0) {
            errors.push(ValidationError::new("eviction.idle_ttl_secs", "must be positive"));
        }
        if eviction.max_entries == Some(0) {
            errors.push(ValidationError::new("eviction.max_entries", "must be positive"));
        }
        if eviction.sweep_interval_secs == Some(0) {
            errors.push(ValidationError::new("eviction.sweep_interval_secs", "must be positive"));
        }
    }

    let upload = &config.upload;
    if upload.max_files == 0 {
        errors.push(ValidationError::new("upload.max_files", "must be positive"));
    }
    if upload.max_file_size == 0 {
        errors.push(ValidationError::new("upload.max_file_size", "must be positive"));
    }
    if upload.max_name_len == 0 {
        errors.push(ValidationError::new("upload.max_name_len", "must be positive"));
    }
    if upload.allowed_types.is_empty() {
        errors.push(ValidationError::new("upload.allowed_types", "must not be empty"));
    }

    if !(10..=100).contains(&config.conversion.default_quality) {
        errors.push(ValidationError::new(
            "conversion.default_quality",
            "must be between 10 and 100",
        ));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if (config.security.max_body_size as u64) < upload.max_file_size {
        errors.push(ValidationError::new(
            "security.max_body_size",
            "must be at least upload.max_file_size",
        ));
    }

    for entry in &config.security.blacklist {
        if !is_valid_ip(entry.trim()) {
            errors.push(ValidationError::new(
                "security.blacklist",
                format!("'{entry}' is not an IP address"),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(validate_config(&GateConfig::default()), Ok(()));
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = GateConfig::default();
        config.rate_limit.compress_limit = 0;
        config.upload.max_files = 0;
        config.listener.bind_address = "nowhere".into();

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec!["listener.bind_address", "rate_limit.compress_limit", "upload.max_files"]
        );
    }

    #[test]
    fn test_reset_horizon_must_outlast_detection_window() {
        let mut config = GateConfig::default();
        config.suspicious.reset_horizon_ms = config.suspicious.detection_window_ms;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "suspicious.reset_horizon_ms");
    }

    #[test]
    fn test_enabled_eviction_needs_a_bound() {
        let mut config = GateConfig::default();
        config.eviction.enabled = true;
        assert!(validate_config(&config).is_err());

        config.eviction.idle_ttl_secs = Some(600);
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_blacklist_entries_must_be_addresses() {
        let mut config = GateConfig::default();
        config.security.blacklist = vec!["2001:DB8:0:0::1".into(), "evil.example".into()];
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "security.blacklist");
        assert!(errors[0].message.contains("evil.example"));
    }
}
