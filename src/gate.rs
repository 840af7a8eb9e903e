//! The admission and file-safety gate.
//!
//! [`SecurityGate`] bundles the shared state (rate limit registry, suspicious
//! activity tracker) with the static policy (blacklist, upload limits,
//! signatures). It is built once and handed to request handlers, so tests can
//! create isolated instances instead of sharing process globals.

use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::config::GateConfig;
use crate::error::{AdmissionDenied, FileRejection, GateError};
use crate::observability::metrics;
use crate::security::{
    EvictionPolicy, IpBlacklist, RateLimitDecision, RateLimitRegistry, SuspiciousActivityTracker,
    SuspiciousPolicy,
};
use crate::upload::{validate_file_upload, SignatureTable, UploadFile, UploadPolicy};

/// Token bucket parameters for one endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointLimit {
    pub limit: u32,
    pub window_ms: u64,
}

pub struct SecurityGate {
    rate_limits: RateLimitRegistry,
    suspicious: SuspiciousActivityTracker,
    blacklist: IpBlacklist,
    upload_policy: UploadPolicy,
    signatures: SignatureTable,
    rate_limit_enabled: bool,
    suspicious_enabled: bool,
}

impl SecurityGate {
    /// Build a gate from configuration using the system clock.
    pub fn from_config(config: &GateConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Build a gate from configuration reading time from `clock`.
    pub fn with_clock(config: &GateConfig, clock: Arc<dyn Clock>) -> Self {
        let eviction = EvictionPolicy::from(&config.eviction);
        Self {
            rate_limits: RateLimitRegistry::new(clock.clone(), eviction),
            suspicious: SuspiciousActivityTracker::new(
                clock,
                SuspiciousPolicy::from(&config.suspicious),
                eviction,
            ),
            blacklist: IpBlacklist::new(config.security.blacklist.iter().cloned()),
            upload_policy: UploadPolicy::from(&config.upload),
            signatures: SignatureTable::default(),
            rate_limit_enabled: config.rate_limit.enabled,
            suspicious_enabled: config.suspicious.enabled,
        }
    }

    /// Run the admission checks for `client` on `endpoint`.
    ///
    /// Order: blacklist, suspicious activity, then the endpoint's token bucket
    /// keyed by `"<endpoint>_<client>"`.
    pub fn admit(
        &self,
        endpoint: &str,
        client: &str,
        limit: EndpointLimit,
    ) -> Result<RateLimitDecision, GateError> {
        let result = self.check_admission(endpoint, client, limit);
        if let Err(err) = &result {
            tracing::info!(
                endpoint = %endpoint,
                client = %client,
                reason = err.reason(),
                "Request not admitted"
            );
            metrics::record_admission_denied(err.reason());
        }
        result
    }

    fn check_admission(
        &self,
        endpoint: &str,
        client: &str,
        limit: EndpointLimit,
    ) -> Result<RateLimitDecision, GateError> {
        if self.blacklist.is_blacklisted(client) {
            return Err(AdmissionDenied::Blacklisted.into());
        }

        if self.suspicious_enabled && self.suspicious.check_suspicious(client) {
            return Err(AdmissionDenied::SuspiciousActivity.into());
        }

        if !self.rate_limit_enabled {
            return Ok(RateLimitDecision {
                allowed: true,
                limit: limit.limit,
                remaining: limit.limit,
                reset_after: std::time::Duration::ZERO,
            });
        }

        let identifier = format!("{endpoint}_{client}");
        let decision = self
            .rate_limits
            .check(&identifier, limit.limit, limit.window_ms);
        if decision.allowed {
            Ok(decision)
        } else {
            let retry_after_secs = (limit.window_ms / 1000).max(1);
            Err(AdmissionDenied::RateLimited { retry_after_secs }.into())
        }
    }

    /// Structural validation of the whole batch, then signature checks per file.
    pub fn inspect(&self, files: &[UploadFile]) -> Result<(), GateError> {
        self.check_structure(files)?;
        self.check_signatures(files)
    }

    /// Batch and per-file policy checks. Nothing is read past the leading bytes.
    pub fn check_structure(&self, files: &[UploadFile]) -> Result<(), GateError> {
        self.logged(files, validate_file_upload(&self.upload_policy, files))
    }

    /// Compare each file's leading bytes with its declared type.
    pub fn check_signatures(&self, files: &[UploadFile]) -> Result<(), GateError> {
        let mismatch = files.iter().find(|file| {
            !self
                .signatures
                .validate_file_signature(&file.content, &file.declared_type)
        });
        let result = match mismatch {
            Some(file) => Err(FileRejection::SignatureMismatch {
                name: file.name.clone(),
            }
            .into()),
            None => Ok(()),
        };
        self.logged(files, result)
    }

    fn logged(&self, files: &[UploadFile], result: Result<(), GateError>) -> Result<(), GateError> {
        if let Err(err) = &result {
            tracing::info!(
                files = files.len(),
                code = err.code(),
                reason = err.reason(),
                "Upload rejected"
            );
            metrics::record_rejection(err.code(), err.reason());
        }
        result
    }

    pub fn is_blacklisted(&self, client: &str) -> bool {
        self.blacklist.is_blacklisted(client)
    }

    pub fn check_rate_limit(&self, identifier: &str, limit: u32, window_ms: u64) -> bool {
        self.rate_limits.check_rate_limit(identifier, limit, window_ms)
    }

    pub fn check_suspicious(&self, client: &str) -> bool {
        self.suspicious.check_suspicious(client)
    }

    pub fn validate_file_upload(&self, files: &[UploadFile]) -> Result<(), GateError> {
        validate_file_upload(&self.upload_policy, files)
    }

    pub fn validate_file_signature(&self, content: &[u8], declared_type: &str) -> bool {
        self.signatures.validate_file_signature(content, declared_type)
    }

    pub fn upload_policy(&self) -> &UploadPolicy {
        &self.upload_policy
    }

    /// Drop idle identifiers from both shared maps. Returns how many went.
    pub fn sweep(&self) -> usize {
        self.rate_limits.sweep() + self.suspicious.sweep()
    }

    /// Identifiers currently tracked by the rate limiter and the abuse tracker.
    pub fn tracked(&self) -> (usize, usize) {
        (self.rate_limits.tracked(), self.suspicious.tracked())
    }
}
