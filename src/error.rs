//! Rejection taxonomy for the admission and upload gate.
//!
//! Every rejection is terminal for the current request and maps to a client
//! error status. Nothing here is retried.

use axum::http::StatusCode;
use thiserror::Error;

/// The request was not admitted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdmissionDenied {
    #[error("Access denied")]
    Blacklisted,

    #[error("Suspicious activity detected")]
    SuspiciousActivity,

    #[error("Too many requests. Please wait {retry_after_secs} seconds before retrying")]
    RateLimited { retry_after_secs: u64 },
}

/// The upload batch as a whole breaks policy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyRejection {
    #[error("No files provided")]
    EmptyBatch,

    #[error("You can upload at most {max} files")]
    TooManyFiles { max: usize },

    #[error("Total upload size is too large (limit {max_bytes} bytes)")]
    AggregateTooLarge { max_bytes: u64 },
}

/// A single file in the batch breaks policy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FileRejection {
    #[error("Invalid file name")]
    InvalidName,

    #[error("File name contains invalid characters: {name}")]
    ForbiddenCharacters { name: String },

    #[error("Unsupported file type: {declared_type}")]
    UnsupportedType { declared_type: String },

    #[error("Invalid file size: {name}")]
    InvalidSize { name: String },

    #[error("File signature check failed: {name}")]
    SignatureMismatch { name: String },
}

/// Any rejection produced by the gate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GateError {
    #[error(transparent)]
    Admission(#[from] AdmissionDenied),

    #[error(transparent)]
    Policy(#[from] PolicyRejection),

    #[error(transparent)]
    File(#[from] FileRejection),
}

impl GateError {
    /// Stable machine-readable code for the rejection class.
    pub fn code(&self) -> &'static str {
        match self {
            GateError::Admission(_) => "admission_denied",
            GateError::Policy(_) => "policy_rejection",
            GateError::File(_) => "file_rejection",
        }
    }

    /// Stable machine-readable reason within the class.
    pub fn reason(&self) -> &'static str {
        match self {
            GateError::Admission(AdmissionDenied::Blacklisted) => "blacklisted",
            GateError::Admission(AdmissionDenied::SuspiciousActivity) => "suspicious_activity",
            GateError::Admission(AdmissionDenied::RateLimited { .. }) => "rate_limited",
            GateError::Policy(PolicyRejection::EmptyBatch) => "empty_batch",
            GateError::Policy(PolicyRejection::TooManyFiles { .. }) => "too_many_files",
            GateError::Policy(PolicyRejection::AggregateTooLarge { .. }) => "aggregate_too_large",
            GateError::File(FileRejection::InvalidName) => "invalid_name",
            GateError::File(FileRejection::ForbiddenCharacters { .. }) => "forbidden_characters",
            GateError::File(FileRejection::UnsupportedType { .. }) => "unsupported_type",
            GateError::File(FileRejection::InvalidSize { .. }) => "invalid_size",
            GateError::File(FileRejection::SignatureMismatch { .. }) => "signature_mismatch",
        }
    }

    /// Always a 4xx status.
    pub fn status_code(&self) -> StatusCode {
        match self {
            GateError::Admission(AdmissionDenied::Blacklisted) => StatusCode::FORBIDDEN,
            GateError::Admission(_) => StatusCode::TOO_MANY_REQUESTS,
            GateError::Policy(_) | GateError::File(_) => StatusCode::BAD_REQUEST,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes_are_client_errors() {
        let errors: Vec<GateError> = vec![
            AdmissionDenied::Blacklisted.into(),
            AdmissionDenied::SuspiciousActivity.into(),
            AdmissionDenied::RateLimited { retry_after_secs: 20 }.into(),
            PolicyRejection::EmptyBatch.into(),
            PolicyRejection::TooManyFiles { max: 5 }.into(),
            FileRejection::SignatureMismatch { name: "a.png".into() }.into(),
        ];
        for err in errors {
            assert!(err.status_code().is_client_error(), "{err}");
        }
    }

    #[test]
    fn test_codes_and_messages() {
        let err: GateError = PolicyRejection::TooManyFiles { max: 5 }.into();
        assert_eq!(err.code(), "policy_rejection");
        assert_eq!(err.reason(), "too_many_files");
        assert!(err.to_string().contains('5'));

        let err: GateError = AdmissionDenied::Blacklisted.into();
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);

        let err: GateError = FileRejection::ForbiddenCharacters { name: "a/b.png".into() }.into();
        assert_eq!(err.code(), "file_rejection");
        assert!(err.to_string().contains("a/b.png"));
    }
}
