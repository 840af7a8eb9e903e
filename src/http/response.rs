//! Response shapes and error mapping.
//!
//! # Responsibilities
//! - Serialize the compress result
//! - Map gate rejections and request faults to status codes
//! - Attach rate limit headers
//!
//! # Design Decisions
//! - Every error body is `{ "error": <reason>, "code": <class> }`
//! - Gate rejections are always 4xx; only conversion faults are 5xx

use axum::extract::multipart::MultipartError;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

use crate::convert::CompressedFile;
use crate::error::{AdmissionDenied, GateError};
use crate::security::headers::rate_limit_header_names;
use crate::security::RateLimitDecision;

/// Errors surfaced by the HTTP layer.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Gate(#[from] GateError),

    #[error("Invalid content type")]
    InvalidContentType,

    #[error("Invalid user agent")]
    InvalidUserAgent,

    #[error("Invalid compression level")]
    InvalidCompressionLevel,

    #[error("Failed to read upload: {0}")]
    Multipart(#[from] MultipartError),

    #[error("Error while processing files")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Gate(err) => err.status_code(),
            ApiError::InvalidContentType
            | ApiError::InvalidUserAgent
            | ApiError::InvalidCompressionLevel => StatusCode::BAD_REQUEST,
            ApiError::Multipart(err) => err.status(),
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Gate(err) => err.code(),
            ApiError::InvalidContentType
            | ApiError::InvalidUserAgent
            | ApiError::InvalidCompressionLevel
            | ApiError::Multipart(_) => "invalid_request",
            ApiError::Internal(_) => "internal_error",
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    code: &'static str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if let ApiError::Internal(detail) = &self {
            tracing::error!(detail = %detail, "Request failed");
        }

        let retry_after = match &self {
            ApiError::Gate(GateError::Admission(AdmissionDenied::RateLimited {
                retry_after_secs,
            })) => Some(*retry_after_secs),
            _ => None,
        };

        let body = ErrorBody {
            error: self.to_string(),
            code: self.code(),
        };
        let mut response = (status, Json(body)).into_response();
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

/// Rate limit state reported with a successful response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitInfo {
    pub remaining: u32,
    /// Unix milliseconds at which the bucket is full again.
    pub reset_time: u64,
}

impl From<&RateLimitDecision> for RateLimitInfo {
    fn from(decision: &RateLimitDecision) -> Self {
        Self {
            remaining: decision.remaining,
            reset_time: reset_epoch_millis(decision),
        }
    }
}

/// Body of a successful compress request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressResponse {
    pub success: bool,
    pub files: Vec<CompressedFile>,
    pub message: String,
    pub rate_limit: RateLimitInfo,
}

impl CompressResponse {
    pub fn new(files: Vec<CompressedFile>, decision: &RateLimitDecision) -> Self {
        Self {
            success: true,
            message: format!("{} file(s) processed successfully", files.len()),
            files,
            rate_limit: RateLimitInfo::from(decision),
        }
    }
}

fn reset_epoch_millis(decision: &RateLimitDecision) -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    (now + decision.reset_after).as_millis() as u64
}

/// Write `X-RateLimit-Limit`, `X-RateLimit-Remaining` and `X-RateLimit-Reset`.
pub fn insert_rate_limit_headers(headers: &mut HeaderMap, decision: &RateLimitDecision) {
    let [limit, remaining, reset] = rate_limit_header_names();
    headers.insert(limit, HeaderValue::from(decision.limit));
    headers.insert(remaining, HeaderValue::from(decision.remaining));
    headers.insert(reset, HeaderValue::from(reset_epoch_millis(decision)));
}
