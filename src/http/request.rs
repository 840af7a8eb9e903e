//! Request inspection and upload form parsing.
//!
//! # Responsibilities
//! - Header checks that run before the body is read
//! - Read the multipart upload form into memory
//!
//! # Design Decisions
//! - The body is only read after the request has been admitted
//! - Missing part content types are guessed from the file extension

use axum::extract::Multipart;
use axum::http::{header, HeaderMap};

use crate::convert::TargetFormat;
use crate::http::response::ApiError;
use crate::upload::{content_type_for, UploadFile};

/// Multipart field carrying the uploaded files.
pub const FILES_FIELD: &str = "files";
/// Multipart field carrying the requested quality.
pub const QUALITY_FIELD: &str = "compressionLevel";
/// Multipart field carrying the requested output format.
pub const FORMAT_FIELD: &str = "fileType";

/// Parsed upload form.
#[derive(Debug)]
pub struct UploadForm {
    pub files: Vec<UploadFile>,
    /// Requested quality, not yet range checked.
    pub quality: i64,
    pub format: TargetFormat,
}

/// The request must declare a multipart body.
pub fn require_multipart(headers: &HeaderMap) -> Result<(), ApiError> {
    let is_multipart = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.contains("multipart/form-data"));

    if is_multipart {
        Ok(())
    } else {
        Err(ApiError::InvalidContentType)
    }
}

/// Reject requests without a plausible `User-Agent`.
pub fn require_user_agent(headers: &HeaderMap, min_len: usize) -> Result<(), ApiError> {
    let len = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map_or(0, str::len);

    if len >= min_len {
        Ok(())
    } else {
        Err(ApiError::InvalidUserAgent)
    }
}

/// Integer at the start of `text`, ignoring whatever follows it.
///
/// `"15.5"` reads as 15 and `"80%"` as 80; text without leading digits is `None`.
pub fn leading_int(text: &str) -> Option<i64> {
    let text = text.trim_start();
    let (negative, rest) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
    let value = rest[..digits].parse::<i64>().ok()?;
    Some(if negative { -value } else { value })
}

/// Read every field of the upload form.
///
/// A missing, unparsable or zero quality becomes `default_quality`; an unknown
/// format keeps files as uploaded.
pub async fn read_upload_form(
    mut multipart: Multipart,
    default_quality: u8,
) -> Result<UploadForm, ApiError> {
    let mut files = Vec::new();
    let mut quality = None;
    let mut format = TargetFormat::All;

    while let Some(field) = multipart.next_field().await? {
        let field_name = field.name().map(str::to_string).unwrap_or_default();

        match field_name.as_str() {
            FILES_FIELD => {
                let name = field.file_name().map(str::to_string).unwrap_or_default();
                let declared_type = field
                    .content_type()
                    .map(str::to_string)
                    .unwrap_or_else(|| content_type_for(&name).to_string());
                let content = field.bytes().await?;
                files.push(UploadFile::new(name, declared_type, content));
            }
            QUALITY_FIELD => {
                let text = field.text().await?;
                quality = leading_int(&text).filter(|q| *q != 0);
            }
            FORMAT_FIELD => {
                let text = field.text().await?;
                format = text.trim().parse().unwrap_or_else(|_| {
                    tracing::debug!(file_type = %text, "Unknown target format, keeping originals");
                    TargetFormat::All
                });
            }
            other => {
                tracing::debug!(field = %other, "Ignoring unexpected form field");
            }
        }
    }

    Ok(UploadForm {
        files,
        quality: quality.unwrap_or(i64::from(default_quality)),
        format,
    })
}
