//! Upload inspection subsystem.
//!
//! # Data Flow
//! ```text
//! Parsed multipart batch
//!     → validator.rs (count, aggregate size, per-file name/type/size)
//!     → signature.rs (leading bytes vs declared type)
//!     → [conversion]
//!     → naming.rs (safe, unique output name)
//! ```
//!
//! # Design Decisions
//! - A batch is accepted or rejected as a whole
//! - Structural checks run before any content byte is looked at
//! - Files are held in memory only; nothing is written to disk

pub mod content_type;
pub mod naming;
pub mod signature;
pub mod validator;

use axum::body::Bytes;

pub use content_type::content_type_for;
pub use naming::{create_safe_file_path, sanitize_file_name};
pub use signature::SignatureTable;
pub use validator::{validate_file_upload, UploadPolicy};

/// One uploaded file with its client-declared metadata.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub name: String,
    /// MIME type claimed by the client.
    pub declared_type: String,
    pub size: u64,
    pub content: Bytes,
}

impl UploadFile {
    /// Build a file whose size is the length of its content.
    pub fn new(name: impl Into<String>, declared_type: impl Into<String>, content: impl Into<Bytes>) -> Self {
        let content = content.into();
        Self {
            name: name.into(),
            declared_type: declared_type.into(),
            size: content.len() as u64,
            content,
        }
    }
}
