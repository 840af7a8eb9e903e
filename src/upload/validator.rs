//! Structural validation of an upload batch.
//!
//! Checks run in a fixed order and the first failure wins, so the same bad
//! batch always produces the same reason.

use crate::config::UploadConfig;
use crate::error::{FileRejection, GateError, PolicyRejection};
use crate::upload::UploadFile;

/// Characters that are never accepted in a file name.
pub const FORBIDDEN_NAME_CHARS: [char; 9] = ['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Upload limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPolicy {
    pub max_files: usize,
    /// Per-file ceiling in bytes. The whole batch may use twice this.
    pub max_file_size: u64,
    /// Maximum file name length in characters.
    pub max_name_len: usize,
    pub allowed_types: Vec<String>,
}

impl UploadPolicy {
    pub fn max_total_size(&self) -> u64 {
        self.max_file_size.saturating_mul(2)
    }

    pub fn is_allowed_type(&self, declared_type: &str) -> bool {
        self.allowed_types.iter().any(|t| t == declared_type)
    }

    pub fn is_valid_size(&self, size: u64) -> bool {
        size > 0 && size <= self.max_file_size
    }
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self::from(&UploadConfig::default())
    }
}

impl From<&UploadConfig> for UploadPolicy {
    fn from(config: &UploadConfig) -> Self {
        Self {
            max_files: config.max_files,
            max_file_size: config.max_file_size,
            max_name_len: config.max_name_len,
            allowed_types: config.allowed_types.clone(),
        }
    }
}

/// Validate a batch against `policy`. Either the whole batch passes or it is rejected.
pub fn validate_file_upload(policy: &UploadPolicy, files: &[UploadFile]) -> Result<(), GateError> {
    if files.is_empty() {
        return Err(PolicyRejection::EmptyBatch.into());
    }

    if files.len() > policy.max_files {
        return Err(PolicyRejection::TooManyFiles {
            max: policy.max_files,
        }
        .into());
    }

    let total = files
        .iter()
        .try_fold(0u64, |sum, file| sum.checked_add(file.size));
    let max_total = policy.max_total_size();
    if total.map_or(true, |total| total > max_total) {
        return Err(PolicyRejection::AggregateTooLarge {
            max_bytes: max_total,
        }
        .into());
    }

    for file in files {
        validate_file(policy, file)?;
    }

    Ok(())
}

fn validate_file(policy: &UploadPolicy, file: &UploadFile) -> Result<(), FileRejection> {
    if file.name.is_empty() || file.name.chars().count() > policy.max_name_len {
        return Err(FileRejection::InvalidName);
    }

    if file.name.chars().any(|c| FORBIDDEN_NAME_CHARS.contains(&c)) {
        return Err(FileRejection::ForbiddenCharacters {
            name: file.name.clone(),
        });
    }

    if !policy.is_allowed_type(&file.declared_type) {
        return Err(FileRejection::UnsupportedType {
            declared_type: file.declared_type.clone(),
        });
    }

    if !policy.is_valid_size(file.size) {
        return Err(FileRejection::InvalidSize {
            name: file.name.clone(),
        });
    }

    Ok(())
}
