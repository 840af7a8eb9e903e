//! Magic number verification.
//!
//! Compares the first bytes of a file with the signatures registered for its
//! declared MIME type, so a client cannot pass off one format as another by
//! lying about `Content-Type`.

use std::collections::HashMap;

/// Declared MIME type → accepted leading-byte patterns (uppercase hex).
///
/// A type with no entry, or with an empty pattern list, is not checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureTable {
    patterns: HashMap<String, Vec<String>>,
    /// Bytes needed to cover the longest pattern.
    prefix_len: usize,
}

impl SignatureTable {
    pub fn new(patterns: HashMap<String, Vec<String>>) -> Self {
        let patterns: HashMap<String, Vec<String>> = patterns
            .into_iter()
            .map(|(mime, sigs)| {
                let sigs = sigs.into_iter().map(|s| s.to_ascii_uppercase()).collect();
                (mime, sigs)
            })
            .collect();
        let prefix_len = patterns
            .values()
            .flatten()
            .map(|sig| sig.len().div_ceil(2))
            .max()
            .unwrap_or(0);
        Self {
            patterns,
            prefix_len,
        }
    }

    /// Patterns registered for `declared_type`, if any.
    pub fn patterns_for(&self, declared_type: &str) -> Option<&[String]> {
        self.patterns.get(declared_type).map(Vec::as_slice)
    }

    /// True when `content` starts with one of the signatures for `declared_type`,
    /// or when no signature is registered for it.
    ///
    /// Empty or truncated content never matches a registered signature.
    pub fn validate_file_signature(&self, content: &[u8], declared_type: &str) -> bool {
        let signatures = match self.patterns_for(declared_type) {
            Some(sigs) if !sigs.is_empty() => sigs,
            _ => return true,
        };

        let head = &content[..content.len().min(self.prefix_len)];
        let hex = hex::encode_upper(head);

        signatures.iter().any(|sig| hex.starts_with(sig.as_str()))
    }
}

impl Default for SignatureTable {
    fn default() -> Self {
        let entries: [(&str, &[&str]); 8] = [
            ("image/jpeg", &["FFD8FF"]),
            ("image/png", &["89504E47"]),
            ("image/webp", &["52494646"]),
            ("image/gif", &["47494638"]),
            ("application/pdf", &["25504446"]),
            ("application/msword", &["D0CF11E0"]),
            (
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
                &["504B0304"],
            ),
            ("text/plain", &[]),
        ];

        Self::new(
            entries
                .into_iter()
                .map(|(mime, sigs)| {
                    (
                        mime.to_string(),
                        sigs.iter().map(|s| s.to_string()).collect(),
                    )
                })
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const JPEG_HEAD: [u8; 4] = [0xFF, 0xD8, 0xFF, 0xE0];

    #[test]
    fn test_jpeg_bytes_match_jpeg_only() {
        let table = SignatureTable::default();
        assert!(table.validate_file_signature(&JPEG_HEAD, "image/jpeg"));
        assert!(!table.validate_file_signature(&JPEG_HEAD, "image/png"));
    }

    #[test]
    fn test_text_plain_is_never_checked() {
        let table = SignatureTable::default();
        assert!(table.validate_file_signature(b"hello", "text/plain"));
        assert!(table.validate_file_signature(&JPEG_HEAD, "text/plain"));
        assert!(table.validate_file_signature(&[], "text/plain"));
    }

    #[test]
    fn test_unknown_type_passes_through() {
        let table = SignatureTable::default();
        assert!(table.validate_file_signature(&[0x00], "application/x-unknown"));
    }

    #[test]
    fn test_empty_and_truncated_buffers_do_not_match() {
        let table = SignatureTable::default();
        assert!(!table.validate_file_signature(&[], "image/jpeg"));
        assert!(!table.validate_file_signature(&[0xFF, 0xD8], "image/jpeg"));
        assert!(!table.validate_file_signature(&[0x89, 0x50, 0x4E], "image/png"));
    }

    #[test]
    fn test_known_formats() {
        let table = SignatureTable::default();
        assert!(table.validate_file_signature(b"\x89PNG\r\n\x1a\n", "image/png"));
        assert!(table.validate_file_signature(b"GIF89a", "image/gif"));
        assert!(table.validate_file_signature(b"RIFF\x00\x00\x00\x00WEBP", "image/webp"));
        assert!(table.validate_file_signature(b"%PDF-1.7", "application/pdf"));
        assert!(table.validate_file_signature(
            b"PK\x03\x04rest",
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        ));
        assert!(!table.validate_file_signature(b"%PDF-1.7", "application/msword"));
    }

    #[test]
    fn test_custom_patterns_are_normalized() {
        let mut patterns = HashMap::new();
        patterns.insert("application/zip".to_string(), vec!["504b".to_string()]);
        let table = SignatureTable::new(patterns);
        assert!(table.validate_file_signature(b"PK\x03\x04", "application/zip"));
        assert!(!table.validate_file_signature(b"PX", "application/zip"));
    }
}
