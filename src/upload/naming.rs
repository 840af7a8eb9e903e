//! Safe, unique output names for untrusted file names.

use rand::RngCore;
use std::time::{SystemTime, UNIX_EPOCH};

const MAX_SANITIZED_LEN: usize = 50;
const FALLBACK_NAME: &str = "file";

/// Reduce an untrusted name to `[A-Za-z0-9._-]`.
///
/// Anything else becomes `_`; runs of `_` or `.` collapse to one; leading and
/// trailing `_`/`.` are stripped; the result is cut to 50 characters. The
/// output never contains a path separator or `..`.
pub fn sanitize_file_name(file_name: &str) -> String {
    let replaced = file_name.chars().map(|c| {
        if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
            c
        } else {
            '_'
        }
    });

    let mut collapsed = String::with_capacity(file_name.len());
    for c in replaced {
        if (c == '_' || c == '.') && collapsed.ends_with(c) {
            continue;
        }
        collapsed.push(c);
    }

    collapsed
        .trim_matches(|c| c == '_' || c == '.')
        .chars()
        .take(MAX_SANITIZED_LEN)
        .collect()
}

/// Build `<unix millis>_<16 hex chars>_<sanitized name>`.
///
/// The random part comes from the thread-local CSPRNG, so two uploads with the
/// same name at the same millisecond still get different names.
pub fn create_safe_file_path(original_name: &str) -> String {
    let mut sanitized = sanitize_file_name(original_name);
    if sanitized.is_empty() {
        sanitized = FALLBACK_NAME.to_string();
    }

    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();

    let mut token = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut token);

    format!("{}_{}_{}", timestamp, hex::encode(token), sanitized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_replaces_and_collapses() {
        assert_eq!(sanitize_file_name("my photo (1).png"), "my_photo_1_.png");
        assert_eq!(sanitize_file_name("a   b.jpg"), "a_b.jpg");
        assert_eq!(sanitize_file_name("__hidden__"), "hidden");
        assert_eq!(sanitize_file_name("report-2024.v2.pdf"), "report-2024.v2.pdf");
    }

    #[test]
    fn test_sanitize_strips_traversal() {
        let name = sanitize_file_name("../../etc/passwd.txt");
        assert_eq!(name, "etc_passwd.txt");
        assert!(!name.contains('/'));
        assert!(!name.contains(".."));

        let name = sanitize_file_name("..\\..\\boot.ini");
        assert!(!name.contains('\\'));
        assert!(!name.contains(".."));
    }

    #[test]
    fn test_sanitize_truncates_to_fifty() {
        let name = sanitize_file_name(&"x".repeat(80));
        assert_eq!(name.len(), 50);
    }

    #[test]
    fn test_sanitize_non_ascii() {
        assert_eq!(sanitize_file_name("résumé.pdf"), "r_sum_.pdf");
    }

    #[test]
    fn test_safe_path_shape() {
        let path = create_safe_file_path("../../etc/passwd.txt");
        assert!(!path.contains('/'));
        assert!(!path.contains(".."));
        assert!(path.ends_with("_etc_passwd.txt"));

        let parts: Vec<&str> = path.splitn(3, '_').collect();
        assert_eq!(parts.len(), 3);
        assert!(parts[0].parse::<u128>().is_ok());
        assert_eq!(parts[1].len(), 16);
        assert!(parts[1].chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(parts[2], "etc_passwd.txt");
    }

    #[test]
    fn test_safe_path_is_unique() {
        let a = create_safe_file_path("photo.png");
        let b = create_safe_file_path("photo.png");
        assert_ne!(a, b);
    }

    #[test]
    fn test_safe_path_fallback_name() {
        let path = create_safe_file_path("///");
        assert!(path.ends_with("_file"));
    }
}
