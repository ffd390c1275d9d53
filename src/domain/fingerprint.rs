//! Input canonicalization and content fingerprinting
//!
//! Pure functions, no I/O. The fingerprint is the exact-match index key:
//! two inputs that normalize to the same text always share a fingerprint.

use sha2::{Digest, Sha256};

/// Canonicalizes raw input text: trim surrounding whitespace, lowercase.
pub fn normalize(input: &str) -> String {
    input.trim().to_lowercase()
}

/// Deterministic content fingerprint: lowercase hex SHA-256 over the
/// normalized input.
pub fn fingerprint(input: &str) -> String {
    let digest = Sha256::digest(normalize(input).as_bytes());
    hex::encode(digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_trims_and_lowercases() {
        assert_eq!(normalize("  Hello "), "hello");
        assert_eq!(normalize(" Hello "), normalize("hello"));
    }

    #[test]
    fn test_normalize_empty() {
        assert_eq!(normalize("   "), "");
    }

    #[test]
    fn test_fingerprint_deterministic() {
        let a = fingerprint("what is 2+2");
        let b = fingerprint("what is 2+2");
        assert_eq!(a, b);
    }

    #[test]
    fn test_fingerprint_case_and_whitespace_insensitive() {
        assert_eq!(fingerprint("Hi"), fingerprint(" hi "));
        assert_eq!(fingerprint("HELLO WORLD"), fingerprint("hello world"));
    }

    #[test]
    fn test_fingerprint_distinct_inputs_differ() {
        assert_ne!(fingerprint("hello"), fingerprint("goodbye"));
    }

    #[test]
    fn test_fingerprint_is_hex_sha256() {
        let fp = fingerprint("hello");
        assert_eq!(fp.len(), 64);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
        // sha256("hello")
        assert_eq!(
            fp,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }
}
