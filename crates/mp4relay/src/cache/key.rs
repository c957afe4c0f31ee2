//! # Cache Keys
//!
//! Deterministic, content-addressed identity for a source URL.

use sha2::{Digest, Sha256};

/// Derive the cache key for a source URL.
///
/// SHA-256 over the exact byte representation of the URL string,
/// rendered as lowercase hex. Pure and stable across restarts; a
/// cryptographic hash so crafted URLs cannot cheaply collide with an
/// existing entry.
pub fn derive_key(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    let hash = hasher.finalize();
    format!("{hash:x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_url_same_key() {
        let url = "https://example.com/video.mp4";
        assert_eq!(derive_key(url), derive_key(url));
    }

    #[test]
    fn test_distinct_urls_distinct_keys() {
        assert_ne!(
            derive_key("https://example.com/a.mp4"),
            derive_key("https://example.com/b.mp4")
        );
    }

    #[test]
    fn test_key_is_hex_digest() {
        let key = derive_key("https://example.com/video.mp4");
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
        // Known vector so keys stay stable across releases
        assert_eq!(
            derive_key("https://example.com/video.mp4"),
            "da09b2ab4d33db12c2f8ecb9449572e139891ed2b22091aecc863bc85e2dc936"
        );
    }
}
