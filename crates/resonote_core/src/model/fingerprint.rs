//! URL fingerprinting for article identity.
//!
//! # Invariants
//! - Output is always 64 lowercase hex characters.
//! - Byte-identical URLs yield identical fingerprints; no URL
//!   canonicalization happens before hashing.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt::{Display, Formatter};

/// Hex length of a SHA-256 digest.
pub const URL_HASH_LEN: usize = 64;

/// Deterministic identity key of an article, derived from its URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UrlHash(String);

impl UrlHash {
    /// Wraps a stored hash value, rejecting anything that is not 64 hex chars.
    pub fn parse(value: &str) -> Option<Self> {
        let well_formed = value.len() == URL_HASH_LEN
            && value
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c));
        well_formed.then(|| Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for UrlHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Computes the SHA-256 fingerprint of the URL's UTF-8 bytes.
pub fn fingerprint(url: &str) -> UrlHash {
    UrlHash(hex::encode(Sha256::digest(url.as_bytes())))
}

#[cfg(test)]
mod tests {
    use super::{fingerprint, UrlHash, URL_HASH_LEN};

    #[test]
    fn fingerprint_is_stable_and_fixed_width() {
        let first = fingerprint("http://x.com/a");
        let second = fingerprint("http://x.com/a");
        assert_eq!(first, second);
        assert_eq!(first.as_str().len(), URL_HASH_LEN);
    }

    #[test]
    fn fingerprint_matches_known_sha256_vector() {
        assert_eq!(
            fingerprint("abc").as_str(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn url_variants_are_distinct_identities() {
        let plain = fingerprint("https://example.com/story");
        let slashed = fingerprint("https://example.com/story/");
        let query_a = fingerprint("https://example.com/story?a=1&b=2");
        let query_b = fingerprint("https://example.com/story?b=2&a=1");
        assert_ne!(plain, slashed);
        assert_ne!(query_a, query_b);
    }

    #[test]
    fn parse_rejects_malformed_values() {
        let valid = fingerprint("https://example.com");
        assert_eq!(UrlHash::parse(valid.as_str()), Some(valid));
        assert!(UrlHash::parse("abc").is_none());
        assert!(UrlHash::parse(&"G".repeat(URL_HASH_LEN)).is_none());
    }
}
