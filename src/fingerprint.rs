//! Content fingerprints
//!
//! A fingerprint is the hex-encoded SHA-256 digest of a text's UTF-8 bytes.
//! Absent text has no fingerprint; this is distinct from the digest of `""`.

use sha2::{Digest, Sha256};

/// Computes the fingerprint of `text`, or `None` when there is no text
pub fn fingerprint(text: Option<&str>) -> Option<String> {
    let text = text?;
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    Some(hex::encode(hasher.finalize()))
}

/// Returns whether two fingerprints describe different content
///
/// Two absent fingerprints are equal; one absent and one present differ.
pub fn changed(old: Option<&str>, new: Option<&str>) -> bool {
    match (old, new) {
        (None, None) => false,
        (old, new) => old != new,
    }
}
