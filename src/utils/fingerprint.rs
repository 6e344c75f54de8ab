use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::Result;

/// Number of hex characters kept from the SHA-256 digest.
pub const CONTENT_HASH_LEN: usize = 16;

/// Hash raw bytes into a short content address.
pub fn content_hash(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    let digest = format!("{:x}", hasher.finalize());
    digest[..CONTENT_HASH_LEN].to_string()
}

/// Hash the compact JSON serialization of a value.
pub fn fingerprint<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let bytes = serde_json::to_vec(value)?;
    Ok(content_hash(&bytes))
}

/// Whether `value` looks like a hash produced by [`content_hash`].
pub fn is_content_hash(value: &str) -> bool {
    value.len() == CONTENT_HASH_LEN
        && value
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}
