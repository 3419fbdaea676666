use sha1::{Digest, Sha1};

/// Content digest of a file's raw bytes: SHA-1 as 40 lowercase hex chars.
pub fn content_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
