//! Request identity for the response namespaces.

use sha2::{Digest, Sha256};

/// Compute the namespace key identifying a request.
///
/// The method is upper-cased so `get` and `GET` collide; the URL is expected
/// to be canonical already (fragment stripped, host lower-cased).
pub fn compute_request_key(method: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.to_ascii_uppercase().as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}
