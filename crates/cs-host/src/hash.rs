//! Content-based hashing for run IDs.

use sha2::{Digest, Sha256};

use crate::request::Overrides;

pub fn compute_run_id(config: &str, overrides: &Overrides, version: &str) -> String {
    let mut hasher = Sha256::new();

    hasher.update(config.as_bytes());

    let overrides_json = serde_json::to_string(overrides).unwrap_or_default();
    hasher.update(overrides_json.as_bytes());

    hasher.update(version.as_bytes());

    let result = hasher.finalize();
    format!("{:x}", result)
}
