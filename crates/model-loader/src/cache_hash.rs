//! # Cache Fingerprints
//!
//! A fingerprint is a SHA-256 digest of the model type identifier and the
//! serialized argument list. It is a dedup key for the response cache, not a
//! security boundary. Argument order is significant: two argument lists that
//! differ only in order produce different keys unless the caller normalizes
//! them first.

use crate::data::{describe_args, Args};
use sha2::{Digest, Sha256};
use std::fmt;

/// Computes the cache fingerprint for `(model_type, args)` as lowercase hex.
pub fn fingerprint(model_type: &str, args: &Args) -> String {
    let mut hasher = Sha256::new();
    hasher.update(model_type.as_bytes());
    // Separator keeps ("ab", {}) and ("a", ...) from sharing a prefix.
    hasher.update([0u8]);
    hasher.update(describe_args(args).as_bytes());
    format!("{:x}", hasher.finalize())
}

/// A computed fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheHash(String);

impl CacheHash {
    pub fn new(model_type: &str, args: &Args) -> Self {
        Self(fingerprint(model_type, args))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(pairs: &[(&str, serde_json::Value)]) -> Args {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_same_input_same_key() {
        let a = args(&[("owner", json!("octo")), ("name", json!("loader"))]);
        assert_eq!(fingerprint("Repository", &a), fingerprint("Repository", &a.clone()));
        assert_eq!(fingerprint("Repository", &a).len(), 64);
    }

    #[test]
    fn test_model_type_is_part_of_the_key() {
        let a = args(&[("number", json!(1))]);
        assert_ne!(fingerprint("Issue", &a), fingerprint("PullRequest", &a));
    }

    #[test]
    fn test_argument_order_is_significant() {
        let forward = args(&[("owner", json!("octo")), ("name", json!("loader"))]);
        let reversed = args(&[("name", json!("loader")), ("owner", json!("octo"))]);
        assert_ne!(
            CacheHash::new("Repository", &forward),
            CacheHash::new("Repository", &reversed)
        );
    }
}
