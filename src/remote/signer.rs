//! Signed URL construction.
//!
//! This module builds HMAC-SHA256-signed query strings for tile-server
//! requests:
//!
//! ```text
//! signature = HMAC-SHA256(secret, "{path}?{canonical_query}")
//! ```
//!
//! The canonical query is the request parameters plus `exp` (expiry as Unix
//! seconds), sorted by key, each key and value percent-encoded, joined with
//! `&`. The `sig` parameter itself is excluded from the canonical form and
//! appended last:
//!
//! ```text
//! /tiles/sample.svs/0/1/2.jpg?exp=1735689600&quality=80&sig=9f2ab...
//! ```
//!
//! Signing is deterministic for a fixed expiry, which both the tests and
//! the server-side verifier rely on. An empty secret disables signing and
//! the canonical query goes out unsigned.

use std::collections::BTreeMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

/// Default signature validity: 5 minutes.
pub const DEFAULT_VALIDITY_SECS: i64 = 300;

type HmacSha256 = Hmac<Sha256>;

/// Percent-encode all bytes outside the RFC 3986 unreserved set, with
/// uppercase hex digits.
pub fn percent_encode(input: &str) -> String {
    let mut encoded = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char);
            }
            _ => {
                encoded.push_str(&format!("%{byte:02X}"));
            }
        }
    }
    encoded
}

// =============================================================================
// UrlSigner
// =============================================================================

/// Mints signed query strings with a shared secret.
#[derive(Clone)]
pub struct UrlSigner {
    secret: Vec<u8>,
}

impl UrlSigner {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
        }
    }

    /// Whether a non-empty secret was configured.
    pub fn is_enabled(&self) -> bool {
        !self.secret.is_empty()
    }

    /// Sign `path` with `params`, expiring `validity_secs` from now.
    /// Returns the query string (without the leading `?`).
    pub fn sign(&self, path: &str, params: &BTreeMap<String, String>, validity_secs: i64) -> String {
        let exp = now_unix() + validity_secs;
        self.sign_with_expiry(path, params, exp)
    }

    /// Sign with an explicit expiry timestamp. Deterministic: the same
    /// inputs always produce the same query string.
    pub fn sign_with_expiry(
        &self,
        path: &str,
        params: &BTreeMap<String, String>,
        exp: i64,
    ) -> String {
        if !self.is_enabled() {
            return canonical_query(params);
        }

        let mut signed_params = params.clone();
        signed_params.insert("exp".to_string(), exp.to_string());

        let canonical = canonical_query(&signed_params);
        let signature = self.compute_signature(&format!("{path}?{canonical}"));

        if canonical.is_empty() {
            format!("sig={signature}")
        } else {
            format!("{canonical}&sig={signature}")
        }
    }

    /// `path + "?" + signed query`, or bare `path` when there is nothing
    /// to append (signing disabled and no parameters).
    pub fn build_signed_url(
        &self,
        path: &str,
        params: &BTreeMap<String, String>,
        validity_secs: i64,
    ) -> String {
        let query = self.sign(path, params, validity_secs);
        if query.is_empty() {
            path.to_string()
        } else {
            format!("{path}?{query}")
        }
    }

    /// Check a signature produced by [`UrlSigner::sign_with_expiry`] for
    /// the same path and parameters. Comparison is constant-time.
    pub fn verify(
        &self,
        path: &str,
        params: &BTreeMap<String, String>,
        exp: i64,
        signature: &str,
    ) -> bool {
        let mut signed_params = params.clone();
        signed_params.insert("exp".to_string(), exp.to_string());
        let canonical = canonical_query(&signed_params);
        let expected = self.compute_signature(&format!("{path}?{canonical}"));

        let Ok(provided) = hex::decode(signature) else {
            return false;
        };
        let Ok(expected) = hex::decode(&expected) else {
            return false;
        };
        provided.ct_eq(&expected).into()
    }

    fn compute_signature(&self, message: &str) -> String {
        let mut mac =
            HmacSha256::new_from_slice(&self.secret).expect("HMAC accepts keys of any size");
        mac.update(message.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }
}

/// Key-sorted `k=v` pairs joined with `&`, both sides percent-encoded.
/// `BTreeMap` iteration supplies the byte-lexicographic key order.
fn canonical_query(params: &BTreeMap<String, String>) -> String {
    params
        .iter()
        .map(|(key, value)| format!("{}={}", percent_encode(key), percent_encode(value)))
        .collect::<Vec<_>>()
        .join("&")
}

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs() as i64
}

// =============================================================================
// Tests
// =============================================================================
