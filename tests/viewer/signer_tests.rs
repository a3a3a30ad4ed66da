//! Signed URL construction against fixed vectors.

use std::collections::BTreeMap;

use hmac::{Hmac, Mac};
use sha2::Sha256;

use pathview::UrlSigner;

fn params(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn reference_hmac(secret: &str, message: &str) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(message.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

#[test]
fn signs_the_documented_vector() {
    // secret "s", path /slides, {limit: 10}, exp 1000000000.
    let signer = UrlSigner::new("s");
    let query = signer.sign_with_expiry("/slides", &params(&[("limit", "10")]), 1_000_000_000);

    let expected_sig = reference_hmac("s", "/slides?exp=1000000000&limit=10");
    assert_eq!(query, format!("exp=1000000000&limit=10&sig={expected_sig}"));
    assert_eq!(expected_sig.len(), 64);
}

#[test]
fn signature_is_deterministic_and_parameter_sensitive() {
    let signer = UrlSigner::new("secret-key");
    let p = params(&[("limit", "10"), ("quality", "80")]);

    let first = signer.sign_with_expiry("/slides", &p, 1_700_000_000);
    let second = signer.sign_with_expiry("/slides", &p, 1_700_000_000);
    assert_eq!(first, second);

    let different = signer.sign_with_expiry("/slides", &params(&[("limit", "10")]), 1_700_000_000);
    assert_ne!(first, different);
}

#[test]
fn output_parses_as_a_query_string() {
    let signer = UrlSigner::new("secret");
    let url = signer.build_signed_url(
        "/tiles/slide.svs/0/1/2.jpg",
        &params(&[("quality", "80")]),
        300,
    );

    let (path, query) = url.split_once('?').unwrap();
    assert_eq!(path, "/tiles/slide.svs/0/1/2.jpg");

    let mut keys = Vec::new();
    for pair in query.split('&') {
        let (key, value) = pair.split_once('=').unwrap();
        assert!(!key.is_empty() && !value.is_empty());
        keys.push(key);
    }
    assert_eq!(keys, vec!["exp", "quality", "sig"]);
}

#[test]
fn parameters_needing_escapes_are_percent_encoded() {
    let signer = UrlSigner::new("secret");
    let query = signer.sign_with_expiry(
        "/slides",
        &params(&[("name", "my slide/v2")]),
        1_000_000_000,
    );

    assert!(query.contains("name=my%20slide%2Fv2"));
    // The signature covers the encoded form.
    let expected_sig =
        reference_hmac("secret", "/slides?exp=1000000000&name=my%20slide%2Fv2");
    assert!(query.ends_with(&format!("&sig={expected_sig}")));
}

#[test]
fn disabled_signer_emits_plain_queries() {
    let signer = UrlSigner::new("");
    let url = signer.build_signed_url("/slides", &params(&[("limit", "10")]), 300);
    assert_eq!(url, "/slides?limit=10");
}
