//! Remote access to a WSI streaming server.
//!
//! Three pieces cooperate here:
//!
//! - [`UrlSigner`]: mints HMAC-SHA256-signed query strings so the server
//!   can verify requests came from a holder of the shared secret.
//! - [`HttpTransport`]: the seam to the HTTP client; a [`ReqwestTransport`]
//!   implementation is provided, tests substitute their own.
//! - [`WsiStreamClient`]: the typed client over the server's REST surface
//!   (`/health`, `/slides`, `/slides/{id}`, `/tiles/...`).
//!
//! [`crate::slide::RemoteSlideSource`] builds on the client to expose a
//! remote slide through the same `SlideSource` contract as a local file.

mod client;
mod signer;

pub use client::{
    HttpResponse, HttpTransport, ReqwestTransport, SlideEntry, SlideInfo, WsiStreamClient,
    DEFAULT_JPEG_QUALITY,
};
pub use signer::{percent_encode, UrlSigner, DEFAULT_VALIDITY_SECS};
