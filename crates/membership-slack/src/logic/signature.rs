//! Slack request signing
//!
//! Slack signs every Events API request with the app's signing secret:
//! `v0=` + hex(HMAC-SHA256(secret, "v0:{timestamp}:{body}")).

use hmac::{Hmac, Mac};
use http::HeaderMap;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-slack-signature";
pub const TIMESTAMP_HEADER: &str = "x-slack-request-timestamp";
const SIGNATURE_VERSION: &str = "v0";

/// Requests older (or further in the future) than this are refused as replays
pub const MAX_REQUEST_AGE_SECS: u64 = 60 * 5;

#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    #[error("missing header {0}")]
    MissingHeader(&'static str),

    #[error("request timestamp is not an integer")]
    InvalidTimestamp,

    #[error("request timestamp is {skew_secs}s away from now")]
    StaleRequest { skew_secs: u64 },

    #[error("signature is not a v0 hex digest")]
    MalformedSignature,

    #[error("signing secret cannot key the HMAC")]
    InvalidKey,

    #[error("signature does not match")]
    Mismatch,
}

#[derive(Clone)]
pub struct SignatureVerifier {
    signing_secret: String,
}

impl SignatureVerifier {
    pub fn new(signing_secret: impl Into<String>) -> Self {
        Self {
            signing_secret: signing_secret.into(),
        }
    }

    /// Verifies the signature headers against the raw request body
    pub fn verify(&self, headers: &HeaderMap, body: &[u8]) -> Result<(), SignatureError> {
        self.verify_at(headers, body, chrono::Utc::now().timestamp())
    }

    pub fn verify_at(
        &self,
        headers: &HeaderMap,
        body: &[u8],
        now: i64,
    ) -> Result<(), SignatureError> {
        let timestamp = header_str(headers, TIMESTAMP_HEADER)?;
        let signature = header_str(headers, SIGNATURE_HEADER)?;

        let sent_at: i64 = timestamp
            .trim()
            .parse()
            .map_err(|_| SignatureError::InvalidTimestamp)?;
        let skew_secs = now.abs_diff(sent_at);
        if skew_secs > MAX_REQUEST_AGE_SECS {
            return Err(SignatureError::StaleRequest { skew_secs });
        }

        let digest = signature
            .strip_prefix(SIGNATURE_VERSION)
            .and_then(|rest| rest.strip_prefix('='))
            .ok_or(SignatureError::MalformedSignature)?;
        let expected = hex::decode(digest).map_err(|_| SignatureError::MalformedSignature)?;

        self.mac(timestamp, body)?
            .verify_slice(&expected)
            .map_err(|_| SignatureError::Mismatch)
    }

    /// Produces the `x-slack-signature` value for a body sent at `timestamp`
    pub fn sign(&self, timestamp: &str, body: &[u8]) -> Result<String, SignatureError> {
        let digest = self.mac(timestamp, body)?.finalize().into_bytes();
        Ok(format!("{SIGNATURE_VERSION}={}", hex::encode(digest)))
    }

    fn mac(&self, timestamp: &str, body: &[u8]) -> Result<HmacSha256, SignatureError> {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(self.signing_secret.as_bytes())
            .map_err(|_| SignatureError::InvalidKey)?;
        mac.update(SIGNATURE_VERSION.as_bytes());
        mac.update(b":");
        mac.update(timestamp.as_bytes());
        mac.update(b":");
        mac.update(body);
        Ok(mac)
    }
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureVerifier")
            .field("signing_secret", &"<redacted>")
            .finish()
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &'static str) -> Result<&'a str, SignatureError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .ok_or(SignatureError::MissingHeader(name))
}
