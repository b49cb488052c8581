//! GitHub webhook signature verification using HMAC-SHA256.
//!
//! GitHub signs every delivery with the hook's shared secret and sends the
//! result in the `X-Hub-Signature-256` header as `sha256=<hex>`. Deliveries
//! are verified before their payload is looked at.

use std::fmt;

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Why a delivery's signature was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    /// The request carried no `X-Hub-Signature-256` header.
    #[error("missing signature header")]
    Missing,

    /// The header is not `sha256=` followed by hex.
    #[error("malformed signature header")]
    Malformed,

    /// The signature does not match the payload.
    #[error("signature mismatch")]
    Mismatch,
}

/// The shared secret configured on the GitHub hook.
///
/// `Debug` does not print the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct WebhookSecret(Vec<u8>);

impl WebhookSecret {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        WebhookSecret(secret.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Checks `signature_header` against `payload`.
    ///
    /// The comparison is constant-time.
    pub fn verify(&self, payload: &[u8], signature_header: Option<&str>) -> Result<(), SignatureError> {
        let header = signature_header.ok_or(SignatureError::Missing)?;
        let expected = parse_signature_header(header).ok_or(SignatureError::Malformed)?;

        let mut mac = HmacSha256::new_from_slice(&self.0).expect("HMAC can take key of any size");
        mac.update(payload);
        mac.verify_slice(&expected)
            .map_err(|_| SignatureError::Mismatch)
    }

    /// Computes the `X-Hub-Signature-256` header value GitHub would send
    /// for `payload`.
    pub fn sign(&self, payload: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(&self.0).expect("HMAC can take key of any size");
        mac.update(payload);
        format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
    }
}

impl fmt::Debug for WebhookSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WebhookSecret(..)")
    }
}

/// Parses a GitHub signature header (`sha256=abc123...`) into raw bytes.
///
/// Returns `None` for malformed headers (missing prefix, invalid hex).
///
/// ```
/// use github_maintenance_exporter::webhooks::parse_signature_header;
///
/// assert!(parse_signature_header("sha256=abcd1234").is_some());
/// assert!(parse_signature_header("abcd1234").is_none());
/// assert!(parse_signature_header("sha1=abcd1234").is_none());
/// assert!(parse_signature_header("sha256=xyz").is_none());
/// ```
pub fn parse_signature_header(header: &str) -> Option<Vec<u8>> {
    let hex_sig = header.strip_prefix("sha256=")?;
    hex::decode(hex_sig).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn known_vector() {
        // RFC 4231 test case 2.
        let secret = WebhookSecret::new("Jefe");
        let header = secret.sign(b"what do ya want for nothing?");
        assert_eq!(
            header,
            "sha256=5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn accepts_own_signature() {
        let secret = WebhookSecret::new("goodsecret");
        let payload = br#"{"zen": "Design for failure."}"#;
        let header = secret.sign(payload);

        assert_eq!(secret.verify(payload, Some(&header)), Ok(()));
    }

    #[test]
    fn rejects_wrong_secret() {
        let payload = b"payload";
        let header = WebhookSecret::new("badsecret").sign(payload);

        assert_eq!(
            WebhookSecret::new("goodsecret").verify(payload, Some(&header)),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn rejects_missing_and_malformed_headers() {
        let secret = WebhookSecret::new("goodsecret");

        assert_eq!(secret.verify(b"x", None), Err(SignatureError::Missing));
        assert_eq!(secret.verify(b"x", Some("")), Err(SignatureError::Malformed));
        assert_eq!(
            secret.verify(b"x", Some("sha1=0123456789abcdef0123456789abcdef01234567")),
            Err(SignatureError::Malformed)
        );
        assert_eq!(secret.verify(b"x", Some("sha256=zz")), Err(SignatureError::Malformed));
    }

    #[test]
    fn rejects_truncated_signature() {
        let secret = WebhookSecret::new("goodsecret");
        let mut header = secret.sign(b"x");
        header.truncate(header.len() - 2);

        assert_eq!(secret.verify(b"x", Some(&header)), Err(SignatureError::Mismatch));
    }

    #[test]
    fn debug_hides_secret() {
        let secret = WebhookSecret::new("hunter2");
        assert!(!format!("{secret:?}").contains("hunter2"));
    }

    proptest! {
        #[test]
        fn tampered_payload_is_rejected(
            payload in prop::collection::vec(any::<u8>(), 1..256),
            index in any::<prop::sample::Index>(),
            flip in 1u8..=255,
        ) {
            let secret = WebhookSecret::new("goodsecret");
            let header = secret.sign(&payload);

            let mut tampered = payload.clone();
            let i = index.index(tampered.len());
            tampered[i] ^= flip;

            prop_assert_eq!(secret.verify(&tampered, Some(&header)), Err(SignatureError::Mismatch));
        }

        #[test]
        fn parse_signature_header_never_panics(header in ".*") {
            let _ = parse_signature_header(&header);
        }
    }
}
