//! VAPID key pair handling (RFC 8292).
//!
//! Keys are provisioned out-of-band and handed to the library as base64url
//! strings. Validation happens once, up front, so a misconfigured key pair
//! fails before any push service is contacted.

// Rust guideline compliant 2026-02

use p256::ecdsa::{SigningKey, VerifyingKey};
use p256::elliptic_curve::rand_core::OsRng;
use serde::{Deserialize, Serialize};

use crate::base64url;
use crate::error::{KeyKind, PushError, Result};

/// Length of an uncompressed SEC1 P-256 point.
pub const PUBLIC_KEY_LEN: usize = 65;

/// Length of a raw P-256 private scalar.
pub const PRIVATE_KEY_LEN: usize = 32;

/// VAPID keypair for web push authentication.
///
/// The private key is the raw 32-byte scalar (base64url). The public key is
/// the uncompressed SEC1 point (65 bytes, `0x04 ‖ X ‖ Y`). Deserializing
/// runs the same checks as [`VapidKeys::from_base64url`].
#[derive(Clone, Serialize, Deserialize)]
#[serde(try_from = "RawVapidKeys")]
pub struct VapidKeys {
    /// Raw 32-byte P-256 private key scalar (base64url).
    private_key_b64: String,
    /// Uncompressed public key bytes (base64url, 65 bytes decoded).
    public_key_b64: String,
}

/// Unvalidated serialized form of [`VapidKeys`].
#[derive(Deserialize)]
struct RawVapidKeys {
    private_key_b64: String,
    public_key_b64: String,
}

impl TryFrom<RawVapidKeys> for VapidKeys {
    type Error = PushError;

    fn try_from(raw: RawVapidKeys) -> Result<Self> {
        Self::from_base64url(&raw.public_key_b64, &raw.private_key_b64)
    }
}

impl std::fmt::Debug for VapidKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VapidKeys")
            .field("public_key_b64", &self.public_key_b64)
            .finish_non_exhaustive()
    }
}

impl VapidKeys {
    /// Generate a fresh VAPID keypair.
    pub fn generate() -> Self {
        let signing_key = SigningKey::random(&mut OsRng);
        let public_bytes = signing_key.verifying_key().to_encoded_point(false);

        Self {
            private_key_b64: base64url::encode(signing_key.to_bytes()),
            public_key_b64: base64url::encode(public_bytes.as_bytes()),
        }
    }

    /// Reconstruct from base64url-encoded strings.
    ///
    /// Checks lengths and the uncompressed-point prefix first, then that the
    /// scalar is valid on P-256 and actually derives the given public key.
    pub fn from_base64url(public_key_b64: &str, private_key_b64: &str) -> Result<Self> {
        let public_key_b64 = public_key_b64.trim();
        let private_key_b64 = private_key_b64.trim();

        let pub_bytes = check_public_key(&base64url::decode(public_key_b64)?)?;
        let priv_bytes = check_private_key(&base64url::decode(private_key_b64)?)?;
        check_pair(&pub_bytes, &priv_bytes)?;

        Ok(Self {
            private_key_b64: base64url::encode(priv_bytes),
            public_key_b64: base64url::encode(pub_bytes),
        })
    }

    /// Base64url-encoded uncompressed public key (65 bytes decoded).
    ///
    /// This is the browser's `applicationServerKey` and the `k=` /
    /// `p256ecdsa=` value on every push request.
    pub fn public_key_base64url(&self) -> &str {
        &self.public_key_b64
    }

    /// Base64url-encoded raw 32-byte private key scalar.
    pub fn private_key_base64url(&self) -> &str {
        &self.private_key_b64
    }

    /// Uncompressed public key bytes (65 bytes).
    pub fn public_key_bytes(&self) -> Result<Vec<u8>> {
        base64url::decode(&self.public_key_b64)
    }

    /// P-256 signing key for ES256, after re-checking both halves of the pair.
    pub(crate) fn signing_key(&self) -> Result<SigningKey> {
        let pub_bytes = check_public_key(&self.public_key_bytes()?)?;
        let priv_bytes = check_private_key(&base64url::decode(&self.private_key_b64)?)?;
        check_pair(&pub_bytes, &priv_bytes)
    }

    /// P-256 verifying key, mostly useful for checking issued tokens.
    pub fn verifying_key(&self) -> Result<VerifyingKey> {
        VerifyingKey::from_sec1_bytes(&self.public_key_bytes()?).map_err(|e| {
            PushError::InvalidKey {
                kind: KeyKind::Public,
                expected: "a point on P-256",
                found: e.to_string(),
            }
        })
    }
}

/// Enforce the 65-byte `0x04`-prefixed shape.
pub(crate) fn check_public_key(bytes: &[u8]) -> Result<[u8; PUBLIC_KEY_LEN]> {
    let array: [u8; PUBLIC_KEY_LEN] = bytes.try_into().map_err(|_| PushError::InvalidKey {
        kind: KeyKind::Public,
        expected: "65-byte uncompressed P-256 point",
        found: format!("{} bytes", bytes.len()),
    })?;
    if array[0] != 0x04 {
        return Err(PushError::InvalidKey {
            kind: KeyKind::Public,
            expected: "uncompressed point starting with 0x04",
            found: format!("leading byte 0x{:02x}", array[0]),
        });
    }
    Ok(array)
}

/// Enforce the 32-byte scalar length.
pub(crate) fn check_private_key(bytes: &[u8]) -> Result<[u8; PRIVATE_KEY_LEN]> {
    bytes.try_into().map_err(|_| PushError::InvalidKey {
        kind: KeyKind::Private,
        expected: "32-byte P-256 scalar",
        found: format!("{} bytes", bytes.len()),
    })
}

/// Check that `private_key` is a valid scalar deriving `public_key`.
pub(crate) fn check_pair(
    public_key: &[u8; PUBLIC_KEY_LEN],
    private_key: &[u8; PRIVATE_KEY_LEN],
) -> Result<SigningKey> {
    let signing_key =
        SigningKey::from_bytes(private_key.as_slice().into()).map_err(|e| PushError::InvalidKey {
            kind: KeyKind::Private,
            expected: "a valid P-256 scalar",
            found: e.to_string(),
        })?;
    let derived = signing_key.verifying_key().to_encoded_point(false);
    if derived.as_bytes() != public_key.as_slice() {
        return Err(PushError::KeyMismatch);
    }
    Ok(signing_key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_vapid_keys() {
        let keys = VapidKeys::generate();

        let pub_bytes = keys.public_key_bytes().expect("decode public key");
        assert_eq!(pub_bytes.len(), 65, "uncompressed P-256 public key is 65 bytes");
        assert_eq!(pub_bytes[0], 0x04, "uncompressed point starts with 0x04");

        let priv_bytes = base64url::decode(keys.private_key_base64url()).expect("decode private key");
        assert_eq!(priv_bytes.len(), 32, "raw P-256 scalar is 32 bytes");
    }

    #[test]
    fn test_from_base64url_roundtrip() {
        let keys = VapidKeys::generate();
        let reconstructed =
            VapidKeys::from_base64url(keys.public_key_base64url(), keys.private_key_base64url())
                .expect("should reconstruct from base64url");

        assert_eq!(keys.public_key_base64url(), reconstructed.public_key_base64url());
        assert_eq!(keys.private_key_base64url(), reconstructed.private_key_base64url());
    }

    #[test]
    fn test_from_base64url_trims_pasted_keys() {
        let keys = VapidKeys::generate();
        let public = format!("  {}\n", keys.public_key_base64url());
        let private = format!("{}\n", keys.private_key_base64url());
        let loaded = VapidKeys::from_base64url(&public, &private).expect("trimmed");
        assert_eq!(loaded.public_key_base64url(), keys.public_key_base64url());
    }

    #[test]
    fn test_from_base64url_rejects_invalid() {
        assert!(VapidKeys::from_base64url("not-valid-key", "also-bad").is_err());
    }

    #[test]
    fn test_short_public_key_reports_length() {
        let keys = VapidKeys::generate();
        let short = base64url::encode([0x04u8; 64]);
        let err = VapidKeys::from_base64url(&short, keys.private_key_base64url())
            .expect_err("64-byte key");
        let msg = err.to_string();
        assert!(msg.contains("64 bytes"), "{msg}");
        assert!(msg.contains("65-byte"), "{msg}");
    }

    #[test]
    fn test_compressed_prefix_rejected() {
        let keys = VapidKeys::generate();
        let mut bytes = keys.public_key_bytes().expect("decode");
        bytes[0] = 0x02;
        let err = VapidKeys::from_base64url(&base64url::encode(&bytes), keys.private_key_base64url())
            .expect_err("wrong prefix");
        assert!(matches!(err, PushError::InvalidKey { kind: KeyKind::Public, .. }));
    }

    #[test]
    fn test_private_key_length_checked() {
        let keys = VapidKeys::generate();
        let err = VapidKeys::from_base64url(keys.public_key_base64url(), &base64url::encode([7u8; 31]))
            .expect_err("31-byte scalar");
        assert!(matches!(err, PushError::InvalidKey { kind: KeyKind::Private, .. }));
        assert!(err.to_string().contains("31 bytes"));
    }

    #[test]
    fn test_mismatched_pair_rejected() {
        let a = VapidKeys::generate();
        let b = VapidKeys::generate();
        let err = VapidKeys::from_base64url(a.public_key_base64url(), b.private_key_base64url())
            .expect_err("mismatch");
        assert!(matches!(err, PushError::KeyMismatch));
    }

    #[test]
    fn test_vapid_keys_roundtrip_serde() {
        let keys = VapidKeys::generate();
        let json = serde_json::to_string(&keys).expect("serialize");
        let loaded: VapidKeys = serde_json::from_str(&json).expect("deserialize");

        assert_eq!(keys.public_key_base64url(), loaded.public_key_base64url());
        assert_eq!(keys.private_key_base64url(), loaded.private_key_base64url());
    }

    #[test]
    fn test_deserialize_validates_public_key() {
        let keys = VapidKeys::generate();
        let json = serde_json::json!({
            "private_key_b64": keys.private_key_base64url(),
            "public_key_b64": base64url::encode([0x05u8; 64]),
        });
        let err = serde_json::from_value::<VapidKeys>(json).expect_err("malformed public key");
        assert!(err.to_string().contains("64 bytes"), "{err}");
    }

    #[test]
    fn test_deserialize_validates_pair() {
        let a = VapidKeys::generate();
        let b = VapidKeys::generate();
        let json = serde_json::json!({
            "private_key_b64": b.private_key_base64url(),
            "public_key_b64": a.public_key_base64url(),
        });
        let err = serde_json::from_value::<VapidKeys>(json).expect_err("mismatched pair");
        assert!(err.to_string().contains("does not match"), "{err}");
    }

    #[test]
    fn test_debug_hides_private_key() {
        let keys = VapidKeys::generate();
        let debug = format!("{keys:?}");
        assert!(!debug.contains(keys.private_key_base64url()));
    }
}
