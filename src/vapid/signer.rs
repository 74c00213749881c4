//! ES256 VAPID JWT signing.
//!
//! A token is scoped to exactly one push-service origin (`aud`). Push
//! services verify the signature against the `k=` / `p256ecdsa=` key sent
//! alongside it and reject tokens minted for another origin, so every
//! subscription needs a token for its own endpoint's origin.
//!
//! # Token shape
//!
//! ```text
//! base64url({"typ":"JWT","alg":"ES256"})
//!   . base64url({"aud":"https://fcm.googleapis.com","exp":1700000000,"sub":"mailto:ops@example.com"})
//!   . base64url(r ‖ s)
//! ```

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::Utc;
use p256::ecdsa::signature::Signer;
use p256::ecdsa::{Signature, SigningKey};
use serde::{Deserialize, Serialize};

use crate::base64url;
use crate::constants::{MAX_JWT_EXPIRY_SECS, TOKEN_REFRESH_MARGIN_SECS, VAPID_JWT_EXPIRY_SECS};
use crate::der::der_to_jose;
use crate::error::{PushError, Result};
use crate::vapid::keys::{check_pair, check_private_key, check_public_key, VapidKeys};

/// JOSE header of every VAPID token.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct JwtHeader {
    /// Always `"JWT"`.
    pub typ: String,
    /// Always `"ES256"`.
    pub alg: String,
}

impl Default for JwtHeader {
    fn default() -> Self {
        Self {
            typ: "JWT".to_string(),
            alg: "ES256".to_string(),
        }
    }
}

/// VAPID claims set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VapidClaims {
    /// Origin of the push service the token is presented to.
    pub aud: String,
    /// Expiry as a Unix timestamp in seconds.
    pub exp: i64,
    /// Operator contact URI (`mailto:` or `https:`).
    pub sub: String,
}

/// Private key in JWK form (RFC 7518 §6.2), with every member base64url.
///
/// Built from the raw key pair before signing, so a malformed pair is caught
/// as a key error rather than surfacing from inside the ECDSA primitive.
#[derive(Debug, Serialize)]
pub(crate) struct EcPrivateJwk {
    kty: &'static str,
    crv: &'static str,
    x: String,
    y: String,
    d: String,
}

impl EcPrivateJwk {
    fn from_raw(public_key: &[u8], private_key: &[u8]) -> Result<Self> {
        let public_key = check_public_key(public_key)?;
        let private_key = check_private_key(private_key)?;
        check_pair(&public_key, &private_key)?;
        Ok(Self {
            kty: "EC",
            crv: "P-256",
            x: base64url::encode(&public_key[1..33]),
            y: base64url::encode(&public_key[33..65]),
            d: base64url::encode(private_key),
        })
    }

    fn signing_key(&self) -> Result<SigningKey> {
        let d = base64url::decode(&self.d)?;
        SigningKey::from_bytes(d.as_slice().into()).map_err(|e| PushError::Signing(e.to_string()))
    }
}

/// Sign a VAPID JWT for `audience` with a fresh 12-hour expiry.
///
/// Keys are the base64url strings operators provision; length and prefix
/// are checked before any cryptography is attempted, and the private scalar
/// must derive the public key.
pub fn generate_vapid_jwt(
    audience: &str,
    subject: &str,
    public_key_b64: &str,
    private_key_b64: &str,
) -> Result<String> {
    let public_key = base64url::decode(public_key_b64)?;
    let private_key = base64url::decode(private_key_b64)?;
    let jwk = EcPrivateJwk::from_raw(&public_key, &private_key)?;

    let claims = VapidClaims {
        aud: audience.to_string(),
        exp: Utc::now().timestamp() + VAPID_JWT_EXPIRY_SECS,
        sub: subject.to_string(),
    };
    sign_claims(&jwk.signing_key()?, &claims)
}

/// Encode header and claims, sign, and append the JOSE signature.
fn sign_claims(key: &SigningKey, claims: &VapidClaims) -> Result<String> {
    let header = base64url::encode(serde_json::to_vec(&JwtHeader::default())?);
    let payload = base64url::encode(serde_json::to_vec(claims)?);
    let signing_input = format!("{header}.{payload}");

    let signature: Signature = key
        .try_sign(signing_input.as_bytes())
        .map_err(|e| PushError::Signing(e.to_string()))?;
    let jose = der_to_jose(signature.to_der().as_bytes())?;

    Ok(format!("{signing_input}.{}", base64url::encode(jose)))
}

/// Decode the claims segment of a compact JWT without verifying it.
pub fn decode_claims(token: &str) -> Result<VapidClaims> {
    let segment = token.split('.').nth(1).ok_or_else(|| {
        PushError::Signing("token has no claims segment".to_string())
    })?;
    Ok(serde_json::from_slice(&base64url::decode(segment)?)?)
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    exp: i64,
}

/// Reusable signer bound to one validated key pair and subject.
///
/// Tokens are cached per audience and reissued once less than
/// [`TOKEN_REFRESH_MARGIN_SECS`] of validity remains.
pub struct VapidSigner {
    keys: VapidKeys,
    signing_key: SigningKey,
    subject: String,
    expiry_secs: i64,
    cache: Mutex<HashMap<String, CachedToken>>,
}

impl std::fmt::Debug for VapidSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VapidSigner")
            .field("subject", &self.subject)
            .field("expiry_secs", &self.expiry_secs)
            .finish_non_exhaustive()
    }
}

impl VapidSigner {
    /// Create a signer with the default 12-hour token lifetime.
    pub fn new(keys: VapidKeys, subject: impl Into<String>) -> Result<Self> {
        let signing_key = keys.signing_key()?;
        Ok(Self {
            keys,
            signing_key,
            subject: subject.into(),
            expiry_secs: VAPID_JWT_EXPIRY_SECS,
            cache: Mutex::new(HashMap::new()),
        })
    }

    /// Override the token lifetime. RFC 8292 caps it at 24 hours.
    pub fn with_expiry_secs(mut self, expiry_secs: i64) -> Result<Self> {
        if !(1..=MAX_JWT_EXPIRY_SECS).contains(&expiry_secs) {
            return Err(PushError::InvalidExpiry {
                max: MAX_JWT_EXPIRY_SECS,
                found: expiry_secs,
            });
        }
        self.expiry_secs = expiry_secs;
        Ok(self)
    }

    /// Key pair this signer uses.
    pub fn keys(&self) -> &VapidKeys {
        &self.keys
    }

    /// Base64url public key sent alongside every token.
    pub fn public_key(&self) -> &str {
        self.keys.public_key_base64url()
    }

    /// Contact URI placed in `sub`.
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Sign a new token for `audience`, bypassing the cache.
    pub fn sign(&self, audience: &str) -> Result<String> {
        let claims = VapidClaims {
            aud: audience.to_string(),
            exp: Utc::now().timestamp() + self.expiry_secs,
            sub: self.subject.clone(),
        };
        sign_claims(&self.signing_key, &claims)
    }

    /// Token for `audience`, reusing a cached one while it is still fresh.
    pub fn token_for(&self, audience: &str) -> Result<String> {
        let now = Utc::now().timestamp();
        let margin = TOKEN_REFRESH_MARGIN_SECS.min(self.expiry_secs / 2);

        if let Some(cached) = self.lock_cache().get(audience) {
            if cached.exp - now > margin {
                return Ok(cached.token.clone());
            }
        }

        let exp = now + self.expiry_secs;
        let token = sign_claims(
            &self.signing_key,
            &VapidClaims {
                aud: audience.to_string(),
                exp,
                sub: self.subject.clone(),
            },
        )?;
        log::debug!("[WebPush] Issued VAPID token for {audience}");
        self.lock_cache().insert(
            audience.to_string(),
            CachedToken {
                token: token.clone(),
                exp,
            },
        );
        Ok(token)
    }

    fn lock_cache(&self) -> std::sync::MutexGuard<'_, HashMap<String, CachedToken>> {
        // A poisoned cache only holds tokens; keep using it.
        self.cache
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
