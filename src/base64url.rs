//! Base64url codec (RFC 4648 §5) for JWT segments and VAPID key material.
//!
//! Encoding never emits `=` padding. Decoding accepts input with or without
//! padding, since keys copied out of browsers and dashboards show up both ways.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;

use crate::error::Result;

/// URL-safe alphabet, unpadded output, padding-indifferent input.
const BASE64URL: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Encode bytes as unpadded base64url.
pub fn encode(bytes: impl AsRef<[u8]>) -> String {
    BASE64URL.encode(bytes)
}

/// Decode base64url text, with or without trailing padding.
pub fn decode(text: &str) -> Result<Vec<u8>> {
    Ok(BASE64URL.decode(text)?)
}
