//! VAPID (RFC 8292) application server identification.
//!
//! - [`keys`] - P-256 key pair validation and generation
//! - [`signer`] - ES256 JWT construction, one token per push-service origin

pub mod keys;
pub mod signer;

pub use keys::VapidKeys;
pub use signer::{generate_vapid_jwt, VapidClaims, VapidSigner};
