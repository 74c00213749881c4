//! Protocol and runtime constants.
//!
//! # Categories
//!
//! - **VAPID**: token lifetimes
//! - **TTL**: per-vendor `TTL` header values
//! - **Dispatch**: concurrency and timeouts

use std::time::Duration;

// ============================================================================
// VAPID
// ============================================================================

/// Lifetime of a VAPID JWT (12 hours).
pub const VAPID_JWT_EXPIRY_SECS: i64 = 12 * 60 * 60;

/// Upper bound on a VAPID JWT lifetime (RFC 8292 §2: no more than 24 hours).
pub const MAX_JWT_EXPIRY_SECS: i64 = 24 * 60 * 60;

/// Cached tokens are reissued once less than this much validity remains.
pub const TOKEN_REFRESH_MARGIN_SECS: i64 = 60 * 60;

// ============================================================================
// TTL
// ============================================================================

/// `TTL` for Apple Web Push (4 weeks). iOS delivers in the background and
/// drops messages whose TTL has lapsed while the device was asleep.
pub const APPLE_TTL_SECS: u32 = 2_419_200;

/// `TTL` for FCM, WNS and generic push services (24 hours).
pub const DEFAULT_TTL_SECS: u32 = 86_400;

// ============================================================================
// Dispatch
// ============================================================================

/// Per-request timeout for POSTs to push services.
pub const HTTP_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Default number of in-flight push requests per batch.
pub const DEFAULT_MAX_CONCURRENCY: usize = 16;

/// Longest response body kept as `error_detail`.
pub const MAX_ERROR_DETAIL_LEN: usize = 512;

/// User-Agent header for push requests.
pub fn user_agent() -> String {
    format!("webpush-dispatch/{}", env!("CARGO_PKG_VERSION"))
}
