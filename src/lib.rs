//! VAPID-authenticated Web Push dispatch.
//!
//! Given a batch of push subscriptions and a JSON payload, this crate signs
//! an ES256 VAPID token for each endpoint's origin (RFC 8292), shapes the
//! request headers the way that endpoint's push service expects, POSTs the
//! payload, and reports per-endpoint outcomes. Endpoints the push service
//! reports gone (404/410) are deleted from the subscription store after the
//! batch.
//!
//! # Architecture
//!
//! ```text
//! SubscriptionStore ──list──▶ Dispatcher ──per subscription──┐
//!                                 │                          ▼
//!                                 │        PushTarget (origin + PushVendor)
//!                                 │                          ▼
//!                                 │        VapidSigner (ES256, DER → JOSE)
//!                                 │                          ▼
//!                                 │        build_headers ──▶ PushTransport::post
//!                                 ▼
//!                          DispatchReport ──gone endpoints──▶ SubscriptionStore::delete
//! ```
//!
//! # Modules
//!
//! - [`base64url`] - unpadded URL-safe base64
//! - [`der`] - DER → JOSE ECDSA signature conversion
//! - [`vapid`] - key pairs and JWT signing
//! - [`vendor`] - push vendor classification and headers
//! - [`transport`] - HTTP delivery
//! - [`dispatch`] - batch orchestration and reporting
//! - [`store`] - subscription records and storage
//! - [`config`] - configuration loading/saving

pub mod base64url;
pub mod config;
pub mod constants;
pub mod der;
pub mod dispatch;
pub mod error;
pub mod payload;
pub mod store;
pub mod transport;
pub mod vapid;
pub mod vendor;

// Re-export commonly used types
pub use config::Config;
pub use dispatch::{DispatchReport, DispatchResult, Dispatcher, Outcome};
pub use error::{PushError, Result};
pub use payload::NotificationPayload;
pub use store::{
    FileSubscriptionStore, MemorySubscriptionStore, PushSubscription, SubscriptionFilter,
    SubscriptionStore,
};
pub use transport::{HttpTransport, PushRequest, PushResponse, PushTransport, TransportError};
pub use vapid::{generate_vapid_jwt, VapidKeys, VapidSigner};
pub use vendor::{build_headers, PushHeaders, PushVendor};
