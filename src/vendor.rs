//! Push vendor classification and request header shaping.
//!
//! Push services agree on the VAPID token but not on how it is carried.
//! Apple takes a single combined `authorization: vapid t=…, k=…` header;
//! FCM, WNS and everyone else take the split `Authorization: WebPush …` and
//! `Crypto-Key: p256ecdsa=…` pair from the older drafts. Vendor identity is
//! derived once from the endpoint host and everything else keys off it.

use serde::{Deserialize, Serialize};

use crate::constants::{APPLE_TTL_SECS, DEFAULT_TTL_SECS};

/// Push service behind an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PushVendor {
    /// Apple Web Push (`*.web.push.apple.com`).
    #[serde(rename = "apns")]
    Apple,
    /// Firebase Cloud Messaging (`fcm.googleapis.com`).
    #[serde(rename = "fcm")]
    Fcm,
    /// Windows Notification Service (`*.notify.windows.com`).
    #[serde(rename = "wns")]
    Wns,
    /// Any other RFC 8030 push service.
    #[serde(rename = "generic")]
    Generic,
}

impl PushVendor {
    /// Classify a push endpoint by hostname. First match wins.
    pub fn classify(host: &str) -> Self {
        let host = host.trim_end_matches('.').to_ascii_lowercase();
        if is_domain_or_subdomain(&host, "web.push.apple.com") {
            Self::Apple
        } else if is_domain_or_subdomain(&host, "fcm.googleapis.com") {
            Self::Fcm
        } else if host.contains("notify.windows.com") {
            Self::Wns
        } else {
            Self::Generic
        }
    }

    /// Short name used in reports (`apns`, `fcm`, `wns`, `generic`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Apple => "apns",
            Self::Fcm => "fcm",
            Self::Wns => "wns",
            Self::Generic => "generic",
        }
    }

    /// Value of the `TTL` header for this vendor.
    pub fn ttl_secs(self) -> u32 {
        match self {
            Self::Apple => APPLE_TTL_SECS,
            Self::Fcm | Self::Wns | Self::Generic => DEFAULT_TTL_SECS,
        }
    }
}

impl std::fmt::Display for PushVendor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn is_domain_or_subdomain(host: &str, domain: &str) -> bool {
    host == domain
        || host
            .strip_suffix(domain)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

/// Ordered request headers. Name casing is kept exactly as built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PushHeaders {
    entries: Vec<(&'static str, String)>,
}

impl PushHeaders {
    fn push(&mut self, name: &'static str, value: String) {
        self.entries.push((name, value));
    }

    /// Look up a header by its exact name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Look up a header ignoring name case.
    pub fn get_ignore_case(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Whether a header with this exact name is present.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// The `TTL` value carried in the map.
    pub fn ttl(&self) -> Option<u32> {
        self.get("TTL").and_then(|v| v.parse().ok())
    }

    /// Iterate `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.entries.iter().map(|(n, v)| (*n, v.as_str()))
    }

    /// Number of headers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no headers.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Build the headers for one push request.
///
/// `jwt` must already be scoped to the endpoint's origin; `public_key` is
/// the base64url VAPID public key.
pub fn build_headers(vendor: PushVendor, jwt: &str, public_key: &str) -> PushHeaders {
    let mut headers = PushHeaders::default();
    match vendor {
        PushVendor::Apple => {
            headers.push("authorization", format!("vapid t={jwt}, k={public_key}"));
        }
        PushVendor::Fcm | PushVendor::Wns | PushVendor::Generic => {
            headers.push("Authorization", format!("WebPush {jwt}"));
            headers.push("Crypto-Key", format!("p256ecdsa={public_key}"));
        }
    }
    headers.push("TTL", vendor.ttl_secs().to_string());
    headers.push("Content-Type", "application/json".to_string());
    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_table() {
        let cases = [
            ("web.push.apple.com", PushVendor::Apple),
            ("api.web.push.apple.com", PushVendor::Apple),
            ("fcm.googleapis.com", PushVendor::Fcm),
            ("FCM.googleapis.com", PushVendor::Fcm),
            ("wns.notify.windows.com", PushVendor::Wns),
            ("wns2-par02p.notify.windows.com", PushVendor::Wns),
            ("updates.push.services.mozilla.com", PushVendor::Generic),
            ("random-push-vendor.example", PushVendor::Generic),
            ("evilweb.push.apple.com.example", PushVendor::Generic),
            ("notfcm.googleapis.com", PushVendor::Generic),
        ];
        for (host, expected) in cases {
            assert_eq!(PushVendor::classify(host), expected, "{host}");
        }
    }

    #[test]
    fn test_apple_headers() {
        let headers = build_headers(PushVendor::Apple, "jwt.token.sig", "PUBKEY");
        let auth = headers.get("authorization").expect("lowercase authorization");
        assert!(auth.starts_with("vapid t="));
        assert_eq!(auth, "vapid t=jwt.token.sig, k=PUBKEY");
        assert!(!headers.contains("Crypto-Key"));
        assert_eq!(headers.get("TTL"), Some("2419200"));
        assert_eq!(headers.ttl(), Some(2_419_200));
    }

    #[test]
    fn test_fcm_headers() {
        let headers = build_headers(PushVendor::Fcm, "jwt.token.sig", "PUBKEY");
        assert_eq!(headers.get("Authorization"), Some("WebPush jwt.token.sig"));
        assert_eq!(headers.get("Crypto-Key"), Some("p256ecdsa=PUBKEY"));
        assert_eq!(headers.get("TTL"), Some("86400"));
    }

    #[test]
    fn test_wns_and_generic_share_fcm_shape() {
        let fcm = build_headers(PushVendor::Fcm, "t", "k");
        assert_eq!(build_headers(PushVendor::Wns, "t", "k"), fcm);
        assert_eq!(build_headers(PushVendor::Generic, "t", "k"), fcm);
    }

    #[test]
    fn test_content_type_is_json() {
        for vendor in [PushVendor::Apple, PushVendor::Fcm, PushVendor::Generic] {
            let headers = build_headers(vendor, "t", "k");
            assert_eq!(headers.get_ignore_case("content-type"), Some("application/json"));
        }
    }

    #[test]
    fn test_vendor_serializes_short_name() {
        assert_eq!(serde_json::to_string(&PushVendor::Apple).expect("json"), "\"apns\"");
        assert_eq!(PushVendor::Wns.to_string(), "wns");
    }
}
