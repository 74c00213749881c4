//! Notification payload helper.
//!
//! The dispatcher sends any serializable value as-is. This type covers the
//! common `{title, body, link, icon, badge}` shape and carries any extra
//! fields through untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Notification body posted to every subscription.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotificationPayload {
    /// Notification title.
    pub title: String,
    /// Notification body text.
    pub body: String,
    /// Click destination.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    /// Icon URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Badge URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub badge: Option<String>,
    /// Any other fields, passed through verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl NotificationPayload {
    /// Payload with just a title and body.
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            ..Self::default()
        }
    }

    /// Set the click destination.
    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }

    /// Set the icon.
    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    /// Set the badge.
    pub fn with_badge(mut self, badge: impl Into<String>) -> Self {
        self.badge = Some(badge.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optional_fields_omitted() {
        let json = serde_json::to_value(NotificationPayload::new("Hi", "There")).expect("json");
        assert_eq!(json, serde_json::json!({"title": "Hi", "body": "There"}));
    }

    #[test]
    fn test_extra_fields_pass_through() {
        let payload: NotificationPayload = serde_json::from_value(serde_json::json!({
            "title": "Prize",
            "body": "Found one",
            "link": "/map",
            "tag": "hunt-42",
            "data": {"x": 1}
        }))
        .expect("parse");
        assert_eq!(payload.link.as_deref(), Some("/map"));
        assert_eq!(payload.extra["tag"], "hunt-42");

        let back = serde_json::to_value(&payload).expect("json");
        assert_eq!(back["data"]["x"], 1);
    }
}
