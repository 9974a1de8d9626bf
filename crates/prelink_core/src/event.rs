//! Inputs from the two sides being correlated.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Pre-request notification reported by the browser before it issues I/O.
///
/// Only `method` and `url` are examined. Every other field (request id,
/// resource type, originating frame...) is carried in `extra` and handed to
/// the matching lookup untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrowserPreRequest {
    pub method: String,
    pub url: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl BrowserPreRequest {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            extra: Map::new(),
        }
    }

    /// Attach an opaque browser-supplied field.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(name.into(), value.into());
        self
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.extra.get(name)
    }

    pub fn resource_type(&self) -> Option<&str> {
        self.field("resourceType").and_then(Value::as_str)
    }

    pub fn request_id(&self) -> Option<&str> {
        self.field("requestId").and_then(Value::as_str)
    }
}

/// What the proxy knows about a request it is about to forward.
pub trait RequestDescriptor {
    fn method(&self) -> &str;

    /// Absolute URL as the browser would have reported it.
    fn proxied_url(&self) -> Cow<'_, str>;
}

/// Plain method + URL descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxiedRequest {
    pub method: String,
    pub proxied_url: String,
}

impl ProxiedRequest {
    pub fn new(method: impl Into<String>, proxied_url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            proxied_url: proxied_url.into(),
        }
    }
}

impl RequestDescriptor for ProxiedRequest {
    fn method(&self) -> &str {
        &self.method
    }

    fn proxied_url(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.proxied_url)
    }
}

impl<B> RequestDescriptor for http::Request<B> {
    fn method(&self) -> &str {
        http::Request::method(self).as_str()
    }

    fn proxied_url(&self) -> Cow<'_, str> {
        Cow::Owned(self.uri().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::{BrowserPreRequest, ProxiedRequest, RequestDescriptor};
    use crate::key::CorrelationKey;

    #[test]
    fn opaque_fields_round_trip_through_json() {
        let raw = r#"{"method":"GET","url":"http://x/a","requestId":"7.1","resourceType":"xhr","frame":{"id":3}}"#;
        let event: BrowserPreRequest = serde_json::from_str(raw).expect("valid event");

        assert_eq!(event.method, "GET");
        assert_eq!(event.request_id(), Some("7.1"));
        assert_eq!(event.resource_type(), Some("xhr"));
        assert_eq!(event.field("frame"), Some(&serde_json::json!({"id": 3})));

        let back = serde_json::to_value(&event).expect("serializable");
        assert_eq!(back, serde_json::from_str::<serde_json::Value>(raw).unwrap());
    }

    #[test]
    fn http_request_uses_absolute_uri() {
        let req = http::Request::builder()
            .method("POST")
            .uri("http://x/c?q=1")
            .body(())
            .unwrap();
        assert_eq!(RequestDescriptor::method(&req), "POST");
        assert_eq!(req.proxied_url(), "http://x/c?q=1");
        assert_eq!(
            CorrelationKey::from_request(&req),
            CorrelationKey::new("POST", "http://x/c?q=1")
        );
    }

    #[test]
    fn pre_request_and_descriptor_share_a_key() {
        let event = BrowserPreRequest::new("GET", "http://x/a").with_field("resourceType", "img");
        let req = ProxiedRequest::new("GET", "http://x/a");
        assert_eq!(
            CorrelationKey::from_pre_request(&event),
            CorrelationKey::from_request(&req)
        );
    }
}
