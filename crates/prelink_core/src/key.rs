use std::fmt;

use crate::event::{BrowserPreRequest, RequestDescriptor};

/// Correlation key shared by a browser pre-request and a proxied request.
///
/// Exact, case-sensitive match on method and URL. Two identical requests in
/// flight at once share a key and cannot be told apart.
#[derive(Hash, Eq, PartialEq, Clone, Debug)]
pub struct CorrelationKey {
    pub method: String,
    pub url: String,
}

impl CorrelationKey {
    pub fn new(method: &str, url: &str) -> Self {
        Self {
            method: method.to_string(),
            url: url.to_string(),
        }
    }

    pub fn from_pre_request(event: &BrowserPreRequest) -> Self {
        Self::new(&event.method, &event.url)
    }

    pub fn from_request<D: RequestDescriptor + ?Sized>(req: &D) -> Self {
        Self::new(req.method(), &req.proxied_url())
    }
}

impl fmt::Display for CorrelationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.method, self.url)
    }
}

#[cfg(test)]
mod tests {
    use super::CorrelationKey;

    #[test]
    fn method_is_case_sensitive() {
        assert_ne!(
            CorrelationKey::new("GET", "http://x/a"),
            CorrelationKey::new("get", "http://x/a")
        );
    }

    #[test]
    fn url_must_match_exactly() {
        assert_ne!(
            CorrelationKey::new("GET", "http://x/a"),
            CorrelationKey::new("GET", "http://x/a/")
        );
    }

    #[test]
    fn displays_method_dash_url() {
        assert_eq!(
            CorrelationKey::new("POST", "http://x/c").to_string(),
            "POST-http://x/c"
        );
    }
}
