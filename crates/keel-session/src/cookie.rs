//! Session token seam between records and the request/response layer.

use std::collections::HashMap;

/// Cookie carrying a session token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
    pub path: String,
    pub max_age_seconds: u64,
    /// Hidden from client-side scripts.
    pub http_only: bool,
}

impl SessionCookie {
    /// Create a root-path, script-inaccessible session cookie.
    pub fn new(name: impl Into<String>, value: impl Into<String>, max_age_seconds: u64) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            path: "/".to_string(),
            max_age_seconds,
            http_only: true,
        }
    }
}

/// Read access to the cookies of an inbound request.
pub trait RequestContext {
    /// Value of the cookie named `name`, if present.
    fn cookie(&self, name: &str) -> Option<String>;
}

/// Write access to the cookies of an outbound response.
pub trait ResponseContext {
    /// Attach a cookie to the response.
    fn add_cookie(&mut self, cookie: SessionCookie);
}

impl RequestContext for HashMap<String, String> {
    fn cookie(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

impl ResponseContext for Vec<SessionCookie> {
    fn add_cookie(&mut self, cookie: SessionCookie) {
        self.push(cookie);
    }
}
