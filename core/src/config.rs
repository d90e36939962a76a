//! Client configuration.

use std::time::Duration;

use crate::headers::HeaderMap;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Upper bound for one transport round-trip. On expiry the transport is
    /// told to cancel and the call fails with `ApiError::Timeout`. `None`
    /// waits indefinitely.
    pub timeout: Option<Duration>,

    /// Headers added to every request that does not already set them.
    pub default_headers: HeaderMap,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Some(DEFAULT_TIMEOUT),
            default_headers: HeaderMap::new(),
        }
    }
}

impl ClientConfig {
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.add(name, value);
        self
    }
}
