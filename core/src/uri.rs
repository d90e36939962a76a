//! Structured URI backed by a single authoritative string.
//!
//! # Design
//! `Uri` stores only its serialized form. Component getters run an
//! RFC 3986 component scan over that string on every call, and component
//! setters rebuild the whole string from the current components. There is
//! never a cached component that can drift out of sync with the string.
//!
//! The host is percent-encoded once, when it enters through
//! [`Uri::from_parts`] or [`Uri::set_host`]. Rebuilding after another
//! setter reuses the already-encoded host text verbatim. A `:` in a host
//! is escaped unless the host is a bracketed IP literal, so it can never be
//! read back as a port separator. Userinfo found in the string is carried
//! through every rebuild but cannot be set from components.

use std::convert::Infallible;
use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Bytes escaped in a host: everything except alphanumerics and the
/// characters URL hosts may carry literally.
const HOST_ESCAPE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'!')
    .remove(b'$')
    .remove(b'&')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')')
    .remove(b'*')
    .remove(b'+')
    .remove(b',')
    .remove(b'-')
    .remove(b'.')
    .remove(b':')
    .remove(b';')
    .remove(b'=')
    .remove(b'[')
    .remove(b']')
    .remove(b'_')
    .remove(b'~');

/// [`HOST_ESCAPE`] for hosts that are not bracketed IP literals.
const PLAIN_HOST_ESCAPE: &AsciiSet = &HOST_ESCAPE.add(b':');

fn encode_host(host: &str) -> String {
    let set = if host.starts_with('[') {
        HOST_ESCAPE
    } else {
        PLAIN_HOST_ESCAPE
    };
    utf8_percent_encode(host, set).to_string()
}

/// Well-known schemes.
pub mod scheme {
    pub const HTTP: &str = "http";
    pub const HTTPS: &str = "https";
    /// HTTP over a Unix domain socket; the socket path is the (encoded) host.
    pub const HTTP_UNIX: &str = "http+unix";
    /// HTTPS over a Unix domain socket; the socket path is the (encoded) host.
    pub const HTTPS_UNIX: &str = "https+unix";
}

/// Unencoded components used to construct a [`Uri`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UriParts<'a> {
    pub scheme: Option<&'a str>,
    pub host: Option<&'a str>,
    pub port: Option<u16>,
    pub path: &'a str,
    pub query: Option<&'a str>,
    pub fragment: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Uri {
    string: String,
}

impl Default for Uri {
    fn default() -> Self {
        Self {
            string: "/".to_string(),
        }
    }
}

impl Uri {
    /// Wrap an already-serialized URI string.
    pub fn new(string: impl Into<String>) -> Self {
        Self {
            string: string.into(),
        }
    }

    /// Build a URI from components, percent-encoding the host.
    pub fn from_parts(parts: UriParts<'_>) -> Self {
        let owned = OwnedParts {
            scheme: parts.scheme.map(str::to_string),
            userinfo: None,
            host: parts.host.map(encode_host),
            port: parts.port,
            path: parts.path.to_string(),
            query: parts.query.map(str::to_string),
            fragment: parts.fragment.map(str::to_string),
        };
        Self {
            string: owned.assemble(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.string
    }

    pub fn scheme(&self) -> Option<&str> {
        self.component(|s| s.scheme.clone())
    }

    /// `user[:password]` before the `@`, still percent-encoded.
    pub fn userinfo(&self) -> Option<&str> {
        self.component(|s| s.userinfo.clone())
    }

    /// The host exactly as it appears in the string (still percent-encoded).
    pub fn host(&self) -> Option<&str> {
        self.component(|s| s.host.clone())
    }

    pub fn port(&self) -> Option<u16> {
        self.component(|s| s.port.clone())
            .and_then(|p| p.parse().ok())
    }

    /// The path, or `""` when the string has none.
    pub fn path(&self) -> &str {
        self.component(|s| s.path.clone()).unwrap_or("")
    }

    pub fn query(&self) -> Option<&str> {
        self.component(|s| s.query.clone())
    }

    pub fn fragment(&self) -> Option<&str> {
        self.component(|s| s.fragment.clone())
    }

    pub fn set_scheme(&mut self, scheme: Option<&str>) {
        self.rebuild(|p| p.scheme = scheme.map(str::to_string));
    }

    pub fn set_host(&mut self, host: Option<&str>) {
        self.rebuild(|p| p.host = host.map(encode_host));
    }

    pub fn set_port(&mut self, port: Option<u16>) {
        self.rebuild(|p| p.port = port);
    }

    pub fn set_path(&mut self, path: &str) {
        self.rebuild(|p| p.path = path.to_string());
    }

    pub fn set_query(&mut self, query: Option<&str>) {
        self.rebuild(|p| p.query = query.map(str::to_string));
    }

    pub fn set_fragment(&mut self, fragment: Option<&str>) {
        self.rebuild(|p| p.fragment = fragment.map(str::to_string));
    }

    fn component(&self, pick: impl FnOnce(&Spans) -> Option<Range<usize>>) -> Option<&str> {
        pick(&scan(&self.string)).map(|r| &self.string[r])
    }

    fn rebuild(&mut self, edit: impl FnOnce(&mut OwnedParts)) {
        let mut parts = OwnedParts {
            scheme: self.scheme().map(str::to_string),
            userinfo: self.userinfo().map(str::to_string),
            host: self.host().map(str::to_string),
            port: self.port(),
            path: self.path().to_string(),
            query: self.query().map(str::to_string),
            fragment: self.fragment().map(str::to_string),
        };
        edit(&mut parts);
        self.string = parts.assemble();
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.string)
    }
}

impl FromStr for Uri {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl From<&str> for Uri {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Uri {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Components with the host already encoded.
struct OwnedParts {
    scheme: Option<String>,
    userinfo: Option<String>,
    host: Option<String>,
    port: Option<u16>,
    path: String,
    query: Option<String>,
    fragment: Option<String>,
}

impl OwnedParts {
    fn assemble(&self) -> String {
        let mut out = String::new();
        if let Some(scheme) = non_empty(&self.scheme) {
            out.push_str(scheme);
            out.push(':');
        }
        let host = non_empty(&self.host);
        if host.is_some() || self.port.is_some() {
            out.push_str("//");
            if let Some(userinfo) = non_empty(&self.userinfo) {
                out.push_str(userinfo);
                out.push('@');
            }
            if let Some(host) = host {
                out.push_str(host);
            }
            if let Some(port) = self.port {
                out.push(':');
                out.push_str(&port.to_string());
            }
        } else if self.scheme.is_some() {
            out.push_str("//");
        }
        if !self.path.starts_with('/') {
            out.push('/');
        }
        out.push_str(&self.path);
        if let Some(query) = non_empty(&self.query) {
            out.push('?');
            out.push_str(query);
        }
        if let Some(fragment) = non_empty(&self.fragment) {
            out.push('#');
            out.push_str(fragment);
        }
        out
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Byte ranges of each component within a URI string. Empty components are
/// reported as absent.
#[derive(Debug, Default)]
struct Spans {
    scheme: Option<Range<usize>>,
    userinfo: Option<Range<usize>>,
    host: Option<Range<usize>>,
    port: Option<Range<usize>>,
    path: Option<Range<usize>>,
    query: Option<Range<usize>>,
    fragment: Option<Range<usize>>,
}

/// Single-pass component scan following the RFC 3986 appendix B grammar:
/// `scheme ":" ["//" authority] path ["?" query] ["#" fragment]`.
fn scan(input: &str) -> Spans {
    let mut spans = Spans::default();
    let len = input.len();
    let mut pos = 0;

    if let Some(i) = input.find([':', '/', '?', '#']) {
        if input.as_bytes()[i] == b':' && is_scheme(&input[..i]) {
            spans.scheme = Some(0..i);
            pos = i + 1;
        }
    }

    if input[pos..].starts_with("//") {
        let start = pos + 2;
        let end = input[start..]
            .find(['/', '?', '#'])
            .map_or(len, |i| start + i);
        scan_authority(input, start..end, &mut spans);
        pos = end;
    }

    let path_end = input[pos..].find(['?', '#']).map_or(len, |i| pos + i);
    spans.path = span(pos..path_end);
    pos = path_end;

    if input[pos..].starts_with('?') {
        let start = pos + 1;
        let end = input[start..].find('#').map_or(len, |i| start + i);
        spans.query = span(start..end);
        pos = end;
    }

    if input[pos..].starts_with('#') {
        spans.fragment = span(pos + 1..len);
    }

    spans
}

fn scan_authority(input: &str, authority: Range<usize>, spans: &mut Spans) {
    let text = &input[authority.clone()];
    // userinfo is everything up to the last '@'.
    let host_start = match text.rfind('@') {
        Some(i) => {
            spans.userinfo = span(authority.start..authority.start + i);
            authority.start + i + 1
        }
        None => authority.start,
    };
    let host_port = &input[host_start..authority.end];

    let port_sep = if host_port.starts_with('[') {
        host_port
            .find(']')
            .and_then(|close| host_port[close..].find(':').map(|i| close + i))
    } else {
        host_port.rfind(':')
    };

    match port_sep {
        Some(i) => {
            spans.host = span(host_start..host_start + i);
            spans.port = span(host_start + i + 1..authority.end);
        }
        None => spans.host = span(host_start..authority.end),
    }
}

fn is_scheme(candidate: &str) -> bool {
    let mut chars = candidate.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

fn span(range: Range<usize>) -> Option<Range<usize>> {
    (!range.is_empty()).then_some(range)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_component() {
        let uri = Uri::new("https://user:pw@api.example.com:8443/v1/widgets?page=2&size=10#top");

        assert_eq!(uri.scheme(), Some("https"));
        assert_eq!(uri.host(), Some("api.example.com"));
        assert_eq!(uri.port(), Some(8443));
        assert_eq!(uri.path(), "/v1/widgets");
        assert_eq!(uri.query(), Some("page=2&size=10"));
        assert_eq!(uri.fragment(), Some("top"));
    }

    #[test]
    fn relative_reference_has_only_path_and_query() {
        let uri = Uri::new("/widgets?id=1");

        assert_eq!(uri.scheme(), None);
        assert_eq!(uri.host(), None);
        assert_eq!(uri.port(), None);
        assert_eq!(uri.path(), "/widgets");
        assert_eq!(uri.query(), Some("id=1"));
    }

    #[test]
    fn default_is_root_path() {
        let uri = Uri::default();
        assert_eq!(uri.as_str(), "/");
        assert_eq!(uri.path(), "/");
    }

    #[test]
    fn absent_components_leave_no_separators() {
        let uri = Uri::from_parts(UriParts {
            scheme: Some("http"),
            host: Some("example.com"),
            path: "/a",
            ..Default::default()
        });
        assert_eq!(uri.as_str(), "http://example.com/a");
    }

    #[test]
    fn path_gains_leading_slash() {
        let uri = Uri::from_parts(UriParts {
            scheme: Some("http"),
            host: Some("example.com"),
            path: "a/b",
            ..Default::default()
        });
        assert_eq!(uri.as_str(), "http://example.com/a/b");
    }

    #[test]
    fn components_round_trip_through_string() {
        let parts = UriParts {
            scheme: Some("https"),
            host: Some("api.example.com"),
            port: Some(8080),
            path: "/v1/items",
            query: Some("a=1&b=2"),
            fragment: Some("frag"),
        };
        let reparsed = Uri::new(Uri::from_parts(parts.clone()).to_string());

        assert_eq!(reparsed.scheme(), parts.scheme);
        assert_eq!(reparsed.host(), parts.host);
        assert_eq!(reparsed.port(), parts.port);
        assert_eq!(reparsed.path(), parts.path);
        assert_eq!(reparsed.query(), parts.query);
        assert_eq!(reparsed.fragment(), parts.fragment);
    }

    #[test]
    fn host_is_encoded_once() {
        let mut uri = Uri::from_parts(UriParts {
            scheme: Some(scheme::HTTP_UNIX),
            host: Some("/var/run/app sock"),
            path: "/status",
            ..Default::default()
        });
        assert_eq!(uri.host(), Some("%2Fvar%2Frun%2Fapp%20sock"));

        uri.set_port(Some(1));
        uri.set_path("/other");
        assert_eq!(uri.host(), Some("%2Fvar%2Frun%2Fapp%20sock"));
        assert_eq!(uri.as_str(), "http+unix://%2Fvar%2Frun%2Fapp%20sock:1/other");
    }

    #[test]
    fn setters_rebuild_whole_string() {
        let mut uri = Uri::default();
        uri.set_scheme(Some("https"));
        uri.set_host(Some("example.com"));
        uri.set_path("/widgets");
        uri.set_query(Some("id=7"));

        assert_eq!(uri.as_str(), "https://example.com/widgets?id=7");

        uri.set_query(None);
        uri.set_port(Some(443));
        assert_eq!(uri.as_str(), "https://example.com:443/widgets");
    }

    #[test]
    fn host_without_scheme_is_network_path_reference() {
        let mut uri = Uri::default();
        uri.set_host(Some("example.com"));

        assert_eq!(uri.as_str(), "//example.com/");
        assert_eq!(uri.host(), Some("example.com"));
    }

    #[test]
    fn ipv6_host_keeps_brackets_and_port() {
        let uri = Uri::new("http://[::1]:9000/x");
        assert_eq!(uri.host(), Some("[::1]"));
        assert_eq!(uri.port(), Some(9000));

        let mut copy = uri.clone();
        copy.set_fragment(Some("f"));
        assert_eq!(copy.as_str(), "http://[::1]:9000/x#f");
    }

    #[test]
    fn colon_in_plain_host_is_escaped() {
        let mut uri = Uri::new("http://example.com/a");
        uri.set_host(Some("a:b"));
        assert_eq!(uri.host(), Some("a%3Ab"));
        assert_eq!(uri.port(), None);

        uri.set_port(Some(8080));
        uri.set_path("/b");
        assert_eq!(uri.as_str(), "http://a%3Ab:8080/b");
    }

    #[test]
    fn bracketed_host_keeps_colons() {
        let mut uri = Uri::default();
        uri.set_scheme(Some("http"));
        uri.set_host(Some("[::1]"));
        uri.set_port(Some(9000));
        assert_eq!(uri.as_str(), "http://[::1]:9000/");
    }

    #[test]
    fn userinfo_survives_setters() {
        let mut uri = Uri::new("https://user:pw@api.example.com:8443/v1");
        assert_eq!(uri.userinfo(), Some("user:pw"));

        uri.set_path("/v2");
        uri.set_query(Some("page=1"));
        assert_eq!(uri.as_str(), "https://user:pw@api.example.com:8443/v2?page=1");
        assert_eq!(uri.host(), Some("api.example.com"));
    }

    #[test]
    fn empty_query_is_dropped() {
        let mut uri = Uri::new("http://example.com/a?x=1");
        uri.set_query(Some(""));
        assert_eq!(uri.as_str(), "http://example.com/a");
    }
}
