//! HTTP request and response values for the host-does-IO pattern.
//!
//! # Design
//! These types describe HTTP requests and responses as plain data. The core
//! builds `HttpRequest` values and decodes `HttpResponse` values without ever
//! touching the network; a [`Transport`](crate::transport::Transport)
//! supplied by the host performs the actual I/O.
//!
//! `HttpRequest` is an immutable snapshot: every `with_*` method consumes
//! the request and returns the modified copy. Its URI is the single source
//! of truth for scheme, host, port, path and query.

use std::convert::Infallible;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::RangeInclusive;
use std::str::FromStr;

use bytes::Bytes;
use serde::Serialize;
use uuid::Uuid;

use crate::body::HttpBody;
use crate::error::ApiError;
use crate::headers::HeaderMap;
use crate::path::{self, PathComponent};
use crate::query::{self, QueryOptions};
use crate::uri::Uri;

/// Status codes treated as success everywhere in the crate.
pub const SUCCESS_STATUS: RangeInclusive<u16> = 200..=299;

/// HTTP method for a request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum HttpMethod {
    #[default]
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
    Options,
    /// Any other method, stored upper-case.
    Custom(String),
}

impl HttpMethod {
    pub fn as_str(&self) -> &str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Head => "HEAD",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Custom(m) => m,
        }
    }

    /// Whether the body is put on the wire for this method.
    pub fn has_request_body(&self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch)
    }
}

impl FromStr for HttpMethod {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.to_ascii_uppercase();
        Ok(match upper.as_str() {
            "GET" => HttpMethod::Get,
            "HEAD" => HttpMethod::Head,
            "POST" => HttpMethod::Post,
            "PUT" => HttpMethod::Put,
            "PATCH" => HttpMethod::Patch,
            "DELETE" => HttpMethod::Delete,
            "OPTIONS" => HttpMethod::Options,
            _ => HttpMethod::Custom(upper),
        })
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An HTTP request described as plain data.
///
/// Equality and hashing cover method, headers, body bytes and the URI
/// string. The per-construction `id` is deliberately excluded from both.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    method: HttpMethod,
    uri: Uri,
    headers: HeaderMap,
    body: HttpBody,
    id: Uuid,
}

impl Default for HttpRequest {
    fn default() -> Self {
        Self {
            method: HttpMethod::Get,
            uri: Uri::default(),
            headers: HeaderMap::new(),
            body: HttpBody::Empty,
            id: Uuid::new_v4(),
        }
    }
}

impl HttpRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing URI string, e.g. `"https://api.example.com/v1"`.
    pub fn with_url(url: impl Into<Uri>) -> Self {
        Self {
            uri: url.into(),
            ..Self::default()
        }
    }

    pub fn method(&self) -> &HttpMethod {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn body(&self) -> &HttpBody {
        &self.body
    }

    /// Unique token generated at construction. Not part of equality.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn path_components(&self) -> Vec<PathComponent> {
        path::parse_components(self.uri.path())
    }

    pub fn query_components(&self) -> Vec<PathComponent> {
        self.uri
            .query()
            .map(|q| {
                q.split('&')
                    .filter(|p| !p.is_empty())
                    .map(PathComponent::from)
                    .collect()
            })
            .unwrap_or_default()
    }

    #[must_use]
    pub fn with_method(mut self, method: HttpMethod) -> Self {
        self.method = method;
        self
    }

    #[must_use]
    pub fn with_uri(mut self, uri: impl Into<Uri>) -> Self {
        self.uri = uri.into();
        self
    }

    #[must_use]
    pub fn with_scheme(mut self, scheme: &str) -> Self {
        self.uri.set_scheme(Some(scheme));
        self
    }

    #[must_use]
    pub fn with_host(mut self, host: &str) -> Self {
        self.uri.set_host(Some(host));
        self
    }

    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.uri.set_port(Some(port));
        self
    }

    /// Replace the path with the `Path` entries of `components`.
    #[must_use]
    pub fn with_path<I, C>(mut self, components: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<PathComponent>,
    {
        let components: Vec<PathComponent> = components.into_iter().map(Into::into).collect();
        self.uri.set_path(&path::render_path(&components));
        self
    }

    /// Replace the query with the `Parameter` entries of `components`.
    #[must_use]
    pub fn with_query<I, C>(mut self, components: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<PathComponent>,
    {
        let components: Vec<PathComponent> = components.into_iter().map(Into::into).collect();
        let query = path::render_query(&components);
        self.uri.set_query(Some(&query));
        self
    }

    /// Append the query-encoded form of `value` to the existing query.
    ///
    /// The existing query is kept verbatim, including bare keys and values
    /// that contain `=`.
    ///
    /// # Errors
    /// Returns [`ApiError::Coding`] if `value` is not record-shaped.
    pub fn add_query<T: Serialize + ?Sized>(
        mut self,
        value: &T,
        options: QueryOptions,
    ) -> Result<Self, ApiError> {
        let added = path::render_query(&query::encode_components(value, options)?);
        let query = match self.uri.query() {
            Some(existing) if !existing.is_empty() && !added.is_empty() => {
                format!("{existing}&{added}")
            }
            Some(existing) if !existing.is_empty() => existing.to_string(),
            _ => added,
        };
        self.uri.set_query(Some(&query));
        Ok(self)
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.add(name, value);
        self
    }

    #[must_use]
    pub fn with_headers(mut self, headers: &HeaderMap) -> Self {
        self.headers.add_all(headers);
        self
    }

    /// Set the body and merge the headers it implies, replacing any
    /// existing values of those headers.
    #[must_use]
    pub fn with_body(mut self, body: HttpBody) -> Self {
        if let Some(extra) = body.additional_headers() {
            for (name, value) in extra.iter() {
                self.headers.replace_or_add(name, value);
            }
        }
        self.body = body;
        self
    }

    /// Convert to a wire-level request. The body is attached only for
    /// methods that carry one.
    ///
    /// # Errors
    /// [`ApiError::MissingUrl`] when the URI lacks a scheme or host or does
    /// not parse; [`ApiError::Coding`] for an invalid method or header.
    pub fn to_http(&self) -> Result<http::Request<Vec<u8>>, ApiError> {
        if self.uri.scheme().is_none() || self.uri.host().is_none() {
            return Err(ApiError::MissingUrl);
        }
        let uri: http::Uri = self
            .uri
            .as_str()
            .parse()
            .map_err(|_| ApiError::MissingUrl)?;
        let method = http::Method::from_bytes(self.method.as_str().as_bytes())
            .map_err(|e| ApiError::Coding(e.to_string()))?;

        let mut builder = http::Request::builder().method(method).uri(uri);
        for (name, value) in self.headers.iter() {
            builder = builder.header(name, value);
        }
        let body = if self.method.has_request_body() {
            self.body.bytes().to_vec()
        } else {
            Vec::new()
        };
        builder.body(body).map_err(|e| ApiError::Coding(e.to_string()))
    }

    /// Render the request as an equivalent `curl` command.
    pub fn curl(&self) -> String {
        let mut out = format!("curl -k -X {} \\\n", self.method);
        for (name, value) in self.headers.iter() {
            out.push_str(&format!("-H \"{name}: {value}\" \\\n"));
        }
        let body = self.body.bytes();
        if let Ok(text) = std::str::from_utf8(&body) {
            if !text.is_empty() {
                out.push_str(&format!("-d '{text}' \\\n"));
            }
        }
        out.push_str(self.uri.as_str());
        out
    }
}

impl PartialEq for HttpRequest {
    fn eq(&self, other: &Self) -> bool {
        self.method == other.method
            && self.headers == other.headers
            && self.body.bytes() == other.body.bytes()
            && self.uri.as_str() == other.uri.as_str()
    }
}

impl Eq for HttpRequest {}

impl Hash for HttpRequest {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.method.hash(state);
        self.headers.hash(state);
        self.uri.as_str().hash(state);
        self.body.bytes().hash(state);
    }
}

impl fmt::Display for HttpRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "URL:\n  {}\nMETHOD:\n  {}\nHEADERS:\n  {}",
            self.uri, self.method, self.headers
        )
    }
}

/// An HTTP response described as plain data.
///
/// Constructed by the transport after executing an `HttpRequest`, then
/// handed to a [`DecodePolicy`](crate::decode::DecodePolicy).
#[derive(Debug, Clone)]
pub struct HttpResponse {
    request: HttpRequest,
    status: u16,
    headers: HeaderMap,
    body: Bytes,
}

impl HttpResponse {
    pub fn new(request: HttpRequest, status: u16, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            request,
            status,
            headers,
            body: body.into(),
        }
    }

    /// Project a native response into an `HttpResponse`. Header values that
    /// are not valid UTF-8 are converted lossily.
    pub fn from_http<B: Into<Bytes>>(request: HttpRequest, response: http::Response<B>) -> Self {
        let (parts, body) = response.into_parts();
        let headers = parts
            .headers
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        Self::new(request, parts.status.as_u16(), headers, body)
    }

    pub fn request(&self) -> &HttpRequest {
        &self.request
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn is_success(&self) -> bool {
        SUCCESS_STATUS.contains(&self.status)
    }

    /// Human-readable reason phrase for the status code.
    pub fn message(&self) -> &'static str {
        http::StatusCode::from_u16(self.status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or("Unknown")
    }

    /// Pass the response through if its status is in `statuses`.
    ///
    /// # Errors
    /// [`ApiError::InvalidStatusCode`] carrying the rejected response.
    pub fn filter(self, statuses: RangeInclusive<u16>) -> Result<Self, ApiError> {
        if statuses.contains(&self.status) {
            return Ok(self);
        }
        Err(ApiError::InvalidStatusCode {
            status: self.status,
            response: Box::new(self),
        })
    }

    /// # Errors
    /// See [`HttpResponse::filter`].
    pub fn filter_status(self, status: u16) -> Result<Self, ApiError> {
        self.filter(status..=status)
    }

    /// # Errors
    /// See [`HttpResponse::filter`].
    pub fn filter_successful_status_codes(self) -> Result<Self, ApiError> {
        self.filter(SUCCESS_STATUS)
    }
}

impl PartialEq for HttpResponse {
    fn eq(&self, other: &Self) -> bool {
        self.status == other.status && self.headers == other.headers && self.body == other.body
    }
}

impl fmt::Display for HttpResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Status Code: {}, Data Length: {}", self.status, self.body.len())
    }
}
