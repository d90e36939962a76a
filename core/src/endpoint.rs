//! Requests paired with their decode policy.

use std::fmt;

use uuid::Uuid;

use crate::decode::DecodePolicy;
use crate::error::ApiError;
use crate::http::{HttpRequest, HttpResponse};

/// A request plus the policy that decodes its response into `T`.
pub struct ApiRequest<T> {
    request: HttpRequest,
    policy: DecodePolicy<T>,
}

impl<T> Clone for ApiRequest<T> {
    fn clone(&self) -> Self {
        Self {
            request: self.request.clone(),
            policy: self.policy.clone(),
        }
    }
}

impl<T> fmt::Debug for ApiRequest<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiRequest")
            .field("request", &self.request)
            .field("policy", &self.policy)
            .finish()
    }
}

impl<T> ApiRequest<T> {
    pub fn new(request: HttpRequest, policy: DecodePolicy<T>) -> Self {
        Self { request, policy }
    }

    pub fn id(&self) -> Uuid {
        self.request.id()
    }

    pub fn request(&self) -> &HttpRequest {
        &self.request
    }

    pub fn policy(&self) -> &DecodePolicy<T> {
        &self.policy
    }

    /// Swap the request while keeping the policy.
    pub fn map_request(mut self, f: impl FnOnce(HttpRequest) -> HttpRequest) -> Self {
        self.request = f(self.request);
        self
    }

    pub fn decode(&self, response: &HttpResponse) -> Result<T, ApiError> {
        self.policy.decode(response)
    }

    pub fn into_parts(self) -> (HttpRequest, DecodePolicy<T>) {
        (self.request, self.policy)
    }
}

/// A typed API operation.
///
/// Implementors describe the request and how to decode its response; the
/// client takes care of sending it.
///
/// ```
/// use apiclient_core::{DecodePolicy, Endpoint, HttpRequest};
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct Widget {
///     name: String,
/// }
///
/// struct GetWidget(&'static str);
///
/// impl Endpoint for GetWidget {
///     type Output = Widget;
///
///     fn http_request(&self) -> HttpRequest {
///         HttpRequest::with_url("https://api.example.com").with_path(["widgets", self.0])
///     }
///
///     fn decode_policy(&self) -> DecodePolicy<Widget> {
///         DecodePolicy::raw()
///     }
/// }
///
/// let request = GetWidget("w1").api_request();
/// assert_eq!(request.request().uri().to_string(), "https://api.example.com/widgets/w1");
/// ```
pub trait Endpoint {
    type Output;

    fn http_request(&self) -> HttpRequest;

    fn decode_policy(&self) -> DecodePolicy<Self::Output>;

    fn api_request(&self) -> ApiRequest<Self::Output> {
        ApiRequest::new(self.http_request(), self.decode_policy())
    }
}
