use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::Serialize;

use crate::completion::Completion;
use crate::errors::Error;
use crate::manager::RequestManager;
use crate::transport::ResponseHead;

use super::auth::{NoAuth, OAuthHandler};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "PATCH" => Ok(HttpMethod::Patch),
            "DELETE" => Ok(HttpMethod::Delete),
            other => Err(Error::Config(format!("Unknown HTTP method '{}'", other))),
        }
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

/// Stateless description of a request plus its validation and auth capabilities.
///
/// A descriptor is fired once and may be replayed after a token refresh, so
/// every accessor must return the same data each time it is called.
pub trait NetworkRequest: Send + Sync {
    fn url(&self) -> &str;

    fn method(&self) -> HttpMethod;

    fn body(&self) -> Option<&[u8]> {
        None
    }

    /// Applied in order; header names are case-insensitive and the last write wins.
    fn custom_headers(&self) -> Vec<(String, String)> {
        Vec::new()
    }

    /// Sent as `If-None-Match`.
    fn cache_tag(&self) -> Option<&str> {
        None
    }

    fn auth(&self) -> &dyn OAuthHandler {
        &NoAuth
    }

    /// Returns previously stored bytes when the response says they are still fresh.
    fn cached_data_if_fresh(&self, _response: &ResponseHead, _body: &[u8]) -> Option<Vec<u8>> {
        None
    }

    /// Returning `false` hands the result over to the descriptor: the manager
    /// delivers nothing and the descriptor must settle `completion` itself.
    fn is_response_valid(
        &self,
        _response: &ResponseHead,
        _body: &[u8],
        _manager: &RequestManager,
        _completion: &Completion,
    ) -> bool {
        true
    }
}

/// Plain data descriptor built with `with_*` methods.
#[derive(Clone)]
pub struct RequestDescriptor {
    url: String,
    method: HttpMethod,
    body: Option<Vec<u8>>,
    headers: Vec<(String, String)>,
    cache_tag: Option<String>,
    auth: Arc<dyn OAuthHandler>,
}

impl RequestDescriptor {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method,
            body: None,
            headers: Vec::new(),
            cache_tag: None,
            auth: Arc::new(NoAuth),
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, url)
    }

    pub fn put(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Put, url)
    }

    pub fn patch(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Patch, url)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, url)
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_json<T: Serialize>(mut self, value: &T) -> Result<Self, Error> {
        self.body = Some(serde_json::to_vec(value)?);
        Ok(self)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_cache_tag(mut self, tag: impl Into<String>) -> Self {
        self.cache_tag = Some(tag.into());
        self
    }

    pub fn with_auth(mut self, auth: Arc<dyn OAuthHandler>) -> Self {
        self.auth = auth;
        self
    }
}

impl fmt::Debug for RequestDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestDescriptor")
            .field("url", &self.url)
            .field("method", &self.method)
            .field("headers", &self.headers)
            .field("cache_tag", &self.cache_tag)
            .field("needs_authentication", &self.auth.needs_authentication())
            .finish()
    }
}

impl NetworkRequest for RequestDescriptor {
    fn url(&self) -> &str {
        &self.url
    }

    fn method(&self) -> HttpMethod {
        self.method
    }

    fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    fn custom_headers(&self) -> Vec<(String, String)> {
        self.headers.clone()
    }

    fn cache_tag(&self) -> Option<&str> {
        self.cache_tag.as_deref()
    }

    fn auth(&self) -> &dyn OAuthHandler {
        self.auth.as_ref()
    }
}
