use reqwest::Url;
use reqwest::header::{
    ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue, IF_NONE_MATCH,
};
use tracing::warn;

use crate::errors::NetworkError;
use crate::transport::OutgoingRequest;

use super::descriptor::{HttpMethod, NetworkRequest};

const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

pub(crate) enum Assembly {
    Ready(OutgoingRequest),
    /// The descriptor needs a bearer token and has none yet.
    NeedsToken,
}

/// Builds the outgoing request, reading the token at call time.
pub(crate) fn assemble(request: &dyn NetworkRequest) -> Result<Assembly, NetworkError> {
    let url = Url::parse(request.url()).map_err(|e| {
        warn!("malformed url '{}': {}", request.url(), e);
        NetworkError::Aborted
    })?;

    let mut headers = HeaderMap::new();
    let auth = request.auth();
    if auth.needs_authentication() {
        let Some(token) = auth.token() else {
            return Ok(Assembly::NeedsToken);
        };
        headers.insert(AUTHORIZATION, header_value(&format!("Bearer {token}"))?);
    }

    for (name, value) in request.custom_headers() {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| NetworkError::Custom(format!("invalid header name '{name}': {e}")))?;
        headers.insert(name, header_value(&value)?);
    }

    if let Some(tag) = request.cache_tag() {
        headers.insert(IF_NONE_MATCH, header_value(tag)?);
    }

    headers.insert(ACCEPT, HeaderValue::from_static(JSON_CONTENT_TYPE));
    if request.method() == HttpMethod::Post {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
    }

    Ok(Assembly::Ready(OutgoingRequest {
        method: request.method().into(),
        url,
        headers,
        body: request.body().map(<[u8]>::to_vec),
    }))
}

fn header_value(value: &str) -> Result<HeaderValue, NetworkError> {
    HeaderValue::from_str(value)
        .map_err(|e| NetworkError::Custom(format!("invalid header value: {e}")))
}
