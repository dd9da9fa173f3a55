use std::borrow::Cow;

use serde::de::DeserializeOwned;

use crate::errors::NetworkError;

const EMPTY_BODY: &str = "--empty--";
const NOT_UTF8: &str = "--not decodable as string--";

/// Renders a body for log lines without failing on binary payloads.
pub fn body_preview(body: Option<&[u8]>) -> Cow<'_, str> {
    match body {
        None => Cow::Borrowed(EMPTY_BODY),
        Some(bytes) => match std::str::from_utf8(bytes) {
            Ok(text) => Cow::Borrowed(text),
            Err(_) => Cow::Borrowed(NOT_UTF8),
        },
    }
}

/// Decodes a JSON payload, reporting failures as `NetworkError::ParseFailure`.
pub fn decode_json<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, NetworkError> {
    serde_json::from_slice(bytes)
        .map_err(|_| NetworkError::ParseFailure(body_preview(Some(bytes)).into_owned()))
}
