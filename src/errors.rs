use std::fmt;

use reqwest::StatusCode;

use crate::decode::body_preview;

/// Failures raised while building managers, transports or configuration.
#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),
    Json(serde_json::Error),
    Http(reqwest::Error),
    Config(String),
    Runtime(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(err) => write!(f, "io error: {err}"),
            Error::Json(err) => write!(f, "json error: {err}"),
            Error::Http(err) => write!(f, "http client error: {err}"),
            Error::Config(msg) => write!(f, "configuration error: {msg}"),
            Error::Runtime(msg) => write!(f, "runtime error: {msg}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::Json(err) => Some(err),
            Error::Http(err) => Some(err),
            Error::Config(_) | Error::Runtime(_) => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(err)
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Http(err)
    }
}

/// Terminal failure delivered to the caller of a fire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    /// No response, no body, or a transport-level failure.
    NoConnectivity,
    /// The server answered with a status outside 2xx/304.
    ServerError { status: StatusCode, body: Vec<u8> },
    /// A descriptor could not decode the payload it received.
    ParseFailure(String),
    RefreshFailed,
    /// Malformed URL, cancellation, or an aborted refresh round.
    Aborted,
    AttemptsExhausted,
    Custom(String),
}

impl NetworkError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            NetworkError::ServerError { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkError::NoConnectivity => write!(f, "no response received from server"),
            NetworkError::ServerError { status, body } => write!(
                f,
                "unable to get data, http code: {} body='{}'",
                status.as_u16(),
                body_preview(Some(body.as_slice()))
            ),
            NetworkError::ParseFailure(body) => write!(f, "failed to parse data: {body}"),
            NetworkError::RefreshFailed => write!(f, "unable to refresh token"),
            NetworkError::Aborted => write!(f, "request aborted"),
            NetworkError::AttemptsExhausted => {
                write!(f, "max number of authentication attempts exceeded")
            }
            NetworkError::Custom(message) => write!(f, "{message}"),
        }
    }
}

impl std::error::Error for NetworkError {}

/// Outcome of one logical fire, however many round-trips it took.
pub type FireResult = Result<Vec<u8>, NetworkError>;
