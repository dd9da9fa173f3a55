use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::config::Config;
use crate::errors::Error;

use super::{OutgoingRequest, ResponseHead, Transport, TransportError, TransportResponse};

const DEFAULT_USER_AGENT: &str = concat!("bearer-dispatch/", env!("CARGO_PKG_VERSION"));

/// `Transport` backed by a shared `reqwest::Client`.
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(config: &Config) -> Result<Self, Error> {
        let user_agent = config
            .user_agent
            .clone()
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());
        let mut builder = Client::builder().user_agent(user_agent);
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
        })
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: OutgoingRequest) -> Result<TransportResponse, TransportError> {
        let OutgoingRequest {
            method,
            url,
            headers,
            body,
        } = request;
        debug!("transport send: method={} url='{}'", method, url);

        let mut builder = self.client.request(method, url).headers(headers);
        if let Some(body) = body {
            builder = builder.body(body);
        }
        let resp = builder.send().await.map_err(map_reqwest_error)?;

        let head = ResponseHead {
            url: resp.url().clone(),
            status: resp.status(),
            headers: resp.headers().clone(),
        };
        let body = resp.bytes().await.map_err(map_reqwest_error)?;
        Ok(TransportResponse {
            head,
            body: Some(body.to_vec()),
        })
    }
}

fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_connect() {
        TransportError::Connect(err.to_string())
    } else {
        TransportError::Other(err.to_string())
    }
}
