//! `reqwest`-backed network the worker falls through to.

use async_trait::async_trait;
use axum::http::{HeaderMap, HeaderName, header};
use bytes::BytesMut;
use reqwest::{Client, redirect};
use tracing::debug;
use url::Url;

use crate::{
    application::network::{Network, NetworkError},
    config::UpstreamSettings,
    domain::{FetchRequest, ResponseSnapshot},
};

use super::error::InfraError;

const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
    HeaderName::from_static("keep-alive"),
];

/// Forwards origin-relative requests to a fixed upstream origin.
#[derive(Clone)]
pub struct HttpNetwork {
    client: Client,
    origin: Url,
    max_body_bytes: usize,
}

impl HttpNetwork {
    pub fn new(settings: &UpstreamSettings) -> Result<Self, InfraError> {
        let client = Client::builder()
            .user_agent(user_agent())
            .timeout(settings.timeout)
            .redirect(redirect::Policy::none())
            .build()
            .map_err(|err| InfraError::upstream(err.to_string()))?;

        Ok(Self {
            client,
            origin: settings.origin.clone(),
            max_body_bytes: settings.max_body_bytes.get(),
        })
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    /// Absolute URL to request for `target`.
    ///
    /// Origin-relative targets resolve against the upstream origin; absolute
    /// `http(s)` targets are requested as they are.
    pub fn resolve(&self, target: &str) -> Result<Url, NetworkError> {
        if let Ok(absolute) = Url::parse(target) {
            if matches!(absolute.scheme(), "http" | "https") {
                return Ok(absolute);
            }
            return Err(NetworkError::InvalidTarget {
                url: target.to_string(),
                message: format!("unsupported scheme `{}`", absolute.scheme()),
            });
        }

        if !target.starts_with('/') {
            return Err(NetworkError::InvalidTarget {
                url: target.to_string(),
                message: "target must be origin-relative".to_string(),
            });
        }

        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (target, None),
        };

        let mut url = self.origin.clone();
        url.set_path(path);
        url.set_query(query);
        Ok(url)
    }
}

#[async_trait]
impl Network for HttpNetwork {
    async fn fetch(&self, request: FetchRequest) -> Result<ResponseSnapshot, NetworkError> {
        let FetchRequest {
            method,
            url: target,
            headers,
            body,
        } = request;
        let url = self.resolve(&target)?;

        let mut builder = self
            .client
            .request(method.clone(), url)
            .headers(forwardable(&headers));
        if !body.is_empty() {
            builder = builder.body(body);
        }

        let mut response = builder
            .send()
            .await
            .map_err(|err| map_reqwest_error(&target, &err))?;

        if let Some(length) = response.content_length()
            && length > self.max_body_bytes as u64
        {
            return Err(NetworkError::BodyTooLarge {
                url: target,
                limit: self.max_body_bytes,
            });
        }

        let status = response.status();
        let response_headers = forwardable(response.headers());

        let mut buffer = BytesMut::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|err| map_reqwest_error(&target, &err))?
        {
            if buffer.len() + chunk.len() > self.max_body_bytes {
                return Err(NetworkError::BodyTooLarge {
                    url: target,
                    limit: self.max_body_bytes,
                });
            }
            buffer.extend_from_slice(&chunk);
        }

        debug!(
            target = "precache::network",
            method = %method,
            url = %target,
            status = status.as_u16(),
            bytes = buffer.len(),
            "upstream responded"
        );

        Ok(ResponseSnapshot::from_parts(
            status,
            response_headers,
            buffer.freeze(),
        ))
    }
}

/// Copy of `headers` without hop-by-hop, `host` and `content-length` entries.
fn forwardable(headers: &HeaderMap) -> HeaderMap {
    let mut filtered = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        if is_hop_by_hop(name) || *name == header::HOST || *name == header::CONTENT_LENGTH {
            continue;
        }
        filtered.append(name.clone(), value.clone());
    }
    filtered
}

fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.iter().any(|hop| hop == name)
}

fn map_reqwest_error(url: &str, err: &reqwest::Error) -> NetworkError {
    if err.is_timeout() {
        NetworkError::Timeout {
            url: url.to_string(),
        }
    } else {
        NetworkError::transport(url, err.to_string())
    }
}

fn user_agent() -> &'static str {
    concat!("precache/", env!("CARGO_PKG_VERSION"))
}
