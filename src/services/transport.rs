//! HTTP transports behind one narrow trait
//!
//! `ImpersonatedTransport` mimics a fixed Chrome TLS fingerprint through
//! isahc/curl: the cipher-suite list is pinned in Chrome's order and HTTP/2 is
//! negotiated over TLS (plaintext connections stay on HTTP/1.1). Responses
//! are decompressed by the transport, which is why callers never pin
//! Accept-Encoding. `PlainTransport` is a stock reqwest client for
//! trusted/internal or test traffic. Test doubles implement [`Transport`]
//! directly.

use crate::error::{AppError, Result};
use async_trait::async_trait;
use isahc::config::{Configurable, VersionNegotiation};
use isahc::prelude::*;
use isahc::HttpClient;
use std::time::Duration;

/// TLS 1.2 cipher suites in Chrome's ClientHello order (OpenSSL names).
/// TLS 1.3 suites are fixed by the TLS stack and need no pinning.
const CHROME_CIPHER_LIST: &[&str] = &[
    "ECDHE-ECDSA-AES128-GCM-SHA256",
    "ECDHE-RSA-AES128-GCM-SHA256",
    "ECDHE-ECDSA-AES256-GCM-SHA384",
    "ECDHE-RSA-AES256-GCM-SHA384",
    "ECDHE-ECDSA-CHACHA20-POLY1305",
    "ECDHE-RSA-CHACHA20-POLY1305",
    "ECDHE-RSA-AES128-SHA",
    "ECDHE-RSA-AES256-SHA",
    "AES128-GCM-SHA256",
    "AES256-GCM-SHA384",
    "AES128-SHA",
    "AES256-SHA",
];

/// A failure while streaming the response body is a connection-level
/// problem, not an I/O one: it must stay in the retryable class.
fn read_body_error(err: std::io::Error) -> AppError {
    AppError::Network(err.to_string())
}

#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// Narrow capability interface: one GET with explicit headers.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str, headers: &[(String, String)]) -> Result<TransportResponse>;
}

/// Browser-fingerprint-impersonating transport (isahc/curl).
pub struct ImpersonatedTransport {
    client: HttpClient,
}

impl ImpersonatedTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = HttpClient::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .version_negotiation(VersionNegotiation::latest_compatible())
            .ssl_ciphers(CHROME_CIPHER_LIST.iter().map(|s| s.to_string()))
            .automatic_decompression(true)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ImpersonatedTransport {
    async fn get(&self, url: &str, headers: &[(String, String)]) -> Result<TransportResponse> {
        let mut builder = isahc::Request::builder().uri(url).method("GET");
        for (name, value) in headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        let request = builder
            .body(())
            .map_err(|e| AppError::Other(format!("Request build error: {}", e)))?;

        let mut response = self.client.send_async(request).await?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(read_body_error)?.into_bytes();
        Ok(TransportResponse { status, body })
    }
}

/// Plain transport (reqwest) for trusted/internal endpoints and test traffic.
pub struct PlainTransport {
    client: reqwest::Client,
}

impl PlainTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(AppError::from)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for PlainTransport {
    async fn get(&self, url: &str, headers: &[(String, String)]) -> Result<TransportResponse> {
        let mut request = self.client.get(url);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }
        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?.to_vec();
        Ok(TransportResponse { status, body })
    }
}
