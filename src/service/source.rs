//! Remote image sources
//!
//! Callers often only have a URL (an avatar or an attachment), so the
//! service can fetch the image itself before converting it.

use async_trait::async_trait;
use reqwest::{Client, Url};
use std::net::IpAddr;

use crate::service::error::AppError;

/// Something that can produce image bytes for a URL
#[async_trait]
pub trait ImageSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, AppError>;
}

/// Fetches images over HTTP(S) with a size limit
///
/// Hosts resolving to loopback, private or link-local addresses are refused
/// unless [`HttpImageSource::allow_private_hosts`] is set.
pub struct HttpImageSource {
    client: Client,
    max_bytes: usize,
    allow_private: bool,
}

impl HttpImageSource {
    pub fn new(client: Client, max_bytes: usize) -> Self {
        Self {
            client,
            max_bytes,
            allow_private: false,
        }
    }

    pub fn allow_private_hosts(mut self, allow: bool) -> Self {
        self.allow_private = allow;
        self
    }
}

/// Reject payloads above `limit`
pub fn check_size(size: usize, limit: usize) -> Result<(), AppError> {
    if size > limit {
        return Err(AppError::PayloadTooLarge { size, limit });
    }
    Ok(())
}

/// Whether an address is reachable on the public internet
fn is_public(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            let [a, b, ..] = v4.octets();
            !(v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_unspecified()
                || v4.is_broadcast()
                || v4.is_documentation()
                // 100.64.0.0/10, carrier-grade NAT
                || (a == 100 && (b & 0xc0) == 64))
        }
        IpAddr::V6(v6) => {
            if let Some(v4) = v6.to_ipv4_mapped() {
                return is_public(IpAddr::V4(v4));
            }
            let first = v6.segments()[0];
            !(v6.is_loopback()
                || v6.is_unspecified()
                // fc00::/7 unique local, fe80::/10 link-local
                || (first & 0xfe00) == 0xfc00
                || (first & 0xffc0) == 0xfe80)
        }
    }
}

/// Resolve the URL's host and refuse non-public addresses
async fn check_host(url: &Url) -> Result<(), AppError> {
    let host = url
        .host_str()
        .ok_or_else(|| AppError::ExternalFetch(format!("URL has no host: {}", url)))?;
    let host = host.trim_start_matches('[').trim_end_matches(']');
    let port = url.port_or_known_default().unwrap_or(80);

    let addrs = tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| AppError::ExternalFetch(format!("Failed to resolve {}: {}", host, e)))?;

    for addr in addrs {
        if !is_public(addr.ip()) {
            return Err(AppError::ExternalFetch(format!(
                "refusing to fetch from non-public address {} ({})",
                addr.ip(),
                host
            )));
        }
    }

    Ok(())
}

#[async_trait]
impl ImageSource for HttpImageSource {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, AppError> {
        let parsed = Url::parse(url)
            .map_err(|e| AppError::ExternalFetch(format!("invalid URL {}: {}", url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(AppError::ExternalFetch(format!("unsupported URL: {}", url)));
        }
        if !self.allow_private {
            check_host(&parsed).await?;
        }

        tracing::info!("Fetching image from: {}", url);

        let mut response = self.client.get(parsed).send().await?;

        if !response.status().is_success() {
            return Err(AppError::ExternalFetch(format!(
                "{} returned status: {}",
                url,
                response.status()
            )));
        }

        if let Some(len) = response.content_length() {
            check_size(len as usize, self.max_bytes)?;
        }

        // Chunked responses carry no length, so the limit is enforced as data arrives
        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            check_size(body.len() + chunk.len(), self.max_bytes)?;
            body.extend_from_slice(&chunk);
        }

        tracing::debug!("Fetched {} bytes from {}", body.len(), url);

        Ok(body)
    }
}
