// # HTTP IP Source
//
// Looks up the current public IP with one GET against a lookup service
// that answers `{"ip": "203.0.113.7"}` (api.ipify.org with `format=json`
// by default). Services that answer with the bare address as plain text
// are accepted too.
//
// Every call is a fresh request with a bounded timeout. Nothing is cached:
// the reconciler decides what an unchanged IP means.

use dyncf_core::config::IpLookupConfig;
use dyncf_core::traits::IpSource;
use dyncf_core::{Error, Result};
use serde::Deserialize;
use std::net::IpAddr;

#[derive(Debug, Deserialize)]
struct LookupBody {
    ip: String,
}

/// Parse a lookup response body
///
/// Accepts `{"ip": "..."}` or a bare address.
pub fn parse_ip_body(body: &str) -> Result<IpAddr> {
    let body = body.trim();

    let text = match serde_json::from_str::<LookupBody>(body) {
        Ok(parsed) => parsed.ip,
        Err(_) if !body.starts_with('{') => body.to_string(),
        Err(e) => return Err(Error::ip_lookup(format!("Malformed response body: {}", e))),
    };

    text.trim()
        .parse()
        .map_err(|_| Error::ip_lookup(format!("Invalid IP address in response: {:?}", text)))
}

/// Public IP lookup over HTTP
#[derive(Debug)]
pub struct HttpIpSource {
    url: String,
    client: reqwest::Client,
}

impl HttpIpSource {
    pub fn new(config: &IpLookupConfig) -> Result<Self> {
        config.validate()?;

        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| Error::ip_lookup(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            url: config.url.clone(),
            client,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait::async_trait]
impl IpSource for HttpIpSource {
    async fn current(&self) -> Result<IpAddr> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| Error::ip_lookup(format!("Request to {} failed: {}", self.url, e)))?;

        if !response.status().is_success() {
            return Err(Error::ip_lookup(format!(
                "{} answered HTTP {}",
                self.url,
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::ip_lookup(format!("Failed to read response: {}", e)))?;

        let ip = parse_ip_body(&body)?;
        tracing::debug!("Public IP from {}: {}", self.url, ip);
        Ok(ip)
    }

    fn source_name(&self) -> &'static str {
        "http"
    }
}
