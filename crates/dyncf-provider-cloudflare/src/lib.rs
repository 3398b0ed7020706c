// # Cloudflare DNS Provider
//
// Cloudflare API v4 implementation of `dyncf_core::DnsProvider`.
//
// The provider is stateless and single-shot: one HTTP request per call
// (zone listing follows pagination), no retries, no caching. The reconciler
// owns scheduling and retry.
//
// ## Security Requirements
//
// - Credentials NEVER appear in logs or Debug output
// - Construction fails if a credential is empty
//
// ## API Reference
//
// - List Zones: GET `/zones?page=N&per_page=50`
// - List DNS Records: GET `/zones/:zone_id/dns_records?name=...`
// - Create DNS Record: POST `/zones/:zone_id/dns_records`
// - Patch DNS Record: PATCH `/zones/:zone_id/dns_records/:record_id`
//
// A call succeeds only when the HTTP status is 2xx AND the body says
// `"success": true`.

use async_trait::async_trait;
use dyncf_core::config::Credentials;
use dyncf_core::traits::{DnsProvider, DnsRecord, NewRecord, RecordUpdate, Zone};
use dyncf_core::{Error, Result};
use reqwest::{RequestBuilder, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Cloudflare API base URL
pub const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Zones requested per page
const ZONES_PER_PAGE: u32 = 50;

const PROVIDER: &str = "cloudflare";

/// Envelope every v4 endpoint returns
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(default)]
    errors: Vec<ApiMessage>,
    result: Option<T>,
    result_info: Option<ResultInfo>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct ResultInfo {
    #[serde(default)]
    total_pages: u32,
}

#[derive(Debug, Deserialize)]
struct ZoneResult {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct RecordResult {
    id: String,
    name: String,
    #[serde(rename = "type")]
    record_type: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    proxied: bool,
}

impl From<RecordResult> for DnsRecord {
    fn from(r: RecordResult) -> Self {
        DnsRecord {
            id: r.id,
            name: r.name,
            record_type: r.record_type,
            content: r.content,
            proxied: r.proxied,
        }
    }
}

/// Cloudflare DNS provider
///
/// # Security
///
/// The Debug implementation does NOT expose credentials.
pub struct CloudflareProvider {
    credentials: Credentials,
    base_url: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for CloudflareProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareProvider")
            .field("credentials", &self.credentials)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl CloudflareProvider {
    /// Create a provider talking to the public Cloudflare API
    pub fn new(credentials: Credentials) -> Result<Self> {
        Self::with_base_url(credentials, CLOUDFLARE_API_BASE)
    }

    /// Create a provider talking to `base_url` (no trailing slash)
    pub fn with_base_url(credentials: Credentials, base_url: impl Into<String>) -> Result<Self> {
        credentials.validate()?;

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::provider(PROVIDER, format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            credentials,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.credentials {
            Credentials::ApiToken { token } => request.bearer_auth(token),
            Credentials::GlobalKey { key, email } => request
                .header("X-Auth-Key", key)
                .header("X-Auth-Email", email),
        }
    }

    /// Send a request and unwrap the v4 envelope
    ///
    /// `subject` names what the call was about (zone, host) for error messages.
    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        subject: &str,
    ) -> Result<ApiResponse<T>> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| Error::provider(PROVIDER, format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::provider(PROVIDER, format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(status_error(status, &body, subject));
        }

        parse_envelope(&body)
    }
}

/// Map a non-2xx response to an error
fn status_error(status: StatusCode, body: &str, subject: &str) -> Error {
    let detail = api_messages(body).unwrap_or_else(|| body.trim().to_string());

    match status.as_u16() {
        401 | 403 => Error::auth(format!(
            "Invalid credentials or insufficient permissions ({}): {}",
            status, detail
        )),
        404 => Error::record_not_found(format!("{} ({})", subject, detail)),
        429 => Error::rate_limited(format!("Cloudflare rate limit exceeded ({})", status)),
        500..=599 => Error::provider(
            PROVIDER,
            format!("Cloudflare server error (transient): {} - {}", status, detail),
        ),
        _ => Error::provider(PROVIDER, format!("Request for {} failed: {} - {}", subject, status, detail)),
    }
}

/// Parse a 2xx body; `success: false` is still a failure
fn parse_envelope<T: DeserializeOwned>(body: &str) -> Result<ApiResponse<T>> {
    let envelope: ApiResponse<T> = serde_json::from_str(body)
        .map_err(|e| Error::provider(PROVIDER, format!("Failed to parse response: {}", e)))?;

    if !envelope.success {
        return Err(Error::provider(PROVIDER, format_messages(&envelope.errors)));
    }
    Ok(envelope)
}

/// Error messages from an error body, if it is a v4 envelope
fn api_messages(body: &str) -> Option<String> {
    let envelope: ApiResponse<serde_json::Value> = serde_json::from_str(body).ok()?;
    (!envelope.errors.is_empty()).then(|| format_messages(&envelope.errors))
}

fn format_messages(errors: &[ApiMessage]) -> String {
    if errors.is_empty() {
        return "API reported failure without details".to_string();
    }
    errors
        .iter()
        .map(|e| format!("[{}] {}", e.code, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

#[async_trait]
impl DnsProvider for CloudflareProvider {
    async fn list_zones(&self) -> Result<Vec<Zone>> {
        let url = format!("{}/zones", self.base_url);
        let mut zones = Vec::new();
        let mut page = 1u32;

        loop {
            let request = self
                .client
                .get(&url)
                .query(&[("page", page), ("per_page", ZONES_PER_PAGE)]);
            let response: ApiResponse<Vec<ZoneResult>> = self.send(request, "zones").await?;

            zones.extend(
                response
                    .result
                    .unwrap_or_default()
                    .into_iter()
                    .map(|z| Zone { id: z.id, name: z.name }),
            );

            let total_pages = response.result_info.map(|info| info.total_pages).unwrap_or(1);
            if page >= total_pages {
                break;
            }
            page += 1;
        }

        tracing::debug!("Fetched {} zone(s)", zones.len());
        Ok(zones)
    }

    async fn list_records(&self, zone_id: &str, name: &str) -> Result<Vec<DnsRecord>> {
        let url = format!("{}/zones/{}/dns_records", self.base_url, zone_id);
        let request = self.client.get(&url).query(&[("name", name)]);

        let response: ApiResponse<Vec<RecordResult>> = self.send(request, name).await?;
        Ok(response
            .result
            .unwrap_or_default()
            .into_iter()
            .map(DnsRecord::from)
            .collect())
    }

    async fn create_record(&self, zone_id: &str, record: &NewRecord) -> Result<DnsRecord> {
        let url = format!("{}/zones/{}/dns_records", self.base_url, zone_id);
        let payload = serde_json::json!({
            "type": record.record_type,
            "name": record.name,
            "content": record.content,
            "ttl": record.ttl,
            "proxied": record.proxied,
        });

        let response: ApiResponse<RecordResult> =
            self.send(self.client.post(&url).json(&payload), &record.name).await?;

        response
            .result
            .map(DnsRecord::from)
            .ok_or_else(|| Error::provider(PROVIDER, "Create response carried no record"))
    }

    async fn update_record(&self, update: &RecordUpdate) -> Result<()> {
        let url = format!(
            "{}/zones/{}/dns_records/{}",
            self.base_url, update.zone_id, update.record_id
        );
        // PATCH leaves TTL and comments untouched
        let payload = serde_json::json!({
            "type": update.record_type,
            "name": update.name,
            "content": update.content,
            "proxied": update.proxied,
        });

        let _: ApiResponse<serde_json::Value> =
            self.send(self.client.patch(&url).json(&payload), &update.name).await?;
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}
