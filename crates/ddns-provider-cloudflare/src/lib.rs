// # Cloudflare DNS Provider
//
// This crate provides a Cloudflare DNS provider implementation for the DDNS system.
//
// ## Behavior
//
// - One HTTP request per trait call; the engine decides what to call
// - No retries, no caching; a failure is reported and the next cycle retries
// - HTTP timeout taken from the engine settings
// - Specific error handling for HTTP status codes (401/403, 404, 409, 429, 5xx)
// - Dry-run mode: reads are performed, writes are logged only
//
// ## Security Requirements
//
// - API token NEVER appears in logs
// - Provider MUST fail fast if token is empty
//
// ## API Reference
//
// - Cloudflare API v4: https://developers.cloudflare.com/api/
// - List Zones: GET `/zones?name=...`
// - List DNS Records: GET `/zones/:zone_id/dns_records?name=...&type=...`
// - Create DNS Record: POST `/zones/:zone_id/dns_records`
// - Update DNS Record: PUT `/zones/:zone_id/dns_records/:record_id`
//
// ## Custom Parameters
//
// Per-domain parameters `proxied=true|false` and `comment=<text>` are
// forwarded in the record body. Unknown keys are ignored.

use async_trait::async_trait;
use ddns_core::config::{EngineConfig, ProviderConfig};
use ddns_core::traits::{DnsProvider, DnsProviderFactory, Record, RecordChange, RecordType, Zone};
use ddns_core::{Error, Result};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

/// Cloudflare API base URL
pub const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// TTL 1 means "automatic" on Cloudflare
pub const DEFAULT_TTL: u32 = 1;

/// Wraps every Cloudflare API response
#[derive(Debug, Deserialize)]
struct ApiResult<T> {
    #[serde(default)]
    errors: Value,
    success: bool,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ZoneInfo {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct DnsRecordInfo {
    id: String,
    name: String,
    #[serde(rename = "type")]
    record_type: String,
    content: String,
    #[serde(default)]
    ttl: Option<u32>,
}

/// Request body for creating or replacing a record
#[derive(Debug, Clone, PartialEq, Serialize)]
struct DnsRecordBody {
    #[serde(rename = "type")]
    record_type: &'static str,
    name: String,
    content: String,
    ttl: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    proxied: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    comment: Option<String>,
}

impl DnsRecordBody {
    fn from_change(change: &RecordChange<'_>) -> Self {
        let proxied = lookup(change.params, "proxied").and_then(|v| match v.to_ascii_lowercase().as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        });

        Self {
            record_type: change.record_type.as_str(),
            name: change.name.to_string(),
            content: change.value.to_string(),
            ttl: change.ttl,
            proxied,
            comment: lookup(change.params, "comment").map(str::to_string),
        }
    }
}

/// Case-insensitive parameter lookup
fn lookup<'a>(params: &'a BTreeMap<String, String>, key: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .map(|(_, v)| v.as_str())
}

/// Cloudflare DNS provider
///
/// # Dry-Run Mode
///
/// When `dry_run` is true, the provider will:
/// - Perform all GET requests (zone lookup, record lookup)
/// - Log the intended POST/PUT payload
/// - **NOT** actually modify DNS records
///
/// # Security
///
/// The Debug implementation intentionally does NOT expose the API token.
pub struct CloudflareProvider {
    /// Cloudflare API token
    /// ⚠️ NEVER log this value
    api_token: String,

    /// API base URL
    base_url: String,

    /// HTTP client for API requests
    client: reqwest::Client,

    /// Dry-run mode: if true, perform GET requests but skip writes
    dry_run: bool,
}

// Custom Debug implementation that hides the API token
impl std::fmt::Debug for CloudflareProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareProvider")
            .field("api_token", &"<REDACTED>")
            .field("base_url", &self.base_url)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl CloudflareProvider {
    /// Create a new Cloudflare provider
    ///
    /// # Parameters
    ///
    /// - `api_token`: Cloudflare API token with Zone:DNS:Edit permissions
    /// - `timeout`: Per-request HTTP timeout
    /// - `dry_run`: If true, perform GET requests but skip writes
    pub fn new(api_token: impl Into<String>, timeout: Duration, dry_run: bool) -> Result<Self> {
        let api_token = api_token.into();
        if api_token.is_empty() {
            return Err(Error::config("Cloudflare API token cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            api_token,
            base_url: CLOUDFLARE_API_BASE.to_string(),
            client,
            dry_run,
        })
    }

    /// Point the provider at another API base (testing, proxies)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    async fn request<R, B>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&B>,
    ) -> Result<R>
    where
        R: DeserializeOwned,
        B: Serialize,
    {
        let url = format!("{}{}", self.base_url, path);
        let req = self
            .client
            .request(method.clone(), &url)
            .bearer_auth(&self.api_token)
            .header("Content-Type", "application/json")
            .query(query);
        let req = if let Some(body) = body { req.json(body) } else { req };

        let response = req
            .send()
            .await
            .map_err(|e| Error::http(format!("{} {} failed: {}", method, path, e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(status_error(status.as_u16(), path, &error_text));
        }

        let body: ApiResult<R> = response
            .json()
            .await
            .map_err(|e| Error::provider("cloudflare", format!("Failed to parse response: {}", e)))?;

        match body {
            ApiResult {
                success: true,
                result: Some(result),
                ..
            } => Ok(result),
            ApiResult { errors, .. } => Err(Error::provider(
                "cloudflare",
                format!("API reported failure: {}", errors),
            )),
        }
    }
}

/// Map a non-2xx status to an error
fn status_error(status: u16, path: &str, error_text: &str) -> Error {
    match status {
        401 | 403 => Error::auth(format!(
            "Invalid API token or insufficient permissions. Status: {}",
            status
        )),
        404 => Error::not_found(format!("{}: {}", path, error_text)),
        409 => Error::provider(
            "cloudflare",
            format!("Conflict: record is being modified concurrently. Status: {}", status),
        ),
        429 => Error::provider(
            "cloudflare",
            format!("Rate limit exceeded. Please retry later. Status: {}", status),
        ),
        500..=599 => Error::provider(
            "cloudflare",
            format!("Cloudflare server error (transient): {} - {}", status, error_text),
        ),
        _ => Error::provider(
            "cloudflare",
            format!("Request failed: {} - {}", status, error_text),
        ),
    }
}

/// Pick the one zone named exactly `name`
fn select_zone(zones: Vec<ZoneInfo>, name: &str) -> Result<Zone> {
    let mut matches: Vec<ZoneInfo> = zones
        .into_iter()
        .filter(|z| z.name.eq_ignore_ascii_case(name))
        .collect();

    match matches.len() {
        0 => Err(Error::not_found(format!("Zone not found: {}", name))),
        1 => {
            let zone = matches.remove(0);
            Ok(Zone {
                id: zone.id,
                name: zone.name,
            })
        }
        n => Err(Error::ambiguous(format!("{} zones named {}", n, name))),
    }
}

fn into_records(records: Vec<DnsRecordInfo>, name: &str, record_type: RecordType) -> Vec<Record> {
    records
        .into_iter()
        .filter(|r| {
            r.name.eq_ignore_ascii_case(name) && RecordType::parse(&r.record_type) == Some(record_type)
        })
        .map(|r| Record {
            id: r.id,
            name: r.name,
            record_type,
            value: r.content,
            ttl: r.ttl,
        })
        .collect()
}

#[async_trait]
impl DnsProvider for CloudflareProvider {
    /// ```http
    /// GET /zones?name=example.com
    /// Authorization: Bearer <token>
    /// ```
    async fn resolve_zone(&self, domain_name: &str) -> Result<Zone> {
        tracing::debug!("Looking up zone ID for domain: {}", domain_name);

        let zones: Vec<ZoneInfo> = self
            .request::<_, ()>(Method::GET, "/zones", &[("name", domain_name)], None)
            .await?;

        let zone = select_zone(zones, domain_name)?;
        tracing::debug!("Found zone ID: {}", zone.id);
        Ok(zone)
    }

    /// ```http
    /// GET /zones/:zone_id/dns_records?name=www.example.com&type=A
    /// ```
    async fn list_records(
        &self,
        zone: &Zone,
        full_name: &str,
        record_type: RecordType,
    ) -> Result<Vec<Record>> {
        let path = format!("/zones/{}/dns_records", zone.id);
        let records: Vec<DnsRecordInfo> = self
            .request::<_, ()>(
                Method::GET,
                &path,
                &[("name", full_name), ("type", record_type.as_str())],
                None,
            )
            .await?;

        Ok(into_records(records, full_name, record_type))
    }

    /// ```http
    /// POST /zones/:zone_id/dns_records
    /// { "type": "A", "name": "...", "content": "1.2.3.4", "ttl": 1 }
    /// ```
    async fn create_record(&self, zone: &Zone, change: &RecordChange<'_>) -> Result<String> {
        let path = format!("/zones/{}/dns_records", zone.id);
        let body = DnsRecordBody::from_change(change);

        if self.dry_run {
            tracing::info!(
                "[DRY-RUN] Would send POST request to {} with payload: {}",
                path,
                serde_json::to_string(&body)?
            );
            return Ok(String::from("dry-run"));
        }

        let created: DnsRecordInfo = self.request(Method::POST, &path, &[], Some(&body)).await?;
        Ok(created.id)
    }

    /// ```http
    /// PUT /zones/:zone_id/dns_records/:record_id
    /// ```
    async fn update_record(
        &self,
        zone: &Zone,
        record: &Record,
        change: &RecordChange<'_>,
    ) -> Result<()> {
        let path = format!("/zones/{}/dns_records/{}", zone.id, record.id);
        let body = DnsRecordBody::from_change(change);

        if self.dry_run {
            tracing::info!(
                "[DRY-RUN] Would send PUT request to {} with payload: {}",
                path,
                serde_json::to_string(&body)?
            );
            return Ok(());
        }

        let _: Value = self.request(Method::PUT, &path, &[], Some(&body)).await?;
        Ok(())
    }

    fn default_ttl(&self) -> u32 {
        DEFAULT_TTL
    }

    fn provider_name(&self) -> &'static str {
        "cloudflare"
    }
}

/// Factory for creating Cloudflare providers
pub struct CloudflareFactory;

impl DnsProviderFactory for CloudflareFactory {
    fn create(
        &self,
        config: &ProviderConfig,
        settings: &EngineConfig,
    ) -> Result<Box<dyn DnsProvider>> {
        match config {
            ProviderConfig::Cloudflare { api_token } => {
                // Check for dry-run mode environment variable
                let dry_run = std::env::var("DDNS_MODE")
                    .unwrap_or_default()
                    .eq_ignore_ascii_case("dry-run");

                if dry_run {
                    tracing::warn!("Cloudflare provider running in DRY-RUN mode - no changes will be made");
                }

                Ok(Box::new(CloudflareProvider::new(
                    api_token.clone(),
                    Duration::from_secs(settings.http_timeout_secs),
                    dry_run,
                )?))
            }
            _ => Err(Error::config("Invalid config for Cloudflare provider")),
        }
    }
}

/// Register the Cloudflare provider with a registry
///
/// # Example
///
/// ```rust
/// use ddns_core::ProviderRegistry;
///
/// let registry = ProviderRegistry::new();
/// ddns_provider_cloudflare::register(&registry);
/// assert!(registry.has_provider("cloudflare"));
/// ```
pub fn register(registry: &ddns_core::ProviderRegistry) {
    registry.register_provider("cloudflare", Box::new(CloudflareFactory));
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::sync::mpsc;

    /// Answer every connection with one canned response, forwarding the raw
    /// request (head and body) to the returned receiver
    async fn serve(
        status: &'static str,
        body: &'static str,
    ) -> (String, mpsc::UnboundedReceiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let request = read_request(&mut socket).await;
                let _ = tx.send(request);
                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        (format!("http://{}", addr), rx)
    }

    async fn read_request(socket: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.unwrap_or(0);
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);

            if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                let head = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
                let length = head
                    .lines()
                    .find_map(|l| l.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= end + 4 + length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }

    fn change<'a>(params: &'a BTreeMap<String, String>) -> RecordChange<'a> {
        RecordChange {
            name: "www.example.com",
            record_type: RecordType::Aaaa,
            value: "2001:db8::5".parse().unwrap(),
            ttl: 120,
            params,
        }
    }

    #[test]
    fn test_factory_creation() {
        let config = ProviderConfig::Cloudflare {
            api_token: "test_token".to_string(),
        };

        let provider = CloudflareFactory.create(&config, &EngineConfig::default()).unwrap();
        assert_eq!(provider.provider_name(), "cloudflare");
        assert_eq!(provider.default_ttl(), 1);
    }

    #[test]
    fn test_factory_missing_token() {
        let config = ProviderConfig::Cloudflare {
            api_token: "".to_string(),
        };

        assert!(CloudflareFactory.create(&config, &EngineConfig::default()).is_err());
    }

    #[test]
    fn test_empty_token_rejected() {
        assert!(matches!(
            CloudflareProvider::new("", Duration::from_secs(5), false),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_api_token_not_exposed_in_debug() {
        let provider =
            CloudflareProvider::new("secret_token_12345", Duration::from_secs(5), false).unwrap();

        let debug_str = format!("{:?}", provider);
        assert!(!debug_str.contains("secret_token_12345"));
        assert!(debug_str.contains("CloudflareProvider"));
    }

    #[test]
    fn test_body_from_change() {
        let mut params = BTreeMap::new();
        params.insert("Proxied".to_string(), "TRUE".to_string());
        params.insert("comment".to_string(), "home router".to_string());
        params.insert("ignored".to_string(), "x".to_string());

        let body = DnsRecordBody::from_change(&change(&params));
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "type": "AAAA",
                "name": "www.example.com",
                "content": "2001:db8::5",
                "ttl": 120,
                "proxied": true,
                "comment": "home router",
            })
        );
    }

    #[test]
    fn test_body_omits_unset_options() {
        let params = BTreeMap::new();
        let json = serde_json::to_value(DnsRecordBody::from_change(&change(&params))).unwrap();

        assert!(json.get("proxied").is_none());
        assert!(json.get("comment").is_none());
    }

    #[test]
    fn test_zone_requires_exact_name() {
        let zones = vec![
            ZoneInfo {
                id: "z1".into(),
                name: "myexample.com".into(),
            },
            ZoneInfo {
                id: "z2".into(),
                name: "example.com".into(),
            },
        ];

        let zone = select_zone(zones, "example.com").unwrap();
        assert_eq!(zone.id, "z2");

        assert!(matches!(select_zone(vec![], "example.com"), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_parse_record_list() {
        let body = r#"{"success":true,"errors":[],"messages":[],"result":[
            {"id":"r1","name":"www.example.com","type":"A","content":"198.51.100.1","ttl":1,"proxied":false},
            {"id":"r2","name":"www.example.com","type":"AAAA","content":"2001:db8::1","ttl":1}
        ]}"#;
        let parsed: ApiResult<Vec<DnsRecordInfo>> = serde_json::from_str(body).unwrap();
        assert!(parsed.success);

        let records = into_records(parsed.result.unwrap(), "www.example.com", RecordType::A);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "r1");
        assert_eq!(records[0].value, "198.51.100.1");
    }

    #[test]
    fn test_status_error_mapping() {
        assert!(matches!(status_error(401, "/zones", ""), Error::Authentication(_)));
        assert!(matches!(status_error(403, "/zones", ""), Error::Authentication(_)));
        assert!(matches!(status_error(404, "/zones/x", ""), Error::NotFound(_)));
        assert!(status_error(429, "/zones", "").to_string().contains("Rate limit"));
        assert!(status_error(502, "/zones", "bad gateway").to_string().contains("transient"));
    }

    #[tokio::test]
    async fn test_dry_run_skips_writes() {
        let provider = CloudflareProvider::new("token", Duration::from_millis(200), true)
            .unwrap()
            .with_base_url("http://127.0.0.1:9");
        let zone = Zone {
            id: "z1".into(),
            name: "example.com".into(),
        };
        let params = BTreeMap::new();

        assert_eq!(provider.create_record(&zone, &change(&params)).await.unwrap(), "dry-run");

        let record = Record {
            id: "r1".into(),
            name: "www.example.com".into(),
            record_type: RecordType::Aaaa,
            value: "2001:db8::1".into(),
            ttl: Some(1),
        };
        assert!(provider.update_record(&zone, &record, &change(&params)).await.is_ok());
    }

    fn zone() -> Zone {
        Zone {
            id: "z1".into(),
            name: "example.com".into(),
        }
    }

    fn provider_at(url: String) -> CloudflareProvider {
        CloudflareProvider::new("test-token", Duration::from_secs(5), false)
            .unwrap()
            .with_base_url(url)
    }

    #[tokio::test]
    async fn test_resolve_zone_request() {
        let (url, mut requests) = serve(
            "200 OK",
            r#"{"success":true,"errors":[],"messages":[],"result":[
                {"id":"z0","name":"myexample.com"},
                {"id":"z1","name":"example.com"}]}"#,
        )
        .await;

        let zone = provider_at(url).resolve_zone("example.com").await.unwrap();
        assert_eq!(zone.id, "z1");

        let request = requests.recv().await.unwrap();
        assert!(request.starts_with("GET /zones?name=example.com "));
        assert!(request.to_ascii_lowercase().contains("authorization: bearer test-token"));
    }

    #[tokio::test]
    async fn test_list_records_request() {
        let (url, mut requests) = serve(
            "200 OK",
            r#"{"success":true,"errors":[],"result":[
                {"id":"r1","name":"www.example.com","type":"AAAA","content":"2001:db8::1","ttl":1}]}"#,
        )
        .await;

        let records = provider_at(url)
            .list_records(&zone(), "www.example.com", RecordType::Aaaa)
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].value, "2001:db8::1");

        let request = requests.recv().await.unwrap();
        assert!(request.starts_with("GET /zones/z1/dns_records?name=www.example.com&type=AAAA "));
    }

    #[tokio::test]
    async fn test_create_record_posts_body() {
        let (url, mut requests) = serve(
            "200 OK",
            r#"{"success":true,"errors":[],"result":
                {"id":"r9","name":"www.example.com","type":"AAAA","content":"2001:db8::5","ttl":120}}"#,
        )
        .await;
        let params = BTreeMap::new();

        let id = provider_at(url)
            .create_record(&zone(), &change(&params))
            .await
            .unwrap();
        assert_eq!(id, "r9");

        let request = requests.recv().await.unwrap();
        assert!(request.starts_with("POST /zones/z1/dns_records "));
        assert!(request.contains(r#""content":"2001:db8::5""#));
        assert!(request.contains(r#""ttl":120"#));
    }

    #[tokio::test]
    async fn test_update_record_puts_to_record_path() {
        let (url, mut requests) = serve(
            "200 OK",
            r#"{"success":true,"errors":[],"result":{"id":"r1"}}"#,
        )
        .await;
        let params = BTreeMap::new();
        let record = Record {
            id: "r1".into(),
            name: "www.example.com".into(),
            record_type: RecordType::Aaaa,
            value: "2001:db8::1".into(),
            ttl: Some(1),
        };

        provider_at(url)
            .update_record(&zone(), &record, &change(&params))
            .await
            .unwrap();

        let request = requests.recv().await.unwrap();
        assert!(request.starts_with("PUT /zones/z1/dns_records/r1 "));
    }

    #[tokio::test]
    async fn test_unsuccessful_envelope_is_provider_error() {
        let (url, _requests) = serve(
            "200 OK",
            r#"{"success":false,"errors":[{"code":9109,"message":"Invalid access token"}],"result":null}"#,
        )
        .await;

        let err = provider_at(url).resolve_zone("example.com").await.unwrap_err();
        assert!(matches!(err, Error::Provider { .. }));
        assert!(err.to_string().contains("9109"));
    }

    #[tokio::test]
    async fn test_http_status_is_mapped() {
        let (url, _requests) = serve(
            "403 Forbidden",
            r#"{"success":false,"errors":[{"code":10000,"message":"Authentication error"}]}"#,
        )
        .await;

        assert!(matches!(
            provider_at(url).resolve_zone("example.com").await,
            Err(Error::Authentication(_))
        ));
    }
}
