// # Alibaba Cloud ESA DNS Provider
//
// This crate provides an ESA (Edge Security Acceleration) DNS provider for
// the DDNS system. An ESA *site* plays the role of a zone.
//
// ## Wire Protocol
//
// Every call is a signed RPC-style `GET` against one endpoint, the action
// and its arguments carried in the query string:
//
// - `ListSites(SiteName, ExactMatch=true)` → zone id
// - `ListRecords(SiteId, RecordName, RecordNameMode=exact, Type)`
// - `CreateRecord(SiteId, RecordName, Type, Data, TTL)`
// - `UpdateRecord(SiteId, RecordId, RecordName, Type, Data, TTL)`
//
// Requests are signed by a [`RequestSigner`] (see [`signer`]). Per-domain
// custom parameters are forwarded on create/update, under the fixed ones.
//
// ## Behavior
//
// - One HTTP request per trait call; no retries, no caching
// - Non-2xx responses surface the vendor `Code`/`Message`
// - Dry-run mode performs reads and logs writes without sending them
// - Credentials never appear in logs or `Debug` output

pub mod api;
pub mod signer;

use async_trait::async_trait;
use ddns_core::config::{EngineConfig, ProviderConfig};
use ddns_core::traits::{
    DnsProvider, DnsProviderFactory, Record, RecordChange, RecordType, RequestSigner, Zone,
};
use ddns_core::{Error, Result};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::time::Duration;

pub use signer::AliyunRpcSigner;

/// Default ESA API endpoint
pub const ESA_ENDPOINT: &str = "https://esa.cn-hangzhou.aliyuncs.com/";

/// TTL used when none is configured (ESA accepts 1 or 30..=86400)
pub const DEFAULT_TTL: u32 = 30;

const PROVIDER_NAME: &str = "esa";

/// ESA DNS provider
///
/// # Dry-Run Mode
///
/// When `dry_run` is true, `ListSites`/`ListRecords` are sent as usual,
/// while `CreateRecord`/`UpdateRecord` are logged and reported as
/// successful without being sent.
pub struct EsaProvider {
    endpoint: String,
    client: reqwest::Client,
    signer: Box<dyn RequestSigner>,
    dry_run: bool,
}

// Custom Debug implementation that hides the signer (it holds the secret)
impl std::fmt::Debug for EsaProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EsaProvider")
            .field("endpoint", &self.endpoint)
            .field("signer", &"<REDACTED>")
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl EsaProvider {
    /// Create a provider signing with an access key pair
    ///
    /// # Parameters
    ///
    /// - `access_key_id` / `access_key_secret`: RAM credentials with ESA access
    /// - `endpoint`: API endpoint, `None` for [`ESA_ENDPOINT`]
    /// - `timeout`: Per-request HTTP timeout
    /// - `dry_run`: If true, skip create/update calls
    pub fn new(
        access_key_id: impl Into<String>,
        access_key_secret: impl Into<String>,
        endpoint: Option<String>,
        timeout: Duration,
        dry_run: bool,
    ) -> Result<Self> {
        let access_key_id = access_key_id.into();
        let access_key_secret = access_key_secret.into();
        if access_key_id.is_empty() || access_key_secret.is_empty() {
            return Err(Error::config("ESA access key ID and secret cannot be empty"));
        }

        Self::with_signer(
            Box::new(AliyunRpcSigner::new(access_key_id, access_key_secret)),
            endpoint,
            timeout,
            dry_run,
        )
    }

    /// Create a provider with an arbitrary signer
    pub fn with_signer(
        signer: Box<dyn RequestSigner>,
        endpoint: Option<String>,
        timeout: Duration,
        dry_run: bool,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            endpoint: endpoint.unwrap_or_else(|| ESA_ENDPOINT.to_string()),
            client,
            signer,
            dry_run,
        })
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Sign `params` and send them as one GET request
    async fn call<R: DeserializeOwned>(&self, mut params: BTreeMap<String, String>) -> Result<R> {
        let action = params.get("Action").cloned().unwrap_or_default();
        self.signer.sign("GET", &mut params)?;

        let response = self
            .client
            .get(&self.endpoint)
            .query(&params)
            .send()
            .await
            .map_err(|e| Error::http(format!("{} request failed: {}", action, e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::http(format!("{} response unreadable: {}", action, e)))?;

        if !status.is_success() {
            return Err(status_error(status.as_u16(), &action, &body));
        }

        serde_json::from_str(&body).map_err(|e| {
            Error::provider(
                PROVIDER_NAME,
                format!("Failed to parse {} response: {}", action, e),
            )
        })
    }
}

/// Map a non-2xx response to an error
fn status_error(status: u16, action: &str, body: &str) -> Error {
    let detail = match serde_json::from_str::<api::ErrorResponse>(body) {
        Ok(e) if !e.code.is_empty() => format!("{}: {} (RequestId: {})", e.code, e.message, e.request_id),
        _ => body.to_string(),
    };

    match status {
        401 | 403 => Error::auth(format!("{} rejected ({}): {}", action, status, detail)),
        404 => Error::not_found(format!("{} ({}): {}", action, status, detail)),
        429 => Error::provider(
            PROVIDER_NAME,
            format!("Rate limit exceeded on {}: {}", action, detail),
        ),
        500..=599 => Error::provider(
            PROVIDER_NAME,
            format!("ESA server error (transient) on {}: {} - {}", action, status, detail),
        ),
        _ => Error::provider(
            PROVIDER_NAME,
            format!("{} failed: {} - {}", action, status, detail),
        ),
    }
}

#[async_trait]
impl DnsProvider for EsaProvider {
    async fn resolve_zone(&self, domain_name: &str) -> Result<Zone> {
        tracing::debug!("Looking up ESA site for {}", domain_name);
        let response: api::ListSitesResponse = self.call(api::list_sites(domain_name)).await?;
        let zone = api::select_site(response, domain_name)?;
        tracing::debug!("Found ESA site {} for {}", zone.id, domain_name);
        Ok(zone)
    }

    async fn list_records(
        &self,
        zone: &Zone,
        full_name: &str,
        record_type: RecordType,
    ) -> Result<Vec<Record>> {
        let response: api::ListRecordsResponse = self
            .call(api::list_records(&zone.id, full_name, record_type))
            .await?;
        Ok(api::into_records(response, full_name, record_type))
    }

    async fn create_record(&self, zone: &Zone, change: &RecordChange<'_>) -> Result<String> {
        let value = change.value.to_string();
        let params = api::create_record(
            change.params,
            &zone.id,
            change.name,
            change.record_type,
            &value,
            change.ttl,
        );

        if self.dry_run {
            tracing::info!("[DRY-RUN] Would send CreateRecord with parameters: {:?}", params);
            return Ok(String::from("dry-run"));
        }

        let response: api::WriteResponse = self.call(params).await?;
        tracing::debug!("CreateRecord accepted (RequestId: {})", response.request_id);
        Ok(response
            .record_id
            .map(|id| id.to_string())
            .unwrap_or_default())
    }

    async fn update_record(
        &self,
        zone: &Zone,
        record: &Record,
        change: &RecordChange<'_>,
    ) -> Result<()> {
        let value = change.value.to_string();
        let params = api::update_record(
            change.params,
            &zone.id,
            &record.id,
            change.name,
            change.record_type,
            &value,
            change.ttl,
        );

        if self.dry_run {
            tracing::info!("[DRY-RUN] Would send UpdateRecord with parameters: {:?}", params);
            return Ok(());
        }

        let response: api::WriteResponse = self.call(params).await?;
        tracing::debug!("UpdateRecord accepted (RequestId: {})", response.request_id);
        Ok(())
    }

    fn default_ttl(&self) -> u32 {
        DEFAULT_TTL
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER_NAME
    }
}

/// Factory for creating ESA providers
pub struct EsaFactory;

impl DnsProviderFactory for EsaFactory {
    fn create(
        &self,
        config: &ProviderConfig,
        settings: &EngineConfig,
    ) -> Result<Box<dyn DnsProvider>> {
        match config {
            ProviderConfig::Esa {
                access_key_id,
                access_key_secret,
                endpoint,
            } => {
                // Check for dry-run mode environment variable
                let dry_run = std::env::var("DDNS_MODE")
                    .unwrap_or_default()
                    .eq_ignore_ascii_case("dry-run");

                if dry_run {
                    tracing::warn!("ESA provider running in DRY-RUN mode - no changes will be made");
                }

                Ok(Box::new(EsaProvider::new(
                    access_key_id.clone(),
                    access_key_secret.clone(),
                    endpoint.clone(),
                    Duration::from_secs(settings.http_timeout_secs),
                    dry_run,
                )?))
            }
            _ => Err(Error::config("Invalid config for ESA provider")),
        }
    }
}

/// Register the ESA provider with a registry
///
/// # Example
///
/// ```rust
/// use ddns_core::ProviderRegistry;
///
/// let registry = ProviderRegistry::new();
/// ddns_provider_esa::register(&registry);
/// assert!(registry.has_provider("esa"));
/// ```
pub fn register(registry: &ddns_core::ProviderRegistry) {
    registry.register_provider(PROVIDER_NAME, Box::new(EsaFactory));
}
