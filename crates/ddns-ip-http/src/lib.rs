// # HTTP IP Discovery
//
// This crate provides HTTP-based IP discovery for the DDNS system.
//
// ## Architecture
//
// For each address family a list of "what is my IP" endpoints is tried in
// order. The first response body containing an address of that family wins.
// When every endpoint fails the family is reported as unknown (`None`) for
// this cycle; that is never an error.
//
// Each family has its own HTTP client bound to an unspecified local address
// of that family, so an IPv4 endpoint reached over IPv6 (or vice versa)
// cannot report the wrong address.

use ddns_core::config::DdnsConfig;
use ddns_core::traits::{AddressFamily, IpDiscovery, IpDiscoveryFactory};
use ddns_core::{Error, ProviderRegistry, Result};

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::time::Duration;

/// Default IPv4 echo services
pub const DEFAULT_IPV4_URLS: &[&str] = &[
    "https://api.ipify.org",
    "https://4.ipw.cn",
    "https://myip.ipip.net",
];

/// Default IPv6 echo services
pub const DEFAULT_IPV6_URLS: &[&str] = &[
    "https://api6.ipify.org",
    "https://6.ipw.cn",
    "https://v6.ident.me",
];

/// Endpoints and client for one family
struct FamilyEndpoints {
    urls: Vec<String>,
    client: reqwest::Client,
}

/// HTTP-based IP discovery
pub struct HttpIpDiscovery {
    /// `None` = family disabled, never queried
    ipv4: Option<FamilyEndpoints>,
    ipv6: Option<FamilyEndpoints>,
}

impl HttpIpDiscovery {
    /// Create a discovery with explicit URL lists
    ///
    /// # Parameters
    ///
    /// - `ipv4_urls` / `ipv6_urls`: Endpoints per family, `None` disables
    ///   the family; an empty list falls back to the defaults
    /// - `timeout`: Per-request timeout
    pub fn new(
        ipv4_urls: Option<Vec<String>>,
        ipv6_urls: Option<Vec<String>>,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            ipv4: ipv4_urls
                .map(|urls| FamilyEndpoints::new(AddressFamily::V4, urls, timeout))
                .transpose()?,
            ipv6: ipv6_urls
                .map(|urls| FamilyEndpoints::new(AddressFamily::V6, urls, timeout))
                .transpose()?,
        })
    }

    /// Create from the `ipv4`/`ipv6` sections of the configuration
    ///
    /// A family that is disabled or has no domains is never queried.
    pub fn from_config(config: &DdnsConfig) -> Result<Self> {
        let urls = |family: AddressFamily| {
            let settings = config.family(family);
            (settings.enabled && !settings.domains.is_empty()).then(|| settings.urls.clone())
        };

        Self::new(
            urls(AddressFamily::V4),
            urls(AddressFamily::V6),
            Duration::from_secs(config.engine.http_timeout_secs),
        )
    }

    /// URLs queried for `family`, in order
    pub fn urls(&self, family: AddressFamily) -> &[String] {
        self.endpoints(family).map(|e| e.urls.as_slice()).unwrap_or(&[])
    }

    fn endpoints(&self, family: AddressFamily) -> Option<&FamilyEndpoints> {
        match family {
            AddressFamily::V4 => self.ipv4.as_ref(),
            AddressFamily::V6 => self.ipv6.as_ref(),
        }
    }
}

impl FamilyEndpoints {
    fn new(family: AddressFamily, urls: Vec<String>, timeout: Duration) -> Result<Self> {
        let urls: Vec<String> = if urls.is_empty() {
            let defaults = match family {
                AddressFamily::V4 => DEFAULT_IPV4_URLS,
                AddressFamily::V6 => DEFAULT_IPV6_URLS,
            };
            defaults.iter().map(|u| u.to_string()).collect()
        } else {
            urls
        };

        let local = match family {
            AddressFamily::V4 => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            AddressFamily::V6 => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
        };

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .local_address(local)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { urls, client })
    }

    /// Ask one endpoint
    async fn fetch(&self, url: &str, family: AddressFamily) -> Option<IpAddr> {
        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("{} lookup via {} failed: {}", family, url, e);
                return None;
            }
        };

        if !response.status().is_success() {
            tracing::warn!("{} lookup via {} returned {}", family, url, response.status());
            return None;
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!("Failed to read response from {}: {}", url, e);
                return None;
            }
        };

        let ip = extract_ip(&body, family);
        if ip.is_none() {
            tracing::warn!("No {} address in response from {}", family, url);
        }
        ip
    }
}

#[async_trait::async_trait]
impl IpDiscovery for HttpIpDiscovery {
    async fn current(&self, family: AddressFamily) -> Option<IpAddr> {
        let endpoints = self.endpoints(family)?;

        for url in &endpoints.urls {
            if let Some(ip) = endpoints.fetch(url, family).await {
                tracing::debug!("{} address {} discovered via {}", family, ip, url);
                return Some(ip);
            }
        }

        tracing::warn!("Could not determine current {} address", family);
        None
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// First address of `family` found in a response body
///
/// Plain-text services answer with the bare address; others embed it in
/// text or JSON, so the body is split on characters that cannot be part of
/// an address and each candidate token is parsed.
pub fn extract_ip(body: &str, family: AddressFamily) -> Option<IpAddr> {
    body.split(|c: char| !(c.is_ascii_hexdigit() || c == '.' || c == ':'))
        .map(|token| token.trim_end_matches('.'))
        .filter(|token| !token.is_empty())
        .filter_map(|token| token.parse::<IpAddr>().ok())
        .find(|ip| family.contains(ip))
}

/// Factory for creating HTTP IP discovery
pub struct HttpFactory;

impl IpDiscoveryFactory for HttpFactory {
    fn create(&self, config: &DdnsConfig) -> Result<Box<dyn IpDiscovery>> {
        Ok(Box::new(HttpIpDiscovery::from_config(config)?))
    }
}

/// Register the HTTP IP discovery with a registry
pub fn register(registry: &ProviderRegistry) {
    registry.register_ip_discovery("http", Box::new(HttpFactory));
}

#[cfg(test)]
mod tests {
    use super::*;
    use ddns_core::config::{FamilyConfig, ProviderConfig};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    /// Serve `body` with `status` to every connection on a local port
    async fn serve(status: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        format!("http://{}", addr)
    }

    #[test]
    fn test_extract_plain_address() {
        assert_eq!(extract_ip("203.0.113.5\n", AddressFamily::V4), Some(ip("203.0.113.5")));
        assert_eq!(extract_ip("2001:db8::5", AddressFamily::V6), Some(ip("2001:db8::5")));
    }

    #[test]
    fn test_extract_embedded_address() {
        assert_eq!(
            extract_ip("当前 IP：203.0.113.5  来自于：中国", AddressFamily::V4),
            Some(ip("203.0.113.5"))
        );
        assert_eq!(
            extract_ip(r#"{"ip":"2001:db8::5","country":"ZZ"}"#, AddressFamily::V6),
            Some(ip("2001:db8::5"))
        );
        assert_eq!(
            extract_ip("Your address is 203.0.113.5.", AddressFamily::V4),
            Some(ip("203.0.113.5"))
        );
    }

    #[test]
    fn test_extract_filters_family() {
        assert_eq!(extract_ip("203.0.113.5", AddressFamily::V6), None);
        assert_eq!(extract_ip("2001:db8::5", AddressFamily::V4), None);
        assert_eq!(extract_ip("<html>rate limited</html>", AddressFamily::V4), None);
        assert_eq!(extract_ip("", AddressFamily::V4), None);
    }

    #[test]
    fn test_default_urls_when_empty() {
        let discovery = HttpIpDiscovery::new(Some(vec![]), None, Duration::from_secs(5)).unwrap();

        assert_eq!(discovery.urls(AddressFamily::V4).len(), DEFAULT_IPV4_URLS.len());
        assert!(discovery.urls(AddressFamily::V6).is_empty());
    }

    #[test]
    fn test_factory_respects_disabled_family() {
        let mut config = DdnsConfig::new(ProviderConfig::Cloudflare {
            api_token: "token".into(),
        });
        config.ipv4 = FamilyConfig {
            urls: vec!["https://ip.example.test".into()],
            ..FamilyConfig::with_domains(["home.example.com"])
        };
        config.ipv6.enabled = false;

        let discovery = HttpIpDiscovery::from_config(&config).unwrap();
        assert_eq!(discovery.urls(AddressFamily::V4), ["https://ip.example.test".to_string()]);
        assert!(discovery.urls(AddressFamily::V6).is_empty());

        let registry = ProviderRegistry::new();
        register(&registry);
        let created = registry.create_ip_discovery("http", &config).unwrap();
        assert_eq!(created.name(), "http");
    }

    #[tokio::test]
    async fn test_disabled_family_is_none() {
        let discovery = HttpIpDiscovery::new(None, None, Duration::from_secs(1)).unwrap();
        assert_eq!(discovery.current_ipv4().await, None);
        assert_eq!(discovery.current_ipv6().await, None);
    }

    #[tokio::test]
    async fn test_fetches_from_server() {
        let url = serve("200 OK", "203.0.113.5\n").await;
        let discovery = HttpIpDiscovery::new(Some(vec![url]), None, Duration::from_secs(5)).unwrap();

        assert_eq!(discovery.current_ipv4().await, Some(ip("203.0.113.5")));
    }

    #[tokio::test]
    async fn test_falls_through_failing_endpoints() {
        let broken = serve("503 Service Unavailable", "busy").await;
        let garbage = serve("200 OK", "<html>no address here</html>").await;
        let good = serve("200 OK", "ip=198.51.100.7").await;

        let discovery = HttpIpDiscovery::new(
            Some(vec![broken, garbage, good]),
            None,
            Duration::from_secs(5),
        )
        .unwrap();

        assert_eq!(discovery.current_ipv4().await, Some(ip("198.51.100.7")));
    }

    #[tokio::test]
    async fn test_all_endpoints_failing_is_none() {
        let broken = serve("500 Internal Server Error", "").await;
        let discovery = HttpIpDiscovery::new(
            Some(vec![broken, "http://127.0.0.1:9".to_string()]),
            None,
            Duration::from_secs(2),
        )
        .unwrap();

        assert_eq!(discovery.current_ipv4().await, None);
    }
}
