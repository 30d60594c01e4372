// Daemon configuration
//
// Either a JSON file (`DDNS_CONFIG_FILE`) or individual environment
// variables. Daemon-only options (log level, run-once) always come from the
// environment.

use anyhow::{Context, Result, bail};
use ddns_core::config::{DdnsConfig, FamilyConfig, ProviderConfig};
use std::env;
use tracing::Level;

/// Options that only affect the daemon process
#[derive(Debug, Clone, PartialEq)]
pub struct DaemonOptions {
    pub log_level: Level,
    pub run_once: bool,
}

/// Load configuration from the process environment
pub fn from_env() -> Result<(DdnsConfig, DaemonOptions)> {
    load(|key| env::var(key).ok())
}

/// Load configuration through `lookup`
pub fn load<F>(lookup: F) -> Result<(DdnsConfig, DaemonOptions)>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

    let options = DaemonOptions {
        log_level: parse_level(var("DDNS_LOG_LEVEL").as_deref().unwrap_or("info"))?,
        run_once: var("DDNS_RUN_ONCE").is_some_and(|v| parse_bool(&v)),
    };

    let config = match var("DDNS_CONFIG_FILE") {
        Some(path) => DdnsConfig::from_json_file(&path)
            .with_context(|| format!("Failed to load DDNS_CONFIG_FILE {}", path))?,
        None => config_from_vars(&var)?,
    };

    Ok((config, options))
}

fn config_from_vars<F>(var: &F) -> Result<DdnsConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let required = |key: &str| {
        var(key).with_context(|| format!("{} is required. Set it via: export {}=...", key, key))
    };

    let provider_type = var("DDNS_PROVIDER_TYPE").unwrap_or_else(|| "esa".to_string());
    let provider = match provider_type.as_str() {
        "esa" => ProviderConfig::Esa {
            access_key_id: required("DDNS_ACCESS_KEY_ID")?,
            access_key_secret: required("DDNS_ACCESS_KEY_SECRET")?,
            endpoint: var("DDNS_ESA_ENDPOINT"),
        },
        "cloudflare" => ProviderConfig::Cloudflare {
            api_token: required("DDNS_PROVIDER_API_TOKEN")?,
        },
        other => bail!(
            "DDNS_PROVIDER_TYPE '{}' is not supported. Supported providers: esa, cloudflare",
            other
        ),
    };

    let mut config = DdnsConfig::new(provider);
    config.ipv4 = family_from_vars(var, "DDNS_IPV4_DOMAINS", "DDNS_IPV4_URLS");
    config.ipv6 = family_from_vars(var, "DDNS_IPV6_DOMAINS", "DDNS_IPV6_URLS");

    if let Some(ttl) = var("DDNS_TTL") {
        config.ttl = Some(parse_number("DDNS_TTL", &ttl)?);
    }
    if let Some(interval) = var("DDNS_INTERVAL_SECS") {
        config.engine.interval_secs = parse_number("DDNS_INTERVAL_SECS", &interval)?;
    }
    if let Some(concurrency) = var("DDNS_CONCURRENCY") {
        config.engine.concurrency = parse_number("DDNS_CONCURRENCY", &concurrency)?;
    }

    Ok(config)
}

/// A family is tracked only when it has domains
fn family_from_vars<F>(var: &F, domains_key: &str, urls_key: &str) -> FamilyConfig
where
    F: Fn(&str) -> Option<String>,
{
    let domains = split_list(var(domains_key));
    FamilyConfig {
        enabled: !domains.is_empty(),
        urls: split_list(var(urls_key)),
        domains,
    }
}

/// Comma- or newline-separated list
fn split_list(value: Option<String>) -> Vec<String> {
    value
        .unwrap_or_default()
        .split([',', '\n'])
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| anyhow::anyhow!("{} must be a positive number. Got: {}", key, value))
}

fn parse_bool(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

fn parse_level(value: &str) -> Result<Level> {
    match value.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => bail!(
            "DDNS_LOG_LEVEL '{}' is not valid. Valid levels: trace, debug, info, warn, error",
            value
        ),
    }
}
