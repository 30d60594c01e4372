//! Domain Set model
//!
//! A [`Domain`] is one configured hostname split into subdomain and root
//! domain, carrying an opaque bag of vendor parameters and the status of the
//! most recent reconciliation attempt. The [`DomainSet`] keeps one ordered
//! list per address family, so each family's status lives on its own entry.
//!
//! ## Entry syntax
//!
//! ```text
//! home.example.com                 sub "home", root "example.com"
//! www:example.co.uk                explicit split
//! @:example.com                    apex
//! home.example.com?Proxied=true    custom parameters
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::config::DdnsConfig;
use crate::error::{Error, Result};
use crate::traits::AddressFamily;

/// Second-level labels that act as part of a public suffix under a
/// two-letter country TLD (`example.co.uk`, `example.com.cn`)
const COMPOUND_SLDS: &[&str] = &["ac", "co", "com", "edu", "gov", "net", "org"];

/// Outcome of the most recent reconciliation attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UpdateStatus {
    /// Never attempted in this process
    #[default]
    NotExecuted,
    /// Remote record matches the address
    Success,
    /// Last attempt failed
    Failed,
}

/// One configured hostname to keep in sync
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Domain {
    sub_domain: String,
    root_domain: String,
    custom_params: BTreeMap<String, String>,
    status: UpdateStatus,
}

impl Domain {
    /// Create a domain from an explicit split
    pub fn new(sub_domain: impl Into<String>, root_domain: impl Into<String>) -> Self {
        Self {
            sub_domain: sub_domain.into(),
            root_domain: root_domain.into(),
            custom_params: BTreeMap::new(),
            status: UpdateStatus::NotExecuted,
        }
    }

    /// Parse a configured entry (`host[?k=v&...]`, host optionally `sub:root`)
    pub fn parse(entry: &str) -> Result<Self> {
        let entry = entry.trim();
        let (host, query) = match entry.split_once('?') {
            Some((host, query)) => (host, Some(query)),
            None => (entry, None),
        };

        let host = host.trim().trim_end_matches('.').to_ascii_lowercase();
        if host.is_empty() {
            return Err(Error::invalid_input(format!("Empty domain entry: '{}'", entry)));
        }

        let (sub_domain, root_domain) = match host.split_once(':') {
            Some((sub, root)) => (sub.to_string(), root.to_string()),
            None => split_host(&host)?,
        };

        validate_root(&root_domain)?;
        validate_sub(&sub_domain)?;

        let mut domain = Self::new(sub_domain, root_domain);
        if let Some(query) = query {
            domain.custom_params = parse_params(query);
        }
        Ok(domain)
    }

    /// Subdomain label(s); empty or `@` for the apex
    pub fn sub_domain(&self) -> &str {
        &self.sub_domain
    }

    /// Root domain (the zone/site name)
    pub fn root_domain(&self) -> &str {
        &self.root_domain
    }

    /// Fully-qualified record name
    pub fn full_name(&self) -> String {
        if self.sub_domain.is_empty() || self.sub_domain == "@" {
            self.root_domain.clone()
        } else {
            format!("{}.{}", self.sub_domain, self.root_domain)
        }
    }

    /// Opaque vendor parameters
    pub fn custom_params(&self) -> &BTreeMap<String, String> {
        &self.custom_params
    }

    /// Status of the most recent attempt
    pub fn status(&self) -> UpdateStatus {
        self.status
    }

    /// Overwrite the status with the outcome of the current attempt
    pub fn set_status(&mut self, status: UpdateStatus) {
        self.status = status;
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name())
    }
}

/// Configured domains, one ordered list per address family
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomainSet {
    /// Domains tracked for IPv4 (A records)
    pub ipv4: Vec<Domain>,
    /// Domains tracked for IPv6 (AAAA records)
    pub ipv6: Vec<Domain>,
}

impl DomainSet {
    /// Build the set from a configuration snapshot
    ///
    /// A disabled family yields an empty list.
    pub fn from_config(config: &DdnsConfig) -> Result<Self> {
        let mut set = DomainSet::default();
        for family in AddressFamily::ALL {
            let settings = config.family(family);
            if !settings.enabled {
                continue;
            }
            let domains = settings
                .domains
                .iter()
                .map(|entry| Domain::parse(entry))
                .collect::<Result<Vec<_>>>()?;
            *set.domains_mut(family) = domains;
        }
        Ok(set)
    }

    /// Domains tracked for `family`
    pub fn domains(&self, family: AddressFamily) -> &[Domain] {
        match family {
            AddressFamily::V4 => &self.ipv4,
            AddressFamily::V6 => &self.ipv6,
        }
    }

    /// Mutable domains tracked for `family`
    pub fn domains_mut(&mut self, family: AddressFamily) -> &mut Vec<Domain> {
        match family {
            AddressFamily::V4 => &mut self.ipv4,
            AddressFamily::V6 => &mut self.ipv6,
        }
    }

    /// Total number of domain entries across both families
    pub fn len(&self) -> usize {
        self.ipv4.len() + self.ipv6.len()
    }

    /// Check if no family tracks any domain
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn split_host(host: &str) -> Result<(String, String)> {
    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() < 2 {
        return Err(Error::invalid_input(format!(
            "Domain '{}' has no root domain; use sub:root.tld",
            host
        )));
    }

    let n = labels.len();
    let root_labels = if n >= 3 && labels[n - 1].len() == 2 && COMPOUND_SLDS.contains(&labels[n - 2]) {
        3
    } else {
        2
    };

    let root = labels[n - root_labels..].join(".");
    let sub = labels[..n - root_labels].join(".");
    Ok((sub, root))
}

fn validate_label(label: &str, domain: &str) -> Result<()> {
    if label.is_empty() {
        return Err(Error::invalid_input(format!("Domain has empty label: '{}'", domain)));
    }
    if label.len() > 63 {
        return Err(Error::invalid_input(format!(
            "Domain label too long: {} chars (max 63). Label: '{}'",
            label.len(),
            label
        )));
    }
    if !label
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(Error::invalid_input(format!(
            "Domain label contains invalid characters. Label: '{}'",
            label
        )));
    }
    if label.starts_with('-') || label.ends_with('-') {
        return Err(Error::invalid_input(format!(
            "Domain label cannot start or end with hyphen. Label: '{}'",
            label
        )));
    }
    Ok(())
}

fn validate_root(root: &str) -> Result<()> {
    if !root.contains('.') {
        return Err(Error::invalid_input(format!("Invalid root domain: '{}'", root)));
    }
    if root.len() > 253 {
        return Err(Error::invalid_input(format!(
            "Domain name too long: {} chars (max 253)",
            root.len()
        )));
    }
    root.split('.').try_for_each(|label| validate_label(label, root))
}

fn validate_sub(sub: &str) -> Result<()> {
    if sub.is_empty() || sub == "@" {
        return Ok(());
    }
    for (i, label) in sub.split('.').enumerate() {
        // leading wildcard only
        if i == 0 && label == "*" {
            continue;
        }
        validate_label(label, sub)?;
    }
    Ok(())
}

fn parse_params(query: &str) -> BTreeMap<String, String> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let key = percent_decode(key);
            (!key.is_empty()).then(|| (key, percent_decode(value)))
        })
        .collect()
}

/// `+` is a space in query strings; malformed escapes are kept as written
fn percent_decode(s: &str) -> String {
    let s = s.replace('+', " ");
    urlencoding::decode(&s)
        .unwrap_or_else(|_| s.as_str().into())
        .into_owned()
}
