// # ESA wire format
//
// Request parameter sets and response bodies for the four RPC actions the
// provider uses. Everything here is pure so it can be tested without a
// network.

use ddns_core::traits::{Record, RecordType, Zone};
use ddns_core::{Error, Result};
use serde::Deserialize;
use std::collections::BTreeMap;

/// ESA OpenAPI version
pub const API_VERSION: &str = "2024-09-10";

/// `ListSites` response
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListSitesResponse {
    #[serde(default)]
    pub total_count: u64,
    #[serde(default)]
    pub sites: Vec<Site>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Site {
    pub site_id: i64,
    pub site_name: String,
}

/// `ListRecords` response
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListRecordsResponse {
    #[serde(default)]
    pub total_count: u64,
    #[serde(default)]
    pub records: Vec<EsaRecord>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EsaRecord {
    pub record_id: i64,
    pub record_name: String,
    #[serde(rename = "Type")]
    pub record_type: String,
    #[serde(default)]
    pub data: RecordData,
    #[serde(rename = "TTL", default)]
    pub ttl: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RecordData {
    #[serde(default)]
    pub value: String,
}

/// `CreateRecord` / `UpdateRecord` response
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WriteResponse {
    #[serde(default)]
    pub request_id: String,
    #[serde(default)]
    pub record_id: Option<i64>,
}

/// Error body returned with non-2xx statuses
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ErrorResponse {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub request_id: String,
}

type Params = BTreeMap<String, String>;

fn action(name: &str) -> Params {
    let mut params = Params::new();
    params.insert("Action".into(), name.into());
    params.insert("Version".into(), API_VERSION.into());
    params
}

/// `{"Value":"<ip>"}`
fn record_data(value: &str) -> String {
    serde_json::json!({ "Value": value }).to_string()
}

pub fn list_sites(site_name: &str) -> Params {
    let mut params = action("ListSites");
    params.insert("SiteName".into(), site_name.into());
    params.insert("ExactMatch".into(), "true".into());
    params
}

pub fn list_records(site_id: &str, record_name: &str, record_type: RecordType) -> Params {
    let mut params = action("ListRecords");
    params.insert("SiteId".into(), site_id.into());
    params.insert("RecordName".into(), record_name.into());
    params.insert("RecordNameMode".into(), "exact".into());
    params.insert("Type".into(), record_type.as_str().into());
    params
}

/// Custom parameters go in first so the fixed ones always win
fn write_params(
    custom: &BTreeMap<String, String>,
    action_name: &str,
    site_id: &str,
    record_name: &str,
    record_type: RecordType,
    value: &str,
    ttl: u32,
) -> Params {
    let mut params = custom.clone();
    params.extend(action(action_name));
    params.insert("SiteId".into(), site_id.into());
    params.insert("RecordName".into(), record_name.into());
    params.insert("Type".into(), record_type.as_str().into());
    params.insert("Data".into(), record_data(value));
    params.insert("TTL".into(), ttl.to_string());
    params
}

pub fn create_record(
    custom: &BTreeMap<String, String>,
    site_id: &str,
    record_name: &str,
    record_type: RecordType,
    value: &str,
    ttl: u32,
) -> Params {
    write_params(custom, "CreateRecord", site_id, record_name, record_type, value, ttl)
}

pub fn update_record(
    custom: &BTreeMap<String, String>,
    site_id: &str,
    record_id: &str,
    record_name: &str,
    record_type: RecordType,
    value: &str,
    ttl: u32,
) -> Params {
    let mut params =
        write_params(custom, "UpdateRecord", site_id, record_name, record_type, value, ttl);
    params.insert("RecordId".into(), record_id.into());
    params
}

/// Pick the one site named exactly `site_name`
///
/// `ExactMatch=true` is sent as well, but the name is checked here again
/// so a lax server can never hand back a neighbouring site.
pub fn select_site(response: ListSitesResponse, site_name: &str) -> Result<Zone> {
    let mut matches: Vec<Site> = response
        .sites
        .into_iter()
        .filter(|s| s.site_name.eq_ignore_ascii_case(site_name))
        .collect();

    match matches.len() {
        0 => Err(Error::not_found(format!(
            "site not found for domain: {}",
            site_name
        ))),
        1 => {
            let site = matches.remove(0);
            Ok(Zone {
                id: site.site_id.to_string(),
                name: site.site_name,
            })
        }
        n => Err(Error::ambiguous(format!(
            "{} sites named {}",
            n, site_name
        ))),
    }
}

/// Records of exactly `record_name` and `record_type`, in response order
pub fn into_records(
    response: ListRecordsResponse,
    record_name: &str,
    record_type: RecordType,
) -> Vec<Record> {
    response
        .records
        .into_iter()
        .filter(|r| {
            r.record_name.eq_ignore_ascii_case(record_name)
                && RecordType::parse(&r.record_type) == Some(record_type)
        })
        .map(|r| Record {
            id: r.record_id.to_string(),
            name: r.record_name,
            record_type,
            value: r.data.value,
            ttl: r.ttl,
        })
        .collect()
}
