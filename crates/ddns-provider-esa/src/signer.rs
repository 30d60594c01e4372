// # Aliyun RPC Signature
//
// ESA uses the Alibaba Cloud RPC signature (version 1.0):
//
// 1. Add the common parameters (`AccessKeyId`, `Format`, `SignatureMethod`,
//    `SignatureNonce`, `SignatureVersion`, `Timestamp`)
// 2. Build the canonical query: keys sorted by byte order, each key and
//    value RFC 3986 percent-encoded, joined as `k=v&k=v`
// 3. String to sign: `METHOD&%2F&percentEncode(canonicalQuery)`
// 4. `Signature = base64(HMAC-SHA1(secret + "&", stringToSign))`
//
// The signature is added to the same parameter set; the caller sends the
// parameters unchanged as the query string.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use ddns_core::traits::RequestSigner;
use ddns_core::{Error, Result};
use ring::hmac;
use ring::rand::{SecureRandom, SystemRandom};
use std::collections::BTreeMap;
use std::fmt::Write as _;

const SIGNATURE_METHOD: &str = "HMAC-SHA1";
const SIGNATURE_VERSION: &str = "1.0";
const RESPONSE_FORMAT: &str = "JSON";

/// HMAC-SHA1 signer for Aliyun RPC-style APIs
pub struct AliyunRpcSigner {
    access_key_id: String,
    /// ⚠️ NEVER log this value
    access_key_secret: String,
    rng: SystemRandom,
}

impl std::fmt::Debug for AliyunRpcSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AliyunRpcSigner")
            .field("access_key_id", &self.access_key_id)
            .field("access_key_secret", &"<REDACTED>")
            .finish()
    }
}

impl AliyunRpcSigner {
    pub fn new(access_key_id: impl Into<String>, access_key_secret: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            access_key_secret: access_key_secret.into(),
            rng: SystemRandom::new(),
        }
    }

    /// Sign with a fixed timestamp and nonce
    pub fn sign_with(
        &self,
        method: &str,
        params: &mut BTreeMap<String, String>,
        timestamp: DateTime<Utc>,
        nonce: &str,
    ) {
        params.remove("Signature");
        params.insert("AccessKeyId".into(), self.access_key_id.clone());
        params.insert("Format".into(), RESPONSE_FORMAT.into());
        params.insert("SignatureMethod".into(), SIGNATURE_METHOD.into());
        params.insert("SignatureNonce".into(), nonce.into());
        params.insert("SignatureVersion".into(), SIGNATURE_VERSION.into());
        params.insert(
            "Timestamp".into(),
            timestamp.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        );

        let signature = signature(&self.access_key_secret, &string_to_sign(method, params));
        params.insert("Signature".into(), signature);
    }

    fn nonce(&self) -> Result<String> {
        let mut bytes = [0u8; 16];
        self.rng
            .fill(&mut bytes)
            .map_err(|_| Error::Other("system random source unavailable".into()))?;

        let mut nonce = String::with_capacity(32);
        for b in bytes {
            let _ = write!(nonce, "{:02x}", b);
        }
        Ok(nonce)
    }
}

impl RequestSigner for AliyunRpcSigner {
    fn sign(&self, method: &str, params: &mut BTreeMap<String, String>) -> Result<()> {
        let nonce = self.nonce()?;
        self.sign_with(method, params, Utc::now(), &nonce);
        Ok(())
    }
}

/// `k=v&k=v` over sorted, percent-encoded parameters
pub fn canonical_query(params: &BTreeMap<String, String>) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", percent_encode(k), percent_encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// `METHOD&%2F&percentEncode(canonicalQuery)`
pub fn string_to_sign(method: &str, params: &BTreeMap<String, String>) -> String {
    format!(
        "{}&{}&{}",
        method,
        percent_encode("/"),
        percent_encode(&canonical_query(params))
    )
}

/// `base64(HMAC-SHA1(secret + "&", string_to_sign))`
pub fn signature(access_key_secret: &str, string_to_sign: &str) -> String {
    let key = hmac::Key::new(
        hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY,
        format!("{}&", access_key_secret).as_bytes(),
    );
    let tag = hmac::sign(&key, string_to_sign.as_bytes());
    STANDARD.encode(tag.as_ref())
}

/// RFC 3986 percent-encoding: only `A-Z a-z 0-9 - _ . ~` pass through
pub fn percent_encode(input: &str) -> String {
    urlencoding::encode(input).into_owned()
}
