// # Request Signer Trait
//
// Request signing is a pluggable capability. Adapters whose vendor signs
// the query string (account key + secret + exact parameter set) hold a
// `RequestSigner` and run every outgoing request through it, regardless
// of which operation issued the request.

use std::collections::BTreeMap;

/// Signs the parameter set of one outgoing request in place
pub trait RequestSigner: Send + Sync {
    /// Add authentication parameters and the signature to `params`
    ///
    /// `method` is the HTTP method of the request (e.g. `"GET"`); vendors
    /// fold it into the string to sign.
    fn sign(&self, method: &str, params: &mut BTreeMap<String, String>) -> Result<(), crate::Error>;
}

/// Signer that leaves requests untouched (tests, unauthenticated endpoints)
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSigner;

impl RequestSigner for NoopSigner {
    fn sign(&self, _method: &str, _params: &mut BTreeMap<String, String>) -> Result<(), crate::Error> {
        Ok(())
    }
}
