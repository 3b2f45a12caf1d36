//! Resource identity extraction
//!
//! A fetched resource is identified twice: once from the URL that requests it
//! (a query parameter) and once from the record the server returns (the same
//! parameter echoed back under `query`, or the key of the `response` mapping).
//! Both derivations must agree for deduplication across runs to work.
//!
//! Both functions are total: malformed input means "no identity", never an error.

use serde_json::Value;
use url::Url;

/// Default query parameter carrying the resource identifier
pub const DEFAULT_IDENTITY_PARAM: &str = "property";

/// Derives record identities for a given query parameter name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityExtractor {
    param: String,
}

impl Default for IdentityExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_IDENTITY_PARAM)
    }
}

impl IdentityExtractor {
    pub fn new(param: impl Into<String>) -> Self {
        Self {
            param: param.into(),
        }
    }

    /// Returns the identifying query parameter of `url`
    ///
    /// Returns `None` when the URL does not parse, or when the parameter is
    /// missing or empty. The first occurrence wins when repeated.
    pub fn from_url(&self, url: &str) -> Option<String> {
        let parsed = Url::parse(url).ok()?;
        parsed
            .query_pairs()
            .find(|(name, _)| name == self.param.as_str())
            .map(|(_, value)| value.into_owned())
            .filter(|value| !value.is_empty())
    }

    /// Returns the identity of a fetched record
    ///
    /// Looks first at `query.<param>[0]`, the identifier the server echoed
    /// back from the request it received. Failing that, falls back to the
    /// first key of the `response` object.
    ///
    /// The fallback is only reliable for single-key responses. With several
    /// keys the choice follows `serde_json::Map` iteration order (sorted by
    /// key) and may not match the URL-derived identity.
    pub fn from_record(&self, record: &Value) -> Option<String> {
        if let Some(echoed) = record
            .get("query")
            .and_then(|query| query.get(&self.param))
            .and_then(echoed_value)
        {
            return Some(echoed);
        }

        record
            .get("response")
            .and_then(Value::as_object)
            .and_then(|response| response.keys().next())
            .filter(|key| !key.is_empty())
            .cloned()
    }
}

/// Normalizes an echoed identifier: first element of an array, or a bare scalar
fn echoed_value(value: &Value) -> Option<String> {
    let first = match value {
        Value::Array(items) => items.first()?,
        other => other,
    };

    match first {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Derives an identity from a URL using the default parameter
pub fn identity_from_url(url: &str) -> Option<String> {
    IdentityExtractor::default().from_url(url)
}

/// Derives an identity from a fetched record using the default parameter
pub fn identity_from_record(record: &Value) -> Option<String> {
    IdentityExtractor::default().from_record(record)
}
