//! Request identity keys for caching and deduplication.

use crate::coordinator::Method;
use serde_json::Value;
use std::fmt;

/// Identity key for a logical request.
///
/// Two requests with the same key are considered identical for caching and
/// deduplication purposes. Keys are derived from the HTTP method, the
/// endpoint path, and a canonical serialization of the request parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey(String);

impl RequestKey {
    /// Derive the identity key for a logical request.
    ///
    /// Pure and side-effect-free: the same logical request always yields
    /// the same key. Parameter objects serialize with sorted keys, so two
    /// equivalent parameter maps built in different insertion orders derive
    /// the same key.
    ///
    /// # Arguments
    ///
    /// * `method` - HTTP method of the request
    /// * `endpoint` - Endpoint path relative to the base URL
    /// * `params` - Optional request parameters
    pub fn derive(method: Method, endpoint: &str, params: Option<&Value>) -> Self {
        let mut key = format!("{} {}", method, endpoint);
        if let Some(params) = params {
            key.push(' ');
            key.push_str(&params.to_string());
        }
        RequestKey(key)
    }

    /// Returns the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
