//! Transfer primitive: issue one HTTP request, get one raw response.
//!
//! The [`Transport`] trait abstracts the HTTP client so the coordinator can
//! be exercised against mock transports in tests. The production
//! implementation is [`HttpTransport`], backed by reqwest.

mod http;
mod types;

pub use http::{HttpTransport, Transport};
pub use types::{RawResponse, TransferRequest};

#[cfg(test)]
pub use http::tests::{MockTransport, ScriptedTransport};
