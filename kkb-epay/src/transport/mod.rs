//! Outbound transport to the gateway.
//!
//! The protocol engine never talks to the network directly. Payment-change
//! commands are delivered through a [`Transport`]: the client builds the full
//! request URL, with the signed document percent-encoded into the query string,
//! and the transport returns the response body as text.
//!
//! [`HttpTransport`] is the production implementation. Tests and embedders with
//! their own HTTP stack implement the trait directly.
//!
//! # Examples
//!
//! ```
//! use kkb_epay::{error::Result, transport::Transport};
//! use url::Url;
//!
//! /// Answers every request with a canned body.
//! struct Canned(String);
//!
//! impl Transport for Canned {
//!     async fn get(&self, _url: &Url) -> Result<String> {
//!         Ok(self.0.clone())
//!     }
//! }
//! ```

#[allow(
    redundant_imports,
    reason = "Future needed for RPITIT despite being in Edition 2024 prelude"
)]
use std::future::Future;

use url::Url;

use crate::error::Result;

pub mod config;
pub mod http;

pub use config::{HttpConfig, HttpVersion};
pub use http::HttpTransport;

/// Transport protocol abstraction.
///
/// Implementations own timeout, cancellation and retry policy. A non-2xx
/// response should be reported as an error rather than returned as a body.
pub trait Transport: Send + Sync {
    /// Executes a GET request and returns the response body.
    ///
    /// # Errors
    ///
    /// Returns error if the request cannot be sent or the gateway answers with a
    /// non-success status.
    fn get(&self, url: &Url) -> impl Future<Output = Result<String>> + Send;
}
