//! HTTP transport implementation.
//!
//! This module provides HTTP/1.1 and HTTP/2 transport using reqwest.

use reqwest::Client;
use tracing::{debug, instrument};
use url::Url;

use super::config::{HttpConfig, HttpVersion};
use crate::{
    error::{EpayError, Result},
    transport::Transport,
};

/// Validates URL for security constraints.
///
/// Signed documents travel in the query string, so only HTTPS is allowed.
fn validate_url(url: &Url) -> Result<()> {
    if url.scheme() != "https" {
        return Err(EpayError::TransportError("Only HTTPS URLs are allowed".to_owned()));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(EpayError::TransportError(format!("URL missing host: {url}")));
    }
    Ok(())
}

/// HTTP/1.1 and HTTP/2 transport using reqwest.
///
/// Supports connection pooling and keep-alive. No retries are made; a failed
/// request surfaces to the caller.
///
/// # Examples
///
/// ```rust,no_run
/// use kkb_epay::transport::{HttpTransport, Transport};
/// use url::Url;
///
/// # async fn example() -> kkb_epay::error::Result<()> {
/// let transport = HttpTransport::new()?;
/// let url = Url::parse("https://testpay.kkb.kz/jsp/remote/control.jsp?%3Cdocument%2F%3E").unwrap();
/// let body = transport.get(&url).await?;
/// println!("{body}");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    http_version: HttpVersion,
}

impl HttpTransport {
    /// Creates a new HTTP transport with default settings.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be created (for example when the
    /// TLS backend fails to initialize).
    pub fn new() -> Result<Self> {
        Self::with_config(&HttpConfig::default())
    }

    /// Creates HTTP transport with custom configuration.
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client creation fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use kkb_epay::transport::{HttpConfig, HttpTransport, HttpVersion};
    ///
    /// let config = HttpConfig {
    ///     pool_max_idle_per_host: 4,
    ///     timeout_secs: 60,
    ///     connect_timeout_secs: 15,
    ///     http_version: HttpVersion::Http1,
    /// };
    ///
    /// let transport = HttpTransport::with_config(&config).unwrap();
    /// assert_eq!(transport.protocol_name(), "http/1.1");
    /// ```
    pub fn with_config(config: &HttpConfig) -> Result<Self> {
        let mut builder = Client::builder()
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .timeout(config.timeout())
            .connect_timeout(config.connect_timeout());

        builder = match config.http_version {
            HttpVersion::Http1 => builder.http1_only(),
            HttpVersion::Http2 => builder.http2_prior_knowledge(),
            HttpVersion::Auto => builder,
        };

        let client = builder.build().map_err(EpayError::HttpError)?;

        Ok(Self { client, http_version: config.http_version })
    }

    /// Returns the configured protocol name.
    #[must_use]
    pub const fn protocol_name(&self) -> &'static str {
        match self.http_version {
            HttpVersion::Http1 => "http/1.1",
            HttpVersion::Http2 => "http/2",
            HttpVersion::Auto => "http",
        }
    }
}

impl Transport for HttpTransport {
    #[instrument(skip(self, url), fields(host = url.host_str(), path = url.path(), protocol = self.protocol_name()))]
    async fn get(&self, url: &Url) -> Result<String> {
        validate_url(url)?;

        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(EpayError::TransportError(format!(
                "gateway returned status {}",
                status.as_u16()
            )));
        }

        let body = response.text().await?;
        debug!(status = status.as_u16(), bytes = body.len(), "gateway responded");
        Ok(body)
    }
}
