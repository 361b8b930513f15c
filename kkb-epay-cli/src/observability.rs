//! Logging setup and the health report printed by `kkb-epay check`.
//!
//! Logs always go to stderr so that stdout carries only the JSON result of a
//! command.

use std::io;

use kkb_epay::{
    EpayClient,
    crypto::load_public_key,
    gateway::TEST_GATEWAY_ENDPOINT,
    transport::Transport,
};
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Log format configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable pretty format for interactive use.
    Pretty,
    /// JSON format for log aggregation.
    Json,
}

impl LogFormat {
    /// Determines log format from the `LOG_FORMAT` environment variable.
    #[must_use]
    pub fn from_env() -> Self {
        Self::parse(&std::env::var("LOG_FORMAT").unwrap_or_default())
    }

    /// `json` selects JSON; anything else, including empty, selects pretty.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("json") { Self::Json } else { Self::Pretty }
    }
}

/// Installs the global tracing subscriber.
///
/// # Environment Variables
///
/// - `LOG_FORMAT`: `json` or `pretty` (default: `pretty`)
/// - `RUST_LOG`: log level filter (default: `info`)
pub fn init_observability(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Pretty => {
            subscriber
                .with(
                    fmt::layer()
                        .with_target(true)
                        .with_span_events(FmtSpan::CLOSE)
                        .with_writer(io::stderr),
                )
                .init();
        }
        LogFormat::Json => {
            subscriber
                .with(
                    fmt::layer()
                        .json()
                        .with_current_span(true)
                        .with_span_list(true)
                        .with_target(true)
                        .with_span_events(FmtSpan::CLOSE)
                        .with_writer(io::stderr),
                )
                .init();
        }
    }
}

/// Overall health of a client configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    /// Every check passed.
    Healthy,
    /// Usable, with warnings.
    Degraded,
    /// At least one check failed; requests will not succeed.
    Unhealthy,
}

impl HealthStatus {
    /// Returns string representation for JSON serialization.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
            Self::Unhealthy => "unhealthy",
        }
    }
}

/// Outcome of one check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthCheckStatus {
    /// Check passed.
    Pass,
    /// Check failed.
    Fail,
    /// Check passed with a caveat.
    Warn,
}

impl HealthCheckStatus {
    /// Returns string representation for JSON serialization.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Fail => "fail",
            Self::Warn => "warn",
        }
    }
}

/// Individual check result.
#[derive(Debug, Clone)]
pub struct HealthCheck {
    /// Check name.
    pub name: String,
    /// Check status.
    pub status: HealthCheckStatus,
    /// Details.
    pub message: String,
}

impl HealthCheck {
    fn new(name: &str, status: HealthCheckStatus, message: impl Into<String>) -> Self {
        Self { name: name.to_owned(), status, message: message.into() }
    }

    /// Creates a passing check.
    #[must_use]
    pub fn pass(name: &str, message: impl Into<String>) -> Self {
        Self::new(name, HealthCheckStatus::Pass, message)
    }

    /// Creates a failing check.
    #[must_use]
    pub fn fail(name: &str, message: impl Into<String>) -> Self {
        Self::new(name, HealthCheckStatus::Fail, message)
    }

    /// Creates a warning check.
    #[must_use]
    pub fn warn(name: &str, message: impl Into<String>) -> Self {
        Self::new(name, HealthCheckStatus::Warn, message)
    }
}

/// Health report of a merchant configuration.
#[derive(Debug, Clone)]
pub struct HealthReport {
    /// Overall status.
    pub status: HealthStatus,
    /// CLI version.
    pub version: String,
    /// Merchant identifier.
    pub merchant_id: String,
    /// Gateway base URL.
    pub gateway_endpoint: String,
    /// Individual checks.
    pub checks: Vec<HealthCheck>,
}

impl HealthReport {
    /// Runs every check against the client's configured key files.
    pub async fn collect<T: Transport>(client: &EpayClient<T>) -> Self {
        let credentials = client.credentials();
        let mut checks = Vec::with_capacity(5);

        checks.push(match client.sign(b"<merchant/>").await {
            Ok(_) => HealthCheck::pass("private_key", "decoded and usable for signing"),
            Err(e) => HealthCheck::fail("private_key", e.to_string()),
        });
        for (name, path) in [
            ("own_public_cert", credentials.own_public_cert_path()),
            ("counterparty_public_key", credentials.counterparty_public_key_path()),
        ] {
            checks.push(match load_public_key(path).await {
                Ok(_) => HealthCheck::pass(name, "decoded"),
                Err(e) => HealthCheck::fail(name, e.to_string()),
            });
        }
        checks.push(match client.check_key_pair().await {
            Ok(true) => HealthCheck::pass("key_pair", "private key matches own certificate"),
            Ok(false) => HealthCheck::fail("key_pair", "private key does not match own certificate"),
            Err(e) => HealthCheck::fail("key_pair", e.to_string()),
        });

        let endpoint = credentials.gateway_endpoint().as_str();
        checks.push(if endpoint == TEST_GATEWAY_ENDPOINT {
            HealthCheck::warn("gateway_endpoint", "test gateway; payments are not real")
        } else if credentials.invert_signature() {
            HealthCheck::pass("gateway_endpoint", endpoint)
        } else {
            HealthCheck::warn("gateway_endpoint", "signature inversion disabled")
        });

        Self {
            status: Self::compute_status(&checks),
            version: env!("CARGO_PKG_VERSION").to_owned(),
            merchant_id: credentials.merchant_id().to_owned(),
            gateway_endpoint: endpoint.to_owned(),
            checks,
        }
    }

    /// Serializes the report to pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns error if JSON serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        let json = serde_json::json!({
            "status": self.status.as_str(),
            "version": self.version,
            "merchant_id": self.merchant_id,
            "gateway_endpoint": self.gateway_endpoint,
            "checks": self.checks.iter().map(|c| serde_json::json!({
                "name": c.name,
                "status": c.status.as_str(),
                "message": c.message,
            })).collect::<Vec<_>>(),
        });

        serde_json::to_string_pretty(&json)
    }

    /// Determines overall status from individual checks.
    #[must_use]
    pub fn compute_status(checks: &[HealthCheck]) -> HealthStatus {
        if checks.iter().any(|c| c.status == HealthCheckStatus::Fail) {
            HealthStatus::Unhealthy
        } else if checks.iter().any(|c| c.status == HealthCheckStatus::Warn) {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        }
    }
}
