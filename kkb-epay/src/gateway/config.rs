//! Client configuration and validated merchant credentials.

use std::{
    fmt,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use url::Url;
use zeroize::Zeroizing;

use crate::{
    error::{EpayError, Result},
    transport::HttpConfig,
};

/// Production gateway endpoint.
pub const DEFAULT_GATEWAY_ENDPOINT: &str = "https://epay.kkb.kz/";

/// Test gateway endpoint.
pub const TEST_GATEWAY_ENDPOINT: &str = "https://testpay.kkb.kz/";

/// Client configuration as read from TOML.
///
/// Required fields are optional here so that a missing value is reported by
/// name from [`Credentials::try_from`] rather than as a generic parse error.
///
/// # Examples
///
/// ```
/// use kkb_epay::gateway::ClientConfig;
///
/// let config = ClientConfig::from_toml(
///     r#"
///     merchant_id = "92061101"
///     merchant_name = "Test shop"
///     merchant_certificate_id = "00C182B189"
///     private_key_path = "/etc/epay/cert.prv"
///     private_key_passphrase = "nissan"
///     own_public_cert_path = "/etc/epay/cert.pub"
///     counterparty_public_key_path = "/etc/epay/kkbca.pub"
///     gateway_endpoint = "https://testpay.kkb.kz"
///
///     [http]
///     timeout_secs = 20
///     "#,
/// )
/// .unwrap();
///
/// assert!(config.invert_signature);
/// assert_eq!(config.http.timeout_secs, 20);
/// ```
#[derive(Clone, Deserialize)]
pub struct ClientConfig {
    /// Merchant identifier (`MERCHANT_ID` in the bank's `config.txt`).
    pub merchant_id: Option<String>,
    /// Merchant display name.
    pub merchant_name: Option<String>,
    /// Serial number of the merchant certificate.
    pub merchant_certificate_id: Option<String>,
    /// PEM file with the merchant private key.
    pub private_key_path: Option<PathBuf>,
    /// Passphrase of the merchant private key.
    pub private_key_passphrase: Option<String>,
    /// PEM file with the merchant certificate.
    pub own_public_cert_path: Option<PathBuf>,
    /// PEM file with the bank certificate used to verify responses.
    pub counterparty_public_key_path: Option<PathBuf>,
    /// Reverse signature bytes, as the production gateway expects.
    #[serde(default = "default_invert_signature")]
    pub invert_signature: bool,
    /// Gateway base URL.
    #[serde(default = "default_gateway_endpoint")]
    pub gateway_endpoint: String,
    /// Outbound HTTP settings.
    #[serde(default)]
    pub http: HttpConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            merchant_id: None,
            merchant_name: None,
            merchant_certificate_id: None,
            private_key_path: None,
            private_key_passphrase: None,
            own_public_cert_path: None,
            counterparty_public_key_path: None,
            invert_signature: default_invert_signature(),
            gateway_endpoint: default_gateway_endpoint(),
            http: HttpConfig::default(),
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("merchant_id", &self.merchant_id)
            .field("merchant_name", &self.merchant_name)
            .field("merchant_certificate_id", &self.merchant_certificate_id)
            .field("private_key_path", &self.private_key_path)
            .field("private_key_passphrase", &self.private_key_passphrase.as_ref().map(|_| "***"))
            .field("own_public_cert_path", &self.own_public_cert_path)
            .field("counterparty_public_key_path", &self.counterparty_public_key_path)
            .field("invert_signature", &self.invert_signature)
            .field("gateway_endpoint", &self.gateway_endpoint)
            .field("http", &self.http)
            .finish()
    }
}

impl ClientConfig {
    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`EpayError::ConfigurationError`] if the TOML is invalid.
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| EpayError::ConfigurationError(e.to_string()))
    }

    /// Reads configuration from a TOML file.
    ///
    /// Relative key paths are resolved against the directory of the file.
    ///
    /// # Errors
    ///
    /// Returns [`EpayError::Io`] if the file cannot be read and
    /// [`EpayError::ConfigurationError`] if it is not valid TOML.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| EpayError::io(path, e))?;
        let mut config = Self::from_toml(&text)?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        Ok(config)
    }

    /// Makes relative key paths relative to `base`.
    pub fn resolve_paths(&mut self, base: &Path) {
        for path in [
            &mut self.private_key_path,
            &mut self.own_public_cert_path,
            &mut self.counterparty_public_key_path,
        ]
        .into_iter()
        .flatten()
        {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }
}

/// Validated, immutable merchant credentials.
///
/// Built once from a [`ClientConfig`]; owned by one client.
#[derive(Clone)]
pub struct Credentials {
    merchant_id: String,
    merchant_name: String,
    merchant_certificate_id: String,
    private_key_path: PathBuf,
    private_key_passphrase: Zeroizing<String>,
    own_public_cert_path: PathBuf,
    counterparty_public_key_path: PathBuf,
    invert_signature: bool,
    gateway_endpoint: Url,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("merchant_id", &self.merchant_id)
            .field("merchant_name", &self.merchant_name)
            .field("merchant_certificate_id", &self.merchant_certificate_id)
            .field("private_key_path", &self.private_key_path)
            .field("own_public_cert_path", &self.own_public_cert_path)
            .field("counterparty_public_key_path", &self.counterparty_public_key_path)
            .field("invert_signature", &self.invert_signature)
            .field("gateway_endpoint", &self.gateway_endpoint.as_str())
            .finish_non_exhaustive()
    }
}

impl TryFrom<ClientConfig> for Credentials {
    type Error = EpayError;

    fn try_from(config: ClientConfig) -> Result<Self> {
        let merchant_id = required_text(config.merchant_id, "merchant_id")?;
        let merchant_name = required_text(config.merchant_name, "merchant_name")?;
        let merchant_certificate_id =
            required_text(config.merchant_certificate_id, "merchant_certificate_id")?;
        let private_key_path = required_path(config.private_key_path, "private_key_path")?;
        let private_key_passphrase =
            Zeroizing::new(required_text(config.private_key_passphrase, "private_key_passphrase")?);
        let own_public_cert_path =
            required_path(config.own_public_cert_path, "own_public_cert_path")?;
        let counterparty_public_key_path =
            required_path(config.counterparty_public_key_path, "counterparty_public_key_path")?;
        let gateway_endpoint = parse_endpoint(&config.gateway_endpoint)?;

        Ok(Self {
            merchant_id,
            merchant_name,
            merchant_certificate_id,
            private_key_path,
            private_key_passphrase,
            own_public_cert_path,
            counterparty_public_key_path,
            invert_signature: config.invert_signature,
            gateway_endpoint,
        })
    }
}

impl Credentials {
    /// Merchant identifier.
    #[must_use]
    pub fn merchant_id(&self) -> &str {
        &self.merchant_id
    }

    /// Merchant display name.
    #[must_use]
    pub fn merchant_name(&self) -> &str {
        &self.merchant_name
    }

    /// Serial number of the merchant certificate.
    #[must_use]
    pub fn merchant_certificate_id(&self) -> &str {
        &self.merchant_certificate_id
    }

    /// Path of the merchant private key.
    #[must_use]
    pub fn private_key_path(&self) -> &Path {
        &self.private_key_path
    }

    pub(crate) fn private_key_passphrase(&self) -> &str {
        &self.private_key_passphrase
    }

    /// Path of the merchant certificate.
    #[must_use]
    pub fn own_public_cert_path(&self) -> &Path {
        &self.own_public_cert_path
    }

    /// Path of the bank certificate.
    #[must_use]
    pub fn counterparty_public_key_path(&self) -> &Path {
        &self.counterparty_public_key_path
    }

    /// Whether signatures are byte-reversed.
    #[must_use]
    pub const fn invert_signature(&self) -> bool {
        self.invert_signature
    }

    /// Gateway base URL, always ending in `/`.
    #[must_use]
    pub const fn gateway_endpoint(&self) -> &Url {
        &self.gateway_endpoint
    }
}

fn required_text(value: Option<String>, field: &str) -> Result<String> {
    match value {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(missing(field)),
    }
}

fn required_path(value: Option<PathBuf>, field: &str) -> Result<PathBuf> {
    match value {
        Some(path) if !path.as_os_str().is_empty() => Ok(path),
        _ => Err(missing(field)),
    }
}

fn missing(field: &str) -> EpayError {
    EpayError::ConfigurationError(format!("missing required field `{field}`"))
}

fn parse_endpoint(endpoint: &str) -> Result<Url> {
    let mut url = Url::parse(endpoint).map_err(|e| {
        EpayError::ConfigurationError(format!("invalid `gateway_endpoint` `{endpoint}`: {e}"))
    })?;
    if !matches!(url.scheme(), "https" | "http") || url.cannot_be_a_base() {
        return Err(EpayError::ConfigurationError(format!(
            "`gateway_endpoint` must be an http(s) URL, got `{endpoint}`"
        )));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

const fn default_invert_signature() -> bool {
    true
}

fn default_gateway_endpoint() -> String {
    DEFAULT_GATEWAY_ENDPOINT.to_owned()
}
