//! Error types for the ePay gateway client.
//!
//! This module defines all error types that can occur while building, signing,
//! submitting and validating gateway documents. All errors implement the standard
//! [`std::error::Error`] trait via [`thiserror::Error`].
//!
//! # Error Categories
//!
//! - **Configuration Errors** ([`EpayError::ConfigurationError`]): Missing or invalid
//!   credential fields, detected when the client is constructed
//! - **Input Errors** ([`EpayError::InvalidInput`], [`EpayError::MissingRequiredOption`]):
//!   Arguments rejected before any document is built
//! - **Key Errors** ([`EpayError::Io`], [`EpayError::CryptoError`]): Key files that cannot
//!   be read or decoded
//! - **Response Errors** ([`EpayError::MalformedXml`], [`EpayError::MissingSignature`],
//!   [`EpayError::UnverifiedSignature`], [`EpayError::GatewayDeclined`]): Bank responses that
//!   cannot be trusted or report a failure
//! - **Network Errors** ([`EpayError::HttpError`], [`EpayError::TransportError`]): Failures
//!   talking to the gateway
//!
//! # Examples
//!
//! ```
//! use kkb_epay::error::{EpayError, Result};
//!
//! fn validate_order_id(order_id: &str) -> Result<&str> {
//!     if !(6..=15).contains(&order_id.chars().count()) {
//!         return Err(EpayError::InvalidInput(
//!             "`order_id` must be between 6 and 15 characters".to_owned(),
//!         ));
//!     }
//!     Ok(order_id)
//! }
//!
//! assert!(validate_order_id("000333").is_ok());
//! assert!(validate_order_id("1").is_err());
//! ```

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for gateway operations.
///
/// All fallible functions in this crate return this type.
pub type Result<T> = std::result::Result<T, EpayError>;

/// Errors that can occur in the ePay gateway client.
///
/// Messages are user-facing and name the offending field where there is one.
///
/// # Error Recovery
///
/// None of these errors are retried by the client itself.
///
/// - **Configuration and input errors**: Fix the value and call again
/// - **Key errors**: Check key paths, file permissions and the passphrase
/// - **Response errors**: Treat the response as untrusted; do not fulfil the order
/// - **Network errors**: The caller decides whether and when to resubmit
#[must_use = "errors should be handled, propagated, or explicitly panicked"]
#[derive(Debug, Error)]
pub enum EpayError {
    /// A required credential field is missing or invalid.
    ///
    /// Raised once, while the client is constructed, never deferred to the first
    /// signing call.
    ///
    /// # Recovery
    ///
    /// Fill in the named field. The values come from the `config.txt` and key files
    /// issued by the bank together with the merchant certificate.
    ///
    /// # Examples
    ///
    /// ```
    /// use kkb_epay::error::EpayError;
    ///
    /// let err = EpayError::ConfigurationError("missing `merchant_id`".to_owned());
    /// assert!(err.to_string().contains("merchant_id"));
    /// ```
    #[error("invalid client configuration: {0}")]
    ConfigurationError(String),

    /// An operation received an argument of the wrong shape, length or range.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A key, certificate or configuration file could not be read.
    ///
    /// Kept apart from [`CryptoError`](Self::CryptoError) so that a missing file is
    /// never mistaken for a wrong passphrase.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        /// Path of the file that failed to load.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Key material could not be decoded or used.
    ///
    /// Common causes include:
    /// - Wrong private key passphrase
    /// - Unsupported PEM label or encryption algorithm
    /// - A certificate that does not carry an RSA public key
    ///
    /// # Recovery
    ///
    /// Verify the passphrase and that the files are the PEM files issued by the bank.
    #[error("cryptographic operation failed: {0}")]
    CryptoError(String),

    /// Text could not be parsed as well-formed XML.
    #[error("malformed XML: {0}")]
    MalformedXml(String),

    /// A bank response carries no `bank_sign` value.
    #[error("response has no non-empty `bank_sign` element")]
    MissingSignature,

    /// A bank response signature did not verify against the counterparty key.
    ///
    /// # Recovery
    ///
    /// The response may be forged or tampered with. If every response fails, check
    /// that `counterparty_public_key_path` points at the bank certificate matching
    /// the environment (test or production).
    #[error("response has an unverified `bank_sign`: {0}")]
    UnverifiedSignature(String),

    /// The gateway answered with a non-success business code.
    ///
    /// # Examples
    ///
    /// ```
    /// use kkb_epay::error::EpayError;
    ///
    /// let err = EpayError::GatewayDeclined {
    ///     field: "results.payment.response_code".to_owned(),
    ///     code: "05".to_owned(),
    /// };
    /// assert!(err.to_string().contains("05"));
    /// ```
    #[error("gateway declined: `{field}` is `{code}`, expected `00`")]
    GatewayDeclined {
        /// Dotted path of the code inside the flattened response.
        field: String,
        /// The code the gateway returned.
        code: String,
    },

    /// A payment change was requested without one of its required fields.
    #[error("missing required option: `{0}`")]
    MissingRequiredOption(String),

    /// HTTP request to the gateway failed.
    ///
    /// Wraps [`reqwest::Error`]: timeouts, refused connections, DNS and TLS failures.
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// The gateway could not be reached in a usable way.
    ///
    /// Covers rejected URLs and non-2xx responses.
    #[error("transport error: {0}")]
    TransportError(String),
}

impl EpayError {
    /// Builds an [`EpayError::Io`] for `path`.
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = EpayError::CryptoError("bad passphrase".into());
        assert_eq!(error.to_string(), "cryptographic operation failed: bad passphrase");
    }

    #[test]
    fn test_io_error_names_path() {
        let source = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let error = EpayError::io("/keys/cert.prv", source);
        let message = error.to_string();
        assert!(message.contains("/keys/cert.prv"));
        assert!(message.contains("no such file"));
    }

    #[test]
    fn test_gateway_declined_carries_code() {
        let error = EpayError::GatewayDeclined { field: "response.code".into(), code: "-1".into() };
        assert_eq!(error.to_string(), "gateway declined: `response.code` is `-1`, expected `00`");
    }

    #[test]
    fn test_missing_required_option() {
        let error = EpayError::MissingRequiredOption("approval_code".into());
        assert!(error.to_string().contains("approval_code"));
    }

    #[test]
    fn test_missing_signature_message() {
        assert!(EpayError::MissingSignature.to_string().contains("bank_sign"));
    }
}
