//! Authentication and normalization of bank responses.
//!
//! A signed bank response has the shape
//!
//! ```text
//! <document><bank ...>...</bank><bank_sign type="SHA/RSA">BASE64</bank_sign></document>
//! ```
//!
//! The signature covers the literal `<bank ...>...</bank>` text as received. It is
//! never checked against a re-encoded copy of the parsed tree.

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::{
    crypto::RsaVerifier,
    error::{EpayError, Result},
    xml::{XmlValue, flatten, parse},
};

/// Signed region of a response: first `<bank` followed by whitespace, up to the
/// last `</bank>` on the same line.
#[allow(clippy::expect_used, reason = "the pattern is a literal")]
static BANK_SECTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(<bank\s.*</bank>)").expect("bank section pattern is valid"));

/// Literal signed section of a response and the signature that covers it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedSection<'a> {
    /// Exact `<bank ...>...</bank>` substring of the response text.
    pub section: &'a str,
    /// Base64 value of `document.bank_sign`.
    pub signature: String,
}

/// Locates the signature and the signed `<bank>` substring of a response.
///
/// `document` is the parsed form of `xml`. The signature is the text of the first
/// `document.bank_sign` element. The section is found by a case-insensitive match
/// on the raw text that runs greedily to the last `</bank>` on the line; a
/// response that nests several `bank` elements therefore yields the outermost
/// span.
///
/// # Errors
///
/// - [`EpayError::MissingSignature`] if `bank_sign` is absent or empty
/// - [`EpayError::UnverifiedSignature`] if no `<bank>` section is present
pub fn extract_signed_section<'a>(xml: &'a str, document: &XmlValue) -> Result<SignedSection<'a>> {
    let signature = document
        .path(&["document", "bank_sign"])
        .and_then(XmlValue::as_sequence)
        .and_then(<[XmlValue]>::first)
        .and_then(XmlValue::text)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(EpayError::MissingSignature)?;

    let section = BANK_SECTION.find(xml).map(|m| m.as_str()).ok_or_else(|| {
        EpayError::UnverifiedSignature("response has no `<bank>` section to verify".to_owned())
    })?;

    Ok(SignedSection { section, signature: signature.to_owned() })
}

/// Verifies a signed bank response and returns its `document.bank` node.
///
/// The returned node is in parser shape; pass it to [`beautify`] for a plain
/// record.
///
/// # Errors
///
/// - [`EpayError::InvalidInput`] if `xml` is empty
/// - [`EpayError::MalformedXml`] if `xml` does not parse
/// - [`EpayError::MissingSignature`] if there is no `bank_sign`
/// - [`EpayError::UnverifiedSignature`] if the signature does not match `verifier`
pub fn verify_bank_response(xml: &str, verifier: &RsaVerifier) -> Result<XmlValue> {
    if xml.is_empty() {
        return Err(EpayError::InvalidInput("response must be non-empty string".to_owned()));
    }

    let document = parse(xml)?;
    let signed = extract_signed_section(xml, &document)?;
    if !verifier.verify(signed.section, &signed.signature) {
        warn!(section_len = signed.section.len(), "bank signature rejected");
        return Err(EpayError::UnverifiedSignature(
            "it may be an unauthorized request, or `counterparty_public_key_path` points at the wrong bank certificate"
                .to_owned(),
        ));
    }
    debug!(section_len = signed.section.len(), "bank signature verified");

    document
        .path(&["document", "bank"])
        .cloned()
        .ok_or_else(|| EpayError::MalformedXml("response has no `document.bank` element".to_owned()))
}

/// Flattens a parsed node into a plain record.
///
/// Same rules as [`flatten`]; used on verified bank nodes and on unsigned
/// fragments alike.
#[must_use]
pub fn beautify(node: &XmlValue) -> XmlValue {
    flatten(node)
}

/// Parses and beautifies an unsigned gateway error payload.
///
/// The gateway reports request-level failures without a signature:
///
/// ```text
/// <response order_id="123456"><error type="system" time="..." code="00">Message</error></response>
/// ```
///
/// # Errors
///
/// Returns [`EpayError::InvalidInput`] or [`EpayError::MalformedXml`] as [`parse`]
/// does.
///
/// # Examples
///
/// ```
/// use kkb_epay::{gateway::parse_error_response, xml::XmlValue};
///
/// let record = parse_error_response(
///     r#"<response order_id="123456"><error type="auth" code="00">Error Message</error></response>"#,
/// )
/// .unwrap();
/// assert_eq!(record.path(&["response", "error", "_"]).and_then(XmlValue::as_str), Some("Error Message"));
/// ```
pub fn parse_error_response(xml: &str) -> Result<XmlValue> {
    Ok(beautify(&parse(xml)?))
}

/// Returns the flattened scalar at `path`.
pub(crate) fn field(record: &XmlValue, path: &[&str]) -> Option<String> {
    record.path(path).and_then(XmlValue::as_str).map(str::to_owned)
}

/// Returns the flattened scalar at `path`, failing if it is missing.
pub(crate) fn required_field(record: &XmlValue, path: &[&str]) -> Result<String> {
    field(record, path).ok_or_else(|| {
        EpayError::MalformedXml(format!("bank response has no `{}`", path.join(".")))
    })
}
