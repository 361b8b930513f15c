//! Signed document envelope.

use crate::{
    error::Result,
    xml::{ATTRIBUTES_KEY, TEXT_KEY, XmlValue, attributes, encode},
};

/// Signature algorithm tag carried on `<merchant_sign>`.
const SIGNATURE_TYPE: &str = "RSA";

/// Wraps a signed `<merchant>` fragment into the wire envelope
/// `<document>{fragment}<merchant_sign type="RSA" ...>{signature}</merchant_sign></document>`.
///
/// `fragment` is inserted verbatim so the bytes the signature covers are the
/// bytes that travel.
pub(crate) fn signed_document(fragment: &str, signature: &str, cert_id: Option<&str>) -> Result<String> {
    let mut attrs = vec![("type", SIGNATURE_TYPE)];
    if let Some(cert_id) = cert_id {
        attrs.push(("cert_id", cert_id));
    }
    let merchant_sign =
        XmlValue::from_pairs([(ATTRIBUTES_KEY, attributes(attrs)), (TEXT_KEY, XmlValue::from(signature))]);
    Ok(format!("<document>{fragment}{}</document>", encode("merchant_sign", &merchant_sign)?))
}
