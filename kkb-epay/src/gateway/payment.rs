//! Payment-change exchange: complete, reverse or refund an existing payment.

use super::{
    config::Credentials,
    models::{PaymentChange, PaymentChangeConfirmation, format_amount},
    response::{field, required_field},
};
use crate::{
    error::{EpayError, Result},
    xml::{ATTRIBUTES_KEY, XmlValue, attributes, encode},
};

/// Encodes the `<merchant>` element of a payment change document.
pub(crate) fn payment_fragment(credentials: &Credentials, change: &PaymentChange) -> Result<String> {
    let mut merchant = vec![
        (ATTRIBUTES_KEY, attributes([("merchant_id", credentials.merchant_id())])),
        (
            "command",
            XmlValue::from_pairs([(ATTRIBUTES_KEY, attributes([("type", change.command.as_str())]))]),
        ),
        (
            "payment",
            XmlValue::from_pairs([(
                ATTRIBUTES_KEY,
                attributes([
                    ("reference", change.reference.clone()),
                    ("approval_code", change.approval_code.clone()),
                    ("orderid", change.order_id.clone()),
                    ("amount", format_amount(change.amount)),
                    ("currency_code", change.currency.to_string()),
                ]),
            )]),
        ),
    ];
    if let Some(reason) = change.command.reason() {
        merchant.push(("reason", XmlValue::from(reason)));
    }
    encode("merchant", &XmlValue::from_pairs(merchant))
}

/// Maps a beautified payment change response into a
/// [`PaymentChangeConfirmation`].
pub(crate) fn payment_change_confirmation(record: &XmlValue) -> Result<PaymentChangeConfirmation> {
    let code = field(record, &["response", "code"]);
    if code.as_deref() != Some("00") {
        return Err(EpayError::GatewayDeclined {
            field: "response.code".to_owned(),
            code: code.unwrap_or_else(|| "<missing>".to_owned()),
        });
    }

    let response = record.get("response").and_then(XmlValue::as_map).cloned().unwrap_or_default();

    Ok(PaymentChangeConfirmation {
        cmd: required_field(record, &["merchant", "command", "type"])?,
        reference: required_field(record, &["merchant", "payment", "reference"])?,
        approval_code: required_field(record, &["merchant", "payment", "approval_code"])?,
        order_id: required_field(record, &["merchant", "payment", "orderid"])?,
        amount: required_field(record, &["merchant", "payment", "amount"])?,
        currency: required_field(record, &["merchant", "payment", "currency_code"])?,
        response,
    })
}
