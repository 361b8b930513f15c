//! Create-order exchange: the signed order document and the payment result.

use rust_decimal::Decimal;

use super::{
    config::Credentials,
    models::{Currency, OrderConfirmation, OrderRequest, format_amount},
    response::{field, required_field},
};
use crate::{
    error::{EpayError, Result},
    xml::{ATTRIBUTES_KEY, XmlValue, attributes, encode},
};

const ORDER_ID_LEN: std::ops::RangeInclusive<usize> = 6..=15;

/// Checks an order before anything is signed.
///
/// Checks run in a fixed order and stop at the first failure.
pub(crate) fn validate_order(order: &OrderRequest) -> Result<()> {
    if !ORDER_ID_LEN.contains(&order.order_id.chars().count()) {
        return Err(EpayError::InvalidInput(format!(
            "`order_id` must be a string of {} to {} characters",
            ORDER_ID_LEN.start(),
            ORDER_ID_LEN.end()
        )));
    }
    if order.amount <= Decimal::ZERO {
        return Err(EpayError::InvalidInput("`amount` must be a positive number".to_owned()));
    }
    if order.callback_url.trim().is_empty() {
        return Err(EpayError::InvalidInput(
            "`callback_url` must be the URL the gateway posts payment results to".to_owned(),
        ));
    }
    if order.success_url.trim().is_empty() {
        return Err(EpayError::InvalidInput(
            "`success_url` must be the URL the customer returns to after payment".to_owned(),
        ));
    }
    if order.failure_url.trim().is_empty() {
        return Err(EpayError::InvalidInput(
            "`failure_url` must be the URL the customer returns to when payment fails".to_owned(),
        ));
    }
    Ok(())
}

/// Encodes the `<merchant>` element of an order document.
pub(crate) fn order_fragment(
    credentials: &Credentials,
    order_id: &str,
    amount: Decimal,
    currency: Currency,
) -> Result<String> {
    let amount = format_amount(amount);
    let department = XmlValue::from_pairs([(
        ATTRIBUTES_KEY,
        attributes([("merchant_id", credentials.merchant_id()), ("amount", amount.as_str())]),
    )]);
    let order = XmlValue::from_pairs([
        (
            ATTRIBUTES_KEY,
            attributes([
                ("order_id", order_id.to_owned()),
                ("amount", amount),
                ("currency", currency.to_string()),
            ]),
        ),
        ("department", department),
    ]);
    let merchant = XmlValue::from_pairs([
        (
            ATTRIBUTES_KEY,
            attributes([
                ("cert_id", credentials.merchant_certificate_id()),
                ("name", credentials.merchant_name()),
            ]),
        ),
        ("order", order),
    ]);
    encode("merchant", &merchant)
}

/// Maps a beautified payment result into an [`OrderConfirmation`].
pub(crate) fn order_confirmation(record: &XmlValue) -> Result<OrderConfirmation> {
    let response_code = field(record, &["results", "payment", "response_code"]);
    if response_code.as_deref() != Some("00") {
        return Err(EpayError::GatewayDeclined {
            field: "results.payment.response_code".to_owned(),
            code: response_code.unwrap_or_else(|| "<missing>".to_owned()),
        });
    }

    let mut payment = record
        .path(&["results", "payment"])
        .and_then(XmlValue::as_map)
        .cloned()
        .unwrap_or_default();
    let mut take = |key: &str| payment.shift_remove(key).and_then(|v| v.as_str().map(str::to_owned));

    let merchant_id = take("merchant_id");
    let approval_code = take("approval_code");
    let reference = take("reference");
    let paid_amount = take("amount");
    take("response_code");

    Ok(OrderConfirmation {
        timestamp: field(record, &["results", "timestamp"]),
        name: field(record, &["customer", "name"]),
        mail: field(record, &["customer", "mail"]),
        phone: field(record, &["customer", "phone"]),
        order_id: required_field(record, &["customer", "merchant", "order", "order_id"])?,
        amount: match paid_amount {
            Some(amount) => amount,
            None => required_field(record, &["customer", "merchant", "order", "amount"])?,
        },
        currency: required_field(record, &["customer", "merchant", "order", "currency"])?,
        merchant_id,
        approval_code,
        response_code: "00".to_owned(),
        reference,
        payment,
    })
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;
    use crate::{
        gateway::{ClientConfig, models::Language},
        xml::{flatten, parse},
    };

    fn credentials() -> Credentials {
        Credentials::try_from(ClientConfig {
            merchant_id: Some("92061101".into()),
            merchant_name: Some("Test shop".into()),
            merchant_certificate_id: Some("00C182B189".into()),
            private_key_path: Some("cert.prv".into()),
            private_key_passphrase: Some("nissan".into()),
            own_public_cert_path: Some("cert.pub".into()),
            counterparty_public_key_path: Some("kkbca.pub".into()),
            ..ClientConfig::default()
        })
        .unwrap()
    }

    fn order() -> OrderRequest {
        OrderRequest {
            order_id: "000333".into(),
            amount: dec!(500),
            currency: Currency::Kzt,
            email: None,
            callback_url: "https://shop.kz/callback".into(),
            success_url: "https://shop.kz/ok".into(),
            failure_url: "https://shop.kz/fail".into(),
            language: Some(Language::Eng),
        }
    }

    #[test]
    fn test_order_fragment() {
        let fragment = order_fragment(&credentials(), "000333", dec!(500.00), Currency::Kzt).unwrap();
        assert_eq!(
            fragment,
            r#"<merchant cert_id="00C182B189" name="Test shop"><order order_id="000333" amount="500" currency="398"><department merchant_id="92061101" amount="500"/></order></merchant>"#
        );
    }

    #[test]
    fn test_validate_order_ok() {
        assert!(validate_order(&order()).is_ok());
    }

    #[test]
    fn test_validate_order_id_length() {
        for order_id in ["1", "12345", "1234567890123456"] {
            let err = validate_order(&OrderRequest { order_id: order_id.into(), ..order() }).unwrap_err();
            let message = err.to_string();
            assert!(message.contains('6') && message.contains("15"), "{message}");
        }
        assert!(validate_order(&OrderRequest { order_id: "123456789012345".into(), ..order() }).is_ok());
    }

    #[test]
    fn test_validate_amount() {
        let err = validate_order(&OrderRequest { amount: dec!(0), ..order() }).unwrap_err();
        assert!(err.to_string().contains("amount"));
        assert!(validate_order(&OrderRequest { amount: dec!(-5), ..order() }).is_err());
    }

    #[test]
    fn test_validate_urls_have_distinct_messages() {
        let callback = validate_order(&OrderRequest { callback_url: String::new(), ..order() })
            .unwrap_err()
            .to_string();
        let success = validate_order(&OrderRequest { success_url: String::new(), ..order() })
            .unwrap_err()
            .to_string();
        let failure = validate_order(&OrderRequest { failure_url: " ".into(), ..order() })
            .unwrap_err()
            .to_string();

        assert!(callback.contains("callback_url"));
        assert!(success.contains("success_url"));
        assert!(failure.contains("failure_url"));
        assert_ne!(callback, success);
        assert_ne!(success, failure);
    }

    #[test]
    fn test_validate_order_checks_id_first() {
        let err = validate_order(&OrderRequest {
            order_id: "1".into(),
            amount: dec!(0),
            callback_url: String::new(),
            ..order()
        })
        .unwrap_err();
        assert!(err.to_string().contains("order_id"));
    }

    #[test]
    fn test_order_confirmation_mapping() {
        let doc = parse(
            r#"<bank name="Kazkommertsbank JSC"><customer name="test" mail="a@b.kz" phone="+7"><merchant cert_id="c" name="n"><order order_id="0202171211" amount="10" currency="398"/></merchant></customer><results timestamp="2017-02-02 17:13:03"><payment merchant_id="92061103" card="4405" amount="10" reference="170202171303" approval_code="171303" response_code="00" Secure="No"/></results></bank>"#,
        )
        .unwrap();
        let record = flatten(doc.get("bank").unwrap());

        let confirmation = order_confirmation(&record).unwrap();
        assert_eq!(confirmation.order_id, "0202171211");
        assert_eq!(confirmation.merchant_id.as_deref(), Some("92061103"));
        assert_eq!(confirmation.approval_code.as_deref(), Some("171303"));
        assert_eq!(confirmation.reference.as_deref(), Some("170202171303"));
        assert_eq!(confirmation.response_code, "00");
        assert_eq!(confirmation.timestamp.as_deref(), Some("2017-02-02 17:13:03"));
        assert_eq!(confirmation.payment.get("card").and_then(XmlValue::as_str), Some("4405"));
        assert_eq!(confirmation.payment.get("Secure").and_then(XmlValue::as_str), Some("No"));
        assert!(!confirmation.payment.contains_key("approval_code"));
    }

    #[test]
    fn test_order_confirmation_without_payment_identifiers() {
        let doc = parse(
            r#"<bank name="Kazkommertsbank JSC"><customer name="test"><merchant cert_id="c" name="n"><order order_id="0202171211" amount="10" currency="398"/></merchant></customer><results timestamp="2017-02-02 17:13:03"><payment card="4405" response_code="00"/></results></bank>"#,
        )
        .unwrap();
        let record = flatten(doc.get("bank").unwrap());

        let confirmation = order_confirmation(&record).unwrap();
        assert_eq!(confirmation.order_id, "0202171211");
        assert_eq!(confirmation.amount, "10");
        assert!(confirmation.merchant_id.is_none());
        assert!(confirmation.approval_code.is_none());
        assert!(confirmation.reference.is_none());
        assert_eq!(confirmation.payment.get("card").and_then(XmlValue::as_str), Some("4405"));

        let json = serde_json::to_value(&confirmation).unwrap();
        assert!(json.get("reference").is_none());
    }

    #[test]
    fn test_order_confirmation_declined() {
        let record = XmlValue::from_pairs([(
            "results",
            XmlValue::from_pairs([("payment", attributes([("response_code", "05")]))]),
        )]);
        let record = flatten(&record);
        let err = order_confirmation(&record).unwrap_err();
        assert!(matches!(err, EpayError::GatewayDeclined { ref code, .. } if code == "05"));
    }

    #[test]
    fn test_order_confirmation_missing_code() {
        let err = order_confirmation(&XmlValue::map()).unwrap_err();
        assert!(matches!(err, EpayError::GatewayDeclined { ref code, .. } if code == "<missing>"));
    }
}
