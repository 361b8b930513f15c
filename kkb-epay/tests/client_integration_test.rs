//! Integration tests for the gateway client.
//!
//! Drives both exchanges end to end against bank-signed fixtures and an in-memory
//! transport that records the request it was given.

use std::{
    path::{Path, PathBuf},
    sync::Mutex,
};

use base64::{Engine as _, engine::general_purpose::STANDARD};
use kkb_epay::{
    EpayError, Result,
    crypto::RsaVerifier,
    gateway::{
        ChangePaymentParams, ClientConfig, Currency, EpayClient, Language, OrderRequest,
        TEST_GATEWAY_ENDPOINT,
    },
    transport::Transport,
    xml::XmlValue,
};
use rust_decimal_macros::dec;
use url::{Url, form_urlencoded};

/// Inverted signature of the merchant fragment of order `000333` for 500 KZT.
const ORDER_SIGNATURE: &str = "txZ3SDRtS+ZAxiPsWRSmg+JIxR5yt2xdGXeWY0E3ncSWHTGTdPaQSZcWDZ7erBMLNHKdVF53ME+oXqrmE0IDN7hOr0y/OxuaqW4ddQnaTEj5jndS+KoAP7YXdcTm3hdcw0MhZKXaVA10UrtzS8o8eoP0/yMh+3ao6I/zZcY9N9N7zg2hzRtvdaPbKwrr6j64OF5F8VBZrv2UMNkP3wT/vhwkyABzTApdR0M0XgM3LUtbPrG9BVEn9mkIhtJ1uxpYv3DuX71dho4rrujqgF5H4PNMhew0L3rm6V+CWR0Jng8Getbb0+M/uLQoRmzdUrBayl6aFICHaRSZbc6WBymqig==";

const ORDER_FRAGMENT: &str = r#"<merchant cert_id="00C182B189" name="Test shop"><order order_id="000333" amount="500" currency="398"><department merchant_id="92061101" amount="500"/></order></merchant>"#;

/// Returns a canned body and remembers the last requested URL.
struct RecordingTransport {
    body: String,
    last_url: Mutex<Option<Url>>,
}

impl RecordingTransport {
    fn new(body: &str) -> Self {
        Self { body: body.to_owned(), last_url: Mutex::new(None) }
    }

    fn last_url(&self) -> Option<Url> {
        self.last_url.lock().unwrap().clone()
    }

    /// Signed document carried in the query string of the last request.
    fn last_document(&self) -> String {
        let url = self.last_url().expect("a request was made");
        let query = url.query().expect("document in query");
        let (document, _) = form_urlencoded::parse(query.as_bytes()).next().unwrap();
        document.into_owned()
    }
}

impl Transport for RecordingTransport {
    async fn get(&self, url: &Url) -> Result<String> {
        *self.last_url.lock().unwrap() = Some(url.clone());
        Ok(self.body.clone())
    }
}

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
}

fn read_fixture(name: &str) -> String {
    std::fs::read_to_string(fixture(name)).unwrap()
}

fn config() -> ClientConfig {
    ClientConfig {
        merchant_id: Some("92061101".into()),
        merchant_name: Some("Test shop".into()),
        merchant_certificate_id: Some("00C182B189".into()),
        private_key_path: Some(fixture("cert.prv")),
        private_key_passphrase: Some("nissan".into()),
        own_public_cert_path: Some(fixture("cert.pub")),
        counterparty_public_key_path: Some(fixture("kkbca_test.pub")),
        gateway_endpoint: TEST_GATEWAY_ENDPOINT.into(),
        ..ClientConfig::default()
    }
}

fn client_with(body: &str) -> EpayClient<RecordingTransport> {
    EpayClient::with_transport(config(), RecordingTransport::new(body)).unwrap()
}

fn merchant_verifier() -> RsaVerifier {
    RsaVerifier::from_pem(&read_fixture("cert.pub"), true).unwrap()
}

/// Splits a signed document into its `<merchant>` fragment and signature.
fn split_document(document: &str) -> (&str, &str) {
    let body = document.strip_prefix("<document>").unwrap().strip_suffix("</document>").unwrap();
    let sign_start = body.find("<merchant_sign").unwrap();
    let fragment = &body[..sign_start];
    let sign = &body[sign_start..];
    let signature = &sign[sign.find('>').unwrap() + 1..sign.rfind("</merchant_sign>").unwrap()];
    (fragment, signature)
}

fn order() -> OrderRequest {
    OrderRequest {
        order_id: "000333".into(),
        amount: dec!(500.00),
        currency: Currency::Kzt,
        email: None,
        callback_url: "https://shop.kz/epay/callback".into(),
        success_url: "https://shop.kz/ok".into(),
        failure_url: "https://shop.kz/fail".into(),
        language: None,
    }
}

fn change(command: &str) -> ChangePaymentParams {
    ChangePaymentParams {
        command: Some(command.into()),
        reference: Some("170202171303".into()),
        approval_code: Some("171303".into()),
        order_id: Some("000333".into()),
        amount: Some(dec!(500)),
        currency: Some(Currency::Kzt),
    }
}

#[tokio::test]
async fn test_build_order_document_known_signature() {
    let client = client_with("");
    let document = client.build_order_document("000333", dec!(500), Currency::Kzt).await.unwrap();

    assert_eq!(
        document,
        format!(r#"<document>{ORDER_FRAGMENT}<merchant_sign type="RSA">{ORDER_SIGNATURE}</merchant_sign></document>"#)
    );
}

#[tokio::test]
async fn test_create_order_form() {
    let client = client_with("");
    let form = client.create_order(order()).await.unwrap();

    assert_eq!(form.email, "");
    assert_eq!(form.back_link, "https://shop.kz/ok");
    assert_eq!(form.failure_back_link, "https://shop.kz/fail");
    assert_eq!(form.post_link, "https://shop.kz/epay/callback");
    assert_eq!(form.language, Language::Rus);

    let document = String::from_utf8(STANDARD.decode(&form.signed_order_b64).unwrap()).unwrap();
    let (fragment, signature) = split_document(&document);
    assert_eq!(fragment, ORDER_FRAGMENT);
    assert!(merchant_verifier().verify(fragment, signature));
    assert!(document.contains(r#"<merchant_sign type="RSA">"#));
}

#[tokio::test]
async fn test_create_order_keeps_email_and_language() {
    let client = client_with("");
    let form = client
        .create_order(OrderRequest {
            email: Some("customer@example.kz".into()),
            language: Some(Language::Kaz),
            ..order()
        })
        .await
        .unwrap();

    assert_eq!(form.email, "customer@example.kz");
    let json = serde_json::to_value(&form).unwrap();
    assert_eq!(json["Language"], "kaz");
}

#[tokio::test]
async fn test_create_order_rejects_short_order_id() {
    let err = client_with("")
        .create_order(OrderRequest { order_id: "1".into(), ..order() })
        .await
        .unwrap_err();
    let message = err.to_string();
    assert!(matches!(err, EpayError::InvalidInput(_)));
    assert!(message.contains('6') && message.contains("15"));
}

#[tokio::test]
async fn test_process_order_response() {
    let client = client_with("");
    let confirmation =
        client.process_order_response(&read_fixture("order_response.xml")).await.unwrap();

    assert_eq!(confirmation.order_id, "0202171211");
    assert_eq!(confirmation.merchant_id.as_deref(), Some("92061103"));
    assert_eq!(confirmation.approval_code.as_deref(), Some("171303"));
    assert_eq!(confirmation.response_code, "00");
    assert_eq!(confirmation.reference.as_deref(), Some("170202171303"));
    assert_eq!(confirmation.amount, "10");
    assert_eq!(confirmation.currency, "398");
    assert_eq!(confirmation.name.as_deref(), Some("test"));
    assert_eq!(confirmation.mail.as_deref(), Some("SeFrolov@kkb.kz"));
    assert_eq!(confirmation.phone.as_deref(), Some("+333333333"));

    let json = serde_json::to_value(&confirmation).unwrap();
    assert_eq!(json["orderId"], "0202171211");
    assert_eq!(json["merchantId"], "92061103");
    assert_eq!(json["approvalCode"], "171303");
    assert_eq!(json["responseCode"], "00");
    assert_eq!(json["card"], "440564-XX-XXXX-6150");
    assert_eq!(json["c_hash"], "13988BBF7C6649F799F36A4808490A3E");
    assert_eq!(json["card_bin"], "");
}

#[tokio::test]
async fn test_process_order_response_declined() {
    let err = client_with("")
        .process_order_response(&read_fixture("order_response_declined.xml"))
        .await
        .unwrap_err();
    assert!(matches!(err, EpayError::GatewayDeclined { ref code, .. } if code == "05"));
    assert!(err.to_string().contains("05"));
}

#[tokio::test]
async fn test_process_order_response_tampered() {
    let err = client_with("")
        .process_order_response(&read_fixture("order_response_invalid_sign.xml"))
        .await
        .unwrap_err();
    assert!(matches!(err, EpayError::UnverifiedSignature(_)));
}

#[tokio::test]
async fn test_process_order_response_without_inversion() {
    let config = ClientConfig { invert_signature: false, ..config() };
    let client = EpayClient::with_transport(config, RecordingTransport::new("")).unwrap();
    let err = client.process_order_response(&read_fixture("order_response.xml")).await.unwrap_err();
    assert!(matches!(err, EpayError::UnverifiedSignature(_)));
}

#[tokio::test]
async fn test_process_order_response_without_signature() {
    let err = client_with("")
        .process_order_response(r#"<document><bank name="Kazkom"></bank></document>"#)
        .await
        .unwrap_err();
    assert!(matches!(err, EpayError::MissingSignature));
}

#[tokio::test]
async fn test_change_payment_complete() {
    let client = client_with(&read_fixture("change_payment_response.xml"));
    let confirmation = client.change_payment(change("complete")).await.unwrap();

    assert_eq!(confirmation.cmd, "complete");
    assert_eq!(confirmation.reference, "170202171303");
    assert_eq!(confirmation.approval_code, "171303");
    assert_eq!(confirmation.order_id, "000333");
    assert_eq!(confirmation.amount, "500");
    assert_eq!(confirmation.currency, "398");
    assert_eq!(confirmation.response.get("message").and_then(XmlValue::as_str), Some("Approved"));
    assert_eq!(confirmation.response.get("remaining_amount").and_then(XmlValue::as_str), Some("0"));

    let url = client.transport().last_url().unwrap();
    assert_eq!(url.host_str(), Some("testpay.kkb.kz"));
    assert_eq!(url.path(), "/jsp/remote/control.jsp");

    let document = client.transport().last_document();
    let (fragment, signature) = split_document(&document);
    assert_eq!(
        fragment,
        r#"<merchant merchant_id="92061101"><command type="complete"/><payment reference="170202171303" approval_code="171303" orderid="000333" amount="500" currency_code="398"/></merchant>"#
    );
    assert!(document.contains(r#"<merchant_sign type="RSA" cert_id="00C182B189">"#));
    assert!(merchant_verifier().verify(fragment, signature));
}

#[tokio::test]
async fn test_change_payment_reverse_sends_reason() {
    let client = client_with(&read_fixture("reverse_payment_response.xml"));
    let confirmation = client.change_payment(change("reverse")).await.unwrap();
    assert_eq!(confirmation.cmd, "reverse");

    let document = client.transport().last_document();
    assert!(document.contains("<reason>Return payment</reason></merchant>"));
}

#[tokio::test]
async fn test_change_payment_declined() {
    let client = client_with(&read_fixture("change_payment_declined.xml"));
    let err = client.change_payment(change("refund")).await.unwrap_err();
    assert!(matches!(err, EpayError::GatewayDeclined { ref code, .. } if code == "-1"));

    let document = client.transport().last_document();
    assert!(document.contains(r#"<command type="refund"/>"#));
    assert!(document.contains("<reason>Return payment</reason>"));
}

#[tokio::test]
async fn test_change_payment_unknown_command() {
    let client = client_with("");
    let err = client.change_payment(change("non-existed")).await.unwrap_err();

    assert!(matches!(err, EpayError::InvalidInput(_)));
    assert!(err.to_string().contains("reverse, complete, refund"));
    assert!(client.transport().last_url().is_none());
}

#[tokio::test]
async fn test_change_payment_missing_option() {
    let client = client_with("");
    let err = client
        .change_payment(ChangePaymentParams { order_id: None, ..change("non-existed") })
        .await
        .unwrap_err();
    assert!(matches!(err, EpayError::MissingRequiredOption(ref field) if field == "order_id"));
}

#[tokio::test]
async fn test_change_payment_rejects_unsigned_reply() {
    let client = client_with(&read_fixture("error_response.xml"));
    let err = client.change_payment(change("complete")).await.unwrap_err();
    assert!(matches!(err, EpayError::MissingSignature));
}

#[tokio::test]
async fn test_process_change_payment_response_directly() {
    let confirmation = client_with("")
        .process_change_payment_response(&read_fixture("reverse_payment_response.xml"))
        .await
        .unwrap();
    assert_eq!(confirmation.cmd, "reverse");
    assert_eq!(confirmation.response.get("code").and_then(XmlValue::as_str), Some("00"));
}

#[tokio::test]
async fn test_client_sign_and_verify() {
    let client = client_with("");
    assert_eq!(client.sign(ORDER_FRAGMENT).await.unwrap(), ORDER_SIGNATURE);

    let xml = read_fixture("order_response.xml");
    let section = &xml[xml.find("<bank ").unwrap()..xml.rfind("</bank>").unwrap() + "</bank>".len()];
    let signature = &xml[xml.find("SHA/RSA\">").unwrap() + "SHA/RSA\">".len()..xml.rfind("</bank_sign>").unwrap()];
    assert!(client.verify(section, signature).await.unwrap());
    assert!(!client.verify("<bank name=\"other\"></bank>", signature).await.unwrap());
}

#[test]
fn test_parse_error_response() {
    let record = client_with("").parse_error_response(&read_fixture("error_response.xml")).unwrap();
    assert_eq!(
        record.path(&["response", "error", "code"]).and_then(XmlValue::as_str),
        Some("00")
    );
    assert_eq!(
        record.path(&["response", "error", "_"]).and_then(XmlValue::as_str),
        Some("Error Message")
    );
}

#[tokio::test]
async fn test_client_from_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let keys = dir.path().join("keys");
    std::fs::create_dir(&keys).unwrap();
    for name in ["cert.prv", "cert.pub", "kkbca_test.pub"] {
        std::fs::copy(fixture(name), keys.join(name)).unwrap();
    }

    let path = dir.path().join("epay.toml");
    std::fs::write(
        &path,
        r#"
        merchant_id = "92061101"
        merchant_name = "Test shop"
        merchant_certificate_id = "00C182B189"
        private_key_path = "keys/cert.prv"
        private_key_passphrase = "nissan"
        own_public_cert_path = "keys/cert.pub"
        counterparty_public_key_path = "keys/kkbca_test.pub"
        gateway_endpoint = "https://testpay.kkb.kz"
        "#,
    )
    .unwrap();

    let config = ClientConfig::from_file(&path).unwrap();
    let client = EpayClient::with_transport(config, RecordingTransport::new("")).unwrap();

    assert!(client.check_key_pair().await.unwrap());
    assert_eq!(client.create_order_url().unwrap().as_str(), "https://testpay.kkb.kz/jsp/process/logon.jsp");
    let confirmation =
        client.process_order_response(&read_fixture("order_response.xml")).await.unwrap();
    assert_eq!(confirmation.response_code, "00");
}
