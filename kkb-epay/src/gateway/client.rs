//! Gateway client bound to one merchant's credentials.

use std::fmt;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use rust_decimal::Decimal;
use tracing::{debug, info, instrument, warn};
use url::{Url, form_urlencoded};

use super::{
    config::{ClientConfig, Credentials},
    document::signed_document,
    models::{
        ChangePaymentParams, Currency, OrderConfirmation, OrderForm, OrderRequest, PaymentChange,
        PaymentChangeConfirmation,
    },
    order::{order_confirmation, order_fragment, validate_order},
    payment::{payment_change_confirmation, payment_fragment},
    response::{beautify, verify_bank_response},
};
use crate::{
    crypto::{RsaSigner, RsaVerifier, load_private_key, load_public_key},
    error::{EpayError, Result},
    transport::{HttpTransport, Transport},
    xml::XmlValue,
};

/// Path of the payment page the order form is posted to.
const CREATE_ORDER_PATH: &str = "jsp/process/logon.jsp";

/// Path of the remote control endpoint for payment changes.
const CHANGE_PAYMENT_PATH: &str = "jsp/remote/control.jsp";

/// Payload signed by [`EpayClient::check_key_pair`].
const KEY_PAIR_PROBE: &[u8] = b"<merchant probe=\"key-pair\"/>";

/// Client for the ePay gateway.
///
/// Holds validated, immutable [`Credentials`] and a [`Transport`]. Operations share
/// no mutable state, so one client can serve any number of concurrent requests.
/// Key files are read on every sign and verify call.
///
/// # Examples
///
/// ```no_run
/// use kkb_epay::gateway::{ClientConfig, EpayClient, OrderRequest};
/// use rust_decimal::Decimal;
///
/// # async fn example() -> kkb_epay::error::Result<()> {
/// let client = EpayClient::new(ClientConfig::from_file("/etc/epay/epay.toml")?)?;
///
/// let form = client
///     .create_order(OrderRequest {
///         order_id: "000333".into(),
///         amount: Decimal::from(500),
///         currency: Default::default(),
///         email: Some("customer@example.kz".into()),
///         callback_url: "https://shop.kz/epay/callback".into(),
///         success_url: "https://shop.kz/ok".into(),
///         failure_url: "https://shop.kz/fail".into(),
///         language: None,
///     })
///     .await?;
///
/// println!("POST {} with {form:?}", client.create_order_url()?);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct EpayClient<T = HttpTransport> {
    credentials: Credentials,
    transport: T,
}

impl<T> fmt::Debug for EpayClient<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EpayClient").field("credentials", &self.credentials).finish_non_exhaustive()
    }
}

impl EpayClient<HttpTransport> {
    /// Creates a client that talks to the gateway over HTTPS.
    ///
    /// # Errors
    ///
    /// Returns [`EpayError::ConfigurationError`] if a required field is missing or
    /// a setting is out of range, and [`EpayError::HttpError`] if the HTTP client
    /// cannot be built.
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.http.validate()?;
        let transport = HttpTransport::with_config(&config.http)?;
        Self::with_transport(config, transport)
    }
}

impl<T: Transport> EpayClient<T> {
    /// Creates a client with a caller-supplied transport.
    ///
    /// # Errors
    ///
    /// Returns [`EpayError::ConfigurationError`] if a required field is missing or
    /// the endpoint is not a valid URL.
    pub fn with_transport(config: ClientConfig, transport: T) -> Result<Self> {
        let credentials = Credentials::try_from(config)?;
        debug!(
            merchant_id = credentials.merchant_id(),
            endpoint = %credentials.gateway_endpoint(),
            invert = credentials.invert_signature(),
            "epay client configured"
        );
        Ok(Self { credentials, transport })
    }

    /// Validated merchant credentials.
    #[must_use]
    pub const fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Transport used for payment changes.
    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// URL the [`OrderForm`] is posted to by the customer's browser.
    ///
    /// # Errors
    ///
    /// Returns [`EpayError::ConfigurationError`] if the endpoint cannot be joined.
    pub fn create_order_url(&self) -> Result<Url> {
        self.endpoint(CREATE_ORDER_PATH)
    }

    /// URL a signed payment change document is submitted to.
    ///
    /// The whole document is percent-encoded as the query string.
    ///
    /// # Errors
    ///
    /// Returns [`EpayError::ConfigurationError`] if the endpoint cannot be joined.
    pub fn change_payment_url(&self, document: &str) -> Result<Url> {
        let mut url = self.endpoint(CHANGE_PAYMENT_PATH)?;
        let query: String = form_urlencoded::byte_serialize(document.as_bytes()).collect();
        url.set_query(Some(&query));
        Ok(url)
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.credentials.gateway_endpoint().join(path).map_err(|e| {
            EpayError::ConfigurationError(format!("cannot build `{path}` URL from `gateway_endpoint`: {e}"))
        })
    }

    /// Signs `payload` with the merchant private key.
    ///
    /// # Errors
    ///
    /// Returns [`EpayError::Io`] if the key file cannot be read and
    /// [`EpayError::CryptoError`] if it cannot be decoded or used.
    pub async fn sign(&self, payload: impl AsRef<[u8]>) -> Result<String> {
        let key = load_private_key(
            self.credentials.private_key_path(),
            self.credentials.private_key_passphrase(),
        )
        .await?;
        RsaSigner::new(key, self.credentials.invert_signature()).sign(payload)
    }

    /// Verifies a bank signature over `payload` with the counterparty key.
    ///
    /// A mismatch is `Ok(false)`, not an error.
    ///
    /// # Errors
    ///
    /// Returns [`EpayError::Io`] or [`EpayError::CryptoError`] if the
    /// counterparty key cannot be loaded.
    pub async fn verify(&self, payload: impl AsRef<[u8]>, signature: &str) -> Result<bool> {
        Ok(self.bank_verifier().await?.verify(payload, signature))
    }

    async fn bank_verifier(&self) -> Result<RsaVerifier> {
        let key = load_public_key(self.credentials.counterparty_public_key_path()).await?;
        Ok(RsaVerifier::new(key, self.credentials.invert_signature()))
    }

    /// Authenticates a bank response and returns its `document.bank` node.
    ///
    /// # Errors
    ///
    /// - [`EpayError::InvalidInput`] if `xml` is empty
    /// - [`EpayError::MalformedXml`] if `xml` does not parse
    /// - [`EpayError::MissingSignature`] if there is no `bank_sign`
    /// - [`EpayError::UnverifiedSignature`] if the signature does not verify
    pub async fn verify_and_extract(&self, xml: &str) -> Result<XmlValue> {
        if xml.is_empty() {
            return Err(EpayError::InvalidInput("response must be non-empty string".to_owned()));
        }
        verify_bank_response(xml, &self.bank_verifier().await?)
    }

    /// Builds the signed order document.
    ///
    /// The `<merchant_sign>` element of this document carries no `cert_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the merchant key cannot be loaded or used.
    #[instrument(skip(self, amount), fields(merchant_id = self.credentials.merchant_id()))]
    pub async fn build_order_document(
        &self,
        order_id: &str,
        amount: Decimal,
        currency: Currency,
    ) -> Result<String> {
        let fragment = order_fragment(&self.credentials, order_id, amount, currency)?;
        let signature = self.sign(&fragment).await?;
        debug!(fragment_len = fragment.len(), "order fragment signed");
        signed_document(&fragment, &signature, None)
    }

    /// Validates an order and returns the form the customer's browser posts to
    /// [`create_order_url`](Self::create_order_url).
    ///
    /// # Errors
    ///
    /// Returns [`EpayError::InvalidInput`] naming the first invalid field, or an
    /// error from signing.
    #[instrument(skip(self, order), fields(order_id = %order.order_id, merchant_id = self.credentials.merchant_id()))]
    pub async fn create_order(&self, order: OrderRequest) -> Result<OrderForm> {
        validate_order(&order)?;

        let document = self.build_order_document(&order.order_id, order.amount, order.currency).await?;
        info!(amount = %order.amount, currency = order.currency.code(), "order created");

        Ok(OrderForm {
            email: order.email.unwrap_or_default(),
            signed_order_b64: STANDARD.encode(document),
            back_link: order.success_url,
            failure_back_link: order.failure_url,
            post_link: order.callback_url,
            language: order.language.unwrap_or_default(),
        })
    }

    /// Authenticates the payment result posted to the callback URL.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`verify_and_extract`](Self::verify_and_extract),
    /// [`EpayError::GatewayDeclined`] if `results.payment.response_code` is not
    /// `00`, and [`EpayError::MalformedXml`] if a mapped field is missing.
    #[instrument(skip_all, fields(response_len = xml.len()))]
    pub async fn process_order_response(&self, xml: &str) -> Result<OrderConfirmation> {
        let bank = self.verify_and_extract(xml).await?;
        let confirmation = order_confirmation(&beautify(&bank)).inspect_err(|e| {
            if let EpayError::GatewayDeclined { code, .. } = e {
                warn!(code = %code, "payment declined");
            }
        })?;
        info!(
            order_id = %confirmation.order_id,
            reference = confirmation.reference.as_deref(),
            "payment confirmed"
        );
        Ok(confirmation)
    }

    /// Builds the signed payment change document.
    ///
    /// The `<merchant_sign>` element of this document carries the merchant
    /// certificate id.
    ///
    /// # Errors
    ///
    /// Returns an error if the merchant key cannot be loaded or used.
    #[instrument(skip_all, fields(command = %change.command, order_id = %change.order_id))]
    pub async fn build_change_payment_document(&self, change: &PaymentChange) -> Result<String> {
        let fragment = payment_fragment(&self.credentials, change)?;
        let signature = self.sign(&fragment).await?;
        debug!(fragment_len = fragment.len(), "payment change fragment signed");
        signed_document(&fragment, &signature, Some(self.credentials.merchant_certificate_id()))
    }

    /// Completes, reverses or refunds a payment.
    ///
    /// # Errors
    ///
    /// - [`EpayError::MissingRequiredOption`] naming the first absent field
    /// - [`EpayError::InvalidInput`] for an unknown command or a non-positive amount
    /// - transport errors, and the errors of
    ///   [`process_change_payment_response`](Self::process_change_payment_response)
    #[instrument(skip_all, fields(command = params.command.as_deref(), order_id = params.order_id.as_deref()))]
    pub async fn change_payment(&self, params: ChangePaymentParams) -> Result<PaymentChangeConfirmation> {
        let change = PaymentChange::try_from(params)?;
        let document = self.build_change_payment_document(&change).await?;
        let url = self.change_payment_url(&document)?;

        let body = self.transport.get(&url).await?;
        debug!(bytes = body.len(), "payment change response received");

        let confirmation = self.process_change_payment_response(&body).await?;
        info!(command = %change.command, reference = %change.reference, "payment changed");
        Ok(confirmation)
    }

    /// Authenticates a payment change response.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`verify_and_extract`](Self::verify_and_extract),
    /// [`EpayError::GatewayDeclined`] if `response.code` is not `00`, and
    /// [`EpayError::MalformedXml`] if a mapped field is missing.
    #[instrument(skip_all, fields(response_len = xml.len()))]
    pub async fn process_change_payment_response(&self, xml: &str) -> Result<PaymentChangeConfirmation> {
        let bank = self.verify_and_extract(xml).await?;
        payment_change_confirmation(&beautify(&bank)).inspect_err(|e| {
            if let EpayError::GatewayDeclined { code, .. } = e {
                warn!(code = %code, "payment change declined");
            }
        })
    }

    /// Parses an unsigned gateway error payload.
    ///
    /// # Errors
    ///
    /// Returns [`EpayError::InvalidInput`] or [`EpayError::MalformedXml`].
    pub fn parse_error_response(&self, xml: &str) -> Result<XmlValue> {
        super::response::parse_error_response(xml)
    }

    /// Checks that the merchant private key matches the merchant certificate.
    ///
    /// # Errors
    ///
    /// Returns an error if either key file cannot be loaded.
    #[instrument(skip(self), fields(merchant_id = self.credentials.merchant_id()))]
    pub async fn check_key_pair(&self) -> Result<bool> {
        let signature = self.sign(KEY_PAIR_PROBE).await?;
        let own = load_public_key(self.credentials.own_public_cert_path()).await?;
        let matches = RsaVerifier::new(own, self.credentials.invert_signature())
            .verify(KEY_PAIR_PROBE, &signature);
        if !matches {
            warn!("private key does not match `own_public_cert_path`");
        }
        Ok(matches)
    }
}
