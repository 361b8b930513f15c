//! KKB ePay: client for the Kazkommertsbank ePay signed-XML payment gateway
//!
//! The gateway speaks single-line XML documents signed with RSA over SHA-1. This
//! crate builds and signs merchant command documents, and authenticates and
//! normalizes the signed documents the bank sends back.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  encode   ┌──────────────┐  sign   ┌───────────────────┐
//! │  EpayClient  │──────────▶│  <merchant>  │────────▶│ <document>        │
//! │  operation   │           │  fragment    │         │   <merchant/>     │
//! └──────▲───────┘           └──────────────┘         │   <merchant_sign/>│
//!        │                                            └─────────┬─────────┘
//!        │ typed record                                         │ Transport
//!        │                                                      ▼
//! ┌──────┴───────┐  beautify ┌──────────────┐ verify  ┌───────────────────┐
//! │ Confirmation │◀──────────│  bank node   │◀────────│ <document>        │
//! └──────────────┘           └──────────────┘         │   <bank/>         │
//!                                                     │   <bank_sign/>    │
//!                                                     └───────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ## 1. Create an Order
//!
//! ```rust,no_run
//! use kkb_epay::gateway::{ClientConfig, Currency, EpayClient, Language, OrderRequest};
//! use rust_decimal::Decimal;
//!
//! # async fn example() -> kkb_epay::error::Result<()> {
//! let client = EpayClient::new(ClientConfig::from_file("epay.toml")?)?;
//!
//! let form = client
//!     .create_order(OrderRequest {
//!         order_id: "000333".into(),
//!         amount: Decimal::new(50000, 2),
//!         currency: Currency::Kzt,
//!         email: None,
//!         callback_url: "https://shop.kz/epay/callback".into(),
//!         success_url: "https://shop.kz/ok".into(),
//!         failure_url: "https://shop.kz/fail".into(),
//!         language: Some(Language::Eng),
//!     })
//!     .await?;
//!
//! // Render an auto-submitting form that posts `form` to this URL.
//! println!("{}", client.create_order_url()?);
//! # Ok(())
//! # }
//! ```
//!
//! ## 2. Accept the Payment Result
//!
//! ```rust,no_run
//! # use kkb_epay::gateway::{ClientConfig, EpayClient};
//! # async fn example(client: EpayClient, posted_xml: &str) -> kkb_epay::error::Result<()> {
//! let confirmation = client.process_order_response(posted_xml).await?;
//! println!("paid {} for order {}", confirmation.amount, confirmation.order_id);
//! # Ok(())
//! # }
//! ```
//!
//! ## 3. Complete the Payment
//!
//! ```rust,no_run
//! use kkb_epay::gateway::{ChangePaymentParams, Currency, EpayClient};
//! use rust_decimal::Decimal;
//!
//! # async fn example(client: EpayClient) -> kkb_epay::error::Result<()> {
//! let result = client
//!     .change_payment(ChangePaymentParams {
//!         command: Some("complete".into()),
//!         reference: Some("170202171303".into()),
//!         approval_code: Some("171303".into()),
//!         order_id: Some("000333".into()),
//!         amount: Some(Decimal::from(500)),
//!         currency: Some(Currency::Kzt),
//!     })
//!     .await?;
//! println!("{}", result.cmd);
//! # Ok(())
//! # }
//! ```
//!
//! # Module Organization
//!
//! - [`gateway`]: configuration, the client and its operations, response normalization
//! - [`xml`]: canonical XML codec (encode, parse, flatten)
//! - [`crypto`]: key loading and RSA-SHA1 signing with byte inversion
//! - [`transport`]: outbound transport abstraction and the HTTPS implementation
//! - [`error`]: error types with recovery guidance
//!
//! # Security Considerations
//!
//! - Responses are authenticated over the literal `<bank>` text received, never a
//!   re-encoded copy.
//! - The private key passphrase is zeroized on drop and never logged.
//! - Only HTTPS URLs are accepted by [`transport::HttpTransport`].

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![allow(
    clippy::multiple_crate_versions,
    reason = "transitive dependencies from reqwest and the RustCrypto stack"
)]

pub mod crypto;
pub mod error;
pub mod gateway;
pub mod transport;
pub mod xml;

pub use error::{EpayError, Result};
pub use gateway::{ClientConfig, EpayClient};
