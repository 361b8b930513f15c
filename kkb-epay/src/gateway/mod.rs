//! Gateway protocol operations.
//!
//! [`EpayClient`] drives both exchanges the gateway supports:
//!
//! - **Create order**: [`EpayClient::create_order`] signs an order document and
//!   returns the form the customer's browser posts to the payment page. The
//!   gateway later posts a signed result to the callback URL, which
//!   [`EpayClient::process_order_response`] authenticates.
//! - **Change payment**: [`EpayClient::change_payment`] signs a `complete`,
//!   `reverse` or `refund` command, submits it through the [`Transport`], and
//!   authenticates the signed reply.
//!
//! Every bank response passes through the same pipeline: parse, locate the literal
//! `<bank>` section, verify its signature against the bank certificate, then
//! [`beautify`] the verified node into a plain record.
//!
//! [`Transport`]: crate::transport::Transport

mod client;
mod config;
mod document;
mod models;
mod order;
mod payment;
mod response;

pub use client::EpayClient;
pub use config::{
    ClientConfig, Credentials, DEFAULT_GATEWAY_ENDPOINT, TEST_GATEWAY_ENDPOINT,
};
pub use models::{
    ChangePaymentParams, Currency, Language, OrderConfirmation, OrderForm, OrderRequest,
    PaymentChange, PaymentChangeConfirmation, PaymentCommand, RETURN_REASON, format_amount,
};
pub use response::{
    SignedSection, beautify, extract_signed_section, parse_error_response, verify_bank_response,
};
