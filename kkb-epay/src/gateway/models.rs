//! Request and response types of the gateway operations.

use std::{fmt, str::FromStr};

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{
    error::{EpayError, Result},
    xml::XmlMap,
};

/// Currencies accepted by the gateway, identified by ISO 4217 numeric code.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Currency {
    /// Kazakhstani tenge (398).
    #[default]
    Kzt,
    /// US dollar (840).
    Usd,
    /// Russian ruble (643).
    Rub,
}

impl Currency {
    /// Returns the ISO 4217 numeric code.
    #[must_use]
    pub const fn code(self) -> u16 {
        match self {
            Self::Kzt => 398,
            Self::Usd => 840,
            Self::Rub => 643,
        }
    }

    /// Looks up a currency by numeric code.
    #[must_use]
    pub const fn from_code(code: u16) -> Option<Self> {
        match code {
            398 => Some(Self::Kzt),
            840 => Some(Self::Usd),
            643 => Some(Self::Rub),
            _ => None,
        }
    }

    /// Returns the ISO 4217 alphabetic code.
    #[must_use]
    pub const fn alpha(self) -> &'static str {
        match self {
            Self::Kzt => "KZT",
            Self::Usd => "USD",
            Self::Rub => "RUB",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for Currency {
    type Err = EpayError;

    /// Accepts either the numeric (`398`) or alphabetic (`KZT`) code.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let found = match s.parse::<u16>() {
            Ok(code) => Self::from_code(code),
            Err(_) => [Self::Kzt, Self::Usd, Self::Rub]
                .into_iter()
                .find(|c| c.alpha().eq_ignore_ascii_case(s)),
        };
        found.ok_or_else(|| {
            EpayError::InvalidInput(format!(
                "unsupported currency `{s}`; allowed values: 398 (KZT), 840 (USD), 643 (RUB)"
            ))
        })
    }
}

impl Serialize for Currency {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_u16(self.code())
    }
}

impl<'de> Deserialize<'de> for Currency {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Code(u16),
            Text(String),
        }

        let currency = match Repr::deserialize(deserializer)? {
            Repr::Code(code) => Self::from_code(code)
                .ok_or_else(|| EpayError::InvalidInput(format!("unsupported currency `{code}`"))),
            Repr::Text(text) => text.parse(),
        };
        currency.map_err(serde::de::Error::custom)
    }
}

/// Language of the gateway payment page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// Russian, the gateway default.
    #[default]
    Rus,
    /// English.
    Eng,
    /// Kazakh.
    Kaz,
}

impl Language {
    /// Returns the tag sent to the gateway.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Rus => "rus",
            Self::Eng => "eng",
            Self::Kaz => "kaz",
        }
    }
}

/// Command applied to an existing payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentCommand {
    /// Release the blocked amount back to the customer.
    Reverse,
    /// Confirm the payment and transfer the blocked amount to the merchant.
    Complete,
    /// Return a confirmed payment to the customer.
    Refund,
}

/// Reason attached to reversals and refunds.
pub const RETURN_REASON: &str = "Return payment";

impl PaymentCommand {
    /// All commands, in the order they are listed in error messages.
    pub const ALL: [Self; 3] = [Self::Reverse, Self::Complete, Self::Refund];

    /// Returns the wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Reverse => "reverse",
            Self::Complete => "complete",
            Self::Refund => "refund",
        }
    }

    /// Returns the `reason` element sent with this command, if any.
    #[must_use]
    pub const fn reason(self) -> Option<&'static str> {
        match self {
            Self::Reverse | Self::Refund => Some(RETURN_REASON),
            Self::Complete => None,
        }
    }
}

impl fmt::Display for PaymentCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentCommand {
    type Err = EpayError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL.into_iter().find(|cmd| cmd.as_str() == s).ok_or_else(|| {
            let allowed: Vec<&str> = Self::ALL.iter().map(|cmd| cmd.as_str()).collect();
            EpayError::InvalidInput(format!(
                "unsupported command `{s}`; allowed values: {}",
                allowed.join(", ")
            ))
        })
    }
}

/// Order to be paid on the gateway payment page.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OrderRequest {
    /// Merchant order number, 6 to 15 characters.
    pub order_id: String,
    /// Amount to charge.
    pub amount: Decimal,
    /// Currency of `amount`.
    #[serde(default)]
    pub currency: Currency,
    /// Customer e-mail, prefilled on the payment page.
    #[serde(default)]
    pub email: Option<String>,
    /// URL the gateway posts the signed payment result to.
    pub callback_url: String,
    /// URL the customer returns to after a successful payment.
    pub success_url: String,
    /// URL the customer returns to after a failed payment.
    pub failure_url: String,
    /// Payment page language.
    #[serde(default)]
    pub language: Option<Language>,
}

/// Form fields posted by the customer's browser to the create-order URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderForm {
    /// Customer e-mail, empty when not provided.
    pub email: String,
    /// Base64 of the whole signed order document.
    #[serde(rename = "Signed_Order_B64")]
    pub signed_order_b64: String,
    /// Success return URL.
    #[serde(rename = "BackLink")]
    pub back_link: String,
    /// Failure return URL.
    #[serde(rename = "FailureBackLink")]
    pub failure_back_link: String,
    /// Callback URL for the payment result.
    #[serde(rename = "PostLink")]
    pub post_link: String,
    /// Payment page language.
    #[serde(rename = "Language")]
    pub language: Language,
}

/// Payment change arguments as supplied by a caller.
///
/// Every field is optional so that an absent value can be reported by name; see
/// [`PaymentChange::try_from`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ChangePaymentParams {
    /// `reverse`, `complete` or `refund`.
    pub command: Option<String>,
    /// Retrieval reference number of the payment.
    pub reference: Option<String>,
    /// Approval code of the payment.
    pub approval_code: Option<String>,
    /// Merchant order number.
    pub order_id: Option<String>,
    /// Amount to complete, reverse or refund.
    pub amount: Option<Decimal>,
    /// Currency of the payment.
    pub currency: Option<Currency>,
}

/// Validated payment change command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentChange {
    /// Command to apply.
    pub command: PaymentCommand,
    /// Retrieval reference number of the payment.
    pub reference: String,
    /// Approval code of the payment.
    pub approval_code: String,
    /// Merchant order number.
    pub order_id: String,
    /// Amount to complete, reverse or refund.
    pub amount: Decimal,
    /// Currency of the payment.
    pub currency: Currency,
}

impl TryFrom<ChangePaymentParams> for PaymentChange {
    type Error = EpayError;

    /// Checks presence of every field first, then the command name.
    fn try_from(params: ChangePaymentParams) -> Result<Self> {
        let command = required(params.command, "command")?;
        let reference = required(params.reference, "reference")?;
        let approval_code = required(params.approval_code, "approval_code")?;
        let order_id = required(params.order_id, "order_id")?;
        let amount = params.amount.ok_or_else(|| EpayError::MissingRequiredOption("amount".into()))?;
        let currency =
            params.currency.ok_or_else(|| EpayError::MissingRequiredOption("currency".into()))?;

        let command = command.parse()?;
        if amount <= Decimal::ZERO {
            return Err(EpayError::InvalidInput("`amount` must be a positive number".to_owned()));
        }

        Ok(Self { command, reference, approval_code, order_id, amount, currency })
    }
}

fn required(value: Option<String>, field: &str) -> Result<String> {
    value.filter(|v| !v.is_empty()).ok_or_else(|| EpayError::MissingRequiredOption(field.to_owned()))
}

/// Verified result of a successful payment, posted by the gateway to the
/// callback URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderConfirmation {
    /// Time the payment was processed, as reported by the gateway.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    /// Cardholder name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Customer e-mail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mail: Option<String>,
    /// Customer phone.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// Merchant order number.
    pub order_id: String,
    /// Charged amount; the payment result wins over the echoed order.
    pub amount: String,
    /// Currency code of the order.
    pub currency: String,
    /// Merchant identifier the payment was made to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merchant_id: Option<String>,
    /// Approval code, needed for later payment changes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approval_code: Option<String>,
    /// Gateway response code, always `00` here.
    pub response_code: String,
    /// Retrieval reference number, needed for later payment changes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    /// Remaining payment fields (`card`, `Secure`, `card_bin`, `c_hash`, ...).
    #[serde(flatten)]
    pub payment: XmlMap,
}

/// Verified result of a successful payment change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentChangeConfirmation {
    /// Command the gateway applied.
    pub cmd: String,
    /// Retrieval reference number.
    pub reference: String,
    /// Approval code.
    pub approval_code: String,
    /// Merchant order number.
    pub order_id: String,
    /// Amount the command applied to.
    pub amount: String,
    /// Currency code.
    pub currency: String,
    /// Fields of the gateway `response` element (`code`, `message`,
    /// `remaining_amount`, ...).
    #[serde(flatten)]
    pub response: XmlMap,
}

/// Renders an amount the way the gateway expects (`500`, `10.5`).
#[must_use]
pub fn format_amount(amount: Decimal) -> String {
    amount.normalize().to_string()
}
