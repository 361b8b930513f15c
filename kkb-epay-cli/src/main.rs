//! KKB ePay CLI: command-line front end for the ePay gateway client.
//!
//! Reads a TOML client configuration and runs one gateway operation per
//! invocation. Results are printed to stdout as JSON; logs go to stderr.
//!
//! ```text
//! kkb-epay --config epay.toml create-order --order-id 000333 --amount 500 \
//!     --callback-url https://shop.kz/cb --success-url https://shop.kz/ok --failure-url https://shop.kz/fail
//! kkb-epay --config epay.toml process-order callback.xml
//! kkb-epay --config epay.toml change-payment --command complete --reference 170202171303 \
//!     --approval-code 171303 --order-id 000333 --amount 500
//! kkb-epay --config epay.toml check
//! ```

#![allow(
    clippy::multiple_crate_versions,
    reason = "transitive dependencies from reqwest and the RustCrypto stack"
)]

mod observability;

use std::{
    io::Read as _,
    path::{Path, PathBuf},
    process::ExitCode,
};

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use kkb_epay::{
    ClientConfig, EpayClient,
    gateway::{ChangePaymentParams, Currency, Language, OrderRequest},
};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::info;

use crate::observability::{HealthReport, HealthStatus, LogFormat, init_observability};

#[derive(Parser)]
#[command(name = "kkb-epay", about = "Client for the Kazkommertsbank ePay payment gateway", version)]
struct Cli {
    /// Client configuration file (TOML)
    #[arg(short, long, default_value = "epay.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sign an order and print the payment page form
    CreateOrder {
        /// Merchant order number, 6 to 15 characters
        #[arg(long)]
        order_id: String,

        /// Amount to charge
        #[arg(long)]
        amount: Decimal,

        /// Currency, numeric (398) or alphabetic (KZT)
        #[arg(long, default_value = "398")]
        currency: Currency,

        /// Customer e-mail
        #[arg(long)]
        email: Option<String>,

        /// URL the gateway posts the payment result to
        #[arg(long)]
        callback_url: String,

        /// URL the customer returns to after payment
        #[arg(long)]
        success_url: String,

        /// URL the customer returns to when payment fails
        #[arg(long)]
        failure_url: String,

        /// Payment page language
        #[arg(long, value_enum)]
        language: Option<LanguageArg>,
    },

    /// Authenticate a payment result posted by the gateway
    ProcessOrder {
        /// Response file, or `-` for stdin
        file: PathBuf,
    },

    /// Complete, reverse or refund a payment
    ChangePayment {
        /// `complete`, `reverse` or `refund`
        #[arg(long)]
        command: Option<String>,

        /// Retrieval reference number of the payment
        #[arg(long)]
        reference: Option<String>,

        /// Approval code of the payment
        #[arg(long)]
        approval_code: Option<String>,

        /// Merchant order number
        #[arg(long)]
        order_id: Option<String>,

        /// Amount the command applies to
        #[arg(long)]
        amount: Option<Decimal>,

        /// Currency, numeric (398) or alphabetic (KZT)
        #[arg(long, default_value = "398")]
        currency: Currency,
    },

    /// Authenticate a payment change response
    ProcessPayment {
        /// Response file, or `-` for stdin
        file: PathBuf,
    },

    /// Check configuration and key material
    Check,
}

#[derive(Clone, Copy, ValueEnum)]
enum LanguageArg {
    Rus,
    Eng,
    Kaz,
}

impl From<LanguageArg> for Language {
    fn from(arg: LanguageArg) -> Self {
        match arg {
            LanguageArg::Rus => Self::Rus,
            LanguageArg::Eng => Self::Eng,
            LanguageArg::Kaz => Self::Kaz,
        }
    }
}

/// Output of `create-order`: where to post and what.
#[derive(Serialize)]
struct CreateOrderOutput<T: Serialize> {
    url: String,
    form: T,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    init_observability(LogFormat::from_env());

    let cli = Cli::parse();
    let config = ClientConfig::from_file(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    let client = EpayClient::new(config)?;

    match cli.command {
        Command::CreateOrder {
            order_id,
            amount,
            currency,
            email,
            callback_url,
            success_url,
            failure_url,
            language,
        } => {
            let form = client
                .create_order(OrderRequest {
                    order_id,
                    amount,
                    currency,
                    email,
                    callback_url,
                    success_url,
                    failure_url,
                    language: language.map(Language::from),
                })
                .await?;
            let url = client.create_order_url()?.to_string();
            print_json(&CreateOrderOutput { url, form })?;
        }
        Command::ProcessOrder { file } => {
            let xml = read_input(&file)?;
            print_json(&client.process_order_response(&xml).await?)?;
        }
        Command::ChangePayment { command, reference, approval_code, order_id, amount, currency } => {
            let params = ChangePaymentParams {
                command,
                reference,
                approval_code,
                order_id,
                amount,
                currency: Some(currency),
            };
            print_json(&client.change_payment(params).await?)?;
        }
        Command::ProcessPayment { file } => {
            let xml = read_input(&file)?;
            print_json(&client.process_change_payment_response(&xml).await?)?;
        }
        Command::Check => {
            let report = HealthReport::collect(&client).await;
            println!("{}", report.to_json()?);
            info!(status = report.status.as_str(), "configuration checked");
            if report.status == HealthStatus::Unhealthy {
                return Ok(ExitCode::FAILURE);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Reads a response document from `path`, or from stdin when `path` is `-`.
fn read_input(path: &Path) -> anyhow::Result<String> {
    let text = if path == Path::new("-") {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text).context("reading stdin")?;
        text
    } else {
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?
    };
    Ok(text.trim().to_owned())
}
