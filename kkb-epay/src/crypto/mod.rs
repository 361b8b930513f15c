//! Signing and verification of gateway documents.
//!
//! Outbound `<merchant>` fragments are signed with the merchant private key;
//! inbound `<bank>` sections are verified against the bank's certificate. Both
//! directions use PKCS#1 v1.5 RSA over SHA-1 with an optional reversal of the
//! signature bytes (see [`RsaSigner`]).
//!
//! # Examples
//!
//! ```no_run
//! use kkb_epay::crypto::{RsaSigner, RsaVerifier};
//!
//! # fn example(key_pem: &str, cert_pem: &str) -> kkb_epay::error::Result<()> {
//! let signer = RsaSigner::from_pem(key_pem, "passphrase", true)?;
//! let verifier = RsaVerifier::from_pem(cert_pem, true)?;
//!
//! let signature = signer.sign("<merchant/>")?;
//! assert!(verifier.verify("<merchant/>", &signature));
//! # Ok(())
//! # }
//! ```

pub mod keys;
mod signer;

pub use keys::{decode_private_key, decode_public_key, load_private_key, load_public_key};
pub use signer::{RsaSigner, RsaVerifier};
