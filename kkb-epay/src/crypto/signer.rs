//! RSA-SHA1 signatures with the gateway's byte-order inversion.

use std::fmt;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use rsa::{
    RsaPrivateKey, RsaPublicKey,
    pkcs1v15::{Signature, SigningKey, VerifyingKey},
    signature::{SignatureEncoding, Signer, Verifier},
};
use sha1::Sha1;
use tracing::{instrument, trace};

use super::keys::{decode_private_key, decode_public_key};
use crate::error::{EpayError, Result};

/// Signs payloads with the merchant private key.
///
/// Produces PKCS#1 v1.5 RSA signatures over a SHA-1 digest, base64 encoded. When
/// `invert` is set, the raw signature bytes are reversed before encoding, which is
/// the convention of the production gateway.
///
/// # Examples
///
/// ```no_run
/// use kkb_epay::crypto::RsaSigner;
///
/// # fn example(pem: &str) -> kkb_epay::error::Result<()> {
/// let signer = RsaSigner::from_pem(pem, "nissan", true)?;
/// let signature = signer.sign(b"<merchant/>")?;
/// assert!(!signature.is_empty());
/// # Ok(())
/// # }
/// ```
pub struct RsaSigner {
    key: RsaPrivateKey,
    invert: bool,
}

impl fmt::Debug for RsaSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RsaSigner").field("invert", &self.invert).finish_non_exhaustive()
    }
}

impl RsaSigner {
    /// Creates a signer from a decoded key.
    #[must_use]
    pub const fn new(key: RsaPrivateKey, invert: bool) -> Self {
        Self { key, invert }
    }

    /// Creates a signer from PEM key material and its passphrase.
    ///
    /// # Errors
    ///
    /// Returns [`EpayError::CryptoError`] if the key cannot be decoded.
    pub fn from_pem(pem: &str, passphrase: &str, invert: bool) -> Result<Self> {
        Ok(Self::new(decode_private_key(pem, passphrase)?, invert))
    }

    /// Signs `payload`, returning the base64 signature.
    ///
    /// # Errors
    ///
    /// Returns [`EpayError::CryptoError`] if the RSA operation fails.
    #[instrument(skip_all, fields(payload_len = payload.as_ref().len(), invert = self.invert))]
    pub fn sign(&self, payload: impl AsRef<[u8]>) -> Result<String> {
        let signing_key = SigningKey::<Sha1>::new(self.key.clone());
        let signature = signing_key
            .try_sign(payload.as_ref())
            .map_err(|e| EpayError::CryptoError(format!("RSA-SHA1 signing failed: {e}")))?;

        let mut bytes = signature.to_vec();
        if self.invert {
            bytes.reverse();
        }
        trace!(signature_len = bytes.len(), "payload signed");
        Ok(STANDARD.encode(bytes))
    }

    /// Returns the public half of the signing key.
    #[must_use]
    pub fn public_key(&self) -> RsaPublicKey {
        self.key.to_public_key()
    }

    /// Returns whether signatures are byte-reversed.
    #[must_use]
    pub const fn invert(&self) -> bool {
        self.invert
    }
}

/// Verifies base64 RSA-SHA1 signatures against one trusted public key.
///
/// Mirror of [`RsaSigner`]: the decoded bytes are reversed first when `invert` is
/// set. A signature that does not match is a normal `false` outcome.
#[derive(Debug, Clone)]
pub struct RsaVerifier {
    key: RsaPublicKey,
    invert: bool,
}

impl RsaVerifier {
    /// Creates a verifier from a decoded key.
    #[must_use]
    pub const fn new(key: RsaPublicKey, invert: bool) -> Self {
        Self { key, invert }
    }

    /// Creates a verifier from a PEM certificate or public key.
    ///
    /// # Errors
    ///
    /// Returns [`EpayError::CryptoError`] if no RSA public key can be extracted.
    pub fn from_pem(pem: &str, invert: bool) -> Result<Self> {
        Ok(Self::new(decode_public_key(pem)?, invert))
    }

    /// Checks `signature` over `payload`.
    ///
    /// Returns `false` for malformed base64, a wrong signature length, a tampered
    /// payload or a different signer. Whitespace inside `signature` is ignored.
    #[must_use]
    #[instrument(skip_all, fields(payload_len = payload.as_ref().len(), invert = self.invert))]
    pub fn verify(&self, payload: impl AsRef<[u8]>, signature: &str) -> bool {
        let compact: String = signature.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        let Ok(mut bytes) = STANDARD.decode(compact) else {
            trace!("signature is not valid base64");
            return false;
        };
        if self.invert {
            bytes.reverse();
        }
        let Ok(signature) = Signature::try_from(bytes.as_slice()) else {
            return false;
        };

        let verifying_key = VerifyingKey::<Sha1>::new(self.key.clone());
        verifying_key.verify(payload.as_ref(), &signature).is_ok()
    }

    /// Returns the trusted public key.
    #[must_use]
    pub const fn public_key(&self) -> &RsaPublicKey {
        &self.key
    }
}
