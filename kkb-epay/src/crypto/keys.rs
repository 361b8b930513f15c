//! Loading RSA keys from PEM files.
//!
//! The gateway issues merchants a private key in the legacy OpenSSL format
//! (`RSA PRIVATE KEY` with `Proc-Type`/`DEK-Info` headers, 3DES-CBC) together with
//! an X.509 certificate, and publishes its own certificate for response
//! verification. Modern PKCS#8 and SPKI encodings are accepted as well.

use std::path::Path;

use cipher::{BlockDecryptMut, KeyIvInit, block_padding::Pkcs7};
use der::{DecodePem, Encode};
use md5::{Digest, Md5};
use pem::Pem;
use rsa::{
    RsaPrivateKey, RsaPublicKey,
    pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey},
    pkcs8::{DecodePrivateKey, DecodePublicKey},
};
use tracing::debug;
use x509_cert::Certificate;
use zeroize::Zeroizing;

use crate::error::{EpayError, Result};

type TdesCbcDec = cbc::Decryptor<des::TdesEde3>;

const TDES_KEY_LEN: usize = 24;
const TDES_IV_LEN: usize = 8;

/// Reads a key or certificate file as text.
///
/// # Errors
///
/// Returns [`EpayError::Io`] carrying `path` if the file cannot be read.
pub async fn read_key_file(path: &Path) -> Result<String> {
    let text = tokio::fs::read_to_string(path).await.map_err(|e| EpayError::io(path, e))?;
    debug!(path = %path.display(), bytes = text.len(), "read key file");
    Ok(text)
}

/// Reads and decodes a private key file.
///
/// # Errors
///
/// Returns [`EpayError::Io`] if the file cannot be read and
/// [`EpayError::CryptoError`] if it cannot be decoded with `passphrase`.
pub async fn load_private_key(path: &Path, passphrase: &str) -> Result<RsaPrivateKey> {
    let pem = Zeroizing::new(read_key_file(path).await?);
    decode_private_key(&pem, passphrase)
}

/// Reads and decodes a public key or certificate file.
///
/// # Errors
///
/// Returns [`EpayError::Io`] if the file cannot be read and
/// [`EpayError::CryptoError`] if it holds no RSA public key.
pub async fn load_public_key(path: &Path) -> Result<RsaPublicKey> {
    let pem = read_key_file(path).await?;
    decode_public_key(&pem)
}

/// Decodes a PEM-encoded RSA private key.
///
/// Supported labels:
/// - `RSA PRIVATE KEY`, plain or encrypted with `DEK-Info: DES-EDE3-CBC`
/// - `ENCRYPTED PRIVATE KEY` (PKCS#8, PBES2)
/// - `PRIVATE KEY` (PKCS#8)
///
/// `passphrase` is ignored for unencrypted keys.
///
/// # Errors
///
/// Returns [`EpayError::CryptoError`] for unsupported formats, a wrong passphrase
/// or a key that is not RSA.
pub fn decode_private_key(pem: &str, passphrase: &str) -> Result<RsaPrivateKey> {
    let block = parse_block(pem)?;
    match block.tag() {
        "RSA PRIVATE KEY" if is_legacy_encrypted(&block) => {
            let der = decrypt_legacy(&block, passphrase)?;
            RsaPrivateKey::from_pkcs1_der(&der).map_err(|e| {
                EpayError::CryptoError(format!("failed to decode private key, check the passphrase: {e}"))
            })
        }
        "RSA PRIVATE KEY" => RsaPrivateKey::from_pkcs1_pem(pem)
            .map_err(|e| EpayError::CryptoError(format!("invalid PKCS#1 private key: {e}"))),
        "ENCRYPTED PRIVATE KEY" => RsaPrivateKey::from_pkcs8_encrypted_pem(pem, passphrase).map_err(|e| {
            EpayError::CryptoError(format!(
                "failed to decrypt PKCS#8 private key, check the passphrase: {e}"
            ))
        }),
        "PRIVATE KEY" => RsaPrivateKey::from_pkcs8_pem(pem)
            .map_err(|e| EpayError::CryptoError(format!("invalid PKCS#8 private key: {e}"))),
        other => Err(EpayError::CryptoError(format!("unsupported private key PEM label `{other}`"))),
    }
}

/// Decodes a PEM-encoded RSA public key.
///
/// Accepts an X.509 `CERTIFICATE` (its subject key is used, the certificate
/// itself is not validated), a `PUBLIC KEY` (SPKI) or an `RSA PUBLIC KEY` (PKCS#1).
///
/// # Errors
///
/// Returns [`EpayError::CryptoError`] if no RSA public key can be extracted.
pub fn decode_public_key(pem: &str) -> Result<RsaPublicKey> {
    let block = parse_block(pem)?;
    match block.tag() {
        "CERTIFICATE" => {
            let cert = Certificate::from_pem(pem)
                .map_err(|e| EpayError::CryptoError(format!("failed to parse X.509 certificate: {e}")))?;
            let spki = cert
                .tbs_certificate
                .subject_public_key_info
                .to_der()
                .map_err(|e| EpayError::CryptoError(format!("failed to encode SPKI: {e}")))?;
            RsaPublicKey::from_public_key_der(&spki).map_err(|e| {
                EpayError::CryptoError(format!("certificate does not carry an RSA key: {e}"))
            })
        }
        "PUBLIC KEY" => RsaPublicKey::from_public_key_pem(pem)
            .map_err(|e| EpayError::CryptoError(format!("invalid RSA public key: {e}"))),
        "RSA PUBLIC KEY" => RsaPublicKey::from_pkcs1_pem(pem)
            .map_err(|e| EpayError::CryptoError(format!("invalid PKCS#1 public key: {e}"))),
        other => Err(EpayError::CryptoError(format!("unsupported public key PEM label `{other}`"))),
    }
}

/// Parses the first PEM block in `pem`, keeping RFC 1421 headers.
fn parse_block(pem: &str) -> Result<Pem> {
    pem::parse(pem).map_err(|e| EpayError::CryptoError(format!("invalid PEM: {e}")))
}

fn is_legacy_encrypted(block: &Pem) -> bool {
    block.headers().get("Proc-Type").is_some_and(|v| v.contains("ENCRYPTED"))
}

/// Decrypts a `Proc-Type: 4,ENCRYPTED` PKCS#1 body.
fn decrypt_legacy(block: &Pem, passphrase: &str) -> Result<Zeroizing<Vec<u8>>> {
    let dek_info = block
        .headers()
        .get("DEK-Info")
        .ok_or_else(|| EpayError::CryptoError("encrypted key has no DEK-Info header".to_owned()))?;
    let (algorithm, iv_hex) = dek_info
        .split_once(',')
        .ok_or_else(|| EpayError::CryptoError(format!("malformed DEK-Info `{dek_info}`")))?;
    if !algorithm.trim().eq_ignore_ascii_case("DES-EDE3-CBC") {
        return Err(EpayError::CryptoError(format!(
            "unsupported PEM encryption `{}`",
            algorithm.trim()
        )));
    }

    let iv = hex::decode(iv_hex.trim())
        .map_err(|e| EpayError::CryptoError(format!("invalid DEK-Info IV: {e}")))?;
    if iv.len() != TDES_IV_LEN {
        return Err(EpayError::CryptoError(format!(
            "DEK-Info IV must be {TDES_IV_LEN} bytes, got {}",
            iv.len()
        )));
    }

    let key = evp_bytes_to_key(passphrase.as_bytes(), &iv, TDES_KEY_LEN);
    let decryptor = TdesCbcDec::new_from_slices(&key, &iv)
        .map_err(|e| EpayError::CryptoError(format!("3DES-CBC init failed: {e}")))?;

    let mut buf = Zeroizing::new(block.contents().to_vec());
    let len = decryptor
        .decrypt_padded_mut::<Pkcs7>(&mut buf)
        .map_err(|_| {
            EpayError::CryptoError("failed to decrypt private key, check the passphrase".to_owned())
        })?
        .len();
    buf.truncate(len);
    Ok(buf)
}

/// OpenSSL `EVP_BytesToKey` with MD5, one iteration, salt taken from the IV.
fn evp_bytes_to_key(passphrase: &[u8], salt: &[u8], len: usize) -> Zeroizing<Vec<u8>> {
    let mut key = Zeroizing::new(Vec::with_capacity(len + 16));
    let mut previous = Vec::new();
    while key.len() < len {
        let mut hasher = Md5::new();
        hasher.update(&previous);
        hasher.update(passphrase);
        hasher.update(&salt[..salt.len().min(8)]);
        previous = hasher.finalize().to_vec();
        key.extend_from_slice(&previous);
    }
    key.truncate(len);
    key
}
