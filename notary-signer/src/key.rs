//! RSA key loading, mirroring the PEM-loading shape of
//! `proxy-server/src/proxy.rs::load_signing_key` (there: SEC1/PKCS8 ECDSA;
//! here: PKCS#1/PKCS#8 RSA, since the wire format is RSA-MD5).

use crate::error::SignerError;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::RsaPrivateKey;
use std::fs;

/// Load an RSA private key from a PEM file, trying PKCS#1 then PKCS#8.
pub fn load_private_key(path: &str) -> Result<RsaPrivateKey, SignerError> {
    let pem = fs::read_to_string(path)
        .map_err(|e| SignerError::KeyLoad(format!("failed to read {path}: {e}")))?;

    if let Ok(key) = RsaPrivateKey::from_pkcs1_pem(&pem) {
        return Ok(key);
    }
    RsaPrivateKey::from_pkcs8_pem(&pem).map_err(|e| {
        SignerError::KeyLoad(format!(
            "{path} is neither valid PKCS#1 nor PKCS#8 RSA PEM: {e}"
        ))
    })
}

/// Load the matching RSA public key (published at `/index.html`).
pub fn load_public_key_pem(path: &str) -> Result<String, SignerError> {
    fs::read_to_string(path).map_err(|e| SignerError::KeyLoad(format!("failed to read {path}: {e}")))
}
