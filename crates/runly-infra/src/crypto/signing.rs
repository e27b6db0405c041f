//! Ed25519 asset signatures.
//!
//! Private keys are stored as the hex-encoded 32-byte seed, public keys and
//! signatures as plain hex. Implements `SignatureScheme` from `runly-core`.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::RngCore;
use rand::rngs::OsRng;
use secrecy::{ExposeSecret, SecretString};

use runly_core::service::signature::SignatureScheme;
use runly_types::error::{SigningError, VerificationError};

/// Ed25519 implementation of `SignatureScheme`.
#[derive(Debug, Default, Clone, Copy)]
pub struct Ed25519SignatureScheme;

impl Ed25519SignatureScheme {
    pub fn new() -> Self {
        Self
    }
}

impl SignatureScheme for Ed25519SignatureScheme {
    fn sign(&self, private_key_hex: &SecretString, message: &[u8]) -> Result<String, SigningError> {
        let signing_key = signing_key_from_hex(private_key_hex)?;
        let signature = signing_key.sign(message);
        Ok(hex::encode(signature.to_bytes()))
    }

    fn verify(
        &self,
        public_key_hex: &str,
        message: &[u8],
        signature_hex: &str,
    ) -> Result<bool, VerificationError> {
        let key_bytes: [u8; 32] =
            decode_fixed(public_key_hex).map_err(VerificationError::InvalidPublicKey)?;
        let verifying_key = VerifyingKey::from_bytes(&key_bytes)
            .map_err(|e| VerificationError::InvalidPublicKey(e.to_string()))?;

        let sig_bytes = hex::decode(signature_hex.trim())
            .map_err(|e| VerificationError::InvalidSignature(e.to_string()))?;
        let signature = Signature::from_slice(&sig_bytes)
            .map_err(|e| VerificationError::InvalidSignature(e.to_string()))?;

        Ok(verifying_key.verify(message, &signature).is_ok())
    }
}

/// A freshly generated keypair, hex-encoded.
#[derive(Debug)]
pub struct GeneratedKeypair {
    pub public_key_hex: String,
    pub private_key_hex: SecretString,
}

/// Generate a new Ed25519 keypair from the OS random source.
pub fn generate_keypair() -> GeneratedKeypair {
    let mut seed = [0u8; 32];
    OsRng.fill_bytes(&mut seed);
    let signing_key = SigningKey::from_bytes(&seed);

    GeneratedKeypair {
        public_key_hex: hex::encode(signing_key.verifying_key().to_bytes()),
        private_key_hex: SecretString::from(hex::encode(seed)),
    }
}

fn signing_key_from_hex(private_key_hex: &SecretString) -> Result<SigningKey, SigningError> {
    let seed: [u8; 32] =
        decode_fixed(private_key_hex.expose_secret()).map_err(SigningError::InvalidKey)?;
    Ok(SigningKey::from_bytes(&seed))
}

fn decode_fixed<const N: usize>(encoded: &str) -> Result<[u8; N], String> {
    let bytes = hex::decode(encoded.trim()).map_err(|e| e.to_string())?;
    let len = bytes.len();
    bytes
        .try_into()
        .map_err(|_| format!("expected {N} bytes, got {len}"))
}
