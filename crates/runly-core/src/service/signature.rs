//! SignatureScheme trait for sealing and verifying assets.
//!
//! Keys and signatures cross this boundary hex-encoded, which is how they
//! are stored in the asset and in the operator profile.

use runly_types::error::{SigningError, VerificationError};
use secrecy::SecretString;

pub trait SignatureScheme: Send + Sync {
    /// Sign `message` with a hex-encoded private key, returning a hex signature.
    fn sign(&self, private_key_hex: &SecretString, message: &[u8]) -> Result<String, SigningError>;

    /// Check a hex signature over `message` against a hex public key.
    ///
    /// Returns `Ok(false)` when the signature is well-formed but does not
    /// match; malformed encodings are errors.
    fn verify(
        &self,
        public_key_hex: &str,
        message: &[u8],
        signature_hex: &str,
    ) -> Result<bool, VerificationError>;
}
