//! Canonicalization, hashing and signing of assets.
//!
//! The canonical form is the document serialized to JSON with every object's
//! keys sorted and `security.signature` blanked. The digest of those bytes is
//! hex-encoded, and it is that hex text (not the raw canonical bytes) which
//! gets signed.

use std::sync::Arc;

use runly_types::asset::Document;
use runly_types::error::{SigningError, VerificationError};
use runly_types::identity::OperatorIdentity;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;

use crate::service::hash::ContentHasher;
use crate::service::signature::SignatureScheme;

/// Builds and verifies sealed assets.
pub struct Compiler {
    hasher: Arc<dyn ContentHasher>,
    signer: Arc<dyn SignatureScheme>,
}

impl Compiler {
    pub fn new(hasher: Arc<dyn ContentHasher>, signer: Arc<dyn SignatureScheme>) -> Self {
        Self { hasher, signer }
    }

    /// Seal `document` with `private_key_hex`.
    ///
    /// On success `security.hash_algo` and `security.signature` are written
    /// and the content digest is returned. On failure the document is left
    /// as it was.
    pub fn build(
        &self,
        document: &mut Document,
        private_key_hex: &SecretString,
    ) -> Result<String, SigningError> {
        if private_key_hex.expose_secret().trim().is_empty() {
            return Err(SigningError::MissingKey);
        }

        let algo = self.hasher.algorithm().to_string();
        let bytes = canonical_bytes_with(document, Some(&algo))
            .map_err(|e| SigningError::Canonicalization(e.to_string()))?;
        let digest = self.hasher.compute_hash(&bytes);
        let signature = self.signer.sign(private_key_hex, digest.as_bytes())?;

        document.security.hash_algo = algo;
        document.security.signature = signature;

        tracing::info!(urn = %document.manifest.urn, hash = %digest, "asset sealed");
        Ok(digest)
    }

    /// Re-stamp the creator from `identity`, then [`build`](Self::build).
    pub fn seal(
        &self,
        document: &mut Document,
        identity: &OperatorIdentity,
    ) -> Result<String, SigningError> {
        document.manifest.creator.me_id = identity.me_id.clone();
        document.manifest.creator.pub_key = identity.public_key_hex.clone();
        self.build(document, &identity.private_key_hex)
    }

    /// Check the document's signature against `manifest.creator.pub_key`.
    ///
    /// The caller's document is never modified.
    pub fn verify(&self, document: &Document) -> Result<bool, VerificationError> {
        let signature = &document.security.signature;
        if signature.is_empty() {
            return Err(VerificationError::MissingSignature);
        }

        let digest = self
            .content_hash(document)
            .map_err(|e| VerificationError::Canonicalization(e.to_string()))?;
        let valid = self.signer.verify(
            &document.manifest.creator.pub_key,
            digest.as_bytes(),
            signature,
        )?;

        tracing::debug!(urn = %document.manifest.urn, hash = %digest, valid, "verified asset seal");
        Ok(valid)
    }

    /// Digest of the canonical form, exactly as `build` and `verify` compute it.
    pub fn content_hash(&self, document: &Document) -> Result<String, serde_json::Error> {
        let bytes = canonical_bytes(document)?;
        Ok(self.hasher.compute_hash(&bytes))
    }
}

/// Canonical encoding of `document` with the signature blanked.
pub fn canonical_bytes(document: &Document) -> Result<Vec<u8>, serde_json::Error> {
    canonical_bytes_with(document, None)
}

fn canonical_bytes_with(
    document: &Document,
    hash_algo: Option<&str>,
) -> Result<Vec<u8>, serde_json::Error> {
    let mut value = serde_json::to_value(document)?;
    if let Some(security) = value.get_mut("security").and_then(Value::as_object_mut) {
        security.insert("signature".to_string(), Value::String(String::new()));
        if let Some(algo) = hash_algo {
            security.insert("hash_algo".to_string(), Value::String(algo.to_string()));
        }
    }
    serde_json::to_vec(&sort_keys(value))
}

fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(entries.into_iter().map(|(k, v)| (k, sort_keys(v))).collect())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    /// Deterministic non-cryptographic stand-in for the SHA-256 adapter.
    struct SipHasher;

    impl ContentHasher for SipHasher {
        fn algorithm(&self) -> &str {
            "TEST-SIP"
        }

        fn compute_hash(&self, content: &[u8]) -> String {
            let mut h = DefaultHasher::new();
            content.hash(&mut h);
            format!("{:016x}", h.finish())
        }
    }

    /// Toy scheme: the public key equals the private key and the signature
    /// is the plain text `key:message`.
    struct EchoScheme;

    impl SignatureScheme for EchoScheme {
        fn sign(&self, key: &SecretString, message: &[u8]) -> Result<String, SigningError> {
            let key = key.expose_secret();
            if key.contains(':') {
                return Err(SigningError::InvalidKey("colon in key".to_string()));
            }
            Ok(format!("{key}:{}", String::from_utf8_lossy(message)))
        }

        fn verify(&self, public_key: &str, message: &[u8], signature: &str) -> Result<bool, VerificationError> {
            if public_key.is_empty() {
                return Err(VerificationError::InvalidPublicKey("empty".to_string()));
            }
            Ok(signature == format!("{public_key}:{}", String::from_utf8_lossy(message)))
        }
    }

    fn compiler() -> Compiler {
        Compiler::new(Arc::new(SipHasher), Arc::new(EchoScheme))
    }

    fn document() -> Document {
        serde_yaml_ng::from_str(
            r#"
manifest:
  urn: "urn:runly:test:compiler"
  title: Compiler
  version: "1.0.0"
  status: draft
  creator: { me_id: "", name: Ada, pub_key: "" }
dictionary:
  inputs:
    - name: x
      type: string
topology:
  start_at: done
  nodes:
    - id: done
      type: TERMINUS
      config: { artifact_ref: out, data_source: inputs.x }
commerce:
  pricing: { mode: PAY_PER_USE, amount: 2.5, currency: EUR }
security: { hash_algo: "", signature: "" }
"#,
        )
        .unwrap()
    }

    fn identity() -> OperatorIdentity {
        OperatorIdentity {
            me_id: "me_42".to_string(),
            public_key_hex: "k1".to_string(),
            private_key_hex: SecretString::from("k1".to_string()),
        }
    }

    #[test]
    fn test_canonical_bytes_sorted_and_signature_blank() {
        let mut doc = document();
        doc.security.signature = "deadbeef".to_string();
        let bytes = canonical_bytes(&doc).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains(r#""signature":"""#));
        assert!(!text.contains("deadbeef"));
        // top-level keys in lexical order
        let commerce = text.find(r#""commerce""#).unwrap();
        let manifest = text.find(r#""manifest""#).unwrap();
        let topology = text.find(r#""topology""#).unwrap();
        assert!(commerce < manifest && manifest < topology);
    }

    #[test]
    fn test_canonical_bytes_independent_of_signature() {
        let mut doc = document();
        let before = canonical_bytes(&doc).unwrap();
        doc.security.signature = "anything".to_string();
        assert_eq!(before, canonical_bytes(&doc).unwrap());
    }

    #[test]
    fn test_build_is_deterministic() {
        let mut a = document();
        let mut b = document();
        let key = SecretString::from("k1".to_string());
        let h1 = compiler().build(&mut a, &key).unwrap();
        let h2 = compiler().build(&mut b, &key).unwrap();
        assert_eq!(h1, h2);
        assert_eq!(a.security, b.security);
        assert_eq!(a.security.hash_algo, "TEST-SIP");
    }

    #[test]
    fn test_build_rejects_empty_key() {
        let mut doc = document();
        let err = compiler().build(&mut doc, &SecretString::from("  ".to_string())).unwrap_err();
        assert!(matches!(err, SigningError::MissingKey));
        assert!(doc.security.signature.is_empty());
    }

    #[test]
    fn test_build_failure_leaves_document_untouched() {
        let mut doc = document();
        let before = doc.clone();
        let err = compiler().build(&mut doc, &SecretString::from("bad:key".to_string())).unwrap_err();
        assert!(matches!(err, SigningError::InvalidKey(_)));
        assert_eq!(doc, before);
    }

    #[test]
    fn test_seal_then_verify_round_trip() {
        let compiler = compiler();
        let mut doc = document();
        let hash = compiler.seal(&mut doc, &identity()).unwrap();

        assert_eq!(doc.manifest.creator.me_id, "me_42");
        assert_eq!(doc.manifest.creator.pub_key, "k1");
        assert_eq!(compiler.content_hash(&doc).unwrap(), hash);
        assert!(compiler.verify(&doc).unwrap());
    }

    #[test]
    fn test_verify_detects_tampering() {
        let compiler = compiler();
        let mut doc = document();
        compiler.seal(&mut doc, &identity()).unwrap();

        doc.manifest.title = "Compiler (edited)".to_string();
        assert!(!compiler.verify(&doc).unwrap());
    }

    #[test]
    fn test_verify_does_not_mutate_document() {
        let compiler = compiler();
        let mut doc = document();
        compiler.seal(&mut doc, &identity()).unwrap();
        doc.commerce.pricing.amount = 9.0;

        let before = doc.clone();
        assert!(!compiler.verify(&doc).unwrap());
        assert_eq!(doc, before);
    }

    #[test]
    fn test_verify_requires_signature() {
        let err = compiler().verify(&document()).unwrap_err();
        assert!(matches!(err, VerificationError::MissingSignature));
    }

    #[test]
    fn test_verify_surfaces_key_errors() {
        let compiler = compiler();
        let mut doc = document();
        compiler.seal(&mut doc, &identity()).unwrap();
        doc.manifest.creator.pub_key.clear();
        let err = compiler.verify(&doc).unwrap_err();
        assert!(matches!(err, VerificationError::InvalidPublicKey(_)));
    }
}
