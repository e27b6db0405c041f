//! Asset loading: secret injection followed by YAML parsing.
//!
//! `{{env.NAME}}` placeholders are substituted on the raw text before the
//! YAML parser sees it, so a secret can appear anywhere in the document.
//! Placeholders whose variable is unset are left untouched.

use std::path::Path;
use std::sync::LazyLock;

use regex::bytes::{Captures, Regex};
use runly_types::asset::Document;
use runly_types::error::LoadError;

/// `{{ env.NAME }}` with `NAME` restricted to `[a-zA-Z0-9_]+`.
static ENV_PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*env\.([a-zA-Z0-9_]+)\s*\}\}").expect("env placeholder pattern is a valid regex")
});

type SecretSource = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Reads asset files, resolving `{{env.NAME}}` secrets on the way in.
pub struct Loader {
    secrets: SecretSource,
}

impl Loader {
    /// A loader that resolves secrets from the process environment.
    pub fn new() -> Self {
        Self::with_secret_source(|name| std::env::var(name).ok())
    }

    /// A loader with a custom secret lookup (tests, vault adapters).
    pub fn with_secret_source<F>(source: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            secrets: Box::new(source),
        }
    }

    /// Read and parse the asset at `path`.
    pub fn load_path(&self, path: &Path) -> Result<Document, LoadError> {
        let raw = std::fs::read(path).map_err(|source| LoadError::Read {
            path: path.display().to_string(),
            source,
        })?;
        tracing::debug!(path = %path.display(), bytes = raw.len(), "read asset file");
        self.load_bytes(&raw)
    }

    /// Parse an asset from raw bytes after secret injection.
    pub fn load_bytes(&self, raw: &[u8]) -> Result<Document, LoadError> {
        let injected = self.inject_secrets(raw);
        serde_yaml_ng::from_slice(&injected).map_err(|e| LoadError::Parse(e.to_string()))
    }

    /// Substitute every resolvable `{{env.NAME}}` placeholder in `raw`.
    pub fn inject_secrets(&self, raw: &[u8]) -> Vec<u8> {
        ENV_PLACEHOLDER
            .replace_all(raw, |caps: &Captures| {
                let name = String::from_utf8_lossy(&caps[1]);
                match (self.secrets)(&name) {
                    Some(value) => value.into_bytes(),
                    None => {
                        tracing::debug!(variable = %name, "secret not set, leaving placeholder");
                        caps[0].to_vec()
                    }
                }
            })
            .into_owned()
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

/// Serialize a document to YAML text.
pub fn to_yaml(document: &Document) -> Result<String, LoadError> {
    serde_yaml_ng::to_string(document).map_err(|e| LoadError::Serialize(e.to_string()))
}

/// Write a document to `path` as YAML.
pub fn save_path(document: &Document, path: &Path) -> Result<(), LoadError> {
    let text = to_yaml(document)?;
    std::fs::write(path, text).map_err(|source| LoadError::Write {
        path: path.display().to_string(),
        source,
    })?;
    tracing::debug!(path = %path.display(), "wrote asset file");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const ASSET: &str = r#"
manifest:
  urn: "urn:runly:test:loader"
  title: "Loader test"
  version: "1.0.0"
  status: draft
skills:
  - id: crm
    type: HTTP
    config:
      endpoint: "https://crm.example.com/query"
      method: POST
      timeout: 5000
      max_retries: 1
      headers:
        Authorization: "Bearer {{env.CRM_TOKEN}}"
        X-Trace: "{{ env.UNSET_TRACE_ID }}"
dictionary:
  inputs:
    - name: x
      type: string
      required: true
topology:
  start_at: done
  nodes:
    - id: done
      type: TERMINUS
      config:
        artifact_ref: out
        data_source: "inputs.x"
      on_success: ""
      on_failure: ""
commerce: {}
security:
  hash_algo: ""
  signature: ""
"#;

    fn fixed_loader(vars: &[(&str, &str)]) -> Loader {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Loader::with_secret_source(move |name| map.get(name).cloned())
    }

    #[test]
    fn test_inject_secrets_substitutes_set_variables() {
        let loader = fixed_loader(&[("CRM_TOKEN", "s3cr3t")]);
        let doc = loader.load_bytes(ASSET.as_bytes()).unwrap();
        let skill = doc.skill("crm").unwrap();
        assert_eq!(skill.config.headers["Authorization"], "Bearer s3cr3t");
    }

    #[test]
    fn test_inject_secrets_leaves_unset_placeholder() {
        let loader = fixed_loader(&[]);
        let doc = loader.load_bytes(ASSET.as_bytes()).unwrap();
        let skill = doc.skill("crm").unwrap();
        assert_eq!(skill.config.headers["Authorization"], "Bearer {{env.CRM_TOKEN}}");
        assert_eq!(skill.config.headers["X-Trace"], "{{ env.UNSET_TRACE_ID }}");
    }

    #[test]
    fn test_inject_secrets_ignores_other_domains() {
        let loader = fixed_loader(&[("x", "nope")]);
        let out = loader.inject_secrets(b"{{ inputs.x }} {{env.x}}");
        assert_eq!(out, b"{{ inputs.x }} nope");
    }

    #[test]
    fn test_loader_reads_process_environment() {
        // SAFETY: test-only env var with a name no other test touches.
        unsafe { std::env::set_var("RUNLY_LOADER_TEST_TOKEN", "from-env") };
        let loader = Loader::new();
        let out = loader.inject_secrets(b"token={{ env.RUNLY_LOADER_TEST_TOKEN }}");
        assert_eq!(out, b"token=from-env");
        // SAFETY: test-only cleanup.
        unsafe { std::env::remove_var("RUNLY_LOADER_TEST_TOKEN") };
    }

    #[test]
    fn test_load_path_missing_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Loader::new()
            .load_path(&dir.path().join("absent.yaml"))
            .unwrap_err();
        assert!(matches!(err, LoadError::Read { .. }));
    }

    #[test]
    fn test_load_bytes_missing_required_section_is_parse_error() {
        let err = Loader::new()
            .load_bytes(b"manifest:\n  urn: x\n")
            .unwrap_err();
        assert!(matches!(err, LoadError::Parse(_)));
    }

    #[test]
    fn test_load_bytes_malformed_yaml_is_parse_error() {
        let err = Loader::new()
            .load_bytes(b"manifest: [unclosed")
            .unwrap_err();
        assert!(matches!(err, LoadError::Parse(_)));
    }

    #[test]
    fn test_save_then_load_preserves_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dist.runly");
        let loader = fixed_loader(&[("CRM_TOKEN", "t")]);
        let doc = loader.load_bytes(ASSET.as_bytes()).unwrap();

        save_path(&doc, &path).unwrap();
        let reloaded = loader.load_path(&path).unwrap();

        assert_eq!(doc, reloaded);
    }
}
