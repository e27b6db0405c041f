//! Asset commands: check and build.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use console::style;

use runly_core::loader::save_path;
use runly_core::service::identity::IdentityProvider;
use runly_core::validator::validate_all;
use runly_types::asset::Document;
use runly_types::error::VerificationError;

use crate::state::AppState;

/// Load `file` and run every validation pass, reporting all violations.
pub fn load_valid_document(state: &AppState, file: &Path, json: bool) -> Result<Document> {
    let document = state
        .loader
        .load_path(file)
        .with_context(|| format!("Failed to load {}", file.display()))?;

    let violations = validate_all(&document);
    if !violations.is_empty() {
        if !json {
            println!();
            for violation in &violations {
                println!("  {} {violation}", style("✗").red().bold());
            }
            println!();
        }
        bail!(
            "{} failed validation with {} error(s); first: {}",
            file.display(),
            violations.len(),
            violations[0]
        );
    }

    Ok(document)
}

/// Warn when the asset asks for a newer runtime than this binary.
pub fn check_runtime(document: &Document) -> Result<bool> {
    let runtime = semver::Version::parse(env!("CARGO_PKG_VERSION"))?;
    let supported = document
        .manifest
        .supports_runtime(&runtime)
        .with_context(|| format!("Invalid min_runtime '{}'", document.manifest.min_runtime))?;
    if !supported {
        tracing::warn!(
            min_runtime = %document.manifest.min_runtime,
            %runtime,
            "asset requires a newer runtime"
        );
    }
    Ok(supported)
}

// ---------------------------------------------------------------------------
// Check
// ---------------------------------------------------------------------------

pub fn handle_check(state: &AppState, file: &Path, unsigned: bool, json: bool) -> Result<()> {
    let document = load_valid_document(state, file, json)?;
    let runtime_ok = check_runtime(&document)?;

    let signature = if unsigned {
        None
    } else {
        let verified = match state.compiler.verify(&document) {
            Ok(verified) => verified,
            Err(VerificationError::MissingSignature) => {
                bail!("{} is not signed; run `runly build` first", file.display())
            }
            Err(err) => return Err(err).context("Signature verification failed"),
        };
        if !verified {
            bail!(
                "Signature of {} does not match its content or creator key",
                file.display()
            );
        }
        Some(state.compiler.content_hash(&document)?)
    };

    let manifest = &document.manifest;
    if json {
        let out = serde_json::json!({
            "valid": true,
            "verified": signature.is_some(),
            "hash": signature,
            "urn": manifest.urn,
            "title": manifest.title,
            "version": manifest.version,
            "creator": manifest.creator.me_id,
            "runtime_supported": runtime_ok,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!();
    match &signature {
        Some(hash) => println!(
            "  {} Asset is valid and signed ({})",
            style("✓").green().bold(),
            style(hash.chars().take(12).collect::<String>()).dim()
        ),
        None => println!("  {} Asset is valid", style("✓").green().bold()),
    }
    println!("  Title:   {}", style(&manifest.title).cyan());
    println!("  URN:     {}", manifest.urn);
    println!("  Version: {} ({})", manifest.version, manifest.status);
    if !manifest.creator.me_id.is_empty() {
        println!("  Creator: {}", manifest.creator.me_id);
    }
    if !runtime_ok {
        println!(
            "  {} Requires runtime {} or newer",
            style("!").yellow().bold(),
            manifest.min_runtime
        );
    }
    println!();

    Ok(())
}

// ---------------------------------------------------------------------------
// Build
// ---------------------------------------------------------------------------

pub fn handle_build(
    state: &AppState,
    file: &Path,
    output: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let identity = state.profiles.active_identity().context(
        "Cannot sign without a keypair; run `runly keys generate` first",
    )?;

    let mut document = load_valid_document(state, file, json)?;
    let hash = state
        .compiler
        .seal(&mut document, &identity)
        .context("Failed to sign asset")?;

    let output = output.unwrap_or_else(|| PathBuf::from(&state.config.output_file));
    save_path(&document, &output)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    tracing::debug!(output = %output.display(), "wrote sealed asset");

    if json {
        let out = serde_json::json!({
            "output": output.display().to_string(),
            "hash": hash,
            "signature": document.security.signature,
            "creator": document.manifest.creator.me_id,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!();
        println!(
            "  {} Sealed '{}'",
            style("*").green().bold(),
            style(&document.manifest.title).cyan()
        );
        println!("  Output:  {}", output.display());
        println!("  Hash:    {}", style(&hash).dim());
        println!("  Creator: {}", document.manifest.creator.me_id);
        println!();
    }

    Ok(())
}
