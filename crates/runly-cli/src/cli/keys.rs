//! Signing keypair commands: generate, show.

use anyhow::{Context, Result, bail};
use clap::Subcommand;
use console::style;
use dialoguer::Confirm;

use runly_infra::crypto::signing::generate_keypair;
use runly_types::identity::Profile;

use crate::state::AppState;

#[derive(Subcommand)]
pub enum KeysCommand {
    /// Generate a new Ed25519 keypair for the active profile.
    Generate {
        /// Identity to record instead of one derived from the public key.
        #[arg(long)]
        me_id: Option<String>,

        /// Replace an existing keypair without asking.
        #[arg(long)]
        force: bool,
    },

    /// Show the active profile's identity.
    Show,
}

pub fn handle_keys_command(cmd: KeysCommand, state: &AppState, json: bool) -> Result<()> {
    match cmd {
        KeysCommand::Generate { me_id, force } => handle_generate(state, me_id, force, json),
        KeysCommand::Show => handle_show(state, json),
    }
}

/// Identity derived from the first 12 hex characters of the public key.
pub fn derived_me_id(public_key_hex: &str) -> String {
    let prefix: String = public_key_hex.chars().take(12).collect();
    format!("me_0x{prefix}")
}

fn handle_generate(state: &AppState, me_id: Option<String>, force: bool, json: bool) -> Result<()> {
    let profiles = state.profiles.load()?;
    let existing = profiles.active().filter(|p| p.has_keys());

    if let Some(existing) = existing {
        if !force {
            if json {
                bail!(
                    "Profile '{}' already has a keypair; pass --force to replace it",
                    profiles.active_profile
                );
            }
            let replace = Confirm::new()
                .with_prompt(format!(
                    "Profile '{}' already has key {}. Replace it?",
                    profiles.active_profile,
                    short_key(&existing.public_key)
                ))
                .default(false)
                .interact()?;
            if !replace {
                println!("  Cancelled.");
                return Ok(());
            }
        }
    }

    let pair = generate_keypair();
    let me_id = me_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| derived_me_id(&pair.public_key_hex));

    let profile = state
        .profiles
        .save_keys(&me_id, &pair.public_key_hex, &pair.private_key_hex)
        .context("Failed to store keypair")?;

    tracing::info!(me_id = %profile.me_id, profile = %profiles.active_profile, "generated keypair");

    if json {
        print_identity_json(&profiles.active_profile, &profile)?;
    } else {
        println!();
        println!("  {} Generated a new keypair", style("✓").green().bold());
        print_identity(&profiles.active_profile, &profile);
        println!(
            "  Sign an asset with: {}",
            style("runly build <file>").dim()
        );
        println!();
    }

    Ok(())
}

fn handle_show(state: &AppState, json: bool) -> Result<()> {
    let profiles = state.profiles.load()?;
    let Some(profile) = profiles.active().filter(|p| p.has_keys()) else {
        bail!(
            "Profile '{}' has no keypair; run `runly keys generate`",
            profiles.active_profile
        );
    };

    if json {
        print_identity_json(&profiles.active_profile, profile)?;
    } else {
        println!();
        print_identity(&profiles.active_profile, profile);
        println!();
    }
    Ok(())
}

fn print_identity(profile_name: &str, profile: &Profile) {
    println!("  Profile:    {}", style(profile_name).cyan());
    println!("  MeID:       {}", style(&profile.me_id).bold());
    println!("  Public key: {}", profile.public_key);
    println!("  Server:     {}", profile.me_server);
}

fn print_identity_json(profile_name: &str, profile: &Profile) -> Result<()> {
    let out = serde_json::json!({
        "profile": profile_name,
        "me_id": profile.me_id,
        "public_key": profile.public_key,
        "me_server": profile.me_server,
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

fn short_key(key: &str) -> String {
    if key.chars().count() > 16 {
        format!("{}…", key.chars().take(16).collect::<String>())
    } else {
        key.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_me_id_uses_key_prefix() {
        assert_eq!(derived_me_id("0123456789abcdef0011"), "me_0x0123456789ab");
        assert_eq!(derived_me_id("abc"), "me_0xabc");
    }

    #[test]
    fn test_short_key() {
        assert_eq!(short_key("abcd"), "abcd");
        assert_eq!(short_key(&"f".repeat(64)), format!("{}…", "f".repeat(16)));
    }
}
