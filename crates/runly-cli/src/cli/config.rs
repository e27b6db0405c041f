//! Profile configuration commands: show, use, set, setup.

use anyhow::{Context, Result, bail};
use clap::Subcommand;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use dialoguer::{Input, Password};

use runly_types::identity::Profile;

use crate::state::AppState;

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// List profiles and the runtime settings in effect.
    Show,

    /// Switch the active profile.
    Use {
        /// Profile name (e.g. `cloud`, `local`).
        name: String,
    },

    /// Update fields of the active profile.
    Set {
        /// Access token for the Runly services.
        #[arg(long)]
        token: Option<String>,

        /// Hub server URL.
        #[arg(long)]
        hub: Option<String>,

        /// Me server URL.
        #[arg(long)]
        me: Option<String>,
    },

    /// Interactively edit the active profile.
    Setup,
}

pub fn handle_config_command(cmd: ConfigCommand, state: &AppState, json: bool) -> Result<()> {
    match cmd {
        ConfigCommand::Show => handle_show(state, json),
        ConfigCommand::Use { name } => handle_use(state, &name, json),
        ConfigCommand::Set { token, hub, me } => handle_set(state, token, hub, me, json),
        ConfigCommand::Setup => handle_setup(state, json),
    }
}

/// Mask all but the last four characters.
pub fn mask_token(token: &str) -> String {
    let count = token.chars().count();
    if count == 0 {
        return String::new();
    }
    if count <= 4 {
        return "*".repeat(count);
    }
    let tail: String = token.chars().skip(count - 4).collect();
    format!("{}{tail}", "*".repeat(count - 4))
}

/// Apply the provided fields to `profile`. Returns whether anything changed.
pub fn apply_profile_update(
    profile: &mut Profile,
    token: Option<String>,
    hub: Option<String>,
    me: Option<String>,
) -> bool {
    let mut modified = false;
    if let Some(token) = token.filter(|t| !t.is_empty()) {
        profile.access_token = token;
        modified = true;
    }
    if let Some(hub) = hub.filter(|h| !h.is_empty()) {
        profile.hub_server = hub;
        modified = true;
    }
    if let Some(me) = me.filter(|m| !m.is_empty()) {
        profile.me_server = me;
        modified = true;
    }
    modified
}

fn handle_show(state: &AppState, json: bool) -> Result<()> {
    let profiles = state.profiles.load()?;

    if json {
        let list: Vec<_> = profiles
            .profiles
            .iter()
            .map(|(name, p)| {
                serde_json::json!({
                    "name": name,
                    "active": *name == profiles.active_profile,
                    "me_id": p.me_id,
                    "me_server": p.me_server,
                    "hub_server": p.hub_server,
                    "has_keys": p.has_keys(),
                    "access_token": mask_token(&p.access_token),
                })
            })
            .collect();
        let out = serde_json::json!({
            "data_dir": state.data_dir.display().to_string(),
            "profile_file": state.profiles.path().display().to_string(),
            "active_profile": profiles.active_profile,
            "profiles": list,
            "runtime": {
                "max_steps": state.config.max_steps,
                "default_skill_timeout_ms": state.config.default_skill_timeout_ms,
                "output_file": state.config.output_file,
            },
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Profile").fg(Color::Cyan),
            Cell::new("MeID"),
            Cell::new("Me server"),
            Cell::new("Hub server"),
            Cell::new("Keys"),
            Cell::new("Token"),
        ]);

    for (name, p) in &profiles.profiles {
        let label = if *name == profiles.active_profile {
            Cell::new(format!("* {name}")).fg(Color::Green)
        } else {
            Cell::new(format!("  {name}"))
        };
        table.add_row(vec![
            label,
            Cell::new(&p.me_id),
            Cell::new(&p.me_server),
            Cell::new(&p.hub_server),
            Cell::new(if p.has_keys() { "yes" } else { "no" }),
            Cell::new(mask_token(&p.access_token)),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    println!("  Data dir:      {}", state.data_dir.display());
    println!("  Profile file:  {}", state.profiles.path().display());
    println!("  Max steps:     {}", state.config.max_steps);
    println!("  Skill timeout: {} ms", state.config.default_skill_timeout_ms);
    println!("  Build output:  {}", state.config.output_file);
    println!();

    Ok(())
}

fn handle_use(state: &AppState, name: &str, json: bool) -> Result<()> {
    state
        .profiles
        .use_profile(name)
        .with_context(|| format!("Cannot switch to profile '{name}'"))?;

    if json {
        println!("{}", serde_json::json!({"active_profile": name}));
    } else {
        println!(
            "  {} Active profile is now '{}'",
            style("✓").green().bold(),
            style(name).cyan()
        );
    }
    Ok(())
}

fn handle_set(
    state: &AppState,
    token: Option<String>,
    hub: Option<String>,
    me: Option<String>,
    json: bool,
) -> Result<()> {
    if token.is_none() && hub.is_none() && me.is_none() {
        bail!("Nothing to set; pass at least one of --token, --hub, --me");
    }

    let mut modified = false;
    let profile = state
        .profiles
        .update_active(|profile| modified = apply_profile_update(profile, token, hub, me))?;

    if !modified {
        bail!("Nothing to set; all values were empty");
    }

    if json {
        println!(
            "{}",
            serde_json::json!({
                "profile": profile.name,
                "me_server": profile.me_server,
                "hub_server": profile.hub_server,
                "access_token": mask_token(&profile.access_token),
            })
        );
    } else {
        println!(
            "  {} Updated profile '{}'",
            style("✓").green().bold(),
            style(&profile.name).cyan()
        );
    }
    Ok(())
}

fn handle_setup(state: &AppState, json: bool) -> Result<()> {
    let profiles = state.profiles.load()?;
    let Some(current) = profiles.active().cloned() else {
        bail!("Active profile '{}' does not exist", profiles.active_profile);
    };

    let hub: String = Input::new()
        .with_prompt("Hub server")
        .default(current.hub_server.clone())
        .interact_text()?;
    let me: String = Input::new()
        .with_prompt("Me server")
        .default(current.me_server.clone())
        .interact_text()?;
    let token = Password::new()
        .with_prompt(format!(
            "Access token {}",
            style("(leave empty to keep)").dim()
        ))
        .allow_empty_password(true)
        .interact()?;

    let profile = state
        .profiles
        .update_active(|profile| {
            apply_profile_update(profile, Some(token), Some(hub), Some(me));
        })?;

    if json {
        println!("{}", serde_json::json!({"profile": profile.name, "updated": true}));
    } else {
        println!(
            "  {} Saved profile '{}'",
            style("✓").green().bold(),
            style(&profile.name).cyan()
        );
    }
    Ok(())
}
