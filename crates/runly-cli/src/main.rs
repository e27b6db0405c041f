//! Runly CLI entry point.
//!
//! Binary name: `runly`
//!
//! Parses CLI arguments, sets up tracing, loads the runtime configuration
//! and local profiles, then dispatches to the command handler.

mod cli;
mod state;

use clap::Parser;
use clap_complete::generate;

use cli::{Cli, Commands};
use runly_observe::tracing_setup::{init_tracing, shutdown_tracing, verbosity_directive};
use state::AppState;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(verbosity_directive(cli.verbose, cli.quiet), cli.otel) {
        eprintln!("Warning: failed to initialize tracing: {e}");
    }

    // Shell completions don't need app state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "runly", &mut std::io::stdout());
        shutdown_tracing();
        return Ok(());
    }

    let state = AppState::init().await;
    let result = dispatch(cli, &state).await;

    shutdown_tracing();
    result
}

async fn dispatch(cli: Cli, state: &AppState) -> anyhow::Result<()> {
    match cli.command {
        Commands::Check { file, unsigned } => cli::asset::handle_check(state, &file, unsigned, cli.json),

        Commands::Build { file, output } => cli::asset::handle_build(state, &file, output, cli.json),

        Commands::Run {
            file,
            inputs,
            sandbox,
            yes,
            max_steps,
        } => cli::run::handle_run(state, &file, &inputs, sandbox, yes, max_steps, cli.json).await,

        Commands::Keys { action } => cli::keys::handle_keys_command(action, state, cli.json),

        Commands::Config { action } => cli::config::handle_config_command(action, state, cli.json),

        Commands::Completions { .. } => Ok(()),
    }
}
