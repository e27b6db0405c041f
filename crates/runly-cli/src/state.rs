//! Application state wiring the infra adapters together.
//!
//! AppState pins the core's port traits to the concrete infra
//! implementations and carries the loaded runtime configuration.

use std::path::PathBuf;
use std::sync::Arc;

use runly_core::compiler::Compiler;
use runly_core::loader::Loader;
use runly_infra::config::load_runtime_config;
use runly_infra::crypto::hash::Sha256ContentHasher;
use runly_infra::crypto::signing::Ed25519SignatureScheme;
use runly_infra::paths::resolve_data_dir;
use runly_infra::profile::ProfileStore;
use runly_types::config::RuntimeConfig;

/// Shared state for one CLI invocation.
pub struct AppState {
    pub data_dir: PathBuf,
    pub config: RuntimeConfig,
    pub profiles: ProfileStore,
    pub loader: Loader,
    pub compiler: Compiler,
}

impl AppState {
    /// Resolve the data directory and load `config.toml`.
    ///
    /// The directory is not created here; only commands that write to it do so.
    pub async fn init() -> Self {
        let data_dir = resolve_data_dir();
        let config = load_runtime_config(&data_dir).await;
        tracing::debug!(data_dir = %data_dir.display(), ?config, "state initialized");

        Self {
            profiles: ProfileStore::in_data_dir(&data_dir),
            loader: Loader::new(),
            compiler: Compiler::new(
                Arc::new(Sha256ContentHasher::new()),
                Arc::new(Ed25519SignatureScheme::new()),
            ),
            data_dir,
            config,
        }
    }
}
