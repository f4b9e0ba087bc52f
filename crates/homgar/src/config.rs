//! Config resolution and the cloud session lifecycle for one CLI run.

use std::path::PathBuf;

use tracing::{debug, warn};

use homgar_config::Config;
use homgar_core::{Coordinator, CoordinatorConfig, CoreError};

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Config file selected by `--config`, or the platform default.
pub fn resolve_path(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(homgar_config::config_path)
}

pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    Ok(homgar_config::load_config_from(&resolve_path(global))?)
}

/// A coordinator with the cached session restored.
pub fn build_coordinator(
    cfg: &Config,
    coordinator_config: CoordinatorConfig,
) -> Result<Coordinator, CliError> {
    let coordinator = Coordinator::new(coordinator_config)?;
    if let Some(cache) = homgar_config::load_auth_cache(&cfg.auth_cache_path()) {
        debug!("restoring cached session");
        coordinator.cloud().restore_session(cache);
    }
    Ok(coordinator)
}

/// Persist the current session so the next run can skip the login.
pub fn save_session(cfg: &Config, coordinator: &Coordinator) {
    let Some(session) = coordinator.cloud().session() else {
        return;
    };
    let path = cfg.auth_cache_path();
    if let Err(e) = homgar_config::save_auth_cache(&path, &session) {
        warn!(path = %path.display(), error = %e, "could not save auth cache");
    }
}

/// Run one poll cycle with push and periodic polling off, hand the
/// coordinator to `f`, shut down and save the session.
pub async fn run_once<F, Fut, T>(cfg: &Config, f: F) -> Result<T, CliError>
where
    F: FnOnce(Coordinator) -> Fut,
    Fut: Future<Output = Result<T, CoreError>>,
{
    let mut coordinator_config = cfg.to_coordinator_config()?;
    coordinator_config.push_enabled = false;
    coordinator_config.poll_interval_secs = 0;

    let coordinator = build_coordinator(cfg, coordinator_config)?;
    let result = coordinator.run_once(f).await;
    save_session(cfg, &coordinator);
    Ok(result?)
}
