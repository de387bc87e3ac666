//! # Snapshot Persistence
//!
//! The ledger state lives in memory while the node runs. It is restored from
//! `state.json` in the data directory on startup and written back on
//! shutdown. Writes go to a temporary file first and are renamed into place,
//! so a crash mid-write never leaves a truncated snapshot behind.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use hena_token::config::{TokenConfig, SNAPSHOT_FILE_NAME};
use hena_token::service::TokenState;

/// Snapshot location inside `data_dir`.
pub fn snapshot_path(data_dir: &Path) -> PathBuf {
    data_dir.join(SNAPSHOT_FILE_NAME)
}

/// Reads a snapshot. `Ok(None)` when the file does not exist.
pub fn load(path: &Path) -> Result<Option<TokenState>> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read snapshot {}", path.display()))?;
    let state = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse snapshot {}", path.display()))?;
    Ok(Some(state))
}

/// Writes a snapshot atomically.
pub fn save(path: &Path, state: &TokenState) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    let body = serde_json::to_vec_pretty(state).context("failed to encode snapshot")?;
    fs::write(&tmp, body)
        .with_context(|| format!("failed to write snapshot {}", tmp.display()))?;
    fs::rename(&tmp, path)
        .with_context(|| format!("failed to move snapshot into place at {}", path.display()))?;
    tracing::info!(path = %path.display(), "snapshot written");
    Ok(())
}

/// Reads and validates a genesis file.
pub fn load_genesis(path: &Path) -> Result<TokenConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read genesis file {}", path.display()))?;
    let config: TokenConfig = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse genesis file {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("invalid genesis file {}", path.display()))?;
    Ok(config)
}

/// Writes `config` as a pretty-printed genesis file.
pub fn write_genesis(path: &Path, config: &TokenConfig) -> Result<()> {
    let body = serde_json::to_vec_pretty(config).context("failed to encode genesis")?;
    fs::write(path, body)
        .with_context(|| format!("failed to write genesis file {}", path.display()))
}
