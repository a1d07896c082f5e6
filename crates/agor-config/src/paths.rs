// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Layout of `~/.agor/`, the daemon's data directory: the SQLite file, the
//! CLI's persisted bearer token (mode 0600, the teacher's existing
//! token-file permission discipline), a worktree shadow tree, and one
//! vendor transcript import cache per vendor family.
use std::path::PathBuf;

use anyhow::{anyhow, Result};

pub fn data_dir() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|h| h.join(".agor"))
        .ok_or_else(|| anyhow!("could not determine home directory"))
}

pub fn db_path() -> Result<PathBuf> {
    Ok(data_dir()?.join("agor.sqlite3"))
}

pub fn cli_token_path() -> Result<PathBuf> {
    Ok(data_dir()?.join("cli-token"))
}

pub fn config_path() -> Result<PathBuf> {
    Ok(data_dir()?.join("config.yaml"))
}

pub fn worktrees_dir() -> Result<PathBuf> {
    Ok(data_dir()?.join("worktrees"))
}

pub fn vendor_import_cache_dir(vendor: &str) -> Result<PathBuf> {
    Ok(data_dir()?.join("imports").join(vendor))
}

/// Creates `~/.agor/` and its fixed subdirectories if missing. Idempotent.
pub fn ensure_data_dir() -> Result<PathBuf> {
    let dir = data_dir()?;
    std::fs::create_dir_all(&dir)?;
    std::fs::create_dir_all(worktrees_dir()?)?;
    std::fs::create_dir_all(dir.join("imports"))?;
    Ok(dir)
}

/// Persists `token` to `cli-token` with mode 0600, creating the data
/// directory first if needed.
#[cfg(unix)]
pub fn write_cli_token(token: &str) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    ensure_data_dir()?;
    let path = cli_token_path()?;
    std::fs::write(&path, token)?;
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
pub fn write_cli_token(token: &str) -> Result<()> {
    ensure_data_dir()?;
    std::fs::write(cli_token_path()?, token)?;
    Ok(())
}

pub fn read_cli_token() -> Result<String> {
    Ok(std::fs::read_to_string(cli_token_path()?)?.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn db_path_lives_under_data_dir() {
        let db = db_path().unwrap();
        let dir = data_dir().unwrap();
        assert!(db.starts_with(&dir));
        assert_eq!(db.file_name().unwrap(), "agor.sqlite3");
    }

    #[test]
    fn vendor_import_cache_dir_is_namespaced_per_vendor() {
        let claude = vendor_import_cache_dir("claude-code").unwrap();
        let codex = vendor_import_cache_dir("codex").unwrap();
        assert_ne!(claude, codex);
    }
}
