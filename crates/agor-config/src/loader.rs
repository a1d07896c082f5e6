// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::Context;
use tracing::debug;

use crate::Config;

/// Ordered list of config file locations searched from lowest to highest priority.
/// Later files override earlier ones.
fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    // 1. System-wide default
    paths.push(PathBuf::from("/etc/agor/config.yaml"));
    paths.push(PathBuf::from("/etc/agor/config.yml"));

    // 2. XDG / home
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".config/agor/config.yaml"));
        paths.push(home.join(".config/agor/config.yml"));
    }
    if let Some(cfg) = dirs::config_dir() {
        paths.push(cfg.join("agor/config.yaml"));
        paths.push(cfg.join("agor/config.yml"));
    }

    // 3. Workspace-local
    paths.push(PathBuf::from(".agor/config.yaml"));
    paths.push(PathBuf::from(".agor/config.yml"));
    paths.push(PathBuf::from(".agor.yaml"));
    paths.push(PathBuf::from(".agor.yml"));
    paths.push(PathBuf::from("agor.yaml"));
    paths.push(PathBuf::from("agor.yml"));

    paths
}

/// Load configuration by merging all discovered YAML files, then applying
/// environment overrides, highest priority last.
/// The `extra` argument may provide an explicit path (e.g. `--config` CLI flag).
pub fn load(extra: Option<&Path>) -> anyhow::Result<Config> {
    let mut merged = serde_yaml::Value::Mapping(serde_yaml::Mapping::new());

    for path in config_search_paths() {
        if path.is_file() {
            debug!(path = %path.display(), "loading config layer");
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            let layer: serde_yaml::Value = serde_yaml::from_str(&text)
                .with_context(|| format!("parsing {}", path.display()))?;
            merge_yaml(&mut merged, layer);
        }
    }

    if let Some(p) = extra {
        debug!(path = %p.display(), "loading explicit config");
        let text =
            std::fs::read_to_string(p).with_context(|| format!("reading {}", p.display()))?;
        let layer: serde_yaml::Value =
            serde_yaml::from_str(&text).with_context(|| format!("parsing {}", p.display()))?;
        merge_yaml(&mut merged, layer);
    }

    let mut config: Config = if matches!(merged, serde_yaml::Value::Mapping(ref m) if m.is_empty())
    {
        Config::default()
    } else {
        serde_yaml::from_value(merged).unwrap_or_default()
    };

    apply_env_overrides(&mut config);
    Ok(config)
}

/// Environment variables win over every config file. Each one maps to
/// exactly the field named in its doc comment in `schema.rs`.
fn apply_env_overrides(config: &mut Config) {
    if let Ok(dialect) = std::env::var("AGOR_DB_DIALECT") {
        match crate::DbDialect::from_str(&dialect) {
            Ok(d) => config.database.dialect = d,
            Err(e) => tracing::warn!(%e, value = %dialect, "ignoring invalid AGOR_DB_DIALECT"),
        }
    }
    if let Ok(url) = std::env::var("DATABASE_URL") {
        config.database.url = Some(url);
    }
    if let Ok(bind) = std::env::var("AGOR_GATEWAY_BIND") {
        config.gateway.bind_addr = bind;
    }
    if let Ok(secret) = std::env::var("AGOR_TOKEN_SECRET") {
        config.gateway.token_secret = Some(secret);
    }
    if let Ok(keys) = std::env::var("AGOR_USER_ENV_KEYS") {
        config.user_env_keys = keys
            .split(',')
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();
    }
}

/// Deep-merge `src` into `dst`; src wins on scalar conflicts.
fn merge_yaml(dst: &mut serde_yaml::Value, src: serde_yaml::Value) {
    match (dst, src) {
        (serde_yaml::Value::Mapping(d), serde_yaml::Value::Mapping(s)) => {
            for (k, v) in s {
                let entry = d
                    .entry(k)
                    .or_insert(serde_yaml::Value::Mapping(serde_yaml::Mapping::new()));
                merge_yaml(entry, v);
            }
        }
        (dst, src) => *dst = src,
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn val(s: &str) -> serde_yaml::Value {
        serde_yaml::from_str(s).unwrap()
    }

    #[test]
    fn merge_scalar_src_wins() {
        let mut dst = val("x: 1");
        let src = val("x: 2");
        merge_yaml(&mut dst, src);
        assert_eq!(dst["x"].as_i64(), Some(2));
    }

    #[test]
    fn merge_preserves_keys_not_in_src() {
        let mut dst = val("a: 1\nb: 2");
        let src = val("b: 99");
        merge_yaml(&mut dst, src);
        assert_eq!(dst["a"].as_i64(), Some(1));
        assert_eq!(dst["b"].as_i64(), Some(99));
    }

    #[test]
    fn merge_nested_tables() {
        let mut dst = val("gateway:\n  bind_addr: 127.0.0.1:4170\n  token_ttl_days: 7");
        let src = val("gateway:\n  token_ttl_days: 1");
        merge_yaml(&mut dst, src);
        assert_eq!(dst["gateway"]["bind_addr"].as_str(), Some("127.0.0.1:4170"));
        assert_eq!(dst["gateway"]["token_ttl_days"].as_i64(), Some(1));
    }

    #[test]
    fn load_returns_error_when_explicit_path_missing() {
        let result = load(Some(Path::new("/tmp/agor_nonexistent_config_xyz.yaml")));
        assert!(result.is_err());
    }

    #[test]
    fn load_with_no_extra_path_returns_defaults() {
        let _guard = ENV_LOCK.lock().unwrap();
        let cfg = load(None).unwrap();
        assert_eq!(cfg.gateway.bind_addr, "127.0.0.1:4170");
    }

    #[test]
    fn load_explicit_file_overrides_defaults() {
        use std::io::Write;
        let _guard = ENV_LOCK.lock().unwrap();
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "gateway:\n  bind_addr: 0.0.0.0:9999").unwrap();
        let cfg = load(Some(f.path())).unwrap();
        assert_eq!(cfg.gateway.bind_addr, "0.0.0.0:9999");
    }

    #[test]
    fn database_url_env_override_wins_over_file() {
        use std::io::Write;
        let _guard = ENV_LOCK.lock().unwrap();
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "database:\n  url: file:///tmp/from-file.sqlite3").unwrap();
        std::env::set_var("DATABASE_URL", "file:///tmp/from-env.sqlite3");
        let cfg = load(Some(f.path())).unwrap();
        std::env::remove_var("DATABASE_URL");
        assert_eq!(cfg.database.url.as_deref(), Some("file:///tmp/from-env.sqlite3"));
    }

    #[test]
    fn user_env_keys_parsed_from_comma_separated_env() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("AGOR_USER_ENV_KEYS", "GITHUB_TOKEN, NPM_TOKEN ,");
        let cfg = load(None).unwrap();
        std::env::remove_var("AGOR_USER_ENV_KEYS");
        assert_eq!(cfg.user_env_keys, vec!["GITHUB_TOKEN".to_string(), "NPM_TOKEN".to_string()]);
    }
}
