// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

/// Top-level daemon configuration, merged from layered YAML files and then
/// overridden field-by-field by the environment variables named in each
/// field's doc comment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub executor: ExecutorConfig,
    /// Environment variable names a session owner is allowed to expose to
    /// `{{ user.env.X }}` templates in MCP server definitions. Overridden
    /// wholesale by `AGOR_USER_ENV_KEYS` (comma-separated).
    #[serde(default)]
    pub user_env_keys: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DbDialect {
    Sqlite,
    Postgres,
}

impl Default for DbDialect {
    fn default() -> Self {
        DbDialect::Sqlite
    }
}

impl std::str::FromStr for DbDialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sqlite" => Ok(DbDialect::Sqlite),
            "postgres" | "postgresql" => Ok(DbDialect::Postgres),
            other => Err(format!("unknown db dialect: {other}")),
        }
    }
}

/// Selects the entity store backend. Only `Sqlite` is implemented; a
/// `Postgres` selection is accepted here so `DATABASE_URL=postgres://...`
/// fails with a clear "not built in this distribution" error from
/// `agor-store` rather than this crate silently downgrading it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Store backend. Overridden by `AGOR_DB_DIALECT`.
    #[serde(default)]
    pub dialect: DbDialect,
    /// Connection string or filesystem path. Overridden by `DATABASE_URL`.
    /// Left `None` to use the default `~/.agor/agor.sqlite3` path.
    pub url: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            dialect: DbDialect::Sqlite,
            url: None,
        }
    }
}

fn default_bind_addr() -> String {
    "127.0.0.1:4170".into()
}
fn default_token_ttl_days() -> u64 {
    7
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Address the HTTP/WebSocket surface binds to. Overridden by
    /// `AGOR_GATEWAY_BIND`.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// HMAC-SHA256 signing secret for bearer tokens. Overridden by
    /// `AGOR_TOKEN_SECRET`; when absent a secret is generated on first run
    /// and persisted under the daemon's data directory.
    pub token_secret: Option<String>,
    /// Default lifetime for a freshly minted login token.
    #[serde(default = "default_token_ttl_days")]
    pub token_ttl_days: u64,
    /// Require TLS termination to happen in front of this process (reverse
    /// proxy) rather than inside it.
    #[serde(default = "default_true")]
    pub behind_tls_proxy: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            token_secret: None,
            token_ttl_days: default_token_ttl_days(),
            behind_tls_proxy: true,
        }
    }
}

fn default_cancel_grace_secs() -> u64 {
    5
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Path to the `agor-executor` binary. Defaults to a sibling of the
    /// running daemon binary when unset.
    pub executor_path: Option<String>,
    /// Grace period between SIGTERM and SIGKILL when cancelling a task.
    #[serde(default = "default_cancel_grace_secs")]
    pub cancel_grace_secs: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            executor_path: None,
            cancel_grace_secs: default_cancel_grace_secs(),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_default_dialect_is_sqlite() {
        let c = Config::default();
        assert_eq!(c.database.dialect, DbDialect::Sqlite);
    }

    #[test]
    fn config_default_bind_addr() {
        let c = Config::default();
        assert_eq!(c.gateway.bind_addr, "127.0.0.1:4170");
    }

    #[test]
    fn config_default_token_ttl_is_seven_days() {
        let c = Config::default();
        assert_eq!(c.gateway.token_ttl_days, 7);
    }

    #[test]
    fn config_default_user_env_keys_is_empty() {
        let c = Config::default();
        assert!(c.user_env_keys.is_empty());
    }

    #[test]
    fn dialect_parses_case_insensitively() {
        assert_eq!("SQLite".parse::<DbDialect>().unwrap(), DbDialect::Sqlite);
        assert_eq!("postgresql".parse::<DbDialect>().unwrap(), DbDialect::Postgres);
        assert!("mysql".parse::<DbDialect>().is_err());
    }

    #[test]
    fn config_partial_yaml_fills_in_defaults() {
        let yaml = "gateway:\n  bind_addr: 0.0.0.0:9000\n";
        let c: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(c.gateway.bind_addr, "0.0.0.0:9000");
        assert_eq!(c.gateway.token_ttl_days, 7);
        assert_eq!(c.database.dialect, DbDialect::Sqlite);
    }

    #[test]
    fn config_round_trips_through_yaml() {
        let mut c = Config::default();
        c.user_env_keys = vec!["GITHUB_TOKEN".into(), "NPM_TOKEN".into()];
        let yaml = serde_yaml::to_string(&c).unwrap();
        let back: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back.user_env_keys, c.user_env_keys);
    }
}
