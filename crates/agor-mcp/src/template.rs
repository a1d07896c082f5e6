// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Minimal `{{ user.env.X }}` template engine.
//!
//! Generalizes the sibling `sven-mcp::registry::build_mcp_registry`
//! comma-separated allow-list filter into a single-purpose renderer: find
//! every `{{ user.env.KEY }}` token, substitute the user's env value when
//! `KEY` is in the `AGOR_USER_ENV_KEYS` allow-list, and report which tokens
//! failed to resolve so the caller can decide "drop the field" vs. "drop the
//! whole server"

use std::collections::{HashMap, HashSet};

use regex::Regex;

fn token_pattern() -> Regex {
    Regex::new(r"\{\{\s*user\.env\.([A-Za-z0-9_]+)\s*\}\}").expect("static template regex is valid")
}

/// Outcome of rendering one templated string field.
pub enum Rendered {
    /// No `{{ ... }}` tokens at all, or every token resolved.
    Ok(String),
    /// At least one token referenced a key outside `allowed_keys` or
    /// missing from the user's env map.
    Unresolved { missing_keys: Vec<String> },
}

/// Render `input` against `user_env`, only substituting keys present in
/// `allowed_keys` is the `AGOR_USER_ENV_KEYS` allow-list.
pub fn render(input: &str, user_env: &HashMap<String, String>, allowed_keys: &HashSet<String>) -> Rendered {
    let pattern = token_pattern();
    let mut missing = Vec::new();
    let mut had_token = false;
    let rendered = pattern.replace_all(input, |caps: &regex::Captures| {
        had_token = true;
        let key = &caps[1];
        if allowed_keys.contains(key) {
            if let Some(value) = user_env.get(key) {
                return value.clone();
            }
        }
        missing.push(key.to_string());
        String::new()
    });
    if missing.is_empty() {
        Rendered::Ok(rendered.into_owned())
    } else {
        let _ = had_token;
        Rendered::Unresolved { missing_keys: missing }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(names: &[&str]) -> HashSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn plain_string_with_no_tokens_passes_through() {
        let rendered = render("stdio://local", &env(&[]), &keys(&[]));
        assert!(matches!(rendered, Rendered::Ok(s) if s == "stdio://local"));
    }

    #[test]
    fn allow_listed_key_substitutes_value() {
        let rendered = render("bearer {{ user.env.GH_TOKEN }}", &env(&[("GH_TOKEN", "abc123")]), &keys(&["GH_TOKEN"]));
        assert!(matches!(rendered, Rendered::Ok(s) if s == "bearer abc123"));
    }

    #[test]
    fn key_outside_allow_list_is_reported_missing() {
        let rendered = render("{{ user.env.SECRET }}", &env(&[("SECRET", "x")]), &keys(&["OTHER"]));
        match rendered {
            Rendered::Unresolved { missing_keys } => assert_eq!(missing_keys, vec!["SECRET".to_string()]),
            Rendered::Ok(_) => panic!("expected unresolved"),
        }
    }

    #[test]
    fn allow_listed_key_absent_from_user_env_is_reported_missing() {
        let rendered = render("{{ user.env.GH_TOKEN }}", &env(&[]), &keys(&["GH_TOKEN"]));
        assert!(matches!(rendered, Rendered::Unresolved { .. }));
    }
}
