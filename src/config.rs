//! Credential and environment-file loading.
//!
//! Auth resolution is deliberately layered: explicit CLI flags win, then
//! process environment variables, then a dotenv-style `.n8n-auth` file at
//! the repository root. The pure resolver is separated from the ambient
//! readers so it can be tested without touching process state.

use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::path::Path;

pub const ENV_API_URL: &str = "N8N_API_URL";
pub const ENV_API_KEY: &str = "N8N_API_KEY";
const AUTH_FILE_NAME: &str = ".n8n-auth";

/// Connection credentials for one n8n instance.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub api_url: String,
    pub api_key: String,
}

/// Load auth from CLI flags, the environment, and `.n8n-auth`.
pub fn load_auth(
    repo_root: &Path,
    cli_api_url: Option<&str>,
    cli_api_key: Option<&str>,
) -> Result<AuthConfig> {
    let file_vars = match std::fs::read_to_string(repo_root.join(AUTH_FILE_NAME)) {
        Ok(content) => parse_env_file(&content),
        Err(_) => BTreeMap::new(),
    };
    resolve_auth(
        cli_api_url,
        cli_api_key,
        std::env::var(ENV_API_URL).ok().as_deref(),
        std::env::var(ENV_API_KEY).ok().as_deref(),
        &file_vars,
    )
}

fn resolve_auth(
    cli_api_url: Option<&str>,
    cli_api_key: Option<&str>,
    env_api_url: Option<&str>,
    env_api_key: Option<&str>,
    file_vars: &BTreeMap<String, String>,
) -> Result<AuthConfig> {
    let api_url = first_nonempty(cli_api_url, env_api_url, file_vars.get(ENV_API_URL));
    let api_key = first_nonempty(cli_api_key, env_api_key, file_vars.get(ENV_API_KEY));

    let api_url = api_url.ok_or_else(|| {
        Error::Config(format!(
            "{ENV_API_URL} not found; provide via --api-url, the {ENV_API_URL} env var, or {AUTH_FILE_NAME}"
        ))
    })?;
    let api_key = api_key.ok_or_else(|| {
        Error::Config(format!(
            "{ENV_API_KEY} not found; provide via --api-key, the {ENV_API_KEY} env var, or {AUTH_FILE_NAME}"
        ))
    })?;

    Ok(AuthConfig { api_url, api_key })
}

fn first_nonempty(
    cli: Option<&str>,
    env: Option<&str>,
    file: Option<&String>,
) -> Option<String> {
    cli.filter(|value| !value.is_empty())
        .or_else(|| env.filter(|value| !value.is_empty()))
        .or_else(|| file.map(String::as_str).filter(|value| !value.is_empty()))
        .map(str::to_string)
}

/// Parse a dotenv-style file: KEY=VALUE lines, `#` comments, optional
/// single or double quotes around the value.
pub fn parse_env_file(content: &str) -> BTreeMap<String, String> {
    let mut result = BTreeMap::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        let value = unquote(value.trim());
        if !key.is_empty() && !value.is_empty() {
            result.insert(key.to_string(), value.to_string());
        }
    }
    result
}

fn unquote(value: &str) -> &str {
    let stripped = value
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .or_else(|| {
            value
                .strip_prefix('\'')
                .and_then(|rest| rest.strip_suffix('\''))
        });
    stripped.unwrap_or(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_basic_auth_file() {
        let vars = parse_env_file("N8N_API_URL=http://localhost:5678\nN8N_API_KEY=secret\n");
        assert_eq!(vars["N8N_API_URL"], "http://localhost:5678");
        assert_eq!(vars["N8N_API_KEY"], "secret");
    }

    #[test]
    fn parse_strips_quotes_and_comments() {
        let vars = parse_env_file(
            "# comment\n\nN8N_API_URL=\"http://a\"\nN8N_API_KEY='k'\nBARE = value \n",
        );
        assert_eq!(vars["N8N_API_URL"], "http://a");
        assert_eq!(vars["N8N_API_KEY"], "k");
        assert_eq!(vars["BARE"], "value");
        assert_eq!(vars.len(), 3);
    }

    #[test]
    fn cli_flags_win_over_env_and_file() {
        let mut file_vars = BTreeMap::new();
        file_vars.insert(ENV_API_URL.to_string(), "http://file".to_string());
        file_vars.insert(ENV_API_KEY.to_string(), "file-key".to_string());

        let auth = resolve_auth(
            Some("http://cli"),
            None,
            Some("http://env"),
            Some("env-key"),
            &file_vars,
        )
        .unwrap();
        assert_eq!(auth.api_url, "http://cli");
        assert_eq!(auth.api_key, "env-key");
    }

    #[test]
    fn file_fills_in_when_nothing_else_set() {
        let mut file_vars = BTreeMap::new();
        file_vars.insert(ENV_API_URL.to_string(), "http://file".to_string());
        file_vars.insert(ENV_API_KEY.to_string(), "file-key".to_string());

        let auth = resolve_auth(None, None, None, None, &file_vars).unwrap();
        assert_eq!(auth.api_url, "http://file");
        assert_eq!(auth.api_key, "file-key");
    }

    #[test]
    fn missing_credentials_is_config_error() {
        let err = resolve_auth(None, None, None, None, &BTreeMap::new()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("N8N_API_URL"));
    }
}
