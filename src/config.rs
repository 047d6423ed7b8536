use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};

use crate::client::ClientConfig;

/// Default SWEET-CROSS API base URL, used when neither the caller nor the
/// environment nor an rc file provides one.
pub(crate) const DEFAULT_URL: &str = "https://sweetcross.link/api/v1";

#[derive(Debug, Default)]
struct RcConfig {
    url: Option<String>,
    username: Option<String>,
    password: Option<String>,
    verify: Option<bool>,
}

pub(crate) fn load_config(
    url: Option<String>,
    username: Option<String>,
    password: Option<String>,
    verify: Option<bool>,
) -> Result<ClientConfig> {
    let mut url = url.or_else(|| std::env::var("CROSSCLIENT_URL").ok());
    let mut username = username.or_else(|| std::env::var("CROSSCLIENT_USERNAME").ok());
    let mut password = password.or_else(|| std::env::var("CROSSCLIENT_PASSWORD").ok());

    let rc_candidates = rc_candidates();
    let mut file_verify: Option<bool> = None;

    if url.is_none() || username.is_none() || password.is_none() || verify.is_none() {
        for rc_path in &rc_candidates {
            if rc_path.exists() {
                let cfg = read_rc(rc_path).with_context(|| {
                    format!("failed to read configuration file {}", rc_path.display())
                })?;

                if url.is_none() {
                    url = cfg.url;
                }
                if username.is_none() {
                    username = cfg.username;
                }
                if password.is_none() {
                    password = cfg.password;
                }
                file_verify = cfg.verify;
                break;
            }
        }
    }

    // The Python client ships a default base URL; only credentials are
    // strictly required.
    let url = url.unwrap_or_else(|| DEFAULT_URL.to_string());

    let username = match username {
        Some(v) => v,
        None => bail!(missing_credential_message("username", &rc_candidates)),
    };

    let password = match password {
        Some(v) => v,
        None => bail!(missing_credential_message("password", &rc_candidates)),
    };

    let verify = verify.or(file_verify).unwrap_or(true);

    Ok(ClientConfig {
        url,
        username,
        password,
        verify,
    })
}

fn missing_credential_message(key: &str, rc_candidates: &[PathBuf]) -> String {
    let env_var = format!("CROSSCLIENT_{}", key.to_uppercase());
    if rc_candidates.is_empty() {
        return format!(
            "Missing configuration: {} (set {} or create .crossclientrc)",
            key, env_var
        );
    }
    format!(
        "Missing configuration: {} (set {} or put `{}:` in one of: {})",
        key,
        env_var,
        key,
        rc_candidates
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", ")
    )
}

fn read_rc(path: &Path) -> Result<RcConfig> {
    let text = std::fs::read_to_string(path)?;
    let mut cfg = RcConfig::default();

    // Support formatting where `password:` is on one line and the value is
    // on the next line.
    let mut pending_key: Option<&str> = None;

    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(pk) = pending_key {
            // Continuation value line (no colon)
            if !line.contains(':') {
                let v = strip_quotes(line);
                match pk {
                    "url" => cfg.url = Some(v.to_string()),
                    "username" => cfg.username = Some(v.to_string()),
                    "password" => cfg.password = Some(v.to_string()),
                    _ => {}
                }
                pending_key = None;
                continue;
            }
            pending_key = None;
        }

        if let Some((k, v)) = line.split_once(':') {
            let k = k.trim();
            let v = strip_quotes(v.trim());
            match k {
                "url" => {
                    if !v.is_empty() {
                        cfg.url = Some(v.to_string());
                    } else {
                        pending_key = Some("url");
                    }
                }
                "username" => {
                    if !v.is_empty() {
                        cfg.username = Some(v.to_string());
                    } else {
                        pending_key = Some("username");
                    }
                }
                "password" => {
                    if !v.is_empty() {
                        cfg.password = Some(v.to_string());
                    } else {
                        pending_key = Some("password");
                    }
                }
                "verify" => {
                    if !v.is_empty() {
                        cfg.verify = Some(v != "0");
                    }
                }
                _ => {}
            }
        }
    }

    Ok(cfg)
}

fn strip_quotes(s: &str) -> &str {
    let s = s.trim();
    if (s.starts_with('"') && s.ends_with('"') && s.len() >= 2)
        || (s.starts_with('\'') && s.ends_with('\'') && s.len() >= 2)
    {
        &s[1..s.len() - 1]
    } else {
        s
    }
}

fn rc_candidates() -> Vec<PathBuf> {
    // Search order mirrors the .cdsapirc convention used by similar clients:
    // 1) CROSSCLIENT_RC (explicit)
    // 2) ./.crossclientrc (current working directory)
    // 3) ~/.crossclientrc
    if let Ok(p) = std::env::var("CROSSCLIENT_RC") {
        return vec![PathBuf::from(p)];
    }

    let mut v = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        v.push(cwd.join(".crossclientrc"));
    }
    if let Some(home) = dirs::home_dir() {
        v.push(home.join(".crossclientrc"));
    }
    v
}
