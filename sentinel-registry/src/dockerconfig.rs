//! Parses a Docker-format credential file (`~/.docker/config.json` shape) into
//! [`sentinel_core::Credential`] records keyed by registry host.

use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use sentinel_core::Credential;
use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    Json(#[from] serde_json::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Debug, Deserialize)]
struct DockerConfig {
    #[serde(default)]
    auths: BTreeMap<String, AuthEntry>,
}

#[derive(Debug, Deserialize)]
struct AuthEntry {
    #[serde(default)]
    auth: String,
}

/// Decodes `{auths: {server: {auth: base64("user:pass")}}}`, skipping empty `auth` entries.
pub fn parse(data: &str) -> Result<BTreeMap<String, Credential>, Error> {
    let config: DockerConfig = serde_json::from_str(data)?;
    let mut out = BTreeMap::new();

    for (server, entry) in config.auths {
        if entry.auth.is_empty() {
            continue;
        }
        let Ok(decoded) = BASE64.decode(entry.auth.as_bytes()) else {
            continue;
        };
        let Ok(decoded) = String::from_utf8(decoded) else {
            continue;
        };
        let Some((username, secret)) = decoded.split_once(':') else {
            continue;
        };

        out.insert(
            server.clone(),
            Credential {
                id: server.clone(),
                registry: server,
                username: username.to_string(),
                secret: secret.to_string(),
            },
        );
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_auth_entries_and_skips_empty() {
        let user_pass = BASE64.encode("bob:hunter2");
        let json = format!(
            r#"{{"auths":{{"docker.io":{{"auth":"{user_pass}"}},"ghcr.io":{{"auth":""}}}}}}"#
        );
        let creds = parse(&json).unwrap();
        assert_eq!(creds.len(), 1);
        let cred = &creds["docker.io"];
        assert_eq!(cred.username, "bob");
        assert_eq!(cred.secret, "hunter2");
    }

    #[test]
    fn missing_auths_key_is_empty_not_error() {
        let creds = parse("{}").unwrap();
        assert!(creds.is_empty());
    }
}
