//! Registry credentials and the masking/restoring rules used when they round-trip through
//! the server's UI.

use serde::{Deserialize, Serialize};

const MASK: &str = "****";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Credential {
    pub id: String,
    pub registry: String,
    pub username: String,
    pub secret: String,
}

/// First 4 chars + `****`, or just `****` when the secret is 4 chars or shorter.
fn mask_secret(secret: &str) -> String {
    if secret.len() <= 4 {
        MASK.to_string()
    } else {
        format!("{}{}", &secret[..4], MASK)
    }
}

/// Never mutates its input — returns a masked copy.
pub fn mask_credential_secrets(credentials: &[Credential]) -> Vec<Credential> {
    credentials
        .iter()
        .map(|c| Credential {
            secret: mask_secret(&c.secret),
            ..c.clone()
        })
        .collect()
}

/// Restores the stored secret of `stored` into `incoming` iff `incoming.secret` ends with
/// `****` *and* the ids match; otherwise `incoming` is returned untouched.
pub fn restore_credential_secret(incoming: &Credential, stored: &Credential) -> Credential {
    if incoming.id == stored.id && incoming.secret.ends_with(MASK) {
        Credential {
            secret: stored.secret.clone(),
            ..incoming.clone()
        }
    } else {
        incoming.clone()
    }
}

/// Applies `restore_credential_secret` pairwise by id against a known-good set.
pub fn restore_credential_secrets(incoming: &[Credential], stored: &[Credential]) -> Vec<Credential> {
    incoming
        .iter()
        .map(|inc| match stored.iter().find(|s| s.id == inc.id) {
            Some(s) => restore_credential_secret(inc, s),
            None => inc.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cred(id: &str, secret: &str) -> Credential {
        Credential {
            id: id.to_string(),
            registry: "docker.io".to_string(),
            username: "bob".to_string(),
            secret: secret.to_string(),
        }
    }

    #[test]
    fn mask_long_secret() {
        assert_eq!(mask_secret("supersecretvalue"), "supe****");
    }

    #[test]
    fn mask_short_secret() {
        assert_eq!(mask_secret("abc"), "****");
        assert_eq!(mask_secret("abcd"), "****");
    }

    #[test]
    fn mask_never_mutates_input() {
        let original = vec![cred("1", "supersecretvalue")];
        let masked = mask_credential_secrets(&original);
        assert_eq!(original[0].secret, "supersecretvalue");
        assert_eq!(masked[0].secret, "supe****");
    }

    #[test]
    fn restore_matches_id_and_mask_suffix() {
        let stored = cred("1", "supersecretvalue");
        let incoming = cred("1", "supe****");
        let restored = restore_credential_secret(&incoming, &stored);
        assert_eq!(restored.secret, "supersecretvalue");
    }

    #[test]
    fn restore_skips_on_id_mismatch_or_no_mask_suffix() {
        let stored = cred("1", "supersecretvalue");
        let incoming_wrong_id = cred("2", "supe****");
        assert_eq!(
            restore_credential_secret(&incoming_wrong_id, &stored).secret,
            "supe****"
        );

        let incoming_plain = cred("1", "brandnewsecret");
        assert_eq!(
            restore_credential_secret(&incoming_plain, &stored).secret,
            "brandnewsecret"
        );
    }
}
