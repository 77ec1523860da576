//! On-disk cert/key/host-id persistence, all mode 0600.
//!
//! Write order on enrollment matters: CA, then agent cert, then host-id, then the private
//! key last — a crash partway through leaves the agent still `unenrolled` rather than in an
//! inconsistent half-enrolled state.

use std::path::{Path, PathBuf};

use crate::fsutil;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    Io(#[from] std::io::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

pub struct CertStore {
    dir: PathBuf,
}

pub struct AgentIdentity {
    pub host_id: String,
    pub ca_pem: Vec<u8>,
    pub agent_cert_pem: Vec<u8>,
    pub agent_key_pem: Vec<u8>,
}

impl CertStore {
    pub fn new(dir: PathBuf) -> Self {
        CertStore { dir }
    }

    fn ca_path(&self) -> PathBuf {
        self.dir.join("ca.pem")
    }

    fn cert_path(&self) -> PathBuf {
        self.dir.join("agent.pem")
    }

    fn key_path(&self) -> PathBuf {
        self.dir.join("agent-key.pem")
    }

    fn host_id_path(&self) -> PathBuf {
        self.dir.join("host-id")
    }

    /// All four files present is the `unenrolled -> enrolling` gate.
    pub fn is_enrolled(&self) -> bool {
        [self.ca_path(), self.cert_path(), self.key_path(), self.host_id_path()]
            .iter()
            .all(|p| p.exists())
    }

    pub fn load(&self) -> Result<Option<AgentIdentity>, Error> {
        if !self.is_enrolled() {
            return Ok(None);
        }
        Ok(Some(AgentIdentity {
            host_id: std::fs::read_to_string(self.host_id_path())?.trim().to_string(),
            ca_pem: std::fs::read(self.ca_path())?,
            agent_cert_pem: std::fs::read(self.cert_path())?,
            agent_key_pem: std::fs::read(self.key_path())?,
        }))
    }

    /// Persists a freshly enrolled identity in order: CA, cert,
    /// host-id, key last.
    pub fn persist_enrollment(
        &self,
        ca_pem: &[u8],
        agent_cert_pem: &[u8],
        host_id: &str,
        agent_key_pem: &[u8],
    ) -> Result<(), Error> {
        std::fs::create_dir_all(&self.dir)?;
        fsutil::write_atomic(&self.ca_path(), ca_pem)?;
        fsutil::write_atomic(&self.cert_path(), agent_cert_pem)?;
        fsutil::write_atomic(&self.host_id_path(), host_id.as_bytes())?;
        fsutil::write_atomic(&self.key_path(), agent_key_pem)?;
        Ok(())
    }

    /// `cert-renewal-response` overwrites just the agent certificate file.
    pub fn overwrite_agent_cert(&self, agent_cert_pem: &[u8]) -> Result<(), Error> {
        fsutil::write_atomic(&self.cert_path(), agent_cert_pem)?;
        Ok(())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unenrolled_until_all_four_files_exist() {
        let dir = tempfile::tempdir().unwrap();
        let store = CertStore::new(dir.path().to_path_buf());
        assert!(!store.is_enrolled());

        store
            .persist_enrollment(b"ca", b"cert", "host-1", b"key")
            .unwrap();
        assert!(store.is_enrolled());

        let identity = store.load().unwrap().unwrap();
        assert_eq!(identity.host_id, "host-1");
        assert_eq!(identity.ca_pem, b"ca");
    }
}
