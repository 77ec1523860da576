//! P-256 keypair + PKCS#10 CSR generation for the `enrolling` state.

use rcgen::{CertificateParams, DistinguishedName, DnType, KeyPair, PKCS_ECDSA_P256_SHA256};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    Rcgen(#[from] rcgen::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

pub struct GeneratedCsr {
    pub key_pair_pem: String,
    pub csr_der: Vec<u8>,
}

/// An otherwise-default CSR whose `CommonName` is the host name, signed with a freshly
/// generated P-256 ECDSA key.
pub fn generate_csr(host_name: &str) -> Result<GeneratedCsr, Error> {
    let key_pair = KeyPair::generate_for(&PKCS_ECDSA_P256_SHA256)?;

    let mut params = CertificateParams::new(Vec::<String>::new())?;
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, host_name);
    params.distinguished_name = dn;

    let csr = params.serialize_request(&key_pair)?;

    Ok(GeneratedCsr {
        key_pair_pem: key_pair.serialize_pem(),
        csr_der: csr.der().to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_nonempty_key_and_csr() {
        let generated = generate_csr("host-1.example").unwrap();
        assert!(generated.key_pair_pem.contains("PRIVATE KEY"));
        assert!(!generated.csr_der.is_empty());
    }
}
