use rustls_pemfile::Item;
use thiserror::Error;
use x509_cert::der::pem::LineEnding;
use x509_cert::der::{Decode, Encode};
use x509_cert::Certificate;

use std::fmt::{Debug, Formatter, Result as FormatterResult};
use std::path::{Path, PathBuf};

#[cfg(test)]
pub(crate) mod tests;

const CERTIFICATE_LABEL: &str = "CERTIFICATE";
const PUBLIC_KEY_LABEL: &str = "PUBLIC KEY";

/// Kind of PEM block a [`TrustedCertificate`] was loaded from.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CertificateKind {
    /// X.509 certificate (`CERTIFICATE`).
    X509,
    /// SubjectPublicKeyInfo public key (`PUBLIC KEY`).
    PublicKey,
}

/// Public key material trusted to sign ID tokens with an asymmetric algorithm.
#[derive(Clone)]
pub struct TrustedCertificate {
    source: String,
    kind: CertificateKind,
    spki_der: Vec<u8>,
    pem: String,
}
impl TrustedCertificate {
    /// Parse every `CERTIFICATE` and `PUBLIC KEY` block in `pem`. Sections with other labels are
    /// skipped, except private keys, CRLs and CSRs, which are rejected. `source` names where the
    /// text came from and is used only in logs and errors.
    pub fn from_pem(source: &str, pem: &str) -> Result<Vec<Self>, CertificateError> {
        let certificates = rustls_pemfile::read_all(&mut pem.as_bytes())
            .map(|item| {
                let item =
                    item.map_err(|err| CertificateError::Pem(format!("{}: {}", source, err)))?;
                Self::from_pem_item(source, item)
            })
            .collect::<Result<Vec<_>, _>>()?;
        if certificates.is_empty() {
            return Err(CertificateError::Empty(source.to_string()));
        }
        Ok(certificates)
    }

    fn from_pem_item(source: &str, item: Item) -> Result<Self, CertificateError> {
        let der_error =
            |err: x509_cert::der::Error| CertificateError::Der(format!("{}: {}", source, err));

        let (kind, label, der, spki_der) = match item {
            Item::X509Certificate(der) => {
                let der = der.as_ref().to_vec();
                let spki_der = Certificate::from_der(&der)
                    .map_err(der_error)?
                    .tbs_certificate
                    .subject_public_key_info
                    .to_der()
                    .map_err(der_error)?;
                (CertificateKind::X509, CERTIFICATE_LABEL, der, spki_der)
            }
            Item::SubjectPublicKeyInfo(der) => {
                let der = der.as_ref().to_vec();
                (CertificateKind::PublicKey, PUBLIC_KEY_LABEL, der.clone(), der)
            }
            Item::Pkcs1Key(_) => return Err(unsupported("RSA PRIVATE KEY")),
            Item::Pkcs8Key(_) => return Err(unsupported("PRIVATE KEY")),
            Item::Sec1Key(_) => return Err(unsupported("EC PRIVATE KEY")),
            Item::Crl(_) => return Err(unsupported("X509 CRL")),
            Item::Csr(_) => return Err(unsupported("CERTIFICATE REQUEST")),
            _ => return Err(unsupported("unknown section")),
        };
        let pem = x509_cert::der::pem::encode_string(label, LineEnding::LF, &der)
            .map_err(|err| CertificateError::Pem(format!("{}: {}", source, err)))?;

        Ok(Self {
            source: source.to_string(),
            kind,
            spki_der,
            pem,
        })
    }

    /// Where this certificate was loaded from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Kind of PEM block the key was extracted from.
    pub fn kind(&self) -> CertificateKind {
        self.kind
    }

    /// DER-encoded SubjectPublicKeyInfo of the trusted key.
    pub fn public_key_der(&self) -> &[u8] {
        &self.spki_der
    }

    /// The key material re-encoded as a PEM block, suitable for adding to an HTTP client's trust
    /// store.
    pub fn pem(&self) -> &str {
        &self.pem
    }
}
impl Debug for TrustedCertificate {
    fn fmt(&self, f: &mut Formatter) -> FormatterResult {
        f.debug_struct("TrustedCertificate")
            .field("source", &self.source)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Error loading trusted certificates.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CertificateError {
    /// The certificate file could not be read.
    #[error("Failed to read certificate file `{}`", path.display())]
    Io {
        /// Resolved path of the file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The input contained no PEM blocks.
    #[error("No PEM blocks found in {0}")]
    Empty(String),
    /// A PEM block was malformed.
    #[error("Malformed PEM: {0}")]
    Pem(String),
    /// A PEM block's DER payload could not be parsed.
    #[error("Malformed certificate: {0}")]
    Der(String),
    /// A PEM block held something other than a certificate or public key.
    #[error("Unsupported PEM block: {0}")]
    UnsupportedLabel(String),
}

/// Resolve `path` against `root`. Paths are always relative to the root, even when written with a
/// leading `/`.
pub fn resolve_certificate_path(root: &Path, path: &str) -> PathBuf {
    root.join(path.trim_start_matches('/'))
}

/// Load every PEM block from each of `paths`, resolved against `root`.
pub fn load_certificates<P>(
    root: &Path,
    paths: &[P],
) -> Result<Vec<TrustedCertificate>, CertificateError>
where
    P: AsRef<str>,
{
    let mut certificates = Vec::new();
    for path in paths {
        let resolved = resolve_certificate_path(root, path.as_ref());
        log::debug!("loading trusted certificates from {}", resolved.display());
        let pem = std::fs::read_to_string(&resolved).map_err(|source| CertificateError::Io {
            path: resolved.clone(),
            source,
        })?;
        certificates.extend(TrustedCertificate::from_pem(
            &resolved.display().to_string(),
            &pem,
        )?);
    }
    Ok(certificates)
}

fn unsupported(label: &str) -> CertificateError {
    CertificateError::UnsupportedLabel(label.to_string())
}
