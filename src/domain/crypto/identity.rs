use super::Fingerprint;
use crate::infra::error::{AssemblyError, AssemblyResult, ResolutionFailure};
use openssl::pkey::{PKey, PKeyRef, Private};
use openssl::x509::{X509Ref, X509};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where signer identities come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum CertificateSource {
    /// The current user's certificate store, looked up by mailbox address.
    #[default]
    OsStore,
    /// A PKCS#12 key file loaded into an ephemeral store per call.
    File,
}

impl fmt::Display for CertificateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CertificateSource::OsStore => write!(f, "os-store"),
            CertificateSource::File => write!(f, "file"),
        }
    }
}

impl std::str::FromStr for CertificateSource {
    type Err = AssemblyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "os-store" | "store" | "os" => Ok(CertificateSource::OsStore),
            "file" | "pkcs12" => Ok(CertificateSource::File),
            _ => Err(AssemblyError::ConfigurationError(format!(
                "Unknown certificate source: {s}"
            ))),
        }
    }
}

/// Reference to the configured signer identity.
///
/// In store mode this is the signer's mailbox; in file mode it only labels
/// errors and log lines.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdentityRef(String);

impl IdentityRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into().trim().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for IdentityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Certificate, optional private key and chain of a resolved signer.
///
/// Lives for one assembly call. Dropping it frees the key (OpenSSL cleanses
/// key memory on free).
pub struct Identity {
    certificate: X509,
    private_key: Option<PKey<Private>>,
    chain: Vec<X509>,
    fingerprint: Fingerprint,
    source: CertificateSource,
}

impl Identity {
    pub fn new(
        certificate: X509,
        private_key: Option<PKey<Private>>,
        chain: Vec<X509>,
        source: CertificateSource,
    ) -> AssemblyResult<Self> {
        let fingerprint = Fingerprint::of(&certificate).map_err(|e| {
            AssemblyError::resolution(
                "<certificate>",
                ResolutionFailure::Malformed(format!("fingerprint: {e}")),
            )
        })?;
        Ok(Self {
            certificate,
            private_key,
            chain,
            fingerprint,
            source,
        })
    }

    #[must_use]
    pub fn certificate(&self) -> &X509Ref {
        &self.certificate
    }

    #[must_use]
    pub fn private_key(&self) -> Option<&PKeyRef<Private>> {
        self.private_key.as_deref()
    }

    #[must_use]
    pub fn chain(&self) -> &[X509] {
        &self.chain
    }

    #[must_use]
    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    #[must_use]
    pub fn source(&self) -> CertificateSource {
        self.source
    }

    /// True when a private key is present and belongs to the certificate.
    #[must_use]
    pub fn key_matches_certificate(&self) -> bool {
        let Some(key) = self.private_key() else {
            return false;
        };
        match self.certificate.public_key() {
            Ok(public) => public.public_eq(key),
            Err(_) => false,
        }
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("fingerprint", &self.fingerprint)
            .field("source", &self.source)
            .field("has_private_key", &self.private_key.is_some())
            .field("chain_len", &self.chain.len())
            .finish()
    }
}
