//! PKCS#12 file provider.
//!
//! Every resolve creates a fresh `EphemeralKeyStore`, imports the key file
//! into it and discards it before returning. Raw key-file bytes and the
//! passphrase copy handed to OpenSSL are zeroized when the store drops, on
//! success and error paths alike.

use crate::adapters::provider::CertificateProvider;
use crate::domain::crypto::{CertificateSource, Identity, IdentityRef, Passphrase};
use crate::infra::error::{AssemblyError, AssemblyResult, ResolutionFailure};
use crate::services::cert_validator::CertificateValidator;
use openssl::error::ErrorStack;
use openssl::pkcs12::Pkcs12;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use zeroize::Zeroizing;

pub struct FileStoreProvider {
    path: PathBuf,
    passphrase: Passphrase,
}

impl FileStoreProvider {
    pub fn new<P: AsRef<Path>>(path: P, passphrase: Passphrase) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            passphrase,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CertificateProvider for FileStoreProvider {
    fn source(&self) -> CertificateSource {
        CertificateSource::File
    }

    fn resolve_signer(&self, identity: &IdentityRef) -> AssemblyResult<Identity> {
        let label = if identity.is_empty() {
            self.path.display().to_string()
        } else {
            identity.to_string()
        };
        log::info!("Loading signer certificate from {}", self.path.display());

        let store = EphemeralKeyStore::open(&self.path)
            .map_err(|cause| AssemblyError::resolution(&label, cause))?;
        let resolved = store
            .import(&self.passphrase)
            .map_err(|cause| AssemblyError::resolution(&label, cause))?;
        drop(store);

        if !identity.is_empty()
            && identity.as_str().contains('@')
            && !CertificateValidator::covers_address(resolved.certificate(), identity.as_str())
        {
            log::warn!("Certificate in key file is not bound to {identity}");
        }
        log::debug!("Loaded certificate {}", resolved.fingerprint());
        Ok(resolved)
    }

    /// Key material is required at load time, so a loaded identity can always sign.
    fn can_sign(&self, _identity: &Identity) -> bool {
        true
    }
}

/// Process-private store holding one PKCS#12 blob for the duration of a call.
struct EphemeralKeyStore {
    der: Zeroizing<Vec<u8>>,
}

impl EphemeralKeyStore {
    fn open(path: &Path) -> Result<Self, ResolutionFailure> {
        let der = std::fs::read(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => ResolutionFailure::MissingFile(path.display().to_string()),
            _ => ResolutionFailure::StoreUnavailable(format!("{}: {e}", path.display())),
        })?;
        Ok(Self {
            der: Zeroizing::new(der),
        })
    }

    fn import(&self, passphrase: &Passphrase) -> Result<Identity, ResolutionFailure> {
        let pkcs12 = Pkcs12::from_der(&self.der)
            .map_err(|e| ResolutionFailure::Malformed(format!("not a PKCS#12 file: {e}")))?;
        let secret = Zeroizing::new(passphrase.expose().to_string());
        let parsed = pkcs12.parse2(&secret).map_err(|e| parse_failure(&e))?;

        let certificate = parsed.cert.ok_or(ResolutionFailure::MissingCertificate)?;
        let private_key = parsed.pkey.ok_or(ResolutionFailure::MissingPrivateKey)?;
        let chain = parsed
            .ca
            .map(|stack| stack.into_iter().collect())
            .unwrap_or_default();

        let identity = Identity::new(certificate, Some(private_key), chain, CertificateSource::File)
            .map_err(|e| ResolutionFailure::Malformed(e.to_string()))?;
        if !identity.key_matches_certificate() {
            return Err(ResolutionFailure::Malformed(
                "private key does not match certificate".to_string(),
            ));
        }
        Ok(identity)
    }
}

/// Only a failed MAC check means the passphrase is wrong. Anything else
/// (typically an RC2-40 bag the OpenSSL build cannot decrypt) is a file problem.
fn parse_failure(errors: &ErrorStack) -> ResolutionFailure {
    if is_mac_failure(errors.errors().iter().map(|e| e.reason())) {
        ResolutionFailure::WrongPassphrase
    } else {
        ResolutionFailure::Malformed(format!("cannot decode PKCS#12 contents: {errors}"))
    }
}

fn is_mac_failure<'a, I>(reasons: I) -> bool
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    reasons
        .into_iter()
        .flatten()
        .any(|reason| reason.eq_ignore_ascii_case(MAC_VERIFY_FAILURE))
}

const MAC_VERIFY_FAILURE: &str = "mac verify failure";

impl Drop for EphemeralKeyStore {
    fn drop(&mut self) {
        log::debug!("Released ephemeral key store");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mac_failure_is_recognised_among_other_reasons() {
        assert!(is_mac_failure([None, Some("Mac Verify Failure")]));
        assert!(!is_mac_failure([Some("unsupported algorithm"), None]));
        assert!(!is_mac_failure(std::iter::empty()));
    }

    #[test]
    fn undecodable_bags_are_not_reported_as_wrong_passphrase() {
        let empty = ErrorStack::get();
        assert!(matches!(parse_failure(&empty), ResolutionFailure::Malformed(_)));
    }

    #[test]
    fn missing_file_is_its_own_cause() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = EphemeralKeyStore::open(&dir.path().join("absent.p12")).err().unwrap();
        assert!(matches!(err, ResolutionFailure::MissingFile(_)));
    }
}
